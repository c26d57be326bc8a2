mod backend;
mod cli;
mod io;
mod logging;
mod lsp;
mod resolver;
mod symbol;

#[cfg(test)]
mod test_utils;

use clap::Parser;
use cli::Args;
use logging::{LogConfig, init_logging};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging with configuration from env vars and CLI args
    let log_config = LogConfig::from_env().with_overrides(args.log_level.clone(), args.log_file.clone());

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = cli::run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
