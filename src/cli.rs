//! Command-line and REPL front end
//!
//! One backend session serves a single command or a whole REPL loop.
//! Results go to stdout, as text or JSON; diagnostics go through `tracing`
//! to stderr or the log file.

use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::backend::{
    BackendConfig, BackendConfigBuilder, BackendConfigError, BackendSession, BackendSessionError,
    BackendSessionTrait, ConfigFile,
};
use crate::resolver::{
    DefinitionResult, OutlineEntry, ReferenceResult, ResolveError, SymbolLocator, SymbolMatch,
    SymbolQuery, symbol_kind_name,
};
use crate::symbol::FileLocation;

// ============================================================================
// Arguments
// ============================================================================

/// Resolve Python symbol definitions and references through a language server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Workspace root (overrides `[repo] path`; defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// TOML config file with `[repo]` and `[lsp]` sections
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Language server command line (overrides REPOGRAPH_LSP_SERVER)
    #[arg(long, value_name = "CMD")]
    pub server: Option<String>,

    /// Python interpreter of the target environment (overrides REPOGRAPH_PYTHON_ENV)
    #[arg(long, value_name = "PATH")]
    pub python_env: Option<PathBuf>,

    /// Additional import search path; repeatable
    #[arg(long = "extra-path", value_name = "DIR")]
    pub extra_paths: Vec<PathBuf>,

    /// JSON object merged into the server's initialization options
    #[arg(long, value_name = "JSON")]
    pub init_options: Option<String>,

    /// Directory for probe files, relative to the workspace root
    #[arg(long, value_name = "DIR")]
    pub probe_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Server startup timeout in seconds
    #[arg(long = "init-timeout", value_name = "SECS")]
    pub initialization_timeout: Option<u64>,

    /// Append the server's stderr to this file
    #[arg(long, value_name = "FILE")]
    pub server_stderr_log: Option<PathBuf>,

    /// Log level (overrides RUST_LOG env var)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log file path (overrides REPOGRAPH_LOG_FILE env var)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Find the definition of `module[:qualpath]`
    FindDefByFqn {
        #[arg(long)]
        module: String,
        #[arg(long)]
        qualpath: Option<String>,
        /// Include hover text and declaration details
        #[arg(long, value_parser = parse_bool, action = ArgAction::Set, default_value = "true")]
        with_hover_msg: bool,
    },

    /// Find references to `module[:qualpath]`
    FindRefsByFqn {
        #[arg(long)]
        module: String,
        #[arg(long)]
        qualpath: Option<String>,
    },

    /// Find the definition of the name at a 0-indexed position
    FindDefByLoc {
        #[arg(long)]
        rel_path: PathBuf,
        #[arg(long)]
        line: u32,
        #[arg(long)]
        character: u32,
        /// Include hover text and declaration details
        #[arg(long, value_parser = parse_bool, action = ArgAction::Set, default_value = "true")]
        with_hover_msg: bool,
    },

    /// Find references to the name at a 0-indexed position
    FindRefsByLoc {
        #[arg(long)]
        rel_path: PathBuf,
        #[arg(long)]
        line: u32,
        #[arg(long)]
        character: u32,
    },

    /// Search workspace symbols
    Search {
        #[arg(long)]
        query: String,
    },

    /// List every symbol of a workspace file
    Outline {
        #[arg(long)]
        rel_path: PathBuf,
    },

    /// Read commands from stdin until `quit`
    Repl,
}

/// `true/1/yes/y` or `false/0/no/n`, any case
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        other => Err(format!("'{other}' is not a boolean (use true/false, yes/no, 1/0)")),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] BackendConfigError),

    #[error(transparent)]
    Session(#[from] BackendSessionError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Invalid server command '{command}': {reason}")]
    ServerCommand { command: String, reason: String },

    #[error("Invalid --init-options: {0}")]
    InitOptions(String),

    #[error("Cannot determine the workspace root: {0}")]
    WorkspaceRoot(std::io::Error),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Configuration
// ============================================================================

/// Session configuration from CLI flags, environment and config file, in
/// that order of priority
pub fn build_config(args: &Args) -> Result<BackendConfig, CliError> {
    build_config_with_env(args, |name| std::env::var(name).ok())
}

fn build_config_with_env(
    args: &Args,
    env: impl Fn(&str) -> Option<String>,
) -> Result<BackendConfig, CliError> {
    let config_file = match &args.config {
        Some(path) => Some((path.clone(), ConfigFile::load(path)?)),
        None => None,
    };

    let configured_root = config_file.as_ref().and_then(|(path, file)| {
        file.repo
            .path
            .clone()
            .map(|root| relative_to_file(path, root))
    });
    let root = match args.root.clone().or(configured_root) {
        Some(root) => root,
        None => std::env::current_dir().map_err(CliError::WorkspaceRoot)?,
    };
    let mut builder = BackendConfigBuilder::new().workspace_root(root);

    if let Some(server) = args.server.clone().or_else(|| env("REPOGRAPH_LSP_SERVER")) {
        let mut words = shell_words::split(&server)
            .map_err(|e| CliError::ServerCommand {
                command: server.clone(),
                reason: e.to_string(),
            })?
            .into_iter();
        let program = words.next().ok_or_else(|| CliError::ServerCommand {
            command: server.clone(),
            reason: "empty command".to_string(),
        })?;
        builder = builder.server_command(program);
        for arg in words {
            builder = builder.add_server_arg(arg);
        }
    }

    if let Some(python_env) = args
        .python_env
        .clone()
        .or_else(|| env("REPOGRAPH_PYTHON_ENV").map(PathBuf::from))
    {
        builder = builder.python_env(python_env);
    }
    builder = builder.extra_paths(args.extra_paths.clone());

    if let Some((_, file)) = &config_file
        && let Some(options) = file.lsp_options()?
    {
        builder = builder.init_options(options);
    }
    if let Some(json) = &args.init_options {
        let options: Value =
            serde_json::from_str(json).map_err(|e| CliError::InitOptions(e.to_string()))?;
        builder = builder.init_options(options);
    }

    if let Some(dir) = &args.probe_dir {
        builder = builder.probe_dir(dir);
    }
    if let Some(secs) = args.request_timeout {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = args.initialization_timeout {
        builder = builder.initialization_timeout(Duration::from_secs(secs));
    }
    if let Some(path) = &args.server_stderr_log {
        builder = builder.stderr_log(path);
    }

    Ok(builder.build()?)
}

/// Paths in a config file are relative to the file itself
fn relative_to_file(config_path: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    config_path
        .parent()
        .map(|dir| dir.join(&path))
        .unwrap_or(path)
}

// ============================================================================
// Execution
// ============================================================================

/// What a command produced
#[derive(Debug)]
pub enum CommandOutput {
    Definitions(Vec<DefinitionResult>),
    References(Vec<ReferenceResult>),
    Symbols(Vec<SymbolMatch>),
    Outline(Vec<OutlineEntry>),
}

/// Start a session, run the command (or the REPL), close the session
pub async fn run(args: Args) -> Result<(), CliError> {
    let config = build_config(&args)?;
    info!(
        "Starting {} for workspace {}",
        config.server_command,
        config.workspace_root.display()
    );

    let session = BackendSession::new(config).await?;
    let mut locator = SymbolLocator::new(session);

    let outcome = match &args.command {
        Command::Repl => run_repl(&mut locator, args.format).await,
        command => match execute(&mut locator, command).await {
            Ok(output) => {
                let mut stdout = std::io::stdout().lock();
                render(&mut stdout, args.format, &output)
            }
            Err(e) => Err(e.into()),
        },
    };

    if let Err(e) = locator.close().await {
        warn!("Failed to close the language server session: {}", e);
    }
    outcome
}

/// Run one lookup command
pub async fn execute<S: BackendSessionTrait>(
    locator: &mut SymbolLocator<S>,
    command: &Command,
) -> Result<CommandOutput, ResolveError> {
    let output = match command {
        Command::FindDefByFqn {
            module,
            qualpath,
            with_hover_msg,
        } => {
            let query = SymbolQuery::by_fqn(module.as_str(), qualpath.as_deref());
            CommandOutput::Definitions(locator.find_definition(&query, *with_hover_msg).await?)
        }
        Command::FindRefsByFqn { module, qualpath } => {
            let query = SymbolQuery::by_fqn(module.as_str(), qualpath.as_deref());
            CommandOutput::References(locator.find_references(&query).await?)
        }
        Command::FindDefByLoc {
            rel_path,
            line,
            character,
            with_hover_msg,
        } => {
            let query = SymbolQuery::by_location(rel_path.clone(), *line, *character);
            CommandOutput::Definitions(locator.find_definition(&query, *with_hover_msg).await?)
        }
        Command::FindRefsByLoc {
            rel_path,
            line,
            character,
        } => {
            let query = SymbolQuery::by_location(rel_path.clone(), *line, *character);
            CommandOutput::References(locator.find_references(&query).await?)
        }
        Command::Search { query } => CommandOutput::Symbols(locator.search_symbols(query).await?),
        Command::Outline { rel_path } => {
            CommandOutput::Outline(locator.document_outline(rel_path).await?)
        }
        Command::Repl => {
            return Err(ResolveError::InvalidQuery {
                query: "repl".to_string(),
                reason: "already in the REPL".to_string(),
            });
        }
    };
    Ok(output)
}

// ============================================================================
// REPL
// ============================================================================

/// Parser for one REPL line: the same commands without global flags
#[derive(Parser, Debug)]
#[command(name = "repograph", no_binary_name = true, disable_help_subcommand = true)]
struct ReplLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Eq)]
enum ReplAction {
    Empty,
    Quit,
    Help,
    Run(Command),
    Invalid(String),
}

fn parse_repl_line(line: &str) -> ReplAction {
    let words = match shell_words::split(line) {
        Ok(words) => words,
        Err(e) => return ReplAction::Invalid(format!("cannot split input: {e}")),
    };

    match words.first().map(String::as_str) {
        None => ReplAction::Empty,
        Some("quit" | "exit") => ReplAction::Quit,
        Some("help") => ReplAction::Help,
        Some(_) => match ReplLine::try_parse_from(words) {
            Ok(ReplLine {
                command: Command::Repl,
            }) => ReplAction::Invalid("already in the REPL".to_string()),
            Ok(parsed) => ReplAction::Run(parsed.command),
            Err(e) => ReplAction::Invalid(e.to_string()),
        },
    }
}

fn repl_help() -> String {
    let mut help = ReplLine::command().render_long_help().to_string();
    help.push_str("\n  help    Show this message\n  quit    Leave the REPL (also: exit)\n");
    help
}

/// Interactive loop; lookup failures are reported and the loop continues,
/// a lost backend ends it
async fn run_repl<S: BackendSessionTrait>(
    locator: &mut SymbolLocator<S>,
    format: OutputFormat,
) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!(
        "Workspace {}. Type 'help' for commands, 'quit' to leave.",
        locator.workspace_root().display()
    );

    loop {
        eprint!("repograph> ");
        std::io::stderr().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_repl_line(&line) {
            ReplAction::Empty => continue,
            ReplAction::Quit => break,
            ReplAction::Help => eprintln!("{}", repl_help()),
            ReplAction::Invalid(message) => eprintln!("{}", message.trim_end()),
            ReplAction::Run(command) => match execute(locator, &command).await {
                Ok(output) => {
                    let mut stdout = std::io::stdout().lock();
                    render(&mut stdout, format, &output)?;
                }
                Err(e @ ResolveError::BackendUnavailable { .. }) => return Err(e.into()),
                Err(e) => eprintln!("{}", describe_error(&e)),
            },
        }
    }
    Ok(())
}

fn describe_error(error: &ResolveError) -> String {
    format!("error [{}]: {error}", error.kind())
}

// ============================================================================
// Output
// ============================================================================

pub fn render(out: &mut impl Write, format: OutputFormat, output: &CommandOutput) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let json = match output {
                CommandOutput::Definitions(results) => serde_json::to_string_pretty(results)?,
                CommandOutput::References(results) => serde_json::to_string_pretty(results)?,
                CommandOutput::Symbols(results) => serde_json::to_string_pretty(results)?,
                CommandOutput::Outline(results) => serde_json::to_string_pretty(results)?,
            };
            writeln!(out, "{json}")?;
        }
        OutputFormat::Text => write!(out, "{}", render_text(output))?,
    }
    out.flush()?;
    Ok(())
}

fn render_text(output: &CommandOutput) -> String {
    let mut text = String::new();
    match output {
        CommandOutput::Definitions(results) => {
            for (index, result) in results.iter().enumerate() {
                render_definition(&mut text, index, results.len(), result);
            }
        }
        CommandOutput::References(results) if results.is_empty() => {
            text.push_str("No references found\n");
        }
        CommandOutput::References(results) => {
            text.push_str(&format!("{} reference(s)\n", results.len()));
            for result in results {
                text.push_str(&format!(
                    "{}:{}:{} ({})\n",
                    result.location.file_path.display(),
                    result.location.line(),
                    result.location.character(),
                    result.location.to_compact()
                ));
                if let Some(context) = &result.context {
                    push_indented(&mut text, context);
                }
            }
        }
        CommandOutput::Symbols(results) if results.is_empty() => {
            text.push_str("No symbols found\n");
        }
        CommandOutput::Symbols(results) => {
            for result in results {
                let name = match &result.container_name {
                    Some(container) => format!("{container}.{}", result.name),
                    None => result.name.clone(),
                };
                text.push_str(&format!(
                    "{:<10} {} {}\n",
                    symbol_kind_name(result.kind),
                    name,
                    result.location.to_compact()
                ));
            }
        }
        CommandOutput::Outline(entries) => {
            for entry in entries {
                text.push_str(&format!(
                    "{:<10} {} {}:{}\n",
                    symbol_kind_name(entry.kind),
                    entry.name,
                    entry.location.line(),
                    entry.location.character()
                ));
            }
        }
    }
    text
}

fn render_definition(text: &mut String, index: usize, total: usize, result: &DefinitionResult) {
    let location = &result.location;
    text.push_str(&format!(
        "Definition {} of {}: {}:{}:{} ({})\n",
        index + 1,
        total,
        location.file_path.display(),
        location.line(),
        location.character(),
        location.to_compact()
    ));

    let kind = result.symbol_kind.map(symbol_kind_name).unwrap_or("unknown");
    text.push_str(&format!("  kind: {kind}\n"));
    if let Some(container) = &result.container_name {
        text.push_str(&format!("  container: {container}\n"));
    }
    if let Some(signature) = &result.signature {
        text.push_str(&format!("  signature: {signature}\n"));
    }
    if !result.declared_methods.is_empty() {
        text.push_str(&format!("  methods: {}\n", result.declared_methods.join(", ")));
    }
    if let Some(range) = result.full_range {
        let span = FileLocation {
            file_path: location.file_path.clone(),
            range,
        };
        text.push_str(&format!("  span: {}\n", span.to_compact_range()));
    }
    if let Some(hover) = &result.hover_text {
        text.push_str("  hover:\n");
        push_indented(text, hover);
    }
    if let Some(context) = &result.context {
        text.push_str("  context:\n");
        push_indented(text, context);
    }
}

fn push_indented(text: &mut String, block: &str) {
    for line in block.lines() {
        text.push_str("    ");
        text.push_str(line);
        text.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::MockBackendSession;
    use crate::lsp::testing::MockLspClient;
    use crate::symbol::{FilePosition, Position, Range};
    use crate::test_utils::SampleProject;
    use lsp_types::SymbolKind;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn args(line: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("lsp-repograph").chain(line.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_bool() {
        for value in ["true", "1", "YES", "y"] {
            assert_eq!(parse_bool(value), Ok(true));
        }
        for value in ["false", "0", "No", "n"] {
            assert_eq!(parse_bool(value), Ok(false));
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_find_def_by_fqn_arguments() {
        let parsed = args(&[
            "--format",
            "json",
            "find-def-by-fqn",
            "--module",
            "core.math_utils",
            "--qualpath",
            "Calculator.add",
            "--with-hover-msg",
            "no",
        ]);

        assert_eq!(parsed.format, OutputFormat::Json);
        assert_eq!(
            parsed.command,
            Command::FindDefByFqn {
                module: "core.math_utils".to_string(),
                qualpath: Some("Calculator.add".to_string()),
                with_hover_msg: false,
            }
        );
    }

    #[test]
    fn test_hover_defaults_to_on() {
        let parsed = args(&[
            "find-def-by-loc",
            "--rel-path",
            "main.py",
            "--line",
            "7",
            "--character",
            "17",
        ]);
        assert!(matches!(
            parsed.command,
            Command::FindDefByLoc {
                with_hover_msg: true,
                ..
            }
        ));
    }

    #[test]
    fn test_repl_lines() {
        assert_eq!(parse_repl_line("   "), ReplAction::Empty);
        assert_eq!(parse_repl_line("quit"), ReplAction::Quit);
        assert_eq!(parse_repl_line("exit"), ReplAction::Quit);
        assert_eq!(parse_repl_line("help"), ReplAction::Help);
        assert_eq!(
            parse_repl_line("search --query 'Calculator add'"),
            ReplAction::Run(Command::Search {
                query: "Calculator add".to_string()
            })
        );
        assert!(matches!(parse_repl_line("repl"), ReplAction::Invalid(_)));
        assert!(matches!(parse_repl_line("frobnicate"), ReplAction::Invalid(_)));
        assert!(matches!(parse_repl_line("search --query 'open"), ReplAction::Invalid(_)));
    }

    #[test]
    fn test_config_priority() {
        let project = SampleProject::new();
        let config_dir = TempDir::new().unwrap();
        let config_path = config_dir.path().join("repograph.toml");
        std::fs::write(
            &config_path,
            format!(
                "[repo]\npath = \"{}\"\n\n[lsp]\nworkspace = {{ environmentPath = \"/from/toml/python\" }}\n",
                project.root().display()
            ),
        )
        .unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("REPOGRAPH_LSP_SERVER", "jedi-language-server --log-file /tmp/jedi.log"),
            ("REPOGRAPH_PYTHON_ENV", "/from/env/python"),
        ]);
        let lookup = |name: &str| env.get(name).map(|value| value.to_string());

        let parsed = args(&[
            "--config",
            config_path.to_str().unwrap(),
            "--init-options",
            r#"{"diagnostics": {"enable": false}}"#,
            "search",
            "--query",
            "add",
        ]);
        let config = build_config_with_env(&parsed, lookup).unwrap();

        assert_eq!(config.workspace_root, project.root());
        assert_eq!(config.server_command, "jedi-language-server");
        assert_eq!(config.server_args, vec!["--log-file", "/tmp/jedi.log"]);
        assert_eq!(config.python_env, Some(PathBuf::from("/from/env/python")));

        let options = config.initialization_options();
        assert_eq!(options["diagnostics"]["enable"], Value::Bool(false));

        // The CLI flag beats the environment
        let parsed = args(&[
            "--root",
            project.root().to_str().unwrap(),
            "--server",
            "pylsp",
            "search",
            "--query",
            "add",
        ]);
        let config = build_config_with_env(&parsed, lookup).unwrap();
        assert_eq!(config.server_command, "pylsp");
        assert!(config.server_args.is_empty());
    }

    #[test]
    fn test_session_tuning_flags() {
        let project = SampleProject::new();
        let stderr_log = project.path("server.log");
        let parsed = args(&[
            "--root",
            project.root().to_str().unwrap(),
            "--probe-dir",
            "core",
            "--request-timeout",
            "3",
            "--init-timeout",
            "45",
            "--server-stderr-log",
            stderr_log.to_str().unwrap(),
            "search",
            "--query",
            "add",
        ]);
        let config = build_config_with_env(&parsed, |_| None).unwrap();

        assert_eq!(config.probe_dir, project.path("core"));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.initialization_timeout, Duration::from_secs(45));
        assert_eq!(config.stderr_log_path, Some(stderr_log));

        let defaults = build_config_with_env(
            &args(&["--root", project.root().to_str().unwrap(), "outline", "--rel-path", "main.py"]),
            |_| None,
        )
        .unwrap();
        assert_eq!(defaults.probe_dir, project.root());
        assert_eq!(defaults.stderr_log_path, None);
    }

    #[test]
    fn test_probe_dir_outside_root_is_rejected() {
        let project = SampleProject::new();
        let elsewhere = TempDir::new().unwrap();
        let parsed = args(&[
            "--root",
            project.root().to_str().unwrap(),
            "--probe-dir",
            elsewhere.path().to_str().unwrap(),
            "search",
            "--query",
            "add",
        ]);
        assert!(matches!(
            build_config_with_env(&parsed, |_| None),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_error_line_names_the_kind() {
        let query = SymbolQuery::by_fqn("nope", Some("thing"));
        let line = describe_error(&ResolveError::symbol_not_found(&query, "no definition"));
        assert!(line.starts_with("error [SymbolNotFound]: "));
        assert!(line.contains("nope:thing"));
    }

    #[test]
    fn test_bad_init_options() {
        let project = SampleProject::new();
        let parsed = args(&[
            "--root",
            project.root().to_str().unwrap(),
            "--init-options",
            "{not json",
            "outline",
            "--rel-path",
            "main.py",
        ]);
        assert!(matches!(
            build_config_with_env(&parsed, |_| None),
            Err(CliError::InitOptions(_))
        ));
    }

    #[test]
    fn test_definition_text_output() {
        let mut result = DefinitionResult::new(
            FilePosition::new("core/math_utils.py", 11, 8),
            Some(SymbolKind::METHOD),
            Some("Calculator".to_string()),
        );
        result.signature = Some("def add(self, a: float, b: float) -> float".to_string());
        result.full_range = Some(Range::new(Position::new(11, 4), Position::new(13, 43)));
        result.hover_text = Some("Add two numbers.".to_string());

        let mut out = Vec::new();
        render(&mut out, OutputFormat::Text, &CommandOutput::Definitions(vec![result])).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Definition 1 of 1: core/math_utils.py:11:8 (core/math_utils.py:12:9)\n\
             \x20 kind: method\n\
             \x20 container: Calculator\n\
             \x20 signature: def add(self, a: float, b: float) -> float\n\
             \x20 span: core/math_utils.py:12:5-14:44\n\
             \x20 hover:\n\
             \x20   Add two numbers.\n"
        );
    }

    #[test]
    fn test_empty_references_text() {
        let mut out = Vec::new();
        render(&mut out, OutputFormat::Text, &CommandOutput::References(Vec::new())).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No references found\n");
    }

    #[tokio::test]
    async fn test_execute_outline_through_locator() {
        let project = SampleProject::new();
        let session = MockBackendSession::new(project.config(), MockLspClient::new());
        let mut locator = SymbolLocator::new(session);

        let output = execute(
            &mut locator,
            &Command::Outline {
                rel_path: PathBuf::from("main.py"),
            },
        )
        .await
        .unwrap();
        assert!(matches!(output, CommandOutput::Outline(entries) if entries.is_empty()));

        let error = execute(
            &mut locator,
            &Command::FindDefByFqn {
                module: "core.math_utils".to_string(),
                qualpath: Some("bad name".to_string()),
                with_hover_msg: true,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind(), "InvalidQuery");
    }
}
