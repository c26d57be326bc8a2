//! Process-wide `tracing` setup
//!
//! Logs go to stderr or a file, never to stdout: stdout carries lookup
//! results.

use std::env;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

const DEFAULT_LEVEL: &str = "info";

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive (e.g., "debug", "lsp_repograph::resolver=trace")
    pub level: String,
    /// Optional log file path. If None, logs only to stderr
    pub file_path: Option<PathBuf>,
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            file_path: None,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// `RUST_LOG`, `REPOGRAPH_LOG_FILE`, `REPOGRAPH_LOG_UNIQUE` and
    /// `REPOGRAPH_LOG_JSON`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str| lookup(name).is_some_and(|value| value == "true");

        let file_path = lookup("REPOGRAPH_LOG_FILE").map(PathBuf::from).map(|path| {
            if flag("REPOGRAPH_LOG_UNIQUE") {
                with_pid_suffix(&path, std::process::id())
            } else {
                path
            }
        });

        Self {
            level: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LEVEL.to_string()),
            file_path,
            json_format: flag("REPOGRAPH_LOG_JSON"),
        }
    }

    /// Override values from CLI arguments
    pub fn with_overrides(mut self, level: Option<String>, file_path: Option<PathBuf>) -> Self {
        if let Some(level) = level {
            self.level = level;
        }
        if let Some(file_path) = file_path {
            self.file_path = Some(file_path);
        }
        self
    }
}

/// `repograph.log` -> `repograph.<pid>.log`
fn with_pid_suffix(path: &Path, pid: u32) -> PathBuf {
    let Some(stem) = path.file_stem() else {
        return path.to_path_buf();
    };
    let unique_filename = match path.extension().and_then(|ext| ext.to_str()) {
        Some(extension) if !extension.is_empty() => {
            format!("{}.{}.{}", stem.to_string_lossy(), pid, extension)
        }
        _ => format!("{}.{}", stem.to_string_lossy(), pid),
    };
    path.with_file_name(unique_filename)
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to install the log subscriber: {0}")]
    Install(String),
}

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

fn output_layer(config: &LogConfig) -> Result<OutputLayer, LoggingError> {
    let layer: OutputLayer = match (&config.file_path, config.json_format) {
        (Some(path), true) => fmt::layer()
            .json()
            .with_writer(open_log_file(path)?)
            .with_ansi(false)
            .boxed(),
        (Some(path), false) => fmt::layer()
            .with_writer(open_log_file(path)?)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .boxed(),
        (None, true) => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_ansi(false)
            .boxed(),
        (None, false) => fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_line_number(true)
            .boxed(),
    };
    Ok(layer)
}

/// Install the global subscriber; an unparsable level falls back to `info`
pub fn init_logging(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    tracing_subscriber::registry()
        .with(output_layer(&config)?)
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))
}

/// Log one JSON-RPC message exchanged with the language server in one line
#[macro_export]
macro_rules! log_lsp_message {
    ($level:expr, $direction:expr, $method:expr, $data:expr) => {
        tracing::event!(
            $level,
            direction = $direction,
            method = $method,
            data = ?$data,
            "LSP message"
        );
    };
}

/// Log the duration of an operation
#[macro_export]
macro_rules! log_timing {
    ($level:expr, $operation:expr, $duration:expr) => {
        tracing::event!(
            $level,
            operation = $operation,
            duration_ms = $duration.as_millis() as u64,
            "Performance timing"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_pid_suffix_keeps_extension() {
        assert_eq!(
            with_pid_suffix(Path::new("/tmp/repograph.log"), 42),
            PathBuf::from("/tmp/repograph.42.log")
        );
        assert_eq!(
            with_pid_suffix(Path::new("/tmp/repograph"), 42),
            PathBuf::from("/tmp/repograph.42")
        );
    }

    #[test]
    fn test_environment_lookup() {
        let env = HashMap::from([
            ("RUST_LOG", "debug"),
            ("REPOGRAPH_LOG_FILE", "/tmp/repograph.log"),
            ("REPOGRAPH_LOG_JSON", "true"),
        ]);
        let config = LogConfig::from_lookup(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.level, "debug");
        assert_eq!(config.file_path, Some(PathBuf::from("/tmp/repograph.log")));
        assert!(config.json_format);

        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config.level, "info");
        assert_eq!(config.file_path, None);
        assert!(!config.json_format);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = LogConfig::default()
            .with_overrides(Some("debug".to_string()), Some(PathBuf::from("out.log")));
        assert_eq!(config.level, "debug");
        assert_eq!(config.file_path, Some(PathBuf::from("out.log")));
        assert!(!config.json_format);
    }
}
