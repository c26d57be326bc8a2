//! Configuration for language-server sessions
//!
//! [`BackendConfig`] is assembled with [`BackendConfigBuilder`], which
//! validates paths and timeouts, and composes the server's
//! `initializationOptions` from the Python environment, extra search paths
//! and user-supplied JSON.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::error::BackendConfigError;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default timeout for LSP initialization (30 seconds)
///
/// Jedi loads the environment's site-packages lazily, so startup is quick;
/// the slack covers slow interpreters on cold caches.
pub const DEFAULT_INITIALIZATION_TIMEOUT_SECS: u64 = 30;

/// Default timeout for individual LSP requests (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum allowed initialization timeout (5 minutes)
pub const MAX_INITIALIZATION_TIMEOUT_SECS: u64 = 300;

/// Server launched when none is configured
pub const DEFAULT_SERVER_COMMAND: &str = "jedi-language-server";

// ============================================================================
// Core Configuration Types
// ============================================================================

/// Complete backend session configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Canonical workspace root; also the server's working directory
    pub workspace_root: PathBuf,

    /// Language server executable
    pub server_command: String,

    /// Additional server command-line arguments
    pub server_args: Vec<String>,

    /// Interpreter whose environment resolves imports
    pub python_env: Option<PathBuf>,

    /// Extra import search paths
    pub extra_paths: Vec<PathBuf>,

    /// User JSON merged over the generated initialization options
    pub custom_init_options: Option<Value>,

    /// Where probe files are written; always under the workspace root
    pub probe_dir: PathBuf,

    pub initialization_timeout: Duration,

    pub request_timeout: Duration,

    /// Server stderr is appended here when set
    pub stderr_log_path: Option<PathBuf>,

    pub client_name: String,

    pub client_version: String,
}

impl BackendConfig {
    /// `initializationOptions` for jedi-language-server
    ///
    /// Generated `workspace.environmentPath` / `workspace.extraPaths` first,
    /// then the custom options merged over them.
    pub fn initialization_options(&self) -> Value {
        let mut workspace = Map::new();
        if let Some(env) = &self.python_env {
            workspace.insert(
                "environmentPath".to_string(),
                Value::String(env.to_string_lossy().into_owned()),
            );
        }
        if !self.extra_paths.is_empty() {
            workspace.insert(
                "extraPaths".to_string(),
                Value::Array(
                    self.extra_paths
                        .iter()
                        .map(|p| Value::String(p.to_string_lossy().into_owned()))
                        .collect(),
                ),
            );
        }

        let mut options = Value::Object(Map::new());
        if !workspace.is_empty() {
            options["workspace"] = Value::Object(workspace);
        }
        if let Some(custom) = &self.custom_init_options {
            merge_json(&mut options, custom.clone());
        }
        options
    }
}

/// Merge `overlay` into `base`: objects key by key, anything else replaces
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ============================================================================
// Config File
// ============================================================================

/// On-disk TOML configuration
///
/// ```toml
/// [repo]
/// path = "/path/to/project"
///
/// [lsp]
/// workspace = { environmentPath = "/path/to/venv/bin/python" }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub repo: RepoSection,

    /// Raw `initializationOptions` overrides
    #[serde(default)]
    pub lsp: Option<toml::Table>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepoSection {
    pub path: Option<PathBuf>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, BackendConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| BackendConfigError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text).map_err(|reason| BackendConfigError::ConfigFile {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// The `[lsp]` table as JSON
    pub fn lsp_options(&self) -> Result<Option<Value>, BackendConfigError> {
        self.lsp
            .as_ref()
            .map(|table| {
                serde_json::to_value(table)
                    .map_err(|e| BackendConfigError::InvalidInitOptions(e.to_string()))
            })
            .transpose()
    }
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for BackendConfig with validation and defaults
#[derive(Default)]
pub struct BackendConfigBuilder {
    workspace_root: Option<PathBuf>,
    server_command: Option<String>,
    server_args: Vec<String>,
    python_env: Option<PathBuf>,
    extra_paths: Vec<PathBuf>,
    custom_init_options: Option<Value>,
    probe_dir: Option<PathBuf>,
    initialization_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    stderr_log_path: Option<PathBuf>,
}

impl BackendConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workspace_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(path.into());
        self
    }

    pub fn server_command(mut self, command: impl Into<String>) -> Self {
        self.server_command = Some(command.into());
        self
    }

    pub fn add_server_arg(mut self, arg: impl Into<String>) -> Self {
        self.server_args.push(arg.into());
        self
    }

    pub fn python_env(mut self, path: impl Into<PathBuf>) -> Self {
        self.python_env = Some(path.into());
        self
    }

    pub fn extra_paths(mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.extra_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Merge more custom initialization options over those already set
    pub fn init_options(mut self, options: Value) -> Self {
        match &mut self.custom_init_options {
            Some(existing) => merge_json(existing, options),
            None => self.custom_init_options = Some(options),
        }
        self
    }

    /// Directory for probe files (default: the workspace root)
    pub fn probe_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.probe_dir = Some(path.into());
        self
    }

    pub fn initialization_timeout(mut self, timeout: Duration) -> Self {
        self.initialization_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn stderr_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_log_path = Some(path.into());
        self
    }

    /// Build the configuration with validation
    pub fn build(self) -> Result<BackendConfig, BackendConfigError> {
        let workspace_root = self
            .workspace_root
            .ok_or_else(|| BackendConfigError::missing_field("workspace_root"))?;
        let workspace_root = Self::validate_workspace_root(&workspace_root)?;

        let server_command = self
            .server_command
            .unwrap_or_else(|| DEFAULT_SERVER_COMMAND.to_string());
        Self::validate_server_command(&server_command, &self.server_args)?;

        let initialization_timeout = self
            .initialization_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_INITIALIZATION_TIMEOUT_SECS));
        let request_timeout = self
            .request_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        Self::validate_timeouts(initialization_timeout, request_timeout)?;

        let probe_dir = match self.probe_dir {
            Some(dir) => Self::validate_probe_dir(&dir, &workspace_root)?,
            None => workspace_root.clone(),
        };

        if let Some(options) = &self.custom_init_options
            && !options.is_object()
        {
            return Err(BackendConfigError::InvalidInitOptions(
                "initialization options must be a JSON object".to_string(),
            ));
        }

        Ok(BackendConfig {
            workspace_root,
            server_command,
            server_args: self.server_args,
            python_env: self.python_env,
            extra_paths: self.extra_paths,
            custom_init_options: self.custom_init_options,
            probe_dir,
            initialization_timeout,
            request_timeout,
            stderr_log_path: self.stderr_log_path,
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// The root must be an existing directory; returns it canonicalized
    fn validate_workspace_root(path: &Path) -> Result<PathBuf, BackendConfigError> {
        let canonical =
            path.canonicalize()
                .map_err(|source| BackendConfigError::WorkspaceRootValidation {
                    path: path.to_path_buf(),
                    source,
                })?;

        if !canonical.is_dir() {
            return Err(BackendConfigError::WorkspaceRootValidation {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "Workspace root is not a directory",
                ),
            });
        }
        Ok(canonical)
    }

    fn validate_server_command(command: &str, args: &[String]) -> Result<(), BackendConfigError> {
        if command.trim().is_empty() {
            return Err(BackendConfigError::invalid_path(
                command,
                "Server command cannot be empty",
            ));
        }
        if command.contains('\0') || args.iter().any(|a| a.contains('\0')) {
            return Err(BackendConfigError::invalid_path(
                command,
                "Server command line contains a null character",
            ));
        }
        Ok(())
    }

    fn validate_timeouts(
        initialization_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<(), BackendConfigError> {
        if initialization_timeout.is_zero() {
            return Err(BackendConfigError::invalid_timeout(
                initialization_timeout,
                "Initialization timeout must be greater than zero",
            ));
        }
        if request_timeout.is_zero() {
            return Err(BackendConfigError::invalid_timeout(
                request_timeout,
                "Request timeout must be greater than zero",
            ));
        }
        if initialization_timeout > Duration::from_secs(MAX_INITIALIZATION_TIMEOUT_SECS) {
            return Err(BackendConfigError::invalid_timeout(
                initialization_timeout,
                "Initialization timeout too long (max 5 minutes)",
            ));
        }
        Ok(())
    }

    /// Probe imports only resolve like project code when the probe sits in
    /// the project, so the directory must be inside the workspace root
    fn validate_probe_dir(dir: &Path, workspace_root: &Path) -> Result<PathBuf, BackendConfigError> {
        let joined = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            workspace_root.join(dir)
        };
        let canonical = joined
            .canonicalize()
            .map_err(|e| BackendConfigError::invalid_path(dir.display(), e.to_string()))?;

        if !canonical.is_dir() {
            return Err(BackendConfigError::invalid_path(
                dir.display(),
                "Probe directory is not a directory",
            ));
        }
        if !canonical.starts_with(workspace_root) {
            return Err(BackendConfigError::invalid_path(
                dir.display(),
                "Probe directory must be inside the workspace root",
            ));
        }
        Ok(canonical)
    }
}
