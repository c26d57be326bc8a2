//! Error types for backend session management

use std::path::PathBuf;
use std::time::Duration;

use crate::backend::file_manager::FileManagerError;
use crate::io::ProcessError;
use crate::lsp::LspError;
use crate::symbol::UriError;

// ============================================================================
// Backend Session Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BackendSessionError {
    /// LSP client errors (initialization, requests, etc.)
    #[error("LSP error: {0}")]
    Lsp(#[from] LspError),

    /// Process management errors (start, stop, communication)
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Configuration error: {0}")]
    Config(#[from] BackendConfigError),

    #[error("File synchronization error: {0}")]
    FileManager(#[from] FileManagerError),

    #[error("URI error: {0}")]
    Uri(#[from] UriError),

    #[error("Session operation timeout: {operation} took longer than {timeout:?}")]
    OperationTimeout {
        operation: String,
        timeout: Duration,
    },
}

// ============================================================================
// Backend Configuration Errors
// ============================================================================

/// Configuration validation and building errors
#[derive(Debug, thiserror::Error)]
pub enum BackendConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid path: {path} - {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid timeout: {timeout:?} - {reason}")]
    InvalidTimeout { timeout: Duration, reason: String },

    #[error("Invalid initialization options: {0}")]
    InvalidInitOptions(String),

    #[error("Workspace root validation failed: {path}")]
    WorkspaceRootValidation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot load config file {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },
}

// ============================================================================
// Error Conversion and Context Helpers
// ============================================================================

impl BackendSessionError {
    pub fn operation_timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::OperationTimeout {
            operation: operation.into(),
            timeout,
        }
    }
}

impl BackendConfigError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_path(path: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_timeout(timeout: Duration, reason: impl Into<String>) -> Self {
        Self::InvalidTimeout {
            timeout,
            reason: reason.into(),
        }
    }
}
