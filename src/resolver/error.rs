//! Caller-facing error taxonomy
//!
//! Everything that can go wrong below the resolver is translated into one
//! of these before it reaches a caller; backend error payloads never leak.

use tracing::debug;

use crate::backend::file_manager::FileManagerError;
use crate::lsp::LspError;
use crate::lsp::protocol::JsonRpcError;
use crate::resolver::query::SymbolQuery;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Malformed name, or a path outside the workspace
    #[error("Invalid query '{query}': {reason}")]
    InvalidQuery { query: String, reason: String },

    /// The backend returned no candidates
    #[error("Symbol not found: '{query}': {reason}")]
    SymbolNotFound { query: String, reason: String },

    /// The probe import did not resolve in the target environment
    #[error("Library not importable: '{query}': {reason}")]
    LibraryNotImportable { query: String, reason: String },

    /// The language server could not serve the request
    #[error("Backend unavailable while resolving '{query}': {reason}")]
    BackendUnavailable { query: String, reason: String },

    /// Optional details could not be computed; the base result stands
    #[error("Enrichment unavailable for '{query}': {reason}")]
    EnrichmentUnavailable { query: String, reason: String },
}

impl ResolveError {
    pub fn invalid_query(query: &SymbolQuery, reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    pub fn symbol_not_found(query: &SymbolQuery, reason: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    pub fn library_not_importable(query: &SymbolQuery, reason: impl Into<String>) -> Self {
        Self::LibraryNotImportable {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    pub fn backend_unavailable(query: impl ToString, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    pub fn enrichment_unavailable(query: impl ToString, reason: impl Into<String>) -> Self {
        Self::EnrichmentUnavailable {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    /// Every LSP failure means the collaborator could not answer
    ///
    /// Server-supplied text stays in the debug log; the reason names only
    /// the method and error code.
    pub fn from_lsp(query: impl ToString, error: &LspError) -> Self {
        let reason = match error {
            LspError::JsonRpc(JsonRpcError::Server {
                method,
                code,
                message,
                data,
            }) => {
                debug!(
                    method = %method,
                    code = *code,
                    message = %message,
                    data = ?data,
                    "Language server returned an error"
                );
                format!("'{method}' failed with JSON-RPC error {code}")
            }
            LspError::JsonRpc(JsonRpcError::Deserialization(e)) => {
                debug!("Undecodable language server response: {}", e);
                "language server response could not be decoded".to_string()
            }
            other => other.to_string(),
        };
        Self::backend_unavailable(query, reason)
    }

    /// Unreadable user files are the caller's problem; LSP failures are not
    pub fn from_file_manager(query: impl ToString, error: &FileManagerError) -> Self {
        match error {
            FileManagerError::Lsp(lsp) => Self::from_lsp(query, lsp),
            FileManagerError::FileRead { .. } | FileManagerError::InvalidPath(_) => {
                Self::InvalidQuery {
                    query: query.to_string(),
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Short name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidQuery { .. } => "InvalidQuery",
            Self::SymbolNotFound { .. } => "SymbolNotFound",
            Self::LibraryNotImportable { .. } => "LibraryNotImportable",
            Self::BackendUnavailable { .. } => "BackendUnavailable",
            Self::EnrichmentUnavailable { .. } => "EnrichmentUnavailable",
        }
    }
}
