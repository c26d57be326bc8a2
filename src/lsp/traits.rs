//! LSP traits and abstractions
//!
//! The resolver talks to the language server only through
//! [`LspClientTrait`], so the real client and the scriptable test double are
//! interchangeable.

use async_trait::async_trait;
use lsp_types::{
    DocumentSymbolResponse, GotoDefinitionResponse, Hover, InitializeParams, InitializeResult,
    Location, Position, Uri, WorkspaceSymbolResponse,
};

use crate::lsp::client::LspError;

// ============================================================================
// LSP Client Trait Abstraction
// ============================================================================

/// The LSP surface used by sessions and the resolver
#[async_trait]
pub trait LspClientTrait: Send + Sync {
    // ========================================================================
    // Core State Methods
    // ========================================================================

    /// Check if client is initialized (ready for LSP operations)
    fn is_initialized(&self) -> bool;

    // ========================================================================
    // Lifecycle Management
    // ========================================================================

    /// Run the `initialize` handshake and send `initialized`
    async fn initialize(&mut self, params: InitializeParams) -> Result<InitializeResult, LspError>;

    /// Send `shutdown` followed by `exit`
    async fn shutdown(&mut self) -> Result<(), LspError>;

    // ========================================================================
    // Document Synchronization
    // ========================================================================

    async fn open_text_document(
        &mut self,
        uri: Uri,
        language_id: String,
        version: i32,
        text: String,
    ) -> Result<(), LspError>;

    /// Replace the full text of an open document
    async fn change_text_document(
        &mut self,
        uri: Uri,
        version: i32,
        text: String,
    ) -> Result<(), LspError>;

    async fn close_text_document(&mut self, uri: Uri) -> Result<(), LspError>;

    // ========================================================================
    // Symbol and Navigation Methods
    // ========================================================================

    /// Search for symbols across the workspace; `None` when the server has none
    async fn workspace_symbols(
        &mut self,
        query: String,
    ) -> Result<Option<WorkspaceSymbolResponse>, LspError>;

    async fn text_document_definition(
        &mut self,
        uri: Uri,
        position: Position,
    ) -> Result<Option<GotoDefinitionResponse>, LspError>;

    /// Find all references to the symbol at the given position
    async fn text_document_references(
        &mut self,
        uri: Uri,
        position: Position,
        include_declaration: bool,
    ) -> Result<Vec<Location>, LspError>;

    async fn text_document_document_symbol(
        &mut self,
        uri: Uri,
    ) -> Result<Option<DocumentSymbolResponse>, LspError>;

    async fn text_document_hover(
        &mut self,
        uri: Uri,
        position: Position,
    ) -> Result<Option<Hover>, LspError>;
}
