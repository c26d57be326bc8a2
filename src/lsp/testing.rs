//! Testing utilities for code that talks to a language server
//!
//! [`MockLspClient`] answers requests from closures installed by the test
//! and records every call, so tests can check both what the resolver asked
//! and what it did with the answer.

use std::collections::HashMap;

use async_trait::async_trait;
use lsp_types::{
    DocumentSymbolResponse, GotoDefinitionResponse, Hover, InitializeParams, InitializeResult,
    Location, Position, ServerCapabilities, Uri, WorkspaceSymbolResponse,
};

use crate::lsp::client::LspError;
use crate::lsp::traits::LspClientTrait;

type WorkspaceSymbolHandler =
    Box<dyn Fn(&str) -> Result<Option<WorkspaceSymbolResponse>, LspError> + Send + Sync>;
type DefinitionHandler = Box<
    dyn Fn(&Uri, Position, Option<&str>) -> Result<Option<GotoDefinitionResponse>, LspError>
        + Send
        + Sync,
>;
type ReferencesHandler =
    Box<dyn Fn(&Uri, Position, bool) -> Result<Vec<Location>, LspError> + Send + Sync>;
type DocumentSymbolHandler =
    Box<dyn Fn(&Uri) -> Result<Option<DocumentSymbolResponse>, LspError> + Send + Sync>;
type HoverHandler = Box<dyn Fn(&Uri, Position) -> Result<Option<Hover>, LspError> + Send + Sync>;

/// One recorded call against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub method: &'static str,
    pub uri: Option<String>,
}

#[derive(Debug, Clone)]
struct MockDocument {
    version: i32,
    text: String,
}

// ============================================================================
// Mock LSP Client
// ============================================================================

/// Scriptable in-memory LSP client
pub struct MockLspClient {
    initialized: bool,
    open_documents: HashMap<String, MockDocument>,
    calls: Vec<MockCall>,
    workspace_symbols: Option<WorkspaceSymbolHandler>,
    definition: Option<DefinitionHandler>,
    references: Option<ReferencesHandler>,
    document_symbols: Option<DocumentSymbolHandler>,
    hover: Option<HoverHandler>,
}

#[allow(dead_code)]
impl MockLspClient {
    /// An initialized client that answers every request with an empty result
    pub fn new() -> Self {
        Self {
            initialized: true,
            open_documents: HashMap::new(),
            calls: Vec::new(),
            workspace_symbols: None,
            definition: None,
            references: None,
            document_symbols: None,
            hover: None,
        }
    }

    pub fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }

    pub fn on_workspace_symbols<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> Result<Option<WorkspaceSymbolResponse>, LspError> + Send + Sync + 'static,
    {
        self.workspace_symbols = Some(Box::new(handler));
        self
    }

    /// The handler also receives the text of the document if it is open
    pub fn on_definition<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Uri, Position, Option<&str>) -> Result<Option<GotoDefinitionResponse>, LspError>
            + Send
            + Sync
            + 'static,
    {
        self.definition = Some(Box::new(handler));
        self
    }

    pub fn on_references<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Uri, Position, bool) -> Result<Vec<Location>, LspError> + Send + Sync + 'static,
    {
        self.references = Some(Box::new(handler));
        self
    }

    pub fn on_document_symbols<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Uri) -> Result<Option<DocumentSymbolResponse>, LspError> + Send + Sync + 'static,
    {
        self.document_symbols = Some(Box::new(handler));
        self
    }

    pub fn on_hover<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Uri, Position) -> Result<Option<Hover>, LspError> + Send + Sync + 'static,
    {
        self.hover = Some(Box::new(handler));
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    /// Number of calls to `method`
    pub fn call_count(&self, method: &str) -> usize {
        self.calls.iter().filter(|c| c.method == method).count()
    }

    pub fn is_document_open(&self, uri: &str) -> bool {
        self.open_documents.contains_key(uri)
    }

    pub fn open_document_count(&self) -> usize {
        self.open_documents.len()
    }

    pub fn document_version(&self, uri: &str) -> Option<i32> {
        self.open_documents.get(uri).map(|d| d.version)
    }

    fn record(&mut self, method: &'static str, uri: Option<&Uri>) -> Result<(), LspError> {
        self.calls.push(MockCall {
            method,
            uri: uri.map(|u| u.as_str().to_string()),
        });
        if self.initialized {
            Ok(())
        } else {
            Err(LspError::NotInitialized)
        }
    }
}

impl Default for MockLspClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LspClientTrait for MockLspClient {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn initialize(&mut self, _params: InitializeParams) -> Result<InitializeResult, LspError> {
        self.calls.push(MockCall {
            method: "initialize",
            uri: None,
        });
        self.initialized = true;
        Ok(InitializeResult {
            capabilities: ServerCapabilities::default(),
            server_info: None,
        })
    }

    async fn shutdown(&mut self) -> Result<(), LspError> {
        self.record("shutdown", None)?;
        self.initialized = false;
        Ok(())
    }

    async fn open_text_document(
        &mut self,
        uri: Uri,
        _language_id: String,
        version: i32,
        text: String,
    ) -> Result<(), LspError> {
        self.record("textDocument/didOpen", Some(&uri))?;
        self.open_documents
            .insert(uri.as_str().to_string(), MockDocument { version, text });
        Ok(())
    }

    async fn change_text_document(
        &mut self,
        uri: Uri,
        version: i32,
        text: String,
    ) -> Result<(), LspError> {
        self.record("textDocument/didChange", Some(&uri))?;
        match self.open_documents.get_mut(uri.as_str()) {
            Some(document) => {
                document.version = version;
                document.text = text;
                Ok(())
            }
            None => Err(LspError::Protocol(format!(
                "Document not open: {}",
                uri.as_str()
            ))),
        }
    }

    async fn close_text_document(&mut self, uri: Uri) -> Result<(), LspError> {
        self.record("textDocument/didClose", Some(&uri))?;
        self.open_documents.remove(uri.as_str());
        Ok(())
    }

    async fn workspace_symbols(
        &mut self,
        query: String,
    ) -> Result<Option<WorkspaceSymbolResponse>, LspError> {
        self.record("workspace/symbol", None)?;
        match &self.workspace_symbols {
            Some(handler) => handler(&query),
            None => Ok(None),
        }
    }

    async fn text_document_definition(
        &mut self,
        uri: Uri,
        position: Position,
    ) -> Result<Option<GotoDefinitionResponse>, LspError> {
        self.record("textDocument/definition", Some(&uri))?;
        let text = self.open_documents.get(uri.as_str()).map(|d| d.text.as_str());
        match &self.definition {
            Some(handler) => handler(&uri, position, text),
            None => Ok(None),
        }
    }

    async fn text_document_references(
        &mut self,
        uri: Uri,
        position: Position,
        include_declaration: bool,
    ) -> Result<Vec<Location>, LspError> {
        self.record("textDocument/references", Some(&uri))?;
        match &self.references {
            Some(handler) => handler(&uri, position, include_declaration),
            None => Ok(Vec::new()),
        }
    }

    async fn text_document_document_symbol(
        &mut self,
        uri: Uri,
    ) -> Result<Option<DocumentSymbolResponse>, LspError> {
        self.record("textDocument/documentSymbol", Some(&uri))?;
        match &self.document_symbols {
            Some(handler) => handler(&uri),
            None => Ok(None),
        }
    }

    async fn text_document_hover(
        &mut self,
        uri: Uri,
        position: Position,
    ) -> Result<Option<Hover>, LspError> {
        self.record("textDocument/hover", Some(&uri))?;
        match &self.hover {
            Some(handler) => handler(&uri, position),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_definition_handler_sees_open_document_text() {
        let mut client = MockLspClient::new().on_definition(|_, position, text| {
            assert_eq!(position, Position::new(1, 3));
            assert_eq!(text, Some("import os as __m\n__m.path\n"));
            Ok(None)
        });

        let uri = Uri::from_str("file:///work/probe.py").unwrap();
        client
            .open_text_document(
                uri.clone(),
                "python".to_string(),
                1,
                "import os as __m\n__m.path\n".to_string(),
            )
            .await
            .unwrap();
        client
            .text_document_definition(uri.clone(), Position::new(1, 3))
            .await
            .unwrap();
        client.close_text_document(uri).await.unwrap();

        assert_eq!(client.open_document_count(), 0);
        assert_eq!(client.call_count("textDocument/definition"), 1);
    }

    #[tokio::test]
    async fn test_uninitialized_client_rejects_requests() {
        let mut client = MockLspClient::new();
        client.set_initialized(false);

        let result = client.workspace_symbols("x".to_string()).await;
        assert!(matches!(result, Err(LspError::NotInitialized)));
    }
}
