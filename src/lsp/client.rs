//! Typed LSP client
//!
//! Builds `lsp_types` parameter structs for the handful of requests the
//! resolver needs and decodes the results, on top of [`JsonRpcClient`].

use async_trait::async_trait;
use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DocumentSymbolParams, DocumentSymbolResponse, GotoDefinitionParams, GotoDefinitionResponse,
    Hover, HoverParams, InitializeParams, InitializeResult, InitializedParams, Location,
    PartialResultParams, Position, ReferenceContext, ReferenceParams,
    TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem,
    TextDocumentPositionParams, Uri, VersionedTextDocumentIdentifier, WorkDoneProgressParams,
    WorkspaceSymbolParams, WorkspaceSymbolResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::io::transport::Transport;
use crate::lsp::protocol::{JsonRpcClient, JsonRpcError};
use crate::lsp::traits::LspClientTrait;

// ============================================================================
// LSP Client Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LspError {
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("LSP client not initialized")]
    NotInitialized,

    #[error("LSP protocol error: {0}")]
    Protocol(String),
}

// ============================================================================
// LSP Client
// ============================================================================

/// Default timeout for a single request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the `initialize` round trip
pub const DEFAULT_INITIALIZE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct LspClient<T: Transport> {
    rpc_client: JsonRpcClient<T>,
    initialized: bool,
    server_capabilities: Option<lsp_types::ServerCapabilities>,
    request_timeout: Duration,
    initialize_timeout: Duration,
}

impl<T: Transport + 'static> LspClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            rpc_client: JsonRpcClient::new(transport),
            initialized: false,
            server_capabilities: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            initialize_timeout: DEFAULT_INITIALIZE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, request_timeout: Duration, initialize_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.initialize_timeout = initialize_timeout;
        self
    }

    pub fn rpc_client(&self) -> &JsonRpcClient<T> {
        &self.rpc_client
    }

    #[allow(dead_code)]
    pub fn server_capabilities(&self) -> Option<&lsp_types::ServerCapabilities> {
        self.server_capabilities.as_ref()
    }

    /// Request on an initialized connection
    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, LspError>
    where
        P: Serialize + Send,
        R: for<'de> Deserialize<'de>,
    {
        if !self.initialized {
            return Err(LspError::NotInitialized);
        }
        Ok(self
            .rpc_client
            .request(method, Some(params), self.request_timeout)
            .await?)
    }

    async fn notify<P>(&self, method: &str, params: P) -> Result<(), LspError>
    where
        P: Serialize + Send,
    {
        if !self.initialized {
            return Err(LspError::NotInitialized);
        }
        Ok(self.rpc_client.notify(method, Some(params)).await?)
    }

    fn position_params(uri: Uri, position: Position) -> TextDocumentPositionParams {
        TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri },
            position,
        }
    }
}

#[async_trait]
impl<T: Transport + 'static> LspClientTrait for LspClient<T> {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn initialize(&mut self, params: InitializeParams) -> Result<InitializeResult, LspError> {
        if self.initialized {
            return Err(LspError::Protocol("Client already initialized".to_string()));
        }

        info!("Initializing LSP connection");
        let result: InitializeResult = self
            .rpc_client
            .request("initialize", Some(params), self.initialize_timeout)
            .await?;
        debug!("Server capabilities: {:?}", result.capabilities);
        self.server_capabilities = Some(result.capabilities.clone());

        self.rpc_client
            .notify("initialized", Some(InitializedParams {}))
            .await?;
        self.initialized = true;
        info!(
            "LSP connection initialized (server: {})",
            result
                .server_info
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("unknown")
        );

        Ok(result)
    }

    async fn shutdown(&mut self) -> Result<(), LspError> {
        if !self.initialized {
            return Ok(());
        }

        info!("Shutting down LSP connection");
        let _: () = self
            .rpc_client
            .request("shutdown", None::<Value>, self.request_timeout)
            .await?;
        self.rpc_client.notify("exit", None::<Value>).await?;
        self.initialized = false;
        self.rpc_client.cancel_pending_requests().await;
        Ok(())
    }

    async fn open_text_document(
        &mut self,
        uri: Uri,
        language_id: String,
        version: i32,
        text: String,
    ) -> Result<(), LspError> {
        self.notify(
            "textDocument/didOpen",
            DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri,
                    language_id,
                    version,
                    text,
                },
            },
        )
        .await
    }

    async fn change_text_document(
        &mut self,
        uri: Uri,
        version: i32,
        text: String,
    ) -> Result<(), LspError> {
        self.notify(
            "textDocument/didChange",
            DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier { uri, version },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text,
                }],
            },
        )
        .await
    }

    async fn close_text_document(&mut self, uri: Uri) -> Result<(), LspError> {
        self.notify(
            "textDocument/didClose",
            DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri },
            },
        )
        .await
    }

    async fn workspace_symbols(
        &mut self,
        query: String,
    ) -> Result<Option<WorkspaceSymbolResponse>, LspError> {
        self.call(
            "workspace/symbol",
            WorkspaceSymbolParams {
                query,
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            },
        )
        .await
    }

    async fn text_document_definition(
        &mut self,
        uri: Uri,
        position: Position,
    ) -> Result<Option<GotoDefinitionResponse>, LspError> {
        self.call(
            "textDocument/definition",
            GotoDefinitionParams {
                text_document_position_params: Self::position_params(uri, position),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            },
        )
        .await
    }

    async fn text_document_references(
        &mut self,
        uri: Uri,
        position: Position,
        include_declaration: bool,
    ) -> Result<Vec<Location>, LspError> {
        let locations: Option<Vec<Location>> = self
            .call(
                "textDocument/references",
                ReferenceParams {
                    text_document_position: Self::position_params(uri, position),
                    work_done_progress_params: WorkDoneProgressParams::default(),
                    partial_result_params: PartialResultParams::default(),
                    context: ReferenceContext {
                        include_declaration,
                    },
                },
            )
            .await?;
        Ok(locations.unwrap_or_default())
    }

    async fn text_document_document_symbol(
        &mut self,
        uri: Uri,
    ) -> Result<Option<DocumentSymbolResponse>, LspError> {
        self.call(
            "textDocument/documentSymbol",
            DocumentSymbolParams {
                text_document: TextDocumentIdentifier { uri },
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            },
        )
        .await
    }

    async fn text_document_hover(
        &mut self,
        uri: Uri,
        position: Position,
    ) -> Result<Option<Hover>, LspError> {
        self.call(
            "textDocument/hover",
            HoverParams {
                text_document_position_params: Self::position_params(uri, position),
                work_done_progress_params: WorkDoneProgressParams::default(),
            },
        )
        .await
    }
}
