//! Language-server session management
//!
//! A [`BackendSession`] owns the server process, the LSP client talking to
//! it and the set of documents the server has open. Creating one performs
//! the whole startup sequence, so a session that exists is ready for
//! requests.

use async_trait::async_trait;
use lsp_types::{
    ClientCapabilities, ClientInfo, DocumentSymbolClientCapabilities, GotoCapability,
    HoverClientCapabilities, InitializeParams, MarkupKind, ReferenceClientCapabilities,
    TextDocumentClientCapabilities, TextDocumentSyncClientCapabilities, Uri,
    WorkspaceClientCapabilities, WorkspaceFolder, WorkspaceSymbolClientCapabilities,
};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::backend::config::BackendConfig;
use crate::backend::error::BackendSessionError;
use crate::backend::file_manager::{FileManager, FileManagerError};
use crate::io::{ChildProcessManager, FileSystemTrait, StdioTransport, StopMode};
use crate::lsp::jsonrpc_utils::{method_not_found_response, null_success_response, success_response};
use crate::lsp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::lsp::{LspClient, LspClientTrait};
use crate::symbol::{UriError, uri_from_path};

// ============================================================================
// Backend Session Trait
// ============================================================================

/// What the resolver needs from a session
#[async_trait]
pub trait BackendSessionTrait: Send + Sync {
    /// Associated LSP client type - the real client or a test double
    type Client: LspClientTrait;

    fn config(&self) -> &BackendConfig;

    fn client_mut(&mut self) -> &mut Self::Client;

    /// Document tracker and client, borrowed together
    fn documents_mut(&mut self) -> (&mut FileManager, &mut Self::Client);

    /// Graceful async cleanup (consumes self)
    async fn close(self) -> Result<(), BackendSessionError>
    where
        Self: Sized;

    /// Sync the on-disk content of `path` to the server
    async fn ensure_file_ready(
        &mut self,
        path: &Path,
        fs: &dyn FileSystemTrait,
    ) -> Result<Uri, FileManagerError> {
        let (file_manager, client) = self.documents_mut();
        file_manager.ensure_file_ready(path, fs, client).await
    }

    /// Open `path` with in-memory content
    async fn open_with_text(
        &mut self,
        path: &Path,
        text: String,
    ) -> Result<Uri, FileManagerError> {
        let (file_manager, client) = self.documents_mut();
        file_manager.sync_text(path, text, client).await
    }

    async fn close_file(&mut self, path: &Path) -> Result<(), FileManagerError> {
        let (file_manager, client) = self.documents_mut();
        file_manager.close_file(path, client).await
    }
}

// ============================================================================
// Backend Session Implementation
// ============================================================================

pub struct BackendSession {
    config: BackendConfig,

    /// Process manager for the server (always running)
    process_manager: ChildProcessManager,

    /// LSP client (always present and initialized)
    lsp_client: LspClient<StdioTransport>,

    file_manager: FileManager,

    started_at: Instant,
}

impl BackendSession {
    /// Start the server and complete the initialize handshake
    pub async fn new(config: BackendConfig) -> Result<Self, BackendSessionError> {
        info!(
            "Starting language server session: {} {:?}",
            config.server_command, config.server_args
        );
        debug!("Workspace root: {:?}", config.workspace_root);

        // Step 1: Create and start the server process in the workspace root
        let mut process_manager = ChildProcessManager::new(
            config.server_command.clone(),
            config.server_args.clone(),
            Some(config.workspace_root.clone()),
        );
        process_manager.on_stderr_line(Self::stderr_sink(&config));
        process_manager.start().await?;

        // Step 2: Create LSP client over the process' stdio
        let transport = process_manager.take_stdio_transport()?;
        let mut lsp_client = LspClient::new(transport)
            .with_timeouts(config.request_timeout, config.initialization_timeout);

        // Step 3: Wire handlers before initialize; the server may ask for
        // configuration as soon as it is initialized
        lsp_client
            .rpc_client()
            .on_request(answer_server_request)
            .await;
        lsp_client
            .rpc_client()
            .on_notification(log_server_notification)
            .await;

        // Step 4: Initialize the LSP connection
        let params = initialize_params(&config)?;
        let init_result = tokio::time::timeout(
            config.initialization_timeout,
            lsp_client.initialize(params),
        )
        .await
        .map_err(|_| {
            BackendSessionError::operation_timeout(
                "LSP initialization",
                config.initialization_timeout,
            )
        })??;
        debug!(
            "LSP initialization completed: {:?}",
            init_result.capabilities
        );

        info!("Language server session started");
        Ok(Self {
            config,
            process_manager,
            lsp_client,
            file_manager: FileManager::new(),
            started_at: Instant::now(),
        })
    }

    /// Graceful async cleanup - consumes self to prevent further use
    ///
    /// Closes open documents, sends `shutdown`/`exit`, then stops the process.
    pub async fn close(mut self) -> Result<(), BackendSessionError> {
        info!(
            "Shutting down language server session after {:?}",
            self.started_at.elapsed()
        );

        debug!(
            "Closing {} open documents",
            self.file_manager.get_open_files_count()
        );
        self.file_manager.close_all_files(&mut self.lsp_client).await;

        let shutdown_result =
            tokio::time::timeout(self.config.request_timeout, self.lsp_client.shutdown()).await;
        match shutdown_result {
            Ok(Ok(())) => debug!("LSP client shutdown completed"),
            Ok(Err(e)) => warn!("LSP client shutdown error: {}", e),
            Err(_) => warn!("LSP client shutdown timed out"),
        }

        self.process_manager.stop(StopMode::Graceful).await?;
        info!("Language server session shutdown completed");
        Ok(())
    }

    /// Stderr handler: trace log plus optional timestamped log file
    fn stderr_sink(config: &BackendConfig) -> impl Fn(String) + Send + Sync + 'static {
        let log_file = config.stderr_log_path.as_ref().and_then(|path| {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => Some(Arc::new(Mutex::new(file))),
                Err(e) => {
                    warn!("Cannot open server stderr log {}: {}", path.display(), e);
                    None
                }
            }
        });

        move |line: String| {
            trace!(target: "server_stderr", "{}", line);
            if let Some(file) = &log_file
                && let Ok(mut file) = file.lock()
            {
                let _ = writeln!(file, "{} {}", chrono::Utc::now().to_rfc3339(), line);
            }
        }
    }
}

/// Dropping a session without `close()` force-kills the server
impl Drop for BackendSession {
    fn drop(&mut self) {
        if self.process_manager.is_running() {
            warn!("BackendSession dropped without calling close() - force killing server");
            self.process_manager.kill_sync();
        }
    }
}

#[async_trait]
impl BackendSessionTrait for BackendSession {
    type Client = LspClient<StdioTransport>;

    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn client_mut(&mut self) -> &mut Self::Client {
        &mut self.lsp_client
    }

    fn documents_mut(&mut self) -> (&mut FileManager, &mut Self::Client) {
        (&mut self.file_manager, &mut self.lsp_client)
    }

    async fn close(self) -> Result<(), BackendSessionError> {
        BackendSession::close(self).await
    }
}

// ============================================================================
// Handshake and server-initiated traffic
// ============================================================================

/// `initialize` parameters for a workspace
pub fn initialize_params(config: &BackendConfig) -> Result<InitializeParams, UriError> {
    let root_uri = uri_from_path(&config.workspace_root)?;
    let root_name = config
        .workspace_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string());

    let capabilities = ClientCapabilities {
        text_document: Some(TextDocumentClientCapabilities {
            synchronization: Some(TextDocumentSyncClientCapabilities {
                did_save: Some(false),
                ..Default::default()
            }),
            hover: Some(HoverClientCapabilities {
                content_format: Some(vec![MarkupKind::Markdown, MarkupKind::PlainText]),
                ..Default::default()
            }),
            definition: Some(GotoCapability {
                link_support: Some(false),
                ..Default::default()
            }),
            references: Some(ReferenceClientCapabilities::default()),
            document_symbol: Some(DocumentSymbolClientCapabilities {
                hierarchical_document_symbol_support: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }),
        workspace: Some(WorkspaceClientCapabilities {
            symbol: Some(WorkspaceSymbolClientCapabilities::default()),
            workspace_folders: Some(true),
            configuration: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    let initialization_options = config.initialization_options();

    #[allow(deprecated)]
    Ok(InitializeParams {
        process_id: Some(std::process::id()),
        root_uri: Some(root_uri.clone()),
        initialization_options: Some(initialization_options),
        capabilities,
        workspace_folders: Some(vec![WorkspaceFolder {
            uri: root_uri,
            name: root_name,
        }]),
        client_info: Some(ClientInfo {
            name: config.client_name.clone(),
            version: Some(config.client_version.clone()),
        }),
        ..Default::default()
    })
}

/// Answer a request the server sends to the client
pub fn answer_server_request(request: JsonRpcRequest) -> JsonRpcResponse {
    match request.method.as_str() {
        "workspace/configuration" => {
            // One null per requested item: use server defaults
            let items = request
                .params
                .as_ref()
                .and_then(|p| p.get("items"))
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            debug!("Answering workspace/configuration with {} nulls", items);
            success_response(request.id, Value::Array(vec![Value::Null; items]))
        }
        "client/registerCapability"
        | "client/unregisterCapability"
        | "window/workDoneProgress/create" => {
            debug!("Accepting {} request: {:?}", request.method, request.id);
            null_success_response(request.id)
        }
        method => {
            debug!("Unsupported server request: {}", method);
            method_not_found_response(request.id, method)
        }
    }
}

/// Log a notification from the server; nothing acts on them
pub fn log_server_notification(notification: JsonRpcNotification) {
    let message = notification
        .params
        .as_ref()
        .and_then(|p| p.get("message"))
        .and_then(Value::as_str);

    match (notification.method.as_str(), message) {
        ("window/logMessage" | "window/showMessage", Some(message)) => {
            debug!(target: "server_log", "{}", message)
        }
        (method, _) => trace!("Ignoring server notification {}", method),
    }
}
