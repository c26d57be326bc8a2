//! JSON-RPC 2.0 protocol layer
//!
//! Correlates requests with responses over a framed transport and
//! dispatches server-initiated requests and notifications to handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{Level, debug, error, trace, warn};

use crate::io::transport::Transport;
use crate::log_lsp_message;
use crate::lsp::framing::LspFraming;
use crate::lsp::jsonrpc_utils::{JSONRPC_VERSION, method_not_found_response};

// ============================================================================
// JSON-RPC Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Inbound message classified by the presence of `id` and `method`
#[derive(Debug)]
enum Inbound {
    Response(JsonRpcResponse),
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl Inbound {
    fn parse(message: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(message)?;
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        let has_method = value.get("method").is_some();

        Ok(match (has_id, has_method) {
            (true, true) => Inbound::Request(serde_json::from_value(value)?),
            (false, true) => Inbound::Notification(serde_json::from_value(value)?),
            _ => Inbound::Response(serde_json::from_value(value)?),
        })
    }
}

// ============================================================================
// JSON-RPC Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum JsonRpcError {
    #[error("JSON-RPC server error ({code}) for '{method}': {message}")]
    Server {
        method: String,
        code: i32,
        message: String,
        data: Option<Value>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(serde_json::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(serde_json::Error),

    #[error("Request '{method}' timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("Request was cancelled")]
    RequestCancelled,
}

// ============================================================================
// JSON-RPC Client
// ============================================================================

type NotificationHandler = Arc<dyn Fn(JsonRpcNotification) + Send + Sync>;
type RequestHandler = Arc<dyn Fn(JsonRpcRequest) -> JsonRpcResponse + Send + Sync>;
type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

#[derive(Default)]
struct Handlers {
    notification: Option<NotificationHandler>,
    request: Option<RequestHandler>,
}

/// JSON-RPC client with request/response correlation
///
/// A background task owns the framed transport. Outbound messages reach it
/// through a channel; inbound responses are routed to the waiting request
/// by id.
pub struct JsonRpcClient<T: Transport> {
    outbound_sender: mpsc::UnboundedSender<String>,
    request_id: AtomicU64,
    pending_requests: PendingRequests,
    handlers: Arc<Mutex<Handlers>>,
    _transport: std::marker::PhantomData<T>,
}

impl<T: Transport + 'static> JsonRpcClient<T> {
    pub fn new(transport: T) -> Self {
        let framed = Arc::new(Mutex::new(LspFraming::new(transport)));
        let (outbound_sender, mut outbound_receiver) = mpsc::unbounded_channel::<String>();
        let pending_requests: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let handlers = Arc::new(Mutex::new(Handlers::default()));

        let task_pending = Arc::clone(&pending_requests);
        let task_handlers = Arc::clone(&handlers);
        let reply_sender = outbound_sender.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    outbound = outbound_receiver.recv() => {
                        let Some(message) = outbound else { break };
                        let mut transport = framed.lock().await;
                        if let Err(e) = transport.send(&message).await {
                            error!("Failed to send message to server: {}", e);
                            break;
                        }
                    }
                    inbound = async { framed.lock().await.receive().await } => {
                        match inbound {
                            Ok(message) => {
                                Self::dispatch(message, &task_pending, &task_handlers, &reply_sender).await;
                            }
                            Err(e) => {
                                error!("Failed to receive message from server: {}", e);
                                break;
                            }
                        }
                    }
                }
            }

            // Waiters see a closed channel and report cancellation
            task_pending.lock().await.clear();
            trace!("JSON-RPC transport task finished");
        });

        Self {
            outbound_sender,
            request_id: AtomicU64::new(1),
            pending_requests,
            handlers,
            _transport: std::marker::PhantomData,
        }
    }

    /// Handle server-to-client notifications
    pub async fn on_notification<F>(&self, handler: F)
    where
        F: Fn(JsonRpcNotification) + Send + Sync + 'static,
    {
        self.handlers.lock().await.notification = Some(Arc::new(handler));
    }

    /// Answer server-to-client requests
    pub async fn on_request<F>(&self, handler: F)
    where
        F: Fn(JsonRpcRequest) -> JsonRpcResponse + Send + Sync + 'static,
    {
        self.handlers.lock().await.request = Some(Arc::new(handler));
    }

    async fn dispatch(
        message: String,
        pending_requests: &PendingRequests,
        handlers: &Arc<Mutex<Handlers>>,
        reply_sender: &mpsc::UnboundedSender<String>,
    ) {
        let inbound = match Inbound::parse(&message) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("Dropping unparseable message from server: {} ({})", e, message);
                return;
            }
        };

        match inbound {
            Inbound::Response(response) => {
                let response_id = response.id.to_string();
                log_lsp_message!(Level::DEBUG, "incoming", response_id.as_str(), &response);
                let Some(id) = response.id.as_u64() else {
                    debug!("Response without numeric id: {:?}", response.id);
                    return;
                };
                match pending_requests.lock().await.remove(&id) {
                    Some(sender) => {
                        if sender.send(response).is_err() {
                            debug!("Response receiver dropped for request {}", id);
                        }
                    }
                    None => debug!("Received response for unknown request {}", id),
                }
            }
            Inbound::Request(request) => {
                log_lsp_message!(Level::DEBUG, "incoming", request.method.as_str(), &request.params);
                let handler = handlers.lock().await.request.clone();
                let response = match handler {
                    Some(handler) => handler(request),
                    None => method_not_found_response(request.id, &request.method),
                };
                match serde_json::to_string(&response) {
                    Ok(json) => {
                        let _ = reply_sender.send(json);
                    }
                    Err(e) => error!("Failed to serialize reply to server request: {}", e),
                }
            }
            Inbound::Notification(notification) => {
                log_lsp_message!(
                    Level::TRACE,
                    "incoming",
                    notification.method.as_str(),
                    &notification.params
                );
                let handler = handlers.lock().await.notification.clone();
                if let Some(handler) = handler {
                    handler(notification);
                }
            }
        }
    }

    /// Send a request and wait for its result
    pub async fn request<P, R>(
        &self,
        method: &str,
        params: Option<P>,
        timeout: Duration,
    ) -> Result<R, JsonRpcError>
    where
        P: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let (response_sender, response_receiver) = oneshot::channel();
        self.pending_requests.lock().await.insert(id, response_sender);

        let request = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Value::from(id),
            method: method.to_string(),
            params: params
                .map(|p| serde_json::to_value(p).map_err(JsonRpcError::Serialization))
                .transpose()?,
        };
        let request_json = serde_json::to_string(&request).map_err(JsonRpcError::Serialization)?;
        log_lsp_message!(Level::DEBUG, "outgoing", method, &request.params);

        if self.outbound_sender.send(request_json).is_err() {
            self.pending_requests.lock().await.remove(&id);
            return Err(JsonRpcError::Transport("Outbound channel closed".to_string()));
        }

        let response = match tokio::time::timeout(timeout, response_receiver).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                self.pending_requests.lock().await.remove(&id);
                return Err(JsonRpcError::RequestCancelled);
            }
            Err(_) => {
                self.pending_requests.lock().await.remove(&id);
                return Err(JsonRpcError::Timeout {
                    method: method.to_string(),
                    timeout,
                });
            }
        };

        if let Some(error) = response.error {
            return Err(JsonRpcError::Server {
                method: method.to_string(),
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        // A missing result is read as null so `()` and `Option<_>` results work
        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(JsonRpcError::Deserialization)
    }

    /// Send a notification; no response is expected
    pub async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<(), JsonRpcError>
    where
        P: Serialize,
    {
        let notification = JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params: params
                .map(|p| serde_json::to_value(p).map_err(JsonRpcError::Serialization))
                .transpose()?,
        };
        let json = serde_json::to_string(&notification).map_err(JsonRpcError::Serialization)?;
        log_lsp_message!(Level::DEBUG, "outgoing", method, &notification.params);

        self.outbound_sender
            .send(json)
            .map_err(|_| JsonRpcError::Transport("Outbound channel closed".to_string()))
    }

    /// Fail every request still waiting for a response
    pub async fn cancel_pending_requests(&self) {
        let mut pending = self.pending_requests.lock().await;
        for (id, _) in pending.drain() {
            debug!("JsonRpcClient: cancelling pending request {}", id);
        }
    }
}
