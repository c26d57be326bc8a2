//! JSON-RPC 2.0 helpers
//!
//! Response builders used when answering requests the language server
//! sends to the client.

use serde_json::Value;

use crate::lsp::protocol::{JsonRpcErrorObject, JsonRpcResponse};

pub const JSONRPC_VERSION: &str = "2.0";

pub mod error_codes {
    pub const METHOD_NOT_FOUND: i32 = -32601;
}

pub fn success_response(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        result: Some(result),
        error: None,
    }
}

pub fn null_success_response(id: Value) -> JsonRpcResponse {
    success_response(id, Value::Null)
}

pub fn method_not_found_response(id: Value, method: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        result: None,
        error: Some(JsonRpcErrorObject {
            code: error_codes::METHOD_NOT_FOUND,
            message: format!("Method not found: {}", method),
            data: None,
        }),
    }
}
