//! Language Server Protocol client
//!
//! Layered on top of the generic I/O layer (`crate::io`):
//!
//! - **Framing**: `Content-Length` message framing
//! - **Protocol**: JSON-RPC 2.0 request/response correlation
//! - **Client**: typed LSP API built on `lsp-types`
//! - **Testing**: scriptable client for engine tests
//!
// Typical wiring, as done by `backend::BackendSession`:
//
// ```rust
// let mut process = ChildProcessManager::new("jedi-language-server".into(), vec![], Some(root));
// process.start().await?;
// let mut client = LspClient::new(process.take_stdio_transport()?);
// client.initialize(params).await?;
// // ... requests ...
// client.shutdown().await?;
// process.stop(StopMode::Graceful).await?;
// ```

pub mod client;
pub mod framing;
pub mod jsonrpc_utils;
pub mod protocol;
#[cfg(test)]
pub mod testing;
pub mod traits;

pub use client::{LspClient, LspError};
pub use traits::LspClientTrait;
