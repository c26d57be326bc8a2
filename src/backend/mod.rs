//! Language-server backend sessions
//!
//! - **BackendSession**: lifecycle of the server process + LSP client
//! - **BackendConfig**: configuration with builder pattern and validation
//! - **FileManager**: document synchronization
//!
//! ```rust,ignore
//! let config = BackendConfigBuilder::new()
//!     .workspace_root("/path/to/project")
//!     .python_env("/path/to/venv/bin/python")
//!     .build()?;
//!
//! let session = BackendSession::new(config).await?;
//! // hand the session to a SymbolLocator ...
//! session.close().await?;
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod session;

#[cfg(test)]
pub mod testing;

pub use config::{BackendConfig, BackendConfigBuilder, ConfigFile};
pub use error::{BackendConfigError, BackendSessionError};
pub use session::{BackendSession, BackendSessionTrait};
