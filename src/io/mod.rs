//! I/O layer - process management, transport and file system access
//!
//! Nothing here knows about LSP. The `lsp` module frames and interprets the
//! strings that travel over a [`transport::Transport`].

pub mod file_system;
pub mod process;
pub mod transport;

pub use file_system::{FileSystemTrait, RealFileSystem};
pub use process::{ChildProcessManager, ProcessError, StopMode};
pub use transport::StdioTransport;
