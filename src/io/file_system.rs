//! File system abstraction
//!
//! Probe files and workspace classification go through this trait so tests
//! can observe writes and deletions without touching a real workspace.

use std::path::Path;

#[cfg_attr(test, mockall::automock)]
pub trait FileSystemTrait: Send + Sync {
    /// True if `path` is an existing regular file
    fn is_file(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> Result<String, std::io::Error>;

    /// Create a new file; fails if it already exists
    fn create_new(&self, path: &Path, contents: &str) -> Result<(), std::io::Error>;

    fn remove_file(&self, path: &Path) -> Result<(), std::io::Error>;
}

/// `std::fs` backed implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystemTrait for RealFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> Result<String, std::io::Error> {
        std::fs::read_to_string(path)
    }

    fn create_new(&self, path: &Path, contents: &str) -> Result<(), std::io::Error> {
        use std::io::Write;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(contents.as_bytes())?;
        file.flush()
    }

    fn remove_file(&self, path: &Path) -> Result<(), std::io::Error> {
        std::fs::remove_file(path)
    }
}
