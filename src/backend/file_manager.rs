//! Document synchronization for backend sessions
//!
//! Tracks which files the server has open, re-sends contents when they
//! change on disk, and closes them again.

use lsp_types::Uri;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::io::FileSystemTrait;
use crate::lsp::{LspClientTrait, LspError};
use crate::symbol::{UriError, uri_from_path};

/// Language id sent with every `didOpen`
pub const PYTHON_LANGUAGE_ID: &str = "python";

// ============================================================================
// File Manager Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FileManagerError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("LSP error: {0}")]
    Lsp(#[from] LspError),

    #[error("Invalid file path: {0}")]
    InvalidPath(#[from] UriError),
}

// ============================================================================
// File Entry
// ============================================================================

#[derive(Debug, Clone)]
struct FileEntry {
    uri: Uri,

    /// SHA256 hash of the content last sent to the server
    content_hash: String,
}

// ============================================================================
// File Manager
// ============================================================================

/// Open documents of one session, keyed by absolute path
pub struct FileManager {
    opened_files: HashMap<PathBuf, FileEntry>,
    next_version: i32,
}

impl FileManager {
    pub fn new() -> Self {
        Self {
            opened_files: HashMap::new(),
            next_version: 1,
        }
    }

    /// Make the server see the current on-disk content of `path`
    ///
    /// Opens the file if needed, sends a full-text change if its content
    /// hash differs from what was last sent, and otherwise does nothing.
    /// Returns the document URI.
    pub async fn ensure_file_ready(
        &mut self,
        path: &Path,
        fs: &dyn FileSystemTrait,
        client: &mut impl LspClientTrait,
    ) -> Result<Uri, FileManagerError> {
        if !client.is_initialized() {
            return Err(FileManagerError::Lsp(LspError::NotInitialized));
        }

        let content = fs
            .read_to_string(path)
            .map_err(|source| FileManagerError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        self.sync_text(path, content, client).await
    }

    /// Open or update `path` with `content` that is already in memory
    pub async fn sync_text(
        &mut self,
        path: &Path,
        content: String,
        client: &mut impl LspClientTrait,
    ) -> Result<Uri, FileManagerError> {
        let content_hash = Self::compute_hash(&content);
        let version = self.next_version;

        if let Some(entry) = self.opened_files.get_mut(path) {
            if entry.content_hash == content_hash {
                debug!("File {} is already open and unchanged", path.display());
                return Ok(entry.uri.clone());
            }

            debug!("File {} changed, sending didChange", path.display());
            client
                .change_text_document(entry.uri.clone(), version, content)
                .await?;
            self.next_version += 1;
            entry.content_hash = content_hash;
            return Ok(entry.uri.clone());
        }

        let uri = uri_from_path(path)?;
        debug!("Opening file {}", path.display());
        client
            .open_text_document(uri.clone(), PYTHON_LANGUAGE_ID.to_string(), version, content)
            .await?;
        self.next_version += 1;
        self.opened_files.insert(
            path.to_path_buf(),
            FileEntry {
                uri: uri.clone(),
                content_hash,
            },
        );
        Ok(uri)
    }

    /// Close a file in the server; a file that is not open is ignored
    pub async fn close_file(
        &mut self,
        path: &Path,
        client: &mut impl LspClientTrait,
    ) -> Result<(), FileManagerError> {
        match self.opened_files.remove(path) {
            Some(entry) => {
                debug!("Closing file {}", path.display());
                client.close_text_document(entry.uri).await?;
            }
            None => debug!("File {} was not open", path.display()),
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn is_file_open(&self, path: &Path) -> bool {
        self.opened_files.contains_key(path)
    }

    pub fn get_open_files_count(&self) -> usize {
        self.opened_files.len()
    }

    /// Close all open files, logging failures
    pub async fn close_all_files(&mut self, client: &mut impl LspClientTrait) {
        let files: Vec<PathBuf> = self.opened_files.keys().cloned().collect();

        for file in files {
            if let Err(e) = self.close_file(&file, client).await {
                warn!("Failed to close file {}: {}", file.display(), e);
            }
        }
    }

    fn compute_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::file_system::MockFileSystemTrait;
    use crate::lsp::testing::MockLspClient;
    use std::sync::{Arc, Mutex};

    // Auto-initialize logging for all tests in this module
    #[cfg(feature = "test-logging")]
    #[ctor::ctor]
    fn init_test_logging() {
        crate::test_utils::logging::init();
    }

    /// A mock file system whose single file content can be swapped by the test
    fn mock_fs(content: Arc<Mutex<String>>) -> MockFileSystemTrait {
        let mut fs = MockFileSystemTrait::new();
        fs.expect_read_to_string()
            .returning(move |_| Ok(content.lock().unwrap().clone()));
        fs
    }

    #[test]
    fn test_compute_hash() {
        let hash1 = FileManager::compute_hash("def add(a, b):\n");
        let hash2 = FileManager::compute_hash("def add(a, b):\n");
        let hash3 = FileManager::compute_hash("def sub(a, b):\n");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
    }

    #[tokio::test]
    async fn test_open_then_unchanged_then_changed() {
        let content = Arc::new(Mutex::new("x = 1\n".to_string()));
        let fs = mock_fs(Arc::clone(&content));
        let mut client = MockLspClient::new();
        let mut manager = FileManager::new();
        let path = Path::new("/work/main.py");

        let uri = manager
            .ensure_file_ready(path, &fs, &mut client)
            .await
            .unwrap();
        assert_eq!(uri.as_str(), "file:///work/main.py");
        assert!(manager.is_file_open(path));

        manager
            .ensure_file_ready(path, &fs, &mut client)
            .await
            .unwrap();
        assert_eq!(client.call_count("textDocument/didOpen"), 1);
        assert_eq!(client.call_count("textDocument/didChange"), 0);

        *content.lock().unwrap() = "x = 2\n".to_string();
        manager
            .ensure_file_ready(path, &fs, &mut client)
            .await
            .unwrap();
        assert_eq!(client.call_count("textDocument/didChange"), 1);
        assert_eq!(client.document_version("file:///work/main.py"), Some(2));
        assert_eq!(manager.get_open_files_count(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_reported() {
        let mut fs = MockFileSystemTrait::new();
        fs.expect_read_to_string().returning(|_| {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            ))
        });
        let mut client = MockLspClient::new();
        let mut manager = FileManager::new();

        let result = manager
            .ensure_file_ready(Path::new("/work/missing.py"), &fs, &mut client)
            .await;
        assert!(matches!(result, Err(FileManagerError::FileRead { .. })));
        assert_eq!(manager.get_open_files_count(), 0);
    }

    #[tokio::test]
    async fn test_close_all_files() {
        let mut client = MockLspClient::new();
        let mut manager = FileManager::new();

        for name in ["/work/a.py", "/work/b.py"] {
            manager
                .sync_text(Path::new(name), "pass\n".to_string(), &mut client)
                .await
                .unwrap();
        }
        assert_eq!(client.open_document_count(), 2);

        manager.close_all_files(&mut client).await;
        assert_eq!(manager.get_open_files_count(), 0);
        assert_eq!(client.open_document_count(), 0);

        // Closing again is a no-op
        manager
            .close_file(Path::new("/work/a.py"), &mut client)
            .await
            .unwrap();
        assert_eq!(client.call_count("textDocument/didClose"), 2);
    }
}
