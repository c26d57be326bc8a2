//! Synthetic import probes
//!
//! A name that does not live in the workspace is resolved by writing a
//! tiny Python file that imports it and asking the server where the
//! imported name is defined. The probe exists on disk only for the
//! duration of one request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::io::FileSystemTrait;
use crate::resolver::translate::utf16_len;
use crate::symbol::Position;

/// File-name prefix shared by every probe; results inside such files are
/// never reported
pub const PROBE_FILE_PREFIX: &str = "__repograph_probe_";

const MODULE_ALIAS: &str = "__m";

/// True for paths created by [`ProbeFile`]
pub fn is_probe_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(PROBE_FILE_PREFIX))
}

/// Probe source text and the cursor to ask about
///
/// With a qualpath: `import <module> as __m` then `__m.<qualpath>`, with
/// the cursor on the last character of the second line. Without one:
/// `import <module>` with the cursor on the first character of the last
/// module segment, which is column 7 for an undotted module.
pub fn probe_source(module: &str, qualpath: Option<&str>) -> (String, Position) {
    match qualpath {
        Some(qualpath) => {
            let access = format!("{MODULE_ALIAS}.{qualpath}");
            let cursor = Position::new(1, utf16_len(&access).saturating_sub(1));
            (
                format!("import {module} as {MODULE_ALIAS}\n{access}\n"),
                cursor,
            )
        }
        None => {
            let prefix_len = module.rfind('.').map(|dot| dot + 1).unwrap_or(0);
            let column = utf16_len("import ") + utf16_len(&module[..prefix_len]);
            (format!("import {module}\n"), Position::new(0, column))
        }
    }
}

/// A probe file on disk, deleted when dropped
pub struct ProbeFile {
    path: PathBuf,
    source: String,
    cursor: Position,
    fs: Arc<dyn FileSystemTrait>,
    removed: bool,
}

impl ProbeFile {
    /// Write a uniquely named probe into `dir`
    pub fn create(
        dir: &Path,
        fs: Arc<dyn FileSystemTrait>,
        module: &str,
        qualpath: Option<&str>,
    ) -> Result<Self, std::io::Error> {
        let (source, cursor) = probe_source(module, qualpath);
        let path = dir.join(format!(
            "{}{}.py",
            PROBE_FILE_PREFIX,
            uuid::Uuid::new_v4().simple()
        ));

        fs.create_new(&path, &source)?;
        debug!("Created probe {} for {}", path.display(), module);

        Ok(Self {
            path,
            source,
            cursor,
            fs,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    /// Delete the probe now, reporting failure
    pub fn remove(mut self) -> Result<(), std::io::Error> {
        self.removed = true;
        self.fs.remove_file(&self.path)
    }
}

impl Drop for ProbeFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = self.fs.remove_file(&self.path) {
            warn!("Failed to remove probe {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::RealFileSystem;
    use tempfile::TempDir;

    #[test]
    fn test_probe_source_with_qualpath() {
        let (source, cursor) = probe_source("collections", Some("deque"));
        assert_eq!(source, "import collections as __m\n__m.deque\n");
        // Last character of "__m.deque"
        assert_eq!(cursor, Position::new(1, 8));
    }

    #[test]
    fn test_probe_source_with_dotted_qualpath() {
        let (source, cursor) = probe_source("collections", Some("deque.popleft"));
        assert_eq!(source, "import collections as __m\n__m.deque.popleft\n");
        // Last character of "__m.deque.popleft"
        assert_eq!(cursor, Position::new(1, 16));
    }

    #[test]
    fn test_probe_source_module_only() {
        let (source, cursor) = probe_source("numpy", None);
        assert_eq!(source, "import numpy\n");
        assert_eq!(cursor, Position::new(0, 7));

        let (source, cursor) = probe_source("os.path", None);
        assert_eq!(source, "import os.path\n");
        assert_eq!(cursor, Position::new(0, 10));
    }

    #[test]
    fn test_probe_cursor_counts_utf16_units() {
        let (_, cursor) = probe_source("m", Some("𝒳"));
        // "__m." is 4 units, '𝒳' is 2
        assert_eq!(cursor, Position::new(1, 5));
    }

    #[test]
    fn test_probe_file_lifecycle() {
        let dir = TempDir::new().unwrap();
        let fs: Arc<dyn FileSystemTrait> = Arc::new(RealFileSystem);

        let probe = ProbeFile::create(dir.path(), Arc::clone(&fs), "json", Some("dumps")).unwrap();
        let path = probe.path().to_path_buf();
        assert!(is_probe_path(&path));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "import json as __m\n__m.dumps\n"
        );

        probe.remove().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_probe_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let fs: Arc<dyn FileSystemTrait> = Arc::new(RealFileSystem);

        let path = {
            let probe = ProbeFile::create(dir.path(), fs, "json", None).unwrap();
            probe.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_concurrent_probe_files_are_isolated() {
        let dir = TempDir::new().unwrap();
        let fs: Arc<dyn FileSystemTrait> = Arc::new(RealFileSystem);

        let first = ProbeFile::create(dir.path(), Arc::clone(&fs), "json", Some("dumps")).unwrap();
        let second = ProbeFile::create(dir.path(), Arc::clone(&fs), "json", Some("dumps")).unwrap();
        assert_ne!(first.path(), second.path());
        assert!(is_probe_path(first.path()) && is_probe_path(second.path()));

        let first_path = first.path().to_path_buf();
        let second_path = second.path().to_path_buf();
        first.remove().unwrap();

        assert!(!first_path.exists());
        assert!(second_path.exists());
        assert_eq!(
            std::fs::read_to_string(&second_path).unwrap(),
            "import json as __m\n__m.dumps\n"
        );

        drop(second);
        assert!(!second_path.exists());
    }

    #[test]
    fn test_is_probe_path() {
        assert!(is_probe_path(Path::new(
            "/work/__repograph_probe_0f9c2a6e.py"
        )));
        assert!(!is_probe_path(Path::new("/work/main.py")));
    }
}
