//! Workspace paths, module classification and column units
//!
//! Callers speak workspace-relative paths; the server speaks absolute
//! file URIs. Columns are UTF-16 code units on both sides, while parsers
//! and Rust strings work in bytes.

use std::path::{Component, Path, PathBuf};

use crate::io::FileSystemTrait;

/// Directory names pip installs third-party packages into
const PACKAGE_DIRS: [&str; 2] = ["site-packages", "dist-packages"];

/// Marker file at the top of every virtual environment
const VENV_MARKER: &str = "pyvenv.cfg";

/// Translates between caller-facing and server-facing coordinates for one
/// workspace root
#[derive(Debug, Clone)]
pub struct WorkspaceTranslator {
    root: PathBuf,
    environment: Option<PathBuf>,
}

impl WorkspaceTranslator {
    /// `root` must already be absolute and canonical
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            environment: None,
        }
    }

    /// Treat the environment of `interpreter` as library code even when it
    /// lives under the root
    ///
    /// `<env>/bin/python` and `<env>/Scripts/python.exe` name `<env>`; any
    /// other path is taken as the environment directory itself.
    pub fn with_environment(mut self, interpreter: &Path) -> Self {
        let in_bin_dir = interpreter
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|dir| dir == "bin" || dir == "Scripts");
        let environment = if in_bin_dir {
            interpreter.parent().and_then(Path::parent)
        } else {
            Some(interpreter)
        };
        self.environment = environment.and_then(normalize_lexically);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a caller-supplied path inside the workspace
    ///
    /// Relative paths are taken from the workspace root. `..` components
    /// are folded lexically so a path cannot climb out unnoticed.
    pub fn resolve_user_path(&self, path: &Path) -> Result<PathBuf, String> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let normalized = normalize_lexically(&joined)
            .ok_or_else(|| format!("{} escapes the filesystem root", path.display()))?;
        if !normalized.starts_with(&self.root) {
            return Err(format!(
                "{} is outside the workspace {}",
                path.display(),
                self.root.display()
            ));
        }
        Ok(normalized)
    }

    /// True for user code: under the root, but outside installed packages
    /// and virtual environments
    pub fn is_in_workspace(&self, path: &Path, fs: &dyn FileSystemTrait) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if self
            .environment
            .as_ref()
            .is_some_and(|environment| path.starts_with(environment))
        {
            return false;
        }
        if relative
            .components()
            .any(|component| PACKAGE_DIRS.iter().any(|dir| component.as_os_str() == *dir))
        {
            return false;
        }

        // Directories strictly between the root and the file
        let mut dir = self.root.clone();
        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            if components.peek().is_none() {
                break;
            }
            dir.push(component);
            if fs.is_file(&dir.join(VENV_MARKER)) {
                return false;
            }
        }
        true
    }

    /// Path as reported to callers: workspace-relative when possible
    pub fn display_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    /// The file a dotted module name maps to, if it lives in the workspace
    ///
    /// `a.b.c` is a workspace module when one of `a/b/c.py`, `a/b/c.pyi`,
    /// `a/b/c/__init__.py` or `a/b/c/__init__.pyi` exists under the root.
    pub fn workspace_module_file(&self, module: &str, fs: &dyn FileSystemTrait) -> Option<PathBuf> {
        let mut base = self.root.clone();
        for segment in module.split('.') {
            base.push(segment);
        }

        let candidates = [
            base.with_extension("py"),
            base.with_extension("pyi"),
            base.join("__init__.py"),
            base.join("__init__.pyi"),
        ];
        candidates.into_iter().find(|candidate| fs.is_file(candidate))
    }
}

/// Fold `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Some(normalized)
}

// ============================================================================
// Column units
// ============================================================================

/// Length of `text` in UTF-16 code units
pub fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

/// Byte offset within `line` of a UTF-16 column, clamped to the line end
pub fn utf16_to_byte(line: &str, column: u32) -> usize {
    let mut units = 0u32;
    for (offset, ch) in line.char_indices() {
        if units >= column {
            return offset;
        }
        units += ch.len_utf16() as u32;
    }
    line.len()
}

/// UTF-16 column of a byte offset within `line`
pub fn byte_to_utf16(line: &str, byte: usize) -> u32 {
    let end = byte.min(line.len());
    let mut units = 0u32;
    for (offset, ch) in line.char_indices() {
        if offset >= end {
            break;
        }
        units += ch.len_utf16() as u32;
    }
    units
}

/// Line `index` of `source` without its terminator
pub fn line_at(source: &str, index: u32) -> Option<&str> {
    source
        .split('\n')
        .nth(index as usize)
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::file_system::MockFileSystemTrait;

    #[test]
    fn test_resolve_user_path() {
        let translator = WorkspaceTranslator::new("/work/project");

        assert_eq!(
            translator.resolve_user_path(Path::new("main.py")).unwrap(),
            PathBuf::from("/work/project/main.py")
        );
        assert_eq!(
            translator
                .resolve_user_path(Path::new("./core/../core/math_utils.py"))
                .unwrap(),
            PathBuf::from("/work/project/core/math_utils.py")
        );
        assert!(translator.resolve_user_path(Path::new("../other/x.py")).is_err());
        assert!(translator.resolve_user_path(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_installed_packages_are_not_workspace_code() {
        let mut fs = MockFileSystemTrait::new();
        fs.expect_is_file()
            .returning(|path| path == Path::new("/work/project/env/pyvenv.cfg"));
        let translator = WorkspaceTranslator::new("/work/project")
            .with_environment(Path::new("/work/project/.venv/bin/python"));

        assert!(translator.is_in_workspace(Path::new("/work/project/core/math_utils.py"), &fs));
        assert!(!translator.is_in_workspace(
            Path::new("/work/project/.venv/lib/python3.12/site-packages/requests/__init__.py"),
            &fs
        ));
        assert!(!translator.is_in_workspace(
            Path::new("/work/project/.venv/lib/python3.12/collections/__init__.py"),
            &fs
        ));
        assert!(!translator.is_in_workspace(
            Path::new("/work/project/vendor/dist-packages/six.py"),
            &fs
        ));
        assert!(!translator.is_in_workspace(
            Path::new("/work/project/env/lib/python3.12/os.py"),
            &fs
        ));
        assert!(!translator.is_in_workspace(Path::new("/usr/lib/python3.12/os.py"), &fs));
    }

    #[test]
    fn test_display_path() {
        let translator = WorkspaceTranslator::new("/work/project");

        assert_eq!(
            translator.display_path(Path::new("/work/project/core/math_utils.py")),
            PathBuf::from("core/math_utils.py")
        );
        assert_eq!(
            translator.display_path(Path::new("/usr/lib/python3.12/collections/__init__.py")),
            PathBuf::from("/usr/lib/python3.12/collections/__init__.py")
        );
    }

    #[test]
    fn test_workspace_module_file() {
        let mut fs = MockFileSystemTrait::new();
        fs.expect_is_file().returning(|path| {
            path == Path::new("/work/project/core/math_utils.py")
                || path == Path::new("/work/project/core/__init__.py")
        });
        let translator = WorkspaceTranslator::new("/work/project");

        assert_eq!(
            translator.workspace_module_file("core.math_utils", &fs),
            Some(PathBuf::from("/work/project/core/math_utils.py"))
        );
        assert_eq!(
            translator.workspace_module_file("core", &fs),
            Some(PathBuf::from("/work/project/core/__init__.py"))
        );
        assert_eq!(translator.workspace_module_file("collections", &fs), None);
    }

    #[test]
    fn test_utf16_columns() {
        // 'é' is one UTF-16 unit and two bytes; '𝒳' is two units and four bytes
        let line = "é = '𝒳'; x = 1";
        assert_eq!(utf16_len(line), 15);
        assert_eq!(utf16_to_byte(line, 1), 2);
        assert_eq!(utf16_to_byte(line, 8), 11);
        assert_eq!(byte_to_utf16(line, 11), 8);
        assert_eq!(utf16_to_byte(line, 100), line.len());
    }

    #[test]
    fn test_line_at() {
        let source = "a = 1\r\nb = 2\n";
        assert_eq!(line_at(source, 0), Some("a = 1"));
        assert_eq!(line_at(source, 1), Some("b = 2"));
        assert_eq!(line_at(source, 2), Some(""));
        assert_eq!(line_at(source, 3), None);
    }
}
