use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use lsp_types::{
    Location as LspLocation, LocationLink as LspLocationLink, Position as LspPosition,
    Range as LspRange, Uri,
};
use serde::{Deserialize, Serialize};

/// 0-based line/character pair; characters are UTF-16 code units as on the wire
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Inclusive of both ends, so a cursor right after a name still hits it
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }

    /// Number of lines spanned, for picking the innermost of nested ranges
    pub fn line_span(&self) -> u32 {
        self.end.line.saturating_sub(self.start.line)
    }
}

/// A point in a file: the unit every lookup result is reported in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilePosition {
    pub file_path: PathBuf,
    #[serde(flatten)]
    pub position: Position,
}

impl FilePosition {
    pub fn new(file_path: impl Into<PathBuf>, line: u32, character: u32) -> Self {
        Self {
            file_path: file_path.into(),
            position: Position::new(line, character),
        }
    }

    pub fn line(&self) -> u32 {
        self.position.line
    }

    pub fn character(&self) -> u32 {
        self.position.character
    }

    /// Compact 1-based form, `main.py:19:15`
    pub fn to_compact(&self) -> String {
        format!(
            "{}:{}:{}",
            self.file_path.display(),
            self.position.line + 1,
            self.position.character + 1
        )
    }
}

impl fmt::Display for FilePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_compact())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub file_path: PathBuf,
    pub range: Range,
}

impl FileLocation {
    pub fn start(&self) -> FilePosition {
        FilePosition {
            file_path: self.file_path.clone(),
            position: self.range.start,
        }
    }

    /// Convert FileLocation to compact 1-based range format
    /// Examples:
    /// - Point location: "core/math_utils.py:23:5"
    /// - Same line range: "core/math_utils.py:23:5-20"
    /// - Multi-line range: "core/math_utils.py:23:5-25:10"
    pub fn to_compact_range(&self) -> String {
        let path = self.file_path.display();
        let start = &self.range.start;
        let end = &self.range.end;

        let start_line = start.line + 1;
        let start_col = start.character + 1;
        let end_line = end.line + 1;
        let end_col = end.character + 1;

        if start_line == end_line {
            if start_col == end_col {
                format!("{}:{}:{}", path, start_line, start_col)
            } else {
                format!("{}:{}:{}-{}", path, start_line, start_col, end_col)
            }
        } else {
            format!(
                "{}:{}:{}-{}:{}",
                path, start_line, start_col, end_line, end_col
            )
        }
    }
}

// ============================================================================
// URI <-> path conversion
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("Not a file URI: {0}")]
    NotAFileUri(String),

    #[error("Path cannot be expressed as a file URI: {0}")]
    InvalidPath(PathBuf),
}

/// File URI for an absolute path, percent-encoded as the server expects
pub fn uri_from_path(path: &Path) -> Result<Uri, UriError> {
    let url =
        url::Url::from_file_path(path).map_err(|_| UriError::InvalidPath(path.to_path_buf()))?;
    Uri::from_str(url.as_str()).map_err(|_| UriError::InvalidPath(path.to_path_buf()))
}

/// Absolute path for a `file://` URI
pub fn path_from_uri(uri: &Uri) -> Result<PathBuf, UriError> {
    let url = url::Url::parse(uri.as_str())
        .map_err(|_| UriError::NotAFileUri(uri.as_str().to_string()))?;
    if url.scheme() != "file" {
        return Err(UriError::NotAFileUri(uri.as_str().to_string()));
    }
    url.to_file_path()
        .map_err(|_| UriError::NotAFileUri(uri.as_str().to_string()))
}

// ============================================================================
// lsp_types conversions
// ============================================================================

impl From<LspPosition> for Position {
    fn from(pos: LspPosition) -> Self {
        Position {
            line: pos.line,
            character: pos.character,
        }
    }
}

impl From<Position> for LspPosition {
    fn from(pos: Position) -> Self {
        LspPosition {
            line: pos.line,
            character: pos.character,
        }
    }
}

impl From<LspRange> for Range {
    fn from(range: LspRange) -> Self {
        Range {
            start: range.start.into(),
            end: range.end.into(),
        }
    }
}

impl TryFrom<&LspLocation> for FileLocation {
    type Error = UriError;

    fn try_from(location: &LspLocation) -> Result<Self, Self::Error> {
        Ok(FileLocation {
            file_path: path_from_uri(&location.uri)?,
            range: Range::from(location.range),
        })
    }
}

impl TryFrom<&LspLocationLink> for FileLocation {
    type Error = UriError;

    /// A link's selection range is the definition's name, like a plain location
    fn try_from(link: &LspLocationLink) -> Result<Self, Self::Error> {
        Ok(FileLocation {
            file_path: path_from_uri(&link.target_uri)?,
            range: Range::from(link.target_selection_range),
        })
    }
}
