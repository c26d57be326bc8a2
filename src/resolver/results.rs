//! Lookup results as reported to callers
//!
//! Paths are workspace-relative for workspace files and absolute otherwise.
//! All coordinates are 0-indexed.

use lsp_types::SymbolKind;
use serde::{Serialize, Serializer};

use crate::symbol::{FilePosition, Range};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionResult {
    pub location: FilePosition,

    /// Unset when the server offered no symbol at the location
    #[serde(serialize_with = "serialize_optional_kind")]
    pub symbol_kind: Option<SymbolKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub declared_methods: Vec<String>,

    /// Workspace functions, methods and classes only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_range: Option<Range>,

    /// Workspace functions, methods and classes only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl DefinitionResult {
    pub fn new(
        location: FilePosition,
        symbol_kind: Option<SymbolKind>,
        container_name: Option<String>,
    ) -> Self {
        Self {
            location,
            symbol_kind,
            container_name,
            hover_text: None,
            signature: None,
            declared_methods: Vec::new(),
            full_range: None,
            source_text: None,
            context: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceResult {
    pub location: FilePosition,

    /// The referencing line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One workspace symbol search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolMatch {
    pub name: String,
    #[serde(serialize_with = "serialize_kind")]
    pub kind: SymbolKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    pub location: FilePosition,
}

/// One symbol of a file outline, named by its dotted path in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub name: String,
    #[serde(serialize_with = "serialize_kind")]
    pub kind: SymbolKind,
    pub location: FilePosition,
}

/// Lower-case name of a symbol kind, as printed and serialized
pub fn symbol_kind_name(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::FILE => "file",
        SymbolKind::MODULE => "module",
        SymbolKind::NAMESPACE => "namespace",
        SymbolKind::PACKAGE => "package",
        SymbolKind::CLASS => "class",
        SymbolKind::METHOD => "method",
        SymbolKind::PROPERTY => "property",
        SymbolKind::FIELD => "field",
        SymbolKind::CONSTRUCTOR => "constructor",
        SymbolKind::ENUM => "enum",
        SymbolKind::INTERFACE => "interface",
        SymbolKind::FUNCTION => "function",
        SymbolKind::VARIABLE => "variable",
        SymbolKind::CONSTANT => "constant",
        SymbolKind::STRING => "string",
        SymbolKind::NUMBER => "number",
        SymbolKind::BOOLEAN => "boolean",
        SymbolKind::ARRAY => "array",
        SymbolKind::OBJECT => "object",
        SymbolKind::KEY => "key",
        SymbolKind::NULL => "null",
        SymbolKind::ENUM_MEMBER => "enum_member",
        SymbolKind::STRUCT => "struct",
        SymbolKind::EVENT => "event",
        SymbolKind::OPERATOR => "operator",
        SymbolKind::TYPE_PARAMETER => "type_parameter",
        _ => "unknown",
    }
}

fn serialize_kind<S: Serializer>(kind: &SymbolKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(symbol_kind_name(*kind))
}

fn serialize_optional_kind<S: Serializer>(
    kind: &Option<SymbolKind>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match kind {
        Some(kind) => serializer.serialize_some(symbol_kind_name(*kind)),
        None => serializer.serialize_none(),
    }
}
