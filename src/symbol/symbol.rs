//! Core Symbol representation
//!
//! One shape for everything the server reports about named program entities,
//! whether it came from `workspace/symbol` or `textDocument/documentSymbol`.

use lsp_types::{DocumentSymbol, OneOf, SymbolInformation, SymbolKind, WorkspaceSymbol};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::symbol::location::{FileLocation, Range, UriError, path_from_uri};

/// A symbol in the codebase with resolved location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,

    pub kind: SymbolKind,

    /// Dotted chain of enclosing symbols (`Calculator` for a method)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    /// Location of the symbol's name
    pub location: FileLocation,

    /// Whole declaration span, known only for document symbols
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_range: Option<Range>,
}

impl Symbol {
    /// `Container.name`, or just the name at module level
    pub fn qualified_name(&self) -> String {
        match &self.container_name {
            Some(container) if !container.is_empty() => format!("{}.{}", container, self.name),
            _ => self.name.clone(),
        }
    }

    /// Flatten a document symbol tree depth-first, giving each entry its
    /// dotted container chain
    pub fn flatten_document_symbols(symbols: &[DocumentSymbol], file_path: &Path) -> Vec<Symbol> {
        let mut flat = Vec::new();
        Self::flatten_into(symbols, file_path, None, &mut flat);
        flat
    }

    fn flatten_into(
        symbols: &[DocumentSymbol],
        file_path: &Path,
        container: Option<&str>,
        out: &mut Vec<Symbol>,
    ) {
        for document_symbol in symbols {
            let symbol = Symbol {
                name: document_symbol.name.clone(),
                kind: document_symbol.kind,
                container_name: container.map(str::to_string),
                location: FileLocation {
                    file_path: file_path.to_path_buf(),
                    range: Range::from(document_symbol.selection_range),
                },
                full_range: Some(Range::from(document_symbol.range)),
            };
            let qualified = symbol.qualified_name();
            out.push(symbol);

            if let Some(children) = &document_symbol.children {
                Self::flatten_into(children, file_path, Some(&qualified), out);
            }
        }
    }
}

impl TryFrom<SymbolInformation> for Symbol {
    type Error = UriError;

    #[allow(deprecated)]
    fn try_from(info: SymbolInformation) -> Result<Self, Self::Error> {
        Ok(Self {
            location: FileLocation::try_from(&info.location)?,
            name: info.name,
            kind: info.kind,
            container_name: info.container_name.filter(|c| !c.is_empty()),
            full_range: None,
        })
    }
}

impl TryFrom<WorkspaceSymbol> for Symbol {
    type Error = UriError;

    fn try_from(ws_symbol: WorkspaceSymbol) -> Result<Self, Self::Error> {
        let location = match &ws_symbol.location {
            OneOf::Left(location) => FileLocation::try_from(location)?,
            // Location resolved lazily by the server; only the file is known
            OneOf::Right(uri_only) => FileLocation {
                file_path: path_from_uri(&uri_only.uri)?,
                range: Range::default(),
            },
        };

        Ok(Self {
            name: ws_symbol.name,
            kind: ws_symbol.kind,
            container_name: ws_symbol.container_name.filter(|c| !c.is_empty()),
            location,
            full_range: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::location::Position;
    use lsp_types::{Location, Uri};
    use std::path::PathBuf;
    use std::str::FromStr;

    fn lsp_range(sl: u32, sc: u32, el: u32, ec: u32) -> lsp_types::Range {
        lsp_types::Range::new(
            lsp_types::Position::new(sl, sc),
            lsp_types::Position::new(el, ec),
        )
    }

    #[allow(deprecated)]
    fn document_symbol(
        name: &str,
        kind: SymbolKind,
        range: lsp_types::Range,
        selection: lsp_types::Range,
        children: Option<Vec<DocumentSymbol>>,
    ) -> DocumentSymbol {
        DocumentSymbol {
            name: name.to_string(),
            detail: None,
            kind,
            tags: None,
            deprecated: None,
            range,
            selection_range: selection,
            children,
        }
    }

    #[test]
    fn test_flatten_gives_dotted_containers() {
        let tree = vec![document_symbol(
            "Calculator",
            SymbolKind::CLASS,
            lsp_range(0, 0, 10, 0),
            lsp_range(0, 6, 0, 16),
            Some(vec![document_symbol(
                "add",
                SymbolKind::METHOD,
                lsp_range(3, 4, 5, 0),
                lsp_range(3, 8, 3, 11),
                Some(vec![document_symbol(
                    "inner",
                    SymbolKind::FUNCTION,
                    lsp_range(4, 8, 4, 30),
                    lsp_range(4, 12, 4, 17),
                    None,
                )]),
            )]),
        )];

        let flat = Symbol::flatten_document_symbols(&tree, Path::new("/work/core/math_utils.py"));
        let names: Vec<String> = flat.iter().map(Symbol::qualified_name).collect();
        assert_eq!(names, vec!["Calculator", "Calculator.add", "Calculator.add.inner"]);
        assert_eq!(flat[1].location.range.start, Position::new(3, 8));
        assert_eq!(flat[1].full_range.unwrap().start, Position::new(3, 4));
    }

    #[test]
    #[allow(deprecated)]
    fn test_from_symbol_information() {
        let info = SymbolInformation {
            name: "add".to_string(),
            kind: SymbolKind::METHOD,
            tags: None,
            deprecated: None,
            location: Location {
                uri: Uri::from_str("file:///work/core/math_utils.py").unwrap(),
                range: lsp_range(5, 8, 5, 11),
            },
            container_name: Some("Calculator".to_string()),
        };

        let symbol = Symbol::try_from(info).unwrap();
        assert_eq!(symbol.qualified_name(), "Calculator.add");
        assert_eq!(
            symbol.location.file_path,
            PathBuf::from("/work/core/math_utils.py")
        );
        assert!(symbol.full_range.is_none());
    }

    #[test]
    fn test_empty_container_is_dropped() {
        let ws_symbol = WorkspaceSymbol {
            name: "main".to_string(),
            kind: SymbolKind::FUNCTION,
            tags: None,
            container_name: Some(String::new()),
            location: OneOf::Left(Location {
                uri: Uri::from_str("file:///work/main.py").unwrap(),
                range: lsp_range(0, 4, 0, 8),
            }),
            data: None,
        };

        let symbol = Symbol::try_from(ws_symbol).unwrap();
        assert_eq!(symbol.container_name, None);
        assert_eq!(symbol.qualified_name(), "main");
    }
}
