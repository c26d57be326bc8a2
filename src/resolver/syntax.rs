//! Syntax-derived details of Python definitions
//!
//! Parses a workspace file with tree-sitter and finds the function or class
//! whose name sits at a resolved location. Positions coming in and going
//! out are UTF-16 columns; tree-sitter itself works in bytes.

use tree_sitter::{Node, Parser, Tree};

use crate::resolver::translate::{byte_to_utf16, line_at, utf16_to_byte};
use crate::symbol::{Position, Range};

#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("Failed to load the Python grammar: {0}")]
    Language(String),

    #[error("Parser produced no tree")]
    Parse,

    #[error("No function or class is named at {line}:{character}")]
    NotFound { line: u32, character: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Function,
    Class,
}

/// What the source says about one definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSyntax {
    pub kind: DefinitionKind,
    pub name: String,

    /// `def name(params) -> ret` or `class Name(bases)`, without `async`
    /// or decorators
    pub signature: String,

    /// Whole declaration, decorators included
    pub full_range: Range,

    pub source_text: String,

    /// Methods declared directly in a class body, in source order
    pub declared_methods: Vec<String>,
}

/// A parsed Python module
pub struct PythonSource<'a> {
    source: &'a str,
    tree: Tree,
}

impl<'a> PythonSource<'a> {
    pub fn parse(source: &'a str) -> Result<Self, SyntaxError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| SyntaxError::Language(e.to_string()))?;
        let tree = parser.parse(source, None).ok_or(SyntaxError::Parse)?;
        Ok(Self { source, tree })
    }

    /// The innermost definition whose name contains `position`
    pub fn definition_at(&self, position: Position) -> Result<DefinitionSyntax, SyntaxError> {
        let not_found = || SyntaxError::NotFound {
            line: position.line,
            character: position.character,
        };
        let line = line_at(self.source, position.line).ok_or_else(not_found)?;
        let column = utf16_to_byte(line, position.character);

        let mut matches = Vec::new();
        collect_named_at(self.tree.root_node(), position.line as usize, column, &mut matches);

        let node = matches
            .into_iter()
            .min_by_key(|node| node.end_byte() - node.start_byte())
            .ok_or_else(not_found)?;
        Ok(self.describe(node))
    }

    fn describe(&self, node: Node<'_>) -> DefinitionSyntax {
        let kind = if node.kind() == "class_definition" {
            DefinitionKind::Class
        } else {
            DefinitionKind::Function
        };
        let name = self.field_text(node, "name").unwrap_or_default().to_string();

        let outer = match node.parent() {
            Some(parent) if parent.kind() == "decorated_definition" => parent,
            _ => node,
        };

        DefinitionSyntax {
            signature: self.signature(node, kind, &name),
            full_range: Range::new(
                self.position_of(outer.start_position()),
                self.position_of(outer.end_position()),
            ),
            source_text: self
                .source
                .get(outer.start_byte()..outer.end_byte())
                .unwrap_or_default()
                .to_string(),
            declared_methods: match kind {
                DefinitionKind::Class => self.declared_methods(node),
                DefinitionKind::Function => Vec::new(),
            },
            kind,
            name,
        }
    }

    fn signature(&self, node: Node<'_>, kind: DefinitionKind, name: &str) -> String {
        let type_parameters = self.field_text(node, "type_parameters").unwrap_or_default();
        match kind {
            DefinitionKind::Class => {
                let bases = self.field_text(node, "superclasses").unwrap_or_default();
                format!("class {name}{type_parameters}{bases}")
            }
            DefinitionKind::Function => {
                let parameters = self.field_text(node, "parameters").unwrap_or("()");
                let mut signature = format!("def {name}{type_parameters}{parameters}");
                if let Some(returns) = self.field_text(node, "return_type") {
                    signature.push_str(" -> ");
                    signature.push_str(returns);
                }
                signature
            }
        }
    }

    fn declared_methods(&self, class: Node<'_>) -> Vec<String> {
        let Some(body) = class.child_by_field_name("body") else {
            return Vec::new();
        };

        let mut methods = Vec::new();
        let mut cursor = body.walk();
        for statement in body.named_children(&mut cursor) {
            let definition = match statement.kind() {
                "function_definition" => Some(statement),
                "decorated_definition" => statement
                    .child_by_field_name("definition")
                    .filter(|inner| inner.kind() == "function_definition"),
                _ => None,
            };
            if let Some(name) = definition.and_then(|def| self.field_text(def, "name")) {
                methods.push(name.to_string());
            }
        }
        methods
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<&'a str> {
        let child = node.child_by_field_name(field)?;
        self.source.get(child.start_byte()..child.end_byte())
    }

    fn position_of(&self, point: tree_sitter::Point) -> Position {
        let line = line_at(self.source, point.row as u32).unwrap_or_default();
        Position::new(point.row as u32, byte_to_utf16(line, point.column))
    }
}

fn collect_named_at<'t>(node: Node<'t>, row: usize, column: usize, out: &mut Vec<Node<'t>>) {
    if matches!(node.kind(), "function_definition" | "class_definition") {
        if let Some(name) = node.child_by_field_name("name") {
            let start = name.start_position();
            let end = name.end_position();
            if start.row == row && start.column <= column && column <= end.column {
                out.push(node);
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_named_at(child, row, column, out);
    }
}
