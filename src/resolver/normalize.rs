//! Shaping raw server answers into deduplicated locations and symbols

use lsp_types::{
    DocumentSymbolResponse, GotoDefinitionResponse, Location as LspLocation,
    WorkspaceSymbolResponse,
};
use std::collections::HashSet;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::resolver::probe::is_probe_path;
use crate::symbol::{FileLocation, Position, Symbol};

/// Keep the first occurrence of each key, preserving order
pub fn dedup_stable<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}

/// Identity of a location: absolute file plus start position
pub fn location_key(location: &FileLocation) -> (PathBuf, Position) {
    (location.file_path.clone(), location.range.start)
}

fn keep_reportable(locations: Vec<FileLocation>) -> Vec<FileLocation> {
    let locations = locations
        .into_iter()
        .filter(|location| !is_probe_path(&location.file_path))
        .collect();
    dedup_stable(locations, location_key)
}

fn convert_locations(locations: &[LspLocation]) -> Vec<FileLocation> {
    locations
        .iter()
        .filter_map(|location| match FileLocation::try_from(location) {
            Ok(converted) => Some(converted),
            Err(e) => {
                warn!("Skipping location {}: {}", location.uri.as_str(), e);
                None
            }
        })
        .collect()
}

/// All definition shapes (single, list, links) as reportable locations
pub fn definition_locations(response: Option<GotoDefinitionResponse>) -> Vec<FileLocation> {
    let locations = match response {
        None => Vec::new(),
        Some(GotoDefinitionResponse::Scalar(location)) => convert_locations(&[location]),
        Some(GotoDefinitionResponse::Array(locations)) => convert_locations(&locations),
        Some(GotoDefinitionResponse::Link(links)) => links
            .iter()
            .filter_map(|link| match FileLocation::try_from(link) {
                Ok(converted) => Some(converted),
                Err(e) => {
                    warn!("Skipping location link {}: {}", link.target_uri.as_str(), e);
                    None
                }
            })
            .collect(),
    };
    keep_reportable(locations)
}

pub fn reference_locations(locations: Vec<LspLocation>) -> Vec<FileLocation> {
    keep_reportable(convert_locations(&locations))
}

/// Workspace symbols outside probe files, deduplicated by location
pub fn workspace_symbols(response: Option<WorkspaceSymbolResponse>) -> Vec<Symbol> {
    let symbols: Vec<Symbol> = match response {
        None => Vec::new(),
        Some(WorkspaceSymbolResponse::Flat(symbols)) => symbols
            .into_iter()
            .filter_map(|information| {
                let uri = information.location.uri.clone();
                Symbol::try_from(information)
                    .map_err(|e| warn!("Skipping symbol in {}: {}", uri.as_str(), e))
                    .ok()
            })
            .collect(),
        Some(WorkspaceSymbolResponse::Nested(symbols)) => symbols
            .into_iter()
            .filter_map(|symbol| {
                let name = symbol.name.clone();
                Symbol::try_from(symbol)
                    .map_err(|e| warn!("Skipping symbol {}: {}", name, e))
                    .ok()
            })
            .collect(),
    };

    let symbols = symbols
        .into_iter()
        .filter(|symbol| !is_probe_path(&symbol.location.file_path))
        .collect();
    dedup_stable(symbols, |symbol| {
        (symbol.name.clone(), location_key(&symbol.location))
    })
}

/// Document symbols of `file_path`, flattened depth-first
pub fn document_symbols(response: Option<DocumentSymbolResponse>, file_path: &Path) -> Vec<Symbol> {
    match response {
        None => Vec::new(),
        Some(DocumentSymbolResponse::Nested(symbols)) => {
            Symbol::flatten_document_symbols(&symbols, file_path)
        }
        Some(DocumentSymbolResponse::Flat(symbols)) => symbols
            .into_iter()
            .filter_map(|information| Symbol::try_from(information).ok())
            .collect(),
    }
}

/// Innermost symbol declared at `position`
///
/// Name ranges are preferred. The fallback accepts the rest of a
/// declaration header (decorators, `def`/`class` keyword) but never a
/// body line, so a local variable does not take its function's kind.
pub fn symbol_at(symbols: &[Symbol], position: Position) -> Option<&Symbol> {
    let by_name = symbols
        .iter()
        .filter(|symbol| symbol.location.range.contains(position));
    if let Some(found) = innermost(by_name, |symbol| symbol.location.range.line_span()) {
        return Some(found);
    }

    let by_header = symbols.iter().filter(|symbol| {
        let name_line = symbol.location.range.start.line;
        symbol.full_range.is_some_and(|range| {
            range.start.line <= position.line && position.line <= name_line
        })
    });
    innermost(by_header, |symbol| {
        symbol.full_range.map(|range| range.line_span()).unwrap_or(u32::MAX)
    })
}

/// Smallest span wins; among equal spans the one starting last
fn innermost<'a>(
    candidates: impl Iterator<Item = &'a Symbol>,
    span: impl Fn(&Symbol) -> u32,
) -> Option<&'a Symbol> {
    candidates.min_by_key(|symbol| (span(symbol), std::cmp::Reverse(symbol.location.range.start)))
}

/// Workspace symbol filter for `<module>:<qualpath>` lookups
///
/// A match has the last qualpath segment as its name, lives in the
/// module's file, and has a container ending with the remaining segments.
/// A top-level name's container, when reported, must be the module.
pub fn matches_qualpath(symbol: &Symbol, module: &str, qualpath: &str, module_file: &Path) -> bool {
    let (parents, name) = match qualpath.rsplit_once('.') {
        Some((parents, name)) => (Some(parents), name),
        None => (None, qualpath),
    };
    if symbol.name != name || symbol.location.file_path != module_file {
        return false;
    }

    let container = symbol.container_name.as_deref().unwrap_or("");
    match parents {
        Some(parents) => container == parents || container.ends_with(&format!(".{parents}")),
        None => {
            let module_tail = module.rsplit('.').next().unwrap_or(module);
            container.is_empty() || container == module || container == module_tail
        }
    }
}
