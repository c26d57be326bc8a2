//! Optional details attached to resolved definitions

use lsp_types::{Hover, HoverContents, MarkedString, SymbolKind};

/// Lines shown around a definition
pub const DEFINITION_CONTEXT_RADIUS: u32 = 3;

/// Plain text of a hover answer; `None` when the server had nothing to say
pub fn hover_text(hover: Hover) -> Option<String> {
    let text = match hover.contents {
        HoverContents::Scalar(marked) => marked_string_text(marked),
        HoverContents::Array(parts) => parts
            .into_iter()
            .map(marked_string_text)
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        HoverContents::Markup(markup) => markup.value,
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn marked_string_text(marked: MarkedString) -> String {
    match marked {
        MarkedString::String(text) => text,
        MarkedString::LanguageString(code) => format!("```{}\n{}\n```", code.language, code.value),
    }
}

/// Kinds whose declaration syntax is worth extracting
pub fn has_declaration_syntax(kind: Option<SymbolKind>) -> bool {
    matches!(
        kind,
        Some(SymbolKind::FUNCTION)
            | Some(SymbolKind::METHOD)
            | Some(SymbolKind::CLASS)
            | Some(SymbolKind::CONSTRUCTOR)
    )
}

/// `radius` lines either side of `line`, each prefixed with its 1-based
/// number; the target line is marked with `>`
pub fn context_lines(source: &str, line: u32, radius: u32) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let target = line as usize;
    if target >= lines.len() {
        return None;
    }

    let first = target.saturating_sub(radius as usize);
    let last = (target + radius as usize).min(lines.len() - 1);
    let width = (last + 1).to_string().len();

    let rendered: Vec<String> = (first..=last)
        .map(|index| {
            let marker = if index == target { '>' } else { ' ' };
            format!("{marker}{:>width$} | {}", index + 1, lines[index])
        })
        .collect();
    Some(rendered.join("\n"))
}
