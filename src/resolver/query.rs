//! Symbol queries and their validation

use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::resolver::error::ResolveError;

/// One Python identifier: a letter or `_`, then letters, digits or `_`
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}_][\p{L}\p{Nd}_]*$").expect("identifier pattern is valid")
});

/// What the caller wants resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolQuery {
    /// `module` plus an optional dotted path inside it
    ByFqn {
        module: String,
        qualpath: Option<String>,
    },
    /// A 0-indexed coordinate in a workspace file; `character` counts UTF-16 units
    ByLocation {
        path: PathBuf,
        line: u32,
        character: u32,
    },
}

impl SymbolQuery {
    pub fn by_fqn(module: impl Into<String>, qualpath: Option<&str>) -> Self {
        Self::ByFqn {
            module: module.into(),
            qualpath: qualpath.map(str::to_string),
        }
    }

    pub fn by_location(path: impl Into<PathBuf>, line: u32, character: u32) -> Self {
        Self::ByLocation {
            path: path.into(),
            line,
            character,
        }
    }

    /// Reject malformed names before anything is sent to the server
    pub fn validate(&self) -> Result<(), ResolveError> {
        match self {
            Self::ByFqn { module, qualpath } => {
                if module.trim().is_empty() {
                    let reason = if qualpath.is_some() {
                        "qualpath given without a module"
                    } else {
                        "module name is empty"
                    };
                    return Err(ResolveError::invalid_query(self, reason));
                }
                validate_dotted(self, "module", module)?;
                if let Some(qualpath) = qualpath {
                    validate_dotted(self, "qualpath", qualpath)?;
                }
                Ok(())
            }
            Self::ByLocation { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err(ResolveError::invalid_query(self, "file path is empty"));
                }
                Ok(())
            }
        }
    }
}

fn validate_dotted(query: &SymbolQuery, what: &str, dotted: &str) -> Result<(), ResolveError> {
    for segment in dotted.split('.') {
        if !IDENTIFIER.is_match(segment) {
            return Err(ResolveError::invalid_query(
                query,
                format!("{what} segment '{segment}' is not a valid identifier"),
            ));
        }
    }
    Ok(())
}

impl fmt::Display for SymbolQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByFqn {
                module,
                qualpath: Some(qualpath),
            } => write!(f, "{module}:{qualpath}"),
            Self::ByFqn {
                module,
                qualpath: None,
            } => write!(f, "{module}"),
            Self::ByLocation {
                path,
                line,
                character,
            } => write!(f, "{}:{line}:{character}", path.display()),
        }
    }
}
