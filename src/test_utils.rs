//! Test utilities and global setup
//!
//! Provides centralized test logging configuration, a sample Python
//! project on disk, and helpers for building server answers.

/// Test logging utilities
#[cfg(all(test, feature = "test-logging"))]
pub mod logging {
    use std::sync::Once;
    use tracing_subscriber::{EnvFilter, fmt};

    static INIT: Once = Once::new();

    /// Initialize test logging globally - safe to call multiple times
    ///
    /// Respects `RUST_LOG`; defaults to debug for this crate and info for
    /// the async runtime. Output goes through the test writer so it is
    /// captured per test.
    ///
    /// ```bash
    /// RUST_LOG=lsp_repograph::resolver=trace cargo test --features test-logging
    /// ```
    pub fn init() {
        INIT.call_once(|| {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debug,tokio=info"));

            fmt()
                .with_env_filter(env_filter)
                .with_test_writer()
                .with_target(true)
                .with_thread_ids(true)
                .compact()
                .try_init()
                .ok(); // Ignore errors if already initialized by another test
        });
    }
}

/// Language server command for integration tests
///
/// `REPOGRAPH_LSP_SERVER` overrides the default `jedi-language-server`, so
/// CI can point at a server inside a virtualenv.
#[cfg(all(test, feature = "jedi-integration-tests"))]
pub fn get_test_server_command() -> String {
    std::env::var("REPOGRAPH_LSP_SERVER")
        .unwrap_or_else(|_| crate::backend::config::DEFAULT_SERVER_COMMAND.to_string())
}

#[cfg(test)]
pub use sample::{SampleProject, lsp_location};

#[cfg(test)]
mod sample {
    use lsp_types::{Location, Position, Range};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    use crate::backend::{BackendConfig, BackendConfigBuilder};
    use crate::symbol::uri_from_path;

    /// `main.py`: line 7 is `    total = calc.add(1, 2)` with `add` at
    /// column 17
    pub const MAIN_PY: &str = r#"from collections import deque

from core.math_utils import AdvancedCalculator, Calculator, factorial


def main():
    calc = Calculator()
    total = calc.add(1, 2)
    advanced = AdvancedCalculator()
    queue = deque([total, advanced.sqrt(16.0)])
    print(factorial(5), queue)


if __name__ == "__main__":
    main()
"#;

    /// `core/math_utils.py`: `Calculator` is declared on line 5 (name at
    /// column 6), `Calculator.add` on line 11 (name at column 8),
    /// `AdvancedCalculator.add` on line 22 and `factorial` on line 30
    pub const MATH_UTILS_PY: &str = r#""""Math utilities for the sample project."""

import math


class Calculator:
    """A simple calculator."""

    def __init__(self, precision: int = 2):
        self.precision = precision

    def add(self, a: float, b: float) -> float:
        """Add two numbers."""
        return round(a + b, self.precision)

    def multiply(self, a: float, b: float) -> float:
        return round(a * b, self.precision)


class AdvancedCalculator(Calculator):
    """Calculator with extra operations."""

    def add(self, a: float, b: float) -> float:
        return super().add(a, b)

    @staticmethod
    def sqrt(value: float) -> float:
        return math.sqrt(value)


def factorial(n: int) -> int:
    return 1 if n <= 1 else n * factorial(n - 1)
"#;

    /// A small Python project in a temporary directory, removed on drop
    pub struct SampleProject {
        _dir: TempDir,
        root: PathBuf,
    }

    impl SampleProject {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = dir.path().canonicalize().unwrap();

            fs::create_dir_all(root.join("core")).unwrap();
            fs::write(root.join("main.py"), MAIN_PY).unwrap();
            fs::write(root.join("core/__init__.py"), "").unwrap();
            fs::write(root.join("core/math_utils.py"), MATH_UTILS_PY).unwrap();

            Self { _dir: dir, root }
        }

        /// Canonical workspace root
        pub fn root(&self) -> &Path {
            &self.root
        }

        pub fn path(&self, relative: &str) -> PathBuf {
            self.root.join(relative)
        }

        /// Session configuration rooted at the project
        pub fn config(&self) -> BackendConfig {
            BackendConfigBuilder::new()
                .workspace_root(&self.root)
                .build()
                .unwrap()
        }
    }

    /// An LSP location covering `length` characters of one line
    pub fn lsp_location(path: &Path, line: u32, character: u32, length: u32) -> Location {
        Location {
            uri: uri_from_path(path).unwrap(),
            range: Range {
                start: Position { line, character },
                end: Position {
                    line,
                    character: character + length,
                },
            },
        }
    }
}
