//! Symbol and location value types
//!
//! Everything here is 0-indexed; the 1-based compact form exists only for
//! display.

pub mod location;
#[allow(clippy::module_inception)]
mod symbol;

pub use location::{FileLocation, FilePosition, Position, Range, UriError, uri_from_path};
pub use symbol::Symbol;
