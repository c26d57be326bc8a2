//! Python symbol resolution
//!
//! - **SymbolQuery**: what to resolve, by dotted name or by file position
//! - **SymbolLocator**: definitions, references, symbol search and outlines
//! - **ResolveError**: the error taxonomy every lookup reports in
//!
//! ```rust,ignore
//! let session = BackendSession::new(config).await?;
//! let mut locator = SymbolLocator::new(session);
//!
//! let query = SymbolQuery::by_fqn("collections", Some("deque"));
//! for definition in locator.find_definition(&query, true).await? {
//!     println!("{}", definition.location);
//! }
//! locator.close().await?;
//! ```

pub mod enrich;
pub mod error;
pub mod locator;
pub mod normalize;
pub mod probe;
pub mod query;
pub mod results;
pub mod syntax;
pub mod translate;


pub use error::ResolveError;
pub use locator::SymbolLocator;
pub use query::SymbolQuery;
pub use results::{
    DefinitionResult, OutlineEntry, ReferenceResult, SymbolMatch, symbol_kind_name,
};
