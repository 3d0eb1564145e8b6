//! Catalog search pipelines
//!
//! - indexing: catalog → [`TextEncoder`] → [`VectorIndex`]
//! - querying: [`QueryRouter`] → relational or vector backend → [`ResultFormatter`]

pub mod embedding;
pub mod format;
pub mod indexer;
pub mod router;
pub mod vectordb;

pub use embedding::{HarmonicEncoder, TextEncoder};
pub use format::{Formatted, Response, ResultFormatter, Table};
pub use indexer::{Indexer, IndexingOptions, IndexingStats};
pub use router::{Query, QueryLimits, QueryRouter, ResultSet, SemanticSearch};
pub use vectordb::{IndexEntry, VectorIndex};
