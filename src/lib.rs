//! catalog-search library
//!
//! Product catalog search over a relational store and a vector index.
//!
//! # Modules
//!
//! - `core`: catalog records, configuration, errors, relational access
//! - `search`: text encoding, vector index, indexing and query pipelines

pub mod core;
pub mod search;

// Re-exports for convenience
pub use crate::core::catalog::{CatalogReader, CatalogSource, PriceRange, RecordFilter};
pub use crate::core::config::{Config, EmptyDescriptionPolicy};
pub use crate::core::error::{CatalogError, Result};
pub use crate::core::provision::CatalogLoader;
pub use crate::core::record::{CatalogRecord, Column};
pub use search::{Query, QueryRouter, Response};
