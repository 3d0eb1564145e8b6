//! Error taxonomy shared by the indexing and query pipelines

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Relational store or index storage could not be opened
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: i64, reason: String },

    #[error("Collection '{name}' already exists (run `catalog index --rebuild` to replace it)")]
    IndexAlreadyExists { name: String },

    #[error("Collection '{name}' not found (run `catalog index` first)")]
    IndexNotFound { name: String },

    #[error("Duplicate id {id} in collection '{collection}'")]
    DuplicateKey { collection: String, id: i64 },

    #[error("Vector dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Collection was built with model '{indexed}', but '{configured}' is configured")]
    ModelMismatch { indexed: String, configured: String },

    #[error("Encoder error: {message}")]
    Encoding { message: String },

    #[error("Product {id} has an empty description")]
    EmptyDescription { id: i64 },

    #[error("Invalid price range: {message}")]
    InvalidRange { message: String },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn store_unavailable<S: Into<String>>(message: S) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    pub fn malformed<S: Into<String>>(id: i64, reason: S) -> Self {
        Self::MalformedRecord {
            id,
            reason: reason.into(),
        }
    }

    pub fn invalid_range<S: Into<String>>(message: S) -> Self {
        Self::InvalidRange {
            message: message.into(),
        }
    }

    pub fn invalid_query<S: Into<String>>(message: S) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Query-time errors that are the caller's fault rather than the system's
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRange { .. } | Self::InvalidQuery { .. }
        )
    }
}
