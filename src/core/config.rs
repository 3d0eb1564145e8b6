//! TOML configuration, loaded once at startup and passed to each component

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::error::{CatalogError, Result};
use crate::search::embedding::HarmonicEncoder;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "catalog.toml";

/// Index database file inside `chroma_directory`
pub const INDEX_FILE: &str = "index.db";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogSettings,
    pub chroma: ChromaSettings,
    #[serde(default)]
    pub indexing: IndexingSettings,
}

/// Relational store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogSettings {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Row cap for `ByName` queries (an empty pattern would otherwise return
    /// the whole catalog)
    #[serde(default = "default_result_limit")]
    pub name_result_limit: usize,
    #[serde(default = "default_result_limit")]
    pub price_result_limit: usize,
}

/// Vector index settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChromaSettings {
    pub chroma_directory: PathBuf,
    pub collection_name: String,
    /// k for semantic queries
    pub num_of_results: usize,
    pub embedding_model: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexingSettings {
    #[serde(default)]
    pub empty_description: EmptyDescriptionPolicy,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// What indexing does with a product whose description is empty or missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyDescriptionPolicy {
    /// Leave the product out of the index and log a warning
    #[default]
    Skip,
    /// Abort indexing
    Reject,
    /// Index an all-zero vector and log a warning
    ZeroVector,
}

fn default_database() -> PathBuf {
    PathBuf::from("data/catalog.db")
}

fn default_result_limit() -> usize {
    100
}

fn default_batch_size() -> usize {
    32
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            database: default_database(),
            name_result_limit: default_result_limit(),
            price_result_limit: default_result_limit(),
        }
    }
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            empty_description: EmptyDescriptionPolicy::default(),
            batch_size: default_batch_size(),
        }
    }
}

impl Config {
    /// Load and validate a config file.
    ///
    /// Relative paths inside the file are resolved against the file's
    /// directory, so the tools behave the same from any working directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| CatalogError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chroma.collection_name.trim().is_empty() {
            return Err(CatalogError::config("chroma.collection_name must not be empty"));
        }
        if self.chroma.num_of_results == 0 {
            return Err(CatalogError::config("chroma.num_of_results must be positive"));
        }
        if self.chroma.chroma_directory.as_os_str().is_empty() {
            return Err(CatalogError::config("chroma.chroma_directory must not be empty"));
        }
        if self.catalog.name_result_limit == 0 || self.catalog.price_result_limit == 0 {
            return Err(CatalogError::config("catalog result limits must be positive"));
        }
        if self.indexing.batch_size == 0 {
            return Err(CatalogError::config("indexing.batch_size must be positive"));
        }
        HarmonicEncoder::from_identifier(&self.chroma.embedding_model)?;
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.catalog.database.is_relative() {
            self.catalog.database = base.join(&self.catalog.database);
        }
        if self.chroma.chroma_directory.is_relative() {
            self.chroma.chroma_directory = base.join(&self.chroma.chroma_directory);
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.chroma.chroma_directory.join(INDEX_FILE)
    }
}
