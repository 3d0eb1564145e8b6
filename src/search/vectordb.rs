//! Persistent vector index on SQLite
//!
//! Vectors are stored as little-endian f32 BLOBs next to their JSON metadata,
//! grouped into named collections. Nearest-neighbour lookup is a cosine scan
//! over one collection, which is fine for catalogs in the tens of thousands.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::embedding::{cosine_similarity, EncodedVector};
use crate::core::config::INDEX_FILE;
use crate::core::error::{CatalogError, Result};
use crate::core::record::CatalogRecord;

/// Copy of the catalog fields stored with each vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub id: i64,
    pub name: String,
    pub price: String,
    pub category: String,
    pub description: String,
}

impl From<&CatalogRecord> for EntryMetadata {
    fn from(record: &CatalogRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            price: record.price_text(),
            category: record.category.clone(),
            description: record.description.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: i64,
    pub vector: EncodedVector,
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    pub fn new(record: &CatalogRecord, vector: EncodedVector) -> Self {
        Self {
            id: record.id,
            vector,
            metadata: EntryMetadata::from(record),
        }
    }
}

/// A nearest-neighbour match
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub metadata: EntryMetadata,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
    pub model_id: String,
    pub dimension: usize,
    pub created_at: i64,
}

#[derive(Debug)]
pub struct CollectionStats {
    pub info: CollectionInfo,
    pub entry_count: usize,
}

/// Vector index database. The connection is closed when this is dropped.
pub struct VectorIndex {
    conn: Connection,
}

impl VectorIndex {
    /// Open or create the index inside `directory`
    pub fn open(directory: &Path) -> Result<Self> {
        std::fs::create_dir_all(directory).map_err(|e| {
            CatalogError::store_unavailable(format!("{}: {}", directory.display(), e))
        })?;
        let db_path = directory.join(INDEX_FILE);
        let conn = Connection::open(&db_path).map_err(|e| {
            CatalogError::store_unavailable(format!("{}: {}", db_path.display(), e))
        })?;
        let index = Self { conn };
        index.init_schema()?;
        Ok(index)
    }

    /// Open an index that must already exist (query side)
    pub fn open_existing(directory: &Path) -> Result<Self> {
        let db_path = directory.join(INDEX_FILE);
        if !db_path.exists() {
            return Err(CatalogError::store_unavailable(format!(
                "vector index not found at {} (run `catalog index` first)",
                db_path.display()
            )));
        }
        Self::open(directory)
    }

    /// In-memory index (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let index = Self {
            conn: Connection::open_in_memory()?,
        };
        index.init_schema()?;
        Ok(index)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                model_id TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS entries (
                collection TEXT NOT NULL,
                id INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,  -- JSON
                PRIMARY KEY (collection, id)
            );
            "#,
        )?;
        Ok(())
    }

    /// Create a new, empty collection. Never overwrites an existing one.
    pub fn create_collection(
        &self,
        name: &str,
        model_id: &str,
        dimension: usize,
    ) -> Result<Collection<'_>> {
        if self.find_collection(name)?.is_some() {
            return Err(CatalogError::IndexAlreadyExists {
                name: name.to_string(),
            });
        }

        let info = CollectionInfo {
            name: name.to_string(),
            model_id: model_id.to_string(),
            dimension,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.conn.execute(
            "INSERT INTO collections (name, model_id, dimension, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![info.name, info.model_id, info.dimension as i64, info.created_at],
        )?;
        Ok(Collection {
            conn: &self.conn,
            info,
        })
    }

    pub fn get_collection(&self, name: &str) -> Result<Collection<'_>> {
        let info = self
            .find_collection(name)?
            .ok_or_else(|| CatalogError::IndexNotFound {
                name: name.to_string(),
            })?;
        Ok(Collection {
            conn: &self.conn,
            info,
        })
    }

    /// Remove a collection and its entries. Returns false if it did not exist.
    ///
    /// Only used by `catalog index --rebuild`; a partially written collection
    /// is recovered by dropping and rebuilding it.
    pub fn drop_collection(&self, name: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM entries WHERE collection = ?1", params![name])?;
        let removed = tx.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    pub fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, model_id, dimension, created_at FROM collections ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CollectionInfo {
                name: row.get(0)?,
                model_id: row.get(1)?,
                dimension: row.get::<_, i64>(2)? as usize,
                created_at: row.get(3)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn stats(&self, name: &str) -> Result<CollectionStats> {
        let collection = self.get_collection(name)?;
        let entry_count = collection.count()?;
        Ok(CollectionStats {
            info: collection.info,
            entry_count,
        })
    }

    fn find_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let info = self
            .conn
            .query_row(
                "SELECT name, model_id, dimension, created_at FROM collections WHERE name = ?1",
                params![name],
                |row| {
                    Ok(CollectionInfo {
                        name: row.get(0)?,
                        model_id: row.get(1)?,
                        dimension: row.get::<_, i64>(2)? as usize,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }
}

/// Handle to one collection, borrowed from its [`VectorIndex`]
pub struct Collection<'a> {
    conn: &'a Connection,
    info: CollectionInfo,
}

impl Collection<'_> {
    pub fn info(&self) -> &CollectionInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Append entries as one transaction.
    ///
    /// Fails with `DuplicateKey` if an id is already in the collection or
    /// repeats within `entries`; in that case nothing from this call is
    /// written. Earlier calls are not rolled back.
    pub fn add(&self, entries: &[IndexEntry]) -> Result<usize> {
        let mut batch_ids = HashSet::with_capacity(entries.len());
        for entry in entries {
            if entry.vector.len() != self.info.dimension {
                return Err(CatalogError::DimensionMismatch {
                    expected: self.info.dimension,
                    actual: entry.vector.len(),
                });
            }
            if !batch_ids.insert(entry.id) || self.contains(entry.id)? {
                return Err(CatalogError::DuplicateKey {
                    collection: self.info.name.clone(),
                    id: entry.id,
                });
            }
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO entries (collection, id, embedding, metadata) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    self.info.name,
                    entry.id,
                    embedding_to_blob(&entry.vector),
                    serde_json::to_string(&entry.metadata)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    pub fn contains(&self, id: i64) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM entries WHERE collection = ?1 AND id = ?2",
                params![self.info.name, id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// The `k` entries most similar to `vector`, best first
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if vector.len() != self.info.dimension {
            return Err(CatalogError::DimensionMismatch {
                expected: self.info.dimension,
                actual: vector.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare("SELECT embedding, metadata FROM entries WHERE collection = ?1")?;
        let mut rows = stmt.query(params![self.info.name])?;

        let mut hits: Vec<IndexHit> = Vec::new();
        while let Some(row) = rows.next()? {
            let blob: Vec<u8> = row.get(0)?;
            let metadata_json: String = row.get(1)?;
            let score = cosine_similarity(vector, &blob_to_embedding(&blob));
            hits.push(IndexHit {
                metadata: serde_json::from_str(&metadata_json)?,
                score,
            });
        }

        // Ties keep id order so results are stable
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.metadata.id.cmp(&b.metadata.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection = ?1",
            params![self.info.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
