//! Catalog provisioning for `catalog init`
//!
//! The search and indexing pipelines never write to the catalog; this is the
//! only code path that does.

use rusqlite::{params, Connection};
use std::path::Path;

use super::catalog::CatalogReader;
use super::error::{CatalogError, Result};
use super::record::{CatalogRecord, PRODUCTS_TABLE};

pub struct CatalogLoader {
    conn: Connection,
}

impl CatalogLoader {
    /// Open or create the catalog database and ensure the schema exists
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path).map_err(|e| {
            CatalogError::store_unavailable(format!("{}: {}", db_path.display(), e))
        })?;
        let loader = Self { conn };
        loader.init_schema()?;
        Ok(loader)
    }

    pub fn open_in_memory() -> Result<Self> {
        let loader = Self {
            conn: Connection::open_in_memory()?,
        };
        loader.init_schema()?;
        Ok(loader)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                price REAL NOT NULL CHECK (price >= 0),
                category TEXT NOT NULL,
                description TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_{table}_price ON {table}(price);
            CREATE INDEX IF NOT EXISTS idx_{table}_category ON {table}(category);
            "#,
            table = PRODUCTS_TABLE
        ))?;
        Ok(())
    }

    /// Insert or replace products in a single transaction.
    ///
    /// Returns the number of rows written. Nothing is written if any record
    /// fails validation.
    pub fn load(&self, records: &[CatalogRecord]) -> Result<usize> {
        for record in records {
            record.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (id, name, price, category, description)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     price = excluded.price,
                     category = excluded.category,
                     description = excluded.description",
                PRODUCTS_TABLE
            ))?;
            for record in records {
                stmt.execute(params![
                    record.id,
                    record.name,
                    record.price,
                    record.category,
                    record.description,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Parse a JSON array of products
    pub fn parse_products(json: &str) -> Result<Vec<CatalogRecord>> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_reader(self) -> Result<CatalogReader> {
        CatalogReader::from_connection(self.conn)
    }
}
