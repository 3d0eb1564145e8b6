//! Read-only access to the product catalog in the relational store

use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, Params, Row};
use std::path::Path;

use super::error::{CatalogError, Result};
use super::record::{CatalogRecord, Column, PRODUCTS_TABLE};

/// SQL function that lowercases with Unicode rules; `LIKE` alone only folds ASCII
const LOWER_FN: &str = "unicode_lower";

/// Inclusive price bounds. A missing bound leaves that side open, so
/// `PriceRange::unbounded()` is the explicit "no filter" mode and `0..0` is a
/// real range.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        for bound in [self.min, self.max].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(CatalogError::invalid_range("bounds must be finite numbers"));
            }
            if bound < 0.0 {
                return Err(CatalogError::invalid_range(format!(
                    "bounds must not be negative, got {}",
                    bound
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(CatalogError::invalid_range(format!(
                    "minimum {} is greater than maximum {}",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

/// Which part of the catalog to read
#[derive(Debug, Clone, PartialEq)]
pub enum RecordFilter {
    /// Every record, uncapped (indexing)
    All,
    /// Case-insensitive substring match on `name`
    NameContains { pattern: String, limit: usize },
    PriceBetween { range: PriceRange, limit: usize },
}

/// Source of catalog records for the query pipeline
pub trait CatalogSource {
    fn fetch(&self, filter: &RecordFilter) -> Result<Vec<CatalogRecord>>;
}

/// Catalog reader over a SQLite `products` table
pub struct CatalogReader {
    conn: Connection,
}

impl CatalogReader {
    /// Open an existing catalog database read-only
    pub fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(CatalogError::store_unavailable(format!(
                "catalog database not found at {} (run `catalog init` first)",
                db_path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            CatalogError::store_unavailable(format!("{}: {}", db_path.display(), e))
        })?;
        Self::from_connection(conn)
    }

    /// Wrap an already-open connection, checking that the catalog table exists
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.create_scalar_function(
            LOWER_FN,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
        )?;

        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![PRODUCTS_TABLE],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(CatalogError::store_unavailable(format!(
                "table '{}' is missing from the catalog database",
                PRODUCTS_TABLE
            )));
        }
        Ok(Self { conn })
    }

    /// Stream matching records to `visit`, one row at a time.
    ///
    /// Returns the number of records visited. The first malformed row or
    /// visitor error stops the scan.
    pub fn scan<F>(&self, filter: &RecordFilter, visit: F) -> Result<usize>
    where
        F: FnMut(CatalogRecord) -> Result<()>,
    {
        let columns = Column::select_list();
        match filter {
            RecordFilter::All => self.drive(
                &format!("SELECT {} FROM {} ORDER BY id", columns, PRODUCTS_TABLE),
                params![],
                visit,
            ),
            RecordFilter::NameContains { pattern, limit } => self.drive(
                &format!(
                    "SELECT {} FROM {} WHERE {}(name) LIKE ?1 ESCAPE '\\' ORDER BY id LIMIT ?2",
                    columns, PRODUCTS_TABLE, LOWER_FN
                ),
                params![like_pattern(&pattern.to_lowercase()), *limit as i64],
                visit,
            ),
            RecordFilter::PriceBetween { range, limit } => self.drive(
                &format!(
                    "SELECT {} FROM {} \
                     WHERE (?1 IS NULL OR price >= ?1) AND (?2 IS NULL OR price <= ?2) \
                     ORDER BY price, id LIMIT ?3",
                    columns, PRODUCTS_TABLE
                ),
                params![range.min, range.max, *limit as i64],
                visit,
            ),
        }
    }

    fn drive<P, F>(&self, sql: &str, params: P, mut visit: F) -> Result<usize>
    where
        P: Params,
        F: FnMut(CatalogRecord) -> Result<()>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut visited = 0;
        while let Some(row) = rows.next()? {
            visit(decode_row(row)?)?;
            visited += 1;
        }
        Ok(visited)
    }

    /// Look up one product by id
    pub fn get(&self, id: i64) -> Result<Option<CatalogRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            Column::select_list(),
            PRODUCTS_TABLE
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(decode_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", PRODUCTS_TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl CatalogSource for CatalogReader {
    fn fetch(&self, filter: &RecordFilter) -> Result<Vec<CatalogRecord>> {
        let mut records = Vec::new();
        self.scan(filter, |record| {
            records.push(record);
            Ok(())
        })?;
        Ok(records)
    }
}

/// Decode a row selected with [`Column::select_list`]
fn decode_row(row: &Row<'_>) -> Result<CatalogRecord> {
    let id: i64 = row.get(0)?;

    let name = text_cell(row, 1)?
        .ok_or_else(|| CatalogError::malformed(id, "name is missing"))?;
    let category = text_cell(row, 3)?
        .ok_or_else(|| CatalogError::malformed(id, "category is missing"))?;
    // Missing descriptions are left to the indexing policy
    let description = text_cell(row, 4)?.unwrap_or_default();

    let price = match row.get_ref(2)? {
        ValueRef::Integer(i) => i as f64,
        ValueRef::Real(r) => r,
        ValueRef::Text(t) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or_else(|| CatalogError::malformed(id, "price is not a number"))?,
        ValueRef::Null => return Err(CatalogError::malformed(id, "price is missing")),
        ValueRef::Blob(_) => return Err(CatalogError::malformed(id, "price is not a number")),
    };

    let record = CatalogRecord {
        id,
        name,
        price,
        category,
        description,
    };
    record.validate()?;
    Ok(record)
}

fn text_cell(row: &Row<'_>, idx: usize) -> Result<Option<String>> {
    Ok(row.get::<_, Option<String>>(idx)?)
}

/// Wrap a user pattern for `LIKE ... ESCAPE '\'` so wildcards match literally
fn like_pattern(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('%');
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
