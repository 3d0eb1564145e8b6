//! Normalizes result sets into the display table shape

use serde_json::{json, Map, Value};

use super::router::{Backend, ResultRow, ResultSet};
use crate::core::record::Column;

/// Rows in [`Column::ALL`] order
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub backend: Backend,
    pub columns: [Column; 5],
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub cells: [String; 5],
    pub score: Option<f32>,
}

impl Table {
    /// Whether rows carry similarity scores
    pub fn has_scores(&self) -> bool {
        self.rows.iter().any(|r| r.score.is_some())
    }

    /// JSON array of objects keyed by column name, plus `score` when present
    pub fn to_json(&self) -> Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut object = Map::new();
                for (column, cell) in self.columns.iter().zip(&row.cells) {
                    let value = match column {
                        Column::Id => cell.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(cell)),
                        _ => json!(cell),
                    };
                    object.insert(column.key().to_string(), value);
                }
                if let Some(score) = row.score {
                    object.insert("score".to_string(), json!(score));
                }
                Value::Object(object)
            })
            .collect();
        Value::Array(rows)
    }
}

/// Output of [`ResultFormatter::format`]
#[derive(Debug, Clone, PartialEq)]
pub enum Formatted {
    Table(Table),
    /// Nothing matched; distinct from an empty table
    NoResults,
}

/// What the display layer receives for one request
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Table(Table),
    NoResults,
    /// The query was not executed or failed; `validation` marks caller errors
    Rejected { message: String, validation: bool },
}

impl From<Formatted> for Response {
    fn from(formatted: Formatted) -> Self {
        match formatted {
            Formatted::Table(table) => Response::Table(table),
            Formatted::NoResults => Response::NoResults,
        }
    }
}

impl Response {
    pub fn to_json(&self) -> Value {
        match self {
            Response::Table(table) => json!({
                "status": "ok",
                "count": table.rows.len(),
                "results": table.to_json(),
            }),
            Response::NoResults => json!({
                "status": "no_results",
                "count": 0,
                "results": [],
            }),
            Response::Rejected {
                message,
                validation,
            } => {
                let status = if *validation { "invalid" } else { "error" };
                json!({
                    "status": status,
                    "error": message,
                })
            }
        }
    }
}

pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format(results: &ResultSet) -> Formatted {
        if results.rows.is_empty() {
            return Formatted::NoResults;
        }
        Formatted::Table(Table {
            backend: results.backend,
            columns: Column::ALL,
            rows: results.rows.iter().map(Self::row).collect(),
        })
    }

    fn row(row: &ResultRow) -> TableRow {
        TableRow {
            cells: Column::ALL.map(|column| Self::cell(row, column)),
            score: row.score,
        }
    }

    fn cell(row: &ResultRow, column: Column) -> String {
        match column {
            Column::Id => row.id.to_string(),
            Column::Name => row.name.clone(),
            Column::Price => row.price.clone(),
            Column::Category => row.category.clone(),
            Column::Description => row.description.clone(),
        }
    }
}
