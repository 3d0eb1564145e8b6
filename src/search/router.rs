//! Query pipeline: routes a typed query to exactly one backend

use std::fmt;
use tracing::{debug, warn};

use super::embedding::TextEncoder;
use super::format::{ResultFormatter, Response};
use super::vectordb::{Collection, IndexHit};
use crate::core::catalog::{CatalogSource, PriceRange, RecordFilter};
use crate::core::config::Config;
use crate::core::error::{CatalogError, Result};
use crate::core::record::CatalogRecord;

/// A search request. Each variant is served by a single backend; scores are
/// never combined across backends.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Case-insensitive substring match on the product name
    ByName(String),
    /// Inclusive price bounds
    ByPriceRange(PriceRange),
    /// Nearest descriptions in the vector index
    BySemanticText(String),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByName(pattern) => write!(f, "name contains \"{}\"", pattern),
            Self::ByPriceRange(range) => match (range.min, range.max) {
                (None, None) => write!(f, "any price"),
                (Some(min), None) => write!(f, "price >= {:.2}", min),
                (None, Some(max)) => write!(f, "price <= {:.2}", max),
                (Some(min), Some(max)) => write!(f, "price {:.2}..={:.2}", min, max),
            },
            Self::BySemanticText(text) => write!(f, "similar to \"{}\"", text),
        }
    }
}

/// Which store produced a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Relational,
    Vector,
}

/// One result in the shared five-column shape
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub id: i64,
    pub name: String,
    pub price: String,
    pub category: String,
    pub description: String,
    /// Similarity, for semantic results only
    pub score: Option<f32>,
}

impl From<CatalogRecord> for ResultRow {
    fn from(record: CatalogRecord) -> Self {
        Self {
            price: record.price_text(),
            id: record.id,
            name: record.name,
            category: record.category,
            description: record.description,
            score: None,
        }
    }
}

impl From<IndexHit> for ResultRow {
    fn from(hit: IndexHit) -> Self {
        Self {
            id: hit.metadata.id,
            name: hit.metadata.name,
            price: hit.metadata.price,
            category: hit.metadata.category,
            description: hit.metadata.description,
            score: Some(hit.score),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultSet {
    pub backend: Backend,
    pub rows: Vec<ResultRow>,
}

/// Per-query-type result caps
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    pub name: usize,
    pub price: usize,
    /// k for semantic queries
    pub semantic: usize,
}

impl From<&Config> for QueryLimits {
    fn from(config: &Config) -> Self {
        Self {
            name: config.catalog.name_result_limit,
            price: config.catalog.price_result_limit,
            semantic: config.chroma.num_of_results,
        }
    }
}

/// Encoder plus the collection it was used to build
pub struct SemanticSearch<'a> {
    encoder: &'a dyn TextEncoder,
    collection: Collection<'a>,
}

impl<'a> SemanticSearch<'a> {
    /// Fails with `ModelMismatch` when the collection was built by another model
    pub fn new(encoder: &'a dyn TextEncoder, collection: Collection<'a>) -> Result<Self> {
        let indexed = &collection.info().model_id;
        if indexed != encoder.model_id() {
            return Err(CatalogError::ModelMismatch {
                indexed: indexed.clone(),
                configured: encoder.model_id().to_string(),
            });
        }
        Ok(Self {
            encoder,
            collection,
        })
    }

    /// A query with nothing to encode would score every entry 0.0 and
    /// return arbitrary products, so it is rejected instead.
    fn search(&self, text: &str, k: usize) -> Result<Vec<IndexHit>> {
        let vector = self.encoder.encode(text)?;
        if !self.encoder.has_content(text) || vector.iter().all(|&x| x == 0.0) {
            return Err(CatalogError::invalid_query(
                "search text has no words to compare against descriptions",
            ));
        }
        self.collection.query(&vector, k)
    }
}

/// Serves each query from the one backend it needs. A backend that was not
/// attached is reported as unavailable for the queries that need it.
pub struct QueryRouter<'a> {
    catalog: Option<&'a dyn CatalogSource>,
    semantic: Option<SemanticSearch<'a>>,
    limits: QueryLimits,
}

impl<'a> QueryRouter<'a> {
    pub fn new(limits: QueryLimits) -> Self {
        Self {
            catalog: None,
            semantic: None,
            limits,
        }
    }

    /// Enable `ByName` and `ByPriceRange`
    pub fn with_catalog(mut self, catalog: &'a dyn CatalogSource) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Enable `BySemanticText`
    pub fn with_semantic(mut self, semantic: SemanticSearch<'a>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    /// Run a query against its backend
    pub fn route(&self, query: &Query) -> Result<ResultSet> {
        debug!(%query, "routing query");
        match query {
            Query::ByName(pattern) => {
                let filter = RecordFilter::NameContains {
                    pattern: pattern.clone(),
                    limit: self.limits.name,
                };
                self.relational(&filter)
            }
            Query::ByPriceRange(range) => {
                // Validation happens before any store access
                range.validate()?;
                let filter = RecordFilter::PriceBetween {
                    range: *range,
                    limit: self.limits.price,
                };
                self.relational(&filter)
            }
            Query::BySemanticText(text) => {
                if text.trim().is_empty() {
                    return Err(CatalogError::invalid_query("search text must not be empty"));
                }
                let semantic = self.semantic.as_ref().ok_or_else(|| {
                    CatalogError::store_unavailable("vector index is not open")
                })?;
                let hits = semantic.search(text, self.limits.semantic)?;
                Ok(ResultSet {
                    backend: Backend::Vector,
                    rows: hits.into_iter().map(ResultRow::from).collect(),
                })
            }
        }
    }

    fn relational(&self, filter: &RecordFilter) -> Result<ResultSet> {
        let catalog = self
            .catalog
            .ok_or_else(|| CatalogError::store_unavailable("product catalog is not open"))?;
        let records = catalog.fetch(filter)?;
        Ok(ResultSet {
            backend: Backend::Relational,
            rows: records.into_iter().map(ResultRow::from).collect(),
        })
    }

    /// Route and format, turning any failure into a user-facing rejection
    pub fn respond(&self, query: &Query) -> Response {
        match self.route(query) {
            Ok(results) => ResultFormatter::format(&results).into(),
            Err(err) => {
                if !err.is_validation() {
                    warn!(%query, error = %err, "query failed");
                }
                Response::Rejected {
                    message: err.to_string(),
                    validation: err.is_validation(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::CatalogReader;
    use crate::core::provision::CatalogLoader;
    use crate::search::embedding::HarmonicEncoder;
    use crate::search::format::Formatted;
    use crate::search::indexer::{Indexer, IndexingOptions};
    use crate::search::vectordb::VectorIndex;
    use std::cell::Cell;

    const LIMITS: QueryLimits = QueryLimits {
        name: 100,
        price: 100,
        semantic: 3,
    };

    fn red_mug() -> CatalogRecord {
        CatalogRecord {
            id: 1,
            name: "Red Mug".to_string(),
            price: 9.99,
            category: "Kitchen".to_string(),
            description: "A red ceramic mug".to_string(),
        }
    }

    fn catalog(records: &[CatalogRecord]) -> CatalogReader {
        let loader = CatalogLoader::open_in_memory().unwrap();
        loader.load(records).unwrap();
        loader.into_reader().unwrap()
    }

    fn build_index(reader: &CatalogReader, encoder: &HarmonicEncoder) -> VectorIndex {
        let index = VectorIndex::open_in_memory().unwrap();
        let indexer = Indexer::new(encoder, IndexingOptions::default());
        {
            let collection = indexer.create_collection(&index, "products", false).unwrap();
            indexer.index_catalog(reader, &collection, |_| {}).unwrap();
        }
        index
    }

    /// Counts store calls and returns nothing
    struct CountingSource {
        calls: Cell<usize>,
    }

    impl CatalogSource for CountingSource {
        fn fetch(&self, _filter: &RecordFilter) -> Result<Vec<CatalogRecord>> {
            self.calls.set(self.calls.get() + 1);
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_red_mug_scenario() -> Result<()> {
        let reader = catalog(&[red_mug()]);
        let encoder = HarmonicEncoder::from_identifier("htp")?;
        let index = build_index(&reader, &encoder);
        let semantic = SemanticSearch::new(&encoder, index.get_collection("products")?)?;
        let router = QueryRouter::new(LIMITS)
            .with_catalog(&reader)
            .with_semantic(semantic);

        let by_name = router.route(&Query::ByName("red".to_string()))?;
        assert_eq!(by_name.backend, Backend::Relational);
        assert_eq!(by_name.rows.len(), 1);
        assert_eq!(by_name.rows[0], ResultRow::from(red_mug()));

        let cheap = router.respond(&Query::ByPriceRange(PriceRange::between(0.0, 5.0)));
        assert!(matches!(cheap, Response::NoResults));

        let similar = router.route(&Query::BySemanticText("ceramic mug".to_string()))?;
        assert_eq!(similar.backend, Backend::Vector);
        let top = &similar.rows[0];
        assert_eq!(top.id, 1);
        assert_eq!(top.name, "Red Mug");
        assert_eq!(top.price, "9.99");
        assert_eq!(top.category, "Kitchen");
        assert_eq!(top.description, "A red ceramic mug");
        assert!(top.score.is_some());
        Ok(())
    }

    #[test]
    fn test_inverted_range_never_reaches_store() {
        let source = CountingSource {
            calls: Cell::new(0),
        };
        let router = QueryRouter::new(LIMITS).with_catalog(&source);

        let result = router.route(&Query::ByPriceRange(PriceRange::between(10.0, 1.0)));
        assert!(matches!(result, Err(CatalogError::InvalidRange { .. })));
        assert_eq!(source.calls.get(), 0);

        let response = router.respond(&Query::ByPriceRange(PriceRange::between(10.0, 1.0)));
        assert!(matches!(response, Response::Rejected { validation: true, .. }));
        assert_eq!(source.calls.get(), 0);

        router
            .route(&Query::ByPriceRange(PriceRange::between(0.0, 0.0)))
            .unwrap();
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_verbatim_description_round_trip() -> Result<()> {
        let records: Vec<CatalogRecord> = [
            (1, "Red Mug", "A red ceramic mug"),
            (2, "Kettle", "Stainless steel electric kettle with auto shutoff"),
            (3, "Tee", "Soft organic cotton t-shirt"),
            (4, "Headphones", "Wireless noise cancelling headphones"),
            (5, "Lamp", "Adjustable LED desk lamp"),
        ]
        .into_iter()
        .map(|(id, name, description)| CatalogRecord {
            id,
            name: name.to_string(),
            price: 10.0,
            category: "Misc".to_string(),
            description: description.to_string(),
        })
        .collect();

        let reader = catalog(&records);
        let encoder = HarmonicEncoder::from_identifier("htp")?;
        let index = build_index(&reader, &encoder);
        let semantic = SemanticSearch::new(&encoder, index.get_collection("products")?)?;
        let router = QueryRouter::new(LIMITS)
            .with_catalog(&reader)
            .with_semantic(semantic);

        for record in &records {
            let results = router.route(&Query::BySemanticText(record.description.clone()))?;
            assert!(results.rows.len() <= LIMITS.semantic);
            assert!(
                results.rows.iter().any(|row| row.id == record.id),
                "record {} missing from its own description's results",
                record.id
            );
        }
        Ok(())
    }

    #[test]
    fn test_semantic_validation() -> Result<()> {
        let reader = catalog(&[red_mug()]);
        let router = QueryRouter::new(LIMITS).with_catalog(&reader);

        assert!(matches!(
            router.route(&Query::BySemanticText("  ".to_string())),
            Err(CatalogError::InvalidQuery { .. })
        ));
        // No index attached
        assert!(matches!(
            router.route(&Query::BySemanticText("mug".to_string())),
            Err(CatalogError::StoreUnavailable { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_wordless_semantic_text_is_invalid() -> Result<()> {
        let reader = catalog(&[
            red_mug(),
            CatalogRecord {
                id: 2,
                description: "Stainless steel kettle".to_string(),
                ..red_mug()
            },
        ]);
        let encoder = HarmonicEncoder::from_identifier("htp")?;
        let index = build_index(&reader, &encoder);
        let semantic = SemanticSearch::new(&encoder, index.get_collection("products")?)?;
        let router = QueryRouter::new(LIMITS).with_semantic(semantic);

        for text in ["???", "...", "— !"] {
            assert!(matches!(
                router.route(&Query::BySemanticText(text.to_string())),
                Err(CatalogError::InvalidQuery { .. })
            ));
            assert!(matches!(
                router.respond(&Query::BySemanticText(text.to_string())),
                Response::Rejected { validation: true, .. }
            ));
        }
        Ok(())
    }

    #[test]
    fn test_semantic_only_router() -> Result<()> {
        let reader = catalog(&[red_mug()]);
        let encoder = HarmonicEncoder::from_identifier("htp")?;
        let index = build_index(&reader, &encoder);
        drop(reader);

        let semantic = SemanticSearch::new(&encoder, index.get_collection("products")?)?;
        let router = QueryRouter::new(LIMITS).with_semantic(semantic);

        let similar = router.route(&Query::BySemanticText("ceramic mug".to_string()))?;
        assert_eq!(similar.rows[0].id, 1);
        assert!(matches!(
            router.route(&Query::ByName("mug".to_string())),
            Err(CatalogError::StoreUnavailable { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_model_mismatch() -> Result<()> {
        let reader = catalog(&[red_mug()]);
        let built_with = HarmonicEncoder::new(64)?;
        let index = build_index(&reader, &built_with);

        let configured = HarmonicEncoder::new(128)?;
        let result = SemanticSearch::new(&configured, index.get_collection("products")?);
        assert!(matches!(result, Err(CatalogError::ModelMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_name_limit_applies() {
        let records: Vec<CatalogRecord> = (1..=5)
            .map(|id| CatalogRecord {
                id,
                name: format!("Mug {}", id),
                price: 1.0,
                category: "Kitchen".to_string(),
                description: "mug".to_string(),
            })
            .collect();
        let reader = catalog(&records);
        let limits = QueryLimits { name: 2, ..LIMITS };
        let router = QueryRouter::new(limits).with_catalog(&reader);

        match router.respond(&Query::ByName(String::new())) {
            Response::Table(table) => assert_eq!(table.rows.len(), 2),
            other => panic!("expected table, got {:?}", other),
        }
        let formatted = ResultFormatter::format(&router.route(&Query::ByName("mug".into())).unwrap());
        assert!(matches!(formatted, Formatted::Table(_)));
    }

    #[test]
    fn test_query_display() {
        assert_eq!(
            Query::ByPriceRange(PriceRange::between(1.0, 2.5)).to_string(),
            "price 1.00..=2.50"
        );
        assert_eq!(Query::ByPriceRange(PriceRange::unbounded()).to_string(), "any price");
        assert_eq!(Query::ByName("red".into()).to_string(), "name contains \"red\"");
    }
}
