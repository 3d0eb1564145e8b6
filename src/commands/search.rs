//! Search command - name, price range, or semantic queries

use anyhow::{Context, Result};

use catalog_search::search::{HarmonicEncoder, QueryLimits, SemanticSearch, VectorIndex};
use catalog_search::{CatalogReader, Config, Query, QueryRouter};

use super::render::print_response;

/// Run one query. Only the store the query needs is opened; failing to open
/// it is fatal, while query errors are reported and end with exit status 1.
pub fn run(config: &Config, query: Query, json: bool) -> Result<()> {
    let limits = QueryLimits::from(config);

    let response = match &query {
        Query::BySemanticText(_) => {
            let encoder = HarmonicEncoder::from_identifier(&config.chroma.embedding_model)?;
            let index = VectorIndex::open_existing(&config.chroma.chroma_directory)
                .context("Failed to open the vector index")?;
            let collection = index.get_collection(&config.chroma.collection_name)?;
            let semantic = SemanticSearch::new(&encoder, collection)?;
            let router = QueryRouter::new(limits).with_semantic(semantic);
            router.respond(&query)
        }
        Query::ByName(_) | Query::ByPriceRange(_) => {
            let catalog = CatalogReader::open(&config.catalog.database)
                .context("Failed to open the product catalog")?;
            let router = QueryRouter::new(limits).with_catalog(&catalog);
            router.respond(&query)
        }
    };

    if !print_response(&response, &query.to_string(), json)? {
        std::process::exit(1);
    }
    Ok(())
}
