//! Catalog MCP Server implementation

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use catalog_search::core::error::CatalogError;
use catalog_search::search::{HarmonicEncoder, QueryLimits, SemanticSearch, VectorIndex};
use catalog_search::{CatalogReader, Config, PriceRange, Query, QueryRouter, Response};

/// Parameters for catalog_search_name tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NameParams {
    /// Substring of the product name (case-insensitive, e.g. "mug")
    #[schemars(description = "Substring of the product name; empty matches every product")]
    #[serde(default)]
    pub pattern: String,
}

/// Parameters for catalog_search_price tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PriceParams {
    #[schemars(description = "Minimum price, inclusive (omit for no lower bound)")]
    #[serde(default)]
    pub min: Option<f64>,
    #[schemars(description = "Maximum price, inclusive (omit for no upper bound)")]
    #[serde(default)]
    pub max: Option<f64>,
}

/// Parameters for catalog_search_semantic tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SemanticParams {
    /// Natural language description (e.g., "ceramic coffee cup")
    #[schemars(description = "Natural language product description")]
    pub text: String,
}

/// Parameters for catalog_get_product tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProductParams {
    #[schemars(description = "Product id")]
    pub id: i64,
}

/// Catalog MCP Service
///
/// Stores are opened per call and closed when the call returns.
#[derive(Clone)]
pub struct CatalogService {
    config: Config,
    tool_router: ToolRouter<Self>,
}

impl CatalogService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tool_router: Self::tool_router(),
        }
    }

    fn open_catalog(&self) -> Result<CatalogReader, McpError> {
        CatalogReader::open(&self.config.catalog.database).map_err(internal)
    }

    fn run_query(&self, query: Query) -> Result<CallToolResult, McpError> {
        let limits = QueryLimits::from(&self.config);

        let response = match &query {
            Query::BySemanticText(_) => {
                let encoder = HarmonicEncoder::from_identifier(&self.config.chroma.embedding_model)
                    .map_err(internal)?;
                let index = VectorIndex::open_existing(&self.config.chroma.chroma_directory)
                    .map_err(internal)?;
                let collection = index
                    .get_collection(&self.config.chroma.collection_name)
                    .map_err(internal)?;
                let semantic = SemanticSearch::new(&encoder, collection).map_err(internal)?;
                let router = QueryRouter::new(limits).with_semantic(semantic);
                router.respond(&query)
            }
            Query::ByName(_) | Query::ByPriceRange(_) => {
                let catalog = self.open_catalog()?;
                let router = QueryRouter::new(limits).with_catalog(&catalog);
                router.respond(&query)
            }
        };

        json_result(&response.to_json(), matches!(response, Response::Rejected { .. }))
    }
}

fn internal(err: CatalogError) -> McpError {
    McpError::internal_error(err.to_string(), None)
}

fn to_json_value<T: Serialize>(value: &T) -> Result<serde_json::Value, McpError> {
    serde_json::to_value(value).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })
}

fn json_result(value: &serde_json::Value, is_error: bool) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })?;
    let content = vec![Content::text(output)];
    Ok(if is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    })
}

#[tool_router]
impl CatalogService {
    /// Search products by name
    #[tool(description = "Search the product catalog by name (case-insensitive substring match). Returns id, name, price, category and description.")]
    async fn catalog_search_name(
        &self,
        params: Parameters<NameParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_query(Query::ByName(params.0.pattern))
    }

    /// Search products by price range
    #[tool(description = "Search the product catalog by inclusive price range. Omit both bounds to list products without a price filter.")]
    async fn catalog_search_price(
        &self,
        params: Parameters<PriceParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_query(Query::ByPriceRange(PriceRange {
            min: params.0.min,
            max: params.0.max,
        }))
    }

    /// Search products by description similarity
    #[tool(description = "Semantic product search: finds products whose descriptions are most similar to the given text.")]
    async fn catalog_search_semantic(
        &self,
        params: Parameters<SemanticParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_query(Query::BySemanticText(params.0.text))
    }

    /// Get one product by id
    #[tool(description = "Get a single product from the catalog by id.")]
    async fn catalog_get_product(
        &self,
        params: Parameters<ProductParams>,
    ) -> Result<CallToolResult, McpError> {
        let catalog = self.open_catalog()?;
        match catalog.get(params.0.id).map_err(internal)? {
            Some(record) => {
                json_result(&to_json_value(&record)?, false)
            }
            None => json_result(
                &serde_json::json!({ "error": "Product not found", "id": params.0.id }),
                true,
            ),
        }
    }

    /// Get vector index status
    #[tool(description = "Get the semantic index status: collection name, model, dimension and number of indexed products.")]
    async fn catalog_index_status(&self) -> Result<CallToolResult, McpError> {
        let name = &self.config.chroma.collection_name;
        let output = match VectorIndex::open_existing(&self.config.chroma.chroma_directory)
            .and_then(|index| index.stats(name))
        {
            Ok(stats) => serde_json::json!({
                "exists": true,
                "collection": stats.info.name,
                "model": stats.info.model_id,
                "dimension": stats.info.dimension,
                "entry_count": stats.entry_count,
                "created_at": stats.info.created_at,
            }),
            Err(err) => serde_json::json!({
                "exists": false,
                "collection": name,
                "error": err.to_string(),
            }),
        };
        json_result(&output, false)
    }
}

#[tool_handler]
impl ServerHandler for CatalogService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Product catalog search. Search by name, price range, or description similarity.".to_string()
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server
pub async fn run_mcp_server(config: Config) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let service = CatalogService::new(config);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_search::CatalogRecord;
    use std::collections::BTreeMap;

    #[test]
    fn test_record_serializes_to_object() {
        let record = CatalogRecord {
            id: 1,
            name: "Red Mug".to_string(),
            price: 9.99,
            category: "Kitchen".to_string(),
            description: "A red ceramic mug".to_string(),
        };
        let value = to_json_value(&record).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["name"], "Red Mug");
    }

    #[test]
    fn test_serialization_failure_is_an_error() {
        // Non-string map keys cannot become JSON
        let mut bad = BTreeMap::new();
        bad.insert((1, 2), "pair");
        assert!(to_json_value(&bad).is_err());
    }
}
