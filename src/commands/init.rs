//! Init command - create the catalog database and load products

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use catalog_search::{CatalogLoader, Config};

pub fn run(config: &Config, products: Option<&Path>, json: bool) -> Result<()> {
    let db_path = &config.catalog.database;
    let loader = CatalogLoader::open(db_path)
        .with_context(|| format!("Failed to open catalog at {}", db_path.display()))?;

    let loaded = match products {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let records = CatalogLoader::parse_products(&text)
                .with_context(|| format!("Invalid product file {}", path.display()))?;
            loader.load(&records)?
        }
        None => 0,
    };
    let total = loader.into_reader()?.count()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "database": db_path.display().to_string(),
                "loaded": loaded,
                "total": total,
            })
        );
    } else {
        println!(
            "{} Catalog ready at {}",
            "✓".green().bold(),
            db_path.display()
        );
        if loaded > 0 {
            println!("  {} Loaded {} products", "→".dimmed(), loaded.to_string().cyan());
        }
        println!("  {} {} products in catalog", "→".dimmed(), total);
        if total > 0 {
            println!();
            println!("Next: {}", "catalog index".cyan());
        }
    }

    Ok(())
}
