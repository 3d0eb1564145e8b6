//! Show command - look up one product by id

use anyhow::{Context, Result};
use colored::Colorize;

use catalog_search::{CatalogReader, Column, Config};

pub fn run(config: &Config, id: i64, json: bool) -> Result<()> {
    let catalog = CatalogReader::open(&config.catalog.database)
        .context("Failed to open the product catalog")?;

    let Some(record) = catalog.get(id)? else {
        if json {
            println!("{}", serde_json::json!({ "error": "Product not found", "id": id }));
        } else {
            println!("{} Product {} not found", "!".yellow().bold(), id);
        }
        std::process::exit(1);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let values = [
        record.id.to_string(),
        record.name.clone(),
        record.price_text(),
        record.category.clone(),
        record.description.clone(),
    ];
    let width = Column::ALL.iter().map(|c| c.title().len()).max().unwrap_or(0);
    for (column, value) in Column::ALL.iter().zip(values) {
        let title = format!("{:<width$}", column.title(), width = width);
        println!("  {}  {}", title.cyan(), value);
    }

    Ok(())
}
