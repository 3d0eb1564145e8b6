//! Index command - build the semantic search collection

use anyhow::{Context, Result};
use colored::Colorize;

use catalog_search::core::error::CatalogError;
use catalog_search::search::{
    HarmonicEncoder, Indexer, IndexingOptions, TextEncoder, VectorIndex,
};
use catalog_search::{CatalogReader, Config};

/// Run index command
pub fn run(config: &Config, status_only: bool, rebuild: bool, json: bool) -> Result<()> {
    if status_only {
        return show_status(config, json);
    }

    let encoder = HarmonicEncoder::from_identifier(&config.chroma.embedding_model)?;
    let catalog = CatalogReader::open(&config.catalog.database)
        .context("Failed to open the product catalog")?;
    let index = VectorIndex::open(&config.chroma.chroma_directory)
        .context("Failed to open the vector index")?;

    let name = &config.chroma.collection_name;
    let indexer = Indexer::new(&encoder, IndexingOptions::from(&config.indexing));

    let collection = match indexer.create_collection(&index, name, rebuild) {
        Ok(collection) => collection,
        Err(err @ CatalogError::IndexAlreadyExists { .. }) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "error": "Collection already exists",
                        "collection": name,
                        "hint": "Run with --rebuild to drop and rebuild it"
                    })
                );
            } else {
                eprintln!("{} {}", "Error:".red().bold(), err);
            }
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    if !json {
        if rebuild {
            println!("{} Rebuilding collection {}", "→".dimmed(), name.cyan());
        }
        println!(
            "{} Building search index with {}...",
            "→".dimmed(),
            encoder.model_id()
        );
    }

    let stats = indexer
        .index_catalog(&catalog, &collection, |meta| {
            if !json {
                println!("  {} Product {} embedding created", "✓".green(), meta.id);
            }
        })
        .with_context(|| {
            format!(
                "Indexing aborted; collection '{}' may be partially written, run `catalog index --rebuild`",
                name
            )
        })?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "collection": name,
                "read": stats.read,
                "indexed": stats.indexed,
                "skipped": stats.skipped,
                "zero_vectors": stats.zero_vectors,
                "duration_ms": stats.duration_ms,
            })
        );
    } else {
        println!();
        println!(
            "{} Indexed {} products in {:.2}s",
            "✓".green().bold(),
            stats.indexed.to_string().cyan(),
            stats.duration_ms as f64 / 1000.0
        );
        if stats.skipped > 0 {
            println!(
                "  {} {} products skipped (empty description)",
                "!".yellow(),
                stats.skipped
            );
        }
        if stats.zero_vectors > 0 {
            println!(
                "  {} {} products indexed with a zero vector (empty description)",
                "!".yellow(),
                stats.zero_vectors
            );
        }
        println!(
            "  {} Index saved to: {}",
            "→".dimmed(),
            config.index_path().display()
        );
    }

    Ok(())
}

/// Show collection status
fn show_status(config: &Config, json: bool) -> Result<()> {
    let name = &config.chroma.collection_name;
    let index_path = config.index_path();

    let stats = if index_path.exists() {
        let index = VectorIndex::open_existing(&config.chroma.chroma_directory)?;
        match index.stats(name) {
            Ok(stats) => Some(stats),
            Err(CatalogError::IndexNotFound { .. }) => None,
            Err(err) => return Err(err.into()),
        }
    } else {
        None
    };

    let Some(stats) = stats else {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "exists": false,
                    "collection": name,
                    "error": "Collection not found"
                })
            );
        } else {
            println!(
                "{} Collection {} not found. Run {} first.",
                "!".yellow().bold(),
                name.cyan(),
                "catalog index".cyan()
            );
        }
        return Ok(());
    };

    let file_size = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);
    let created = chrono::DateTime::from_timestamp(stats.info.created_at, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    if json {
        println!(
            "{}",
            serde_json::json!({
                "exists": true,
                "collection": stats.info.name,
                "model": stats.info.model_id,
                "dimension": stats.info.dimension,
                "entry_count": stats.entry_count,
                "created_at": stats.info.created_at,
                "file_size_bytes": file_size,
            })
        );
    } else {
        println!("{}", "Index Status".bold());
        println!();
        println!("  {} Collection: {}", "→".dimmed(), stats.info.name.cyan());
        println!(
            "  {} {} products indexed",
            "→".dimmed(),
            stats.entry_count.to_string().cyan()
        );
        println!(
            "  {} Model: {} ({} dims)",
            "→".dimmed(),
            stats.info.model_id,
            stats.info.dimension
        );
        println!("  {} Size: {:.2} KB", "→".dimmed(), file_size as f64 / 1024.0);
        println!("  {} Created: {}", "→".dimmed(), created);
    }

    Ok(())
}
