mod commands;
#[cfg(feature = "mcp")]
mod mcp;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use catalog_search::core::config::DEFAULT_CONFIG_FILE;
use catalog_search::{PriceRange, Query};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Hybrid product search: by name, price range, or description similarity", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, env = "CATALOG_CONFIG", default_value = DEFAULT_CONFIG_FILE, help = "Config file")]
    config: PathBuf,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "More log output (-v info, -vv debug)")]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog database, optionally loading products from JSON
    Init {
        #[arg(long, help = "JSON array of products to load")]
        products: Option<PathBuf>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    /// Build the semantic search index from the catalog
    Index {
        #[arg(long, help = "Show index status only")]
        status: bool,
        #[arg(long, help = "Drop the existing collection and rebuild it")]
        rebuild: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    /// Search the catalog
    Search {
        #[command(subcommand)]
        by: SearchBy,
    },

    /// Show one product by id
    Show {
        id: i64,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    /// Start MCP server
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

#[derive(Subcommand)]
enum SearchBy {
    /// Case-insensitive substring match on product name
    Name {
        #[arg(default_value = "")]
        pattern: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Inclusive price range; omit both bounds for no filter
    Price {
        #[arg(long, allow_negative_numbers = true, help = "Minimum price")]
        min: Option<f64>,
        #[arg(long, allow_negative_numbers = true, help = "Maximum price")]
        max: Option<f64>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Semantic search over product descriptions
    #[command(alias = "ss")]
    Semantic {
        text: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = commands::load_config(&cli.config)?;

    match cli.command {
        Commands::Init { products, json } => {
            commands::init::run(&config, products.as_deref(), json)
        }
        Commands::Index {
            status,
            rebuild,
            json,
        } => commands::index::run(&config, status, rebuild, json),
        Commands::Search { by } => {
            let (query, json) = match by {
                SearchBy::Name { pattern, json } => (Query::ByName(pattern), json),
                SearchBy::Price { min, max, json } => {
                    (Query::ByPriceRange(PriceRange { min, max }), json)
                }
                SearchBy::Semantic { text, json } => (Query::BySemanticText(text), json),
            };
            commands::search::run(&config, query, json)
        }
        Commands::Show { id, json } => commands::show::run(&config, id, json),

        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions(&cli.config);
                Ok(())
            } else {
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(mcp::run_mcp_server(config))
            }
        }
    }
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(config_path: &std::path::Path) {
    use colored::Colorize;

    let config_path = std::fs::canonicalize(config_path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| config_path.to_string_lossy().to_string());

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "catalog".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(r#"{{
  "mcpServers": {{
    "catalog-search": {{
      "command": "{}",
      "args": ["--config", "{}", "mcp"]
    }}
  }}
}}"#, binary_path, config_path);
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Name substring search", "catalog_search_name".green());
    println!("  • {} - Inclusive price range search", "catalog_search_price".green());
    println!("  • {} - Description similarity search", "catalog_search_semantic".green());
    println!("  • {} - Product by id", "catalog_get_product".green());
    println!("  • {} - Semantic index status", "catalog_index_status".green());
}
