pub mod index;
pub mod init;
pub mod search;
pub mod show;

mod render;

use anyhow::{Context, Result};
use std::path::Path;

use catalog_search::Config;

/// Load the config file; any problem here is fatal
pub fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
}
