//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::models::{Config, ZoneParameterTable};
use crate::infrastructure::config::ConfigLoader;

pub mod check;
pub mod run;

/// Load config from `path`, or from the layered defaults when none is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Load the zone parameter table named by the config.
pub(crate) fn load_table(config: &Config) -> Result<ZoneParameterTable> {
    let path = config.work_dir.join(&config.parameters);
    ZoneParameterTable::load(&path)
        .with_context(|| format!("Failed to load zone parameters from {}", path.display()))
}
