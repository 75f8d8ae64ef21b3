//! Subcommand implementations.

use std::path::Path;

use anyhow::{Context, Result};
use compat_core::CompatConfig;

pub mod plan;
pub mod run;

/// Loads the configuration file, or the defaults when none is given.
///
/// The matrix is validated here so that a bad file fails before anything
/// else happens.
pub fn load_config(path: Option<&Path>) -> Result<CompatConfig> {
    let config = match path {
        Some(path) => CompatConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CompatConfig::default(),
    };
    config.matrix().context("invalid version matrix")?;
    Ok(config)
}
