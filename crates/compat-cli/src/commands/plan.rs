//! `compat plan`: show what a run would execute, without building anything.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use compat_core::VersionMatrix;
use tracing::warn;

use super::load_config;

/// Prints the planned `(version, scenario)` pairs.
///
/// # Arguments
///
/// * `config` - Optional compat configuration file
pub fn run(config: Option<&Path>) -> Result<()> {
    let matrix = load_config(config)?.matrix()?;
    print!("{}", render(&matrix)?);
    Ok(())
}

fn render(matrix: &VersionMatrix) -> Result<String> {
    let baseline = matrix.baseline();
    let mut out = String::new();

    for version in matrix.historical_versions() {
        let unmatched = matrix.unmatched_scenarios(version)?;
        if !unmatched.is_empty() {
            let names: Vec<&str> = unmatched.iter().map(|s| s.as_str()).collect();
            warn!(%version, scenarios = %names.join(", "), "not declared by {baseline}, skipped");
        }
    }

    for run in matrix.plan() {
        writeln!(out, "{} {} -> {baseline}", run.scenario, run.version)?;
    }
    Ok(out)
}
