//! `compat run`: build every version and run the compatibility matrix.
//!
//! # Example
//!
//! ```bash
//! export TANKER_ADMIND_URL=... TANKER_TRUSTCHAIND_URL=... TANKER_ID_TOKEN=...
//! compat run --profile linux-release --isolate-conan-user-home --export-tanker-dev
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use compat_core::build::{ConanCmakeBuilder, ConanContext};
use compat_core::config::ConanSettings;
use compat_core::{
    BuildProfile, CompatConfig, CompatError, CompatibilityOrchestrator, HttpBackendAdmin, Secrets,
};
use tracing::info;

use super::load_config;

/// Arguments for `compat run`.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Conan profile every version is built with
    #[arg(long)]
    pub profile: String,

    /// Use `<workspace>/.cache/conan` as the Conan home and refresh its
    /// configuration
    #[arg(long)]
    pub isolate_conan_user_home: bool,

    /// Export the SDK sources as the dev package instead of packaging an
    /// already-built tree
    #[arg(long)]
    pub export_tanker_dev: bool,

    /// Path to a compat configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// SDK checkout the run operates on (defaults to the current directory)
    #[arg(long)]
    pub workspace: Option<PathBuf>,
}

/// Runs the full compatibility check.
///
/// # Arguments
///
/// * `args` - Parsed `compat run` arguments
pub fn run(args: &RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let matrix = config.matrix()?;
    let profile = BuildProfile::new(args.profile.as_str())?;
    let secrets = Secrets::from_env()?;
    let backend = HttpBackendAdmin::new(&secrets)?;

    let workspace = match &args.workspace {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to determine current directory")?,
    };

    let conan = conan_context(&workspace, &config.conan, args.isolate_conan_user_home)?;
    if args.isolate_conan_user_home {
        conan.update_config(matrix.baseline(), config.conan.config_url.as_deref())?;
    }

    if args.export_tanker_dev {
        conan.export_dev(matrix.baseline(), &workspace)?;
    } else {
        conan.export_pkg(matrix.baseline(), &workspace, &profile)?;
    }

    let builder = ConanCmakeBuilder::new(source_root(&workspace, &config), conan, &config.build);

    let summary = CompatibilityOrchestrator::new(
        &matrix,
        &builder,
        &backend,
        &secrets,
        &config.backend,
        &config.environment,
    )
    .execute(&profile)
    .with_context(|| format!("compatibility run against {} failed", matrix.baseline()))?;

    for outcome in &summary.outcomes {
        println!("{outcome}");
    }
    info!(
        pairs = summary.outcomes.len(),
        elapsed_secs = summary.elapsed.as_secs(),
        "all compatibility checks passed"
    );
    Ok(())
}

fn conan_context(
    workspace: &Path,
    settings: &ConanSettings,
    isolate: bool,
) -> Result<ConanContext> {
    if !isolate {
        return Ok(ConanContext::user_default());
    }
    if settings.config_url.is_none() {
        return Err(CompatError::configuration(
            "--isolate-conan-user-home requires [conan] config_url to be set",
        )
        .into());
    }
    let home = settings
        .isolated_home
        .as_ref()
        .map_or_else(|| workspace.join(".cache").join("conan"), |h| workspace.join(h));
    Ok(ConanContext::isolated(home)?)
}

/// Version snapshots live under the workspace unless configured elsewhere.
fn source_root(workspace: &Path, config: &CompatConfig) -> PathBuf {
    workspace.join(&config.build.source_root)
}
