//! Producing one compat executable per version.
//!
//! A build failure for any version aborts the whole run: without a binary
//! every scenario of that version is unrunnable, so there is nothing useful
//! left to check.

mod conan;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::BuildProfile;
use crate::error::{CompatError, Result};
use crate::matrix::{VersionMatrix, VersionTag};

pub use conan::{ConanCmakeBuilder, ConanContext, DEV_PACKAGE_CHANNEL};

/// Produces a runnable compat executable for one version.
pub trait BinaryBuilder {
    /// Builds `version` with `profile` and returns the executable path.
    ///
    /// Must be idempotent per `(version, profile)` and must not share build
    /// state between versions.
    ///
    /// # Errors
    ///
    /// Returns [`CompatError::Build`] if any step fails.
    fn build(&self, version: &VersionTag, profile: &BuildProfile) -> Result<PathBuf>;
}

/// Executables built for a run, keyed by version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltBinaries {
    binaries: BTreeMap<VersionTag, PathBuf>,
}

impl BuiltBinaries {
    /// Path of the executable for `version`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `version` was not built.
    pub fn get(&self, version: &VersionTag) -> Result<&Path> {
        self.binaries
            .get(version)
            .map(PathBuf::as_path)
            .ok_or_else(|| CompatError::configuration(format!("no binary built for '{version}'")))
    }

    /// Number of built versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.binaries.len()
    }

    /// Returns `true` if nothing was built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
    }
}

/// Builds every declared version, in declared order, stopping at the first
/// failure.
///
/// # Errors
///
/// Returns the first build error.
pub fn build_all<B: BinaryBuilder + ?Sized>(
    builder: &B,
    matrix: &VersionMatrix,
    profile: &BuildProfile,
) -> Result<BuiltBinaries> {
    let mut binaries = BTreeMap::new();
    for version in matrix.versions() {
        info!(%version, %profile, "building compat");
        let path = builder.build(version, profile)?;
        info!(%version, path = %path.display(), "built compat");
        binaries.insert(version.clone(), path);
    }
    Ok(BuiltBinaries { binaries })
}
