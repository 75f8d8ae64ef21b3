//! Conan + CMake driven builds of the compat binaries, and packaging of the
//! current SDK tree as the `dev` package they depend on.
//!
//! Layout per version:
//!
//! ```text
//! <source_root>/<version>/                   source snapshot (own CMakeLists)
//! <source_root>/<version>/build/<profile>/   conan install + cmake build folder
//! <source_root>/<version>/build/<profile>/bin/compat
//! ```

use std::fmt::Display;
use std::path::{Path, PathBuf};

use tracing::info;
use xshell::{Shell, cmd};

use super::BinaryBuilder;
use crate::config::{BuildProfile, BuildSettings};
use crate::error::{BuildStep, CompatError, Result};
use crate::matrix::VersionTag;

/// User/channel the current SDK tree is exported under.
pub const DEV_PACKAGE_CHANNEL: &str = "tanker/dev";

/// Environment variable relocating the Conan home.
const CONAN_USER_HOME_ENV: &str = "CONAN_USER_HOME";

fn step_error(version: &VersionTag, step: BuildStep, err: impl Display) -> CompatError {
    CompatError::Build {
        version: version.clone(),
        step,
        message: err.to_string(),
    }
}

/// Where Conan keeps its cache and configuration for the commands we spawn.
///
/// Isolation applies only to child commands; the parent's environment is
/// left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConanContext {
    user_home: Option<PathBuf>,
}

impl ConanContext {
    /// Uses the invoking user's Conan home.
    #[must_use]
    pub fn user_default() -> Self {
        Self::default()
    }

    /// Uses `home` as the Conan home, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn isolated(home: impl Into<PathBuf>) -> Result<Self> {
        let home = home.into();
        std::fs::create_dir_all(&home)
            .map_err(|e| CompatError::io(format!("failed to create {}", home.display()), e))?;
        info!(home = %home.display(), "using isolated conan home");
        Ok(Self {
            user_home: Some(home),
        })
    }

    /// The isolated Conan home, if any.
    #[must_use]
    pub fn user_home(&self) -> Option<&Path> {
        self.user_home.as_deref()
    }

    fn shell(&self, version: &VersionTag, step: BuildStep) -> Result<Shell> {
        let sh = Shell::new().map_err(|e| step_error(version, step, e))?;
        if let Some(home) = &self.user_home {
            sh.set_var(CONAN_USER_HOME_ENV, home);
        }
        Ok(sh)
    }

    /// Refreshes the Conan configuration from `config_url`.
    ///
    /// Does nothing for the user's own Conan home when no source is
    /// configured. A fresh isolated home has no remotes or profiles, so it
    /// requires a source.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the home is isolated and
    /// `config_url` is `None`, or a build error (attributed to `version`) if
    /// `conan config install` fails.
    pub fn update_config(&self, version: &VersionTag, config_url: Option<&str>) -> Result<()> {
        let Some(config_url) = config_url else {
            if self.user_home.is_some() {
                return Err(CompatError::configuration(
                    "an isolated conan home requires [conan] config_url to be set",
                ));
            }
            info!("no conan config source configured, keeping current configuration");
            return Ok(());
        };
        let sh = self.shell(version, BuildStep::UpdateConfig)?;
        cmd!(sh, "conan config install {config_url}")
            .run()
            .map_err(|e| step_error(version, BuildStep::UpdateConfig, e))
    }

    /// Exports the SDK tree at `src` as `<name>/<version>@tanker/dev`.
    ///
    /// # Errors
    ///
    /// Returns a build error if `conan export` fails.
    pub fn export_dev(&self, version: &VersionTag, src: &Path) -> Result<()> {
        info!(src = %src.display(), channel = DEV_PACKAGE_CHANNEL, "exporting sdk");
        let sh = self.shell(version, BuildStep::Export)?;
        cmd!(sh, "conan export {src} {DEV_PACKAGE_CHANNEL}")
            .run()
            .map_err(|e| step_error(version, BuildStep::Export, e))
    }

    /// Packages the already-built SDK tree at `src` under `tanker/dev`.
    ///
    /// The tree must have been built with `profile` into
    /// `<src>/build/<profile>`.
    ///
    /// # Errors
    ///
    /// Returns a build error if `conan export-pkg` fails.
    pub fn export_pkg(
        &self,
        version: &VersionTag,
        src: &Path,
        profile: &BuildProfile,
    ) -> Result<()> {
        let build_folder = src.join("build").join(profile.as_str());
        let profile = profile.as_str();
        info!(
            src = %src.display(),
            build_folder = %build_folder.display(),
            channel = DEV_PACKAGE_CHANNEL,
            "packaging prebuilt sdk"
        );
        let sh = self.shell(version, BuildStep::Package)?;
        cmd!(
            sh,
            "conan export-pkg {src} {DEV_PACKAGE_CHANNEL} --profile {profile} --build-folder {build_folder} --force"
        )
        .run()
        .map_err(|e| step_error(version, BuildStep::Package, e))
    }
}

/// Builds each version's source snapshot with `conan install` and CMake.
#[derive(Debug, Clone)]
pub struct ConanCmakeBuilder {
    source_root: PathBuf,
    conan: ConanContext,
    coverage: bool,
    warn_as_error: bool,
}

impl ConanCmakeBuilder {
    /// Creates a builder for snapshots under `source_root`.
    #[must_use]
    pub fn new(
        source_root: impl Into<PathBuf>,
        conan: ConanContext,
        settings: &BuildSettings,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            conan,
            coverage: settings.coverage,
            warn_as_error: settings.warn_as_error,
        }
    }

    /// Source snapshot of `version`.
    #[must_use]
    pub fn source_dir(&self, version: &VersionTag) -> PathBuf {
        self.source_root.join(version.as_str())
    }

    /// Build folder of `version` for `profile`. Never shared across versions.
    #[must_use]
    pub fn build_dir(&self, version: &VersionTag, profile: &BuildProfile) -> PathBuf {
        self.source_dir(version).join("build").join(profile.as_str())
    }

    /// Expected executable of `version` for `profile`.
    #[must_use]
    pub fn binary_path(&self, version: &VersionTag, profile: &BuildProfile) -> PathBuf {
        self.build_dir(version, profile)
            .join("bin")
            .join(format!("compat{}", std::env::consts::EXE_SUFFIX))
    }

    fn cmake_definitions(&self) -> Vec<String> {
        let on_off = |flag: bool| if flag { "ON" } else { "OFF" };
        vec![
            "-DCMAKE_BUILD_TYPE=Release".to_string(),
            format!("-DWITH_COVERAGE={}", on_off(self.coverage)),
            format!("-DWARN_AS_ERROR={}", on_off(self.warn_as_error)),
        ]
    }
}

impl BinaryBuilder for ConanCmakeBuilder {
    fn build(&self, version: &VersionTag, profile: &BuildProfile) -> Result<PathBuf> {
        let src = self.source_dir(version);
        if !src.is_dir() {
            return Err(step_error(
                version,
                BuildStep::Source,
                format!("source snapshot {} does not exist", src.display()),
            ));
        }

        let build = self.build_dir(version, profile);
        std::fs::create_dir_all(&build).map_err(|e| step_error(version, BuildStep::Source, e))?;

        let sh = self.conan.shell(version, BuildStep::InstallDeps)?;
        let profile_name = profile.as_str();

        cmd!(
            sh,
            "conan install {src} --profile {profile_name} --install-folder {build} --build missing"
        )
        .run()
        .map_err(|e| step_error(version, BuildStep::InstallDeps, e))?;

        let definitions = self.cmake_definitions();
        cmd!(sh, "cmake -S {src} -B {build} {definitions...}")
            .run()
            .map_err(|e| step_error(version, BuildStep::Configure, e))?;

        cmd!(sh, "cmake --build {build}")
            .run()
            .map_err(|e| step_error(version, BuildStep::Build, e))?;

        let binary = self.binary_path(version, profile);
        if !binary.is_file() {
            return Err(step_error(
                version,
                BuildStep::LocateBinary,
                format!("expected executable {} was not produced", binary.display()),
            ));
        }
        Ok(binary)
    }
}
