//! Error types for compatibility runs.
//!
//! Every failure is fatal for the run: nothing here is retried, and the first
//! error propagates to the CLI which exits non-zero.

use std::fmt;

use thiserror::Error;

use crate::matrix::{ScenarioName, VersionTag};
use crate::process::Role;

/// Step of the build pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    /// `conan export` of the current source tree.
    Export,
    /// `conan export-pkg` of an already-built tree.
    Package,
    /// Refreshing the Conan configuration.
    UpdateConfig,
    /// Locating the version's source snapshot and preparing its build folder.
    Source,
    /// `conan install` of the declared dependencies.
    InstallDeps,
    /// CMake configure.
    Configure,
    /// CMake build.
    Build,
    /// Locating the produced executable.
    LocateBinary,
}

impl BuildStep {
    /// Returns the kebab-case name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Export => "export",
            Self::Package => "package",
            Self::UpdateConfig => "update-config",
            Self::Source => "source",
            Self::InstallDeps => "install-deps",
            Self::Configure => "configure",
            Self::Build => "build",
            Self::LocateBinary => "locate-binary",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during a compatibility run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompatError {
    /// A required secret or configuration value is missing or invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// What is wrong with the configuration.
        message: String,
    },

    /// Installing dependencies, configuring, or compiling a version failed.
    #[error("build of compat {version} failed at {step}: {message}")]
    Build {
        /// The version being built.
        version: VersionTag,
        /// The failing step.
        step: BuildStep,
        /// Failure detail (tool output or missing path).
        message: String,
    },

    /// Creating, querying, or deleting a backend application failed.
    #[error("backend {operation} failed: {message}")]
    Backend {
        /// The admin operation (`create_app`, `delete_app`, ...).
        operation: &'static str,
        /// Failure detail.
        message: String,
    },

    /// A base or next invocation did not exit successfully.
    #[error("compat {scenario} {version} ({role}) failed: {status}")]
    ScenarioExecution {
        /// The historical version under test.
        version: VersionTag,
        /// The scenario being run.
        scenario: ScenarioName,
        /// Which invocation failed.
        role: Role,
        /// Exit status, signal, or launch failure description.
        status: String,
    },

    /// Filesystem operation failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON or TOML (de)serialization failed.
    #[error("{context}: {source}")]
    Serialization {
        /// What was being (de)serialized.
        context: String,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CompatError {
    /// Shorthand for a [`CompatError::Configuration`].
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a [`CompatError::Io`].
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns the failing `(version, scenario)` pair for scenario failures.
    #[must_use]
    pub const fn failed_pair(&self) -> Option<(&VersionTag, &ScenarioName)> {
        match self {
            Self::ScenarioExecution {
                version, scenario, ..
            } => Some((version, scenario)),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = CompatError> = std::result::Result<T, E>;
