//! Cross-version compatibility verification for the client SDK.
//!
//! A compat binary exists for every supported SDK version. Each scenario is
//! run twice against one freshly provisioned backend application: first by
//! the historical binary (`--base`), which creates data and leaves state on
//! disk, then by the current binary (`--next`), which must read and extend
//! it. Any failure aborts the run.
//!
//! # Components
//!
//! - [`matrix`]: which versions exist and which scenarios each supports
//! - [`build`]: one compat executable per version via Conan and CMake
//! - [`backend`]: ephemeral backend applications, torn down exactly once
//! - [`scenario`]: one base/next pair in a private temporary directory
//! - [`orchestrator`]: builds everything, then walks the matrix in order
//!
//! # Example
//!
//! ```rust,no_run
//! use compat_core::{
//!     CompatConfig, CompatibilityOrchestrator, ConanCmakeBuilder, ConanContext,
//!     HttpBackendAdmin, Secrets, BuildProfile,
//! };
//!
//! # fn main() -> compat_core::Result<()> {
//! let config = CompatConfig::default();
//! let matrix = config.matrix()?;
//! let secrets = Secrets::from_env()?;
//! let builder = ConanCmakeBuilder::new(
//!     &config.build.source_root,
//!     ConanContext::user_default(),
//!     &config.build,
//! );
//! let backend = HttpBackendAdmin::new(&secrets)?;
//!
//! let summary = CompatibilityOrchestrator::new(
//!     &matrix,
//!     &builder,
//!     &backend,
//!     &secrets,
//!     &config.backend,
//!     &config.environment,
//! )
//! .execute(&BuildProfile::new("linux-release")?)?;
//!
//! for outcome in &summary.outcomes {
//!     println!("{outcome}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod build;
pub mod config;
pub mod environment;
pub mod error;
pub mod matrix;
pub mod orchestrator;
pub mod process;
pub mod redact;
pub mod scenario;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use backend::{AppCredentials, BackendAdmin, BackendSession, HttpBackendAdmin};
pub use build::{BinaryBuilder, BuiltBinaries, ConanCmakeBuilder, ConanContext};
pub use config::{BuildProfile, CompatConfig, Secrets};
pub use environment::TestEnvironment;
pub use error::{BuildStep, CompatError, Result};
pub use matrix::{ScenarioName, VersionMatrix, VersionTag};
pub use orchestrator::{CompatibilityOrchestrator, RunSummary, ScenarioOutcome};
pub use process::Role;
pub use scenario::ScenarioRunner;
