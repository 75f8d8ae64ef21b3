//! End-to-end compatibility run.
//!
//! ```text
//! build every version ──► establish environment ──► for each historical
//!                                                    version, for each
//!                                                    shared scenario:
//!                                                      run base, run next
//! ```
//!
//! Everything is sequential. The first failure aborts the run; no further
//! pair is started.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::backend::BackendAdmin;
use crate::build::{BinaryBuilder, build_all};
use crate::config::{BackendSettings, BuildProfile, Secrets};
use crate::environment::TestEnvironment;
use crate::error::Result;
use crate::matrix::{ScenarioName, VersionMatrix, VersionTag};
use crate::scenario::ScenarioRunner;

/// One successful `(version, scenario)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutcome {
    /// The historical version.
    pub version: VersionTag,
    /// The scenario.
    pub scenario: ScenarioName,
    /// The baseline it was checked against.
    pub baseline: VersionTag,
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compat {} {} -> {} success",
            self.scenario, self.version, self.baseline
        )
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Completed pairs, in execution order.
    pub outcomes: Vec<ScenarioOutcome>,
    /// Wall-clock duration of the run, builds included.
    pub elapsed: Duration,
}

/// Drives a whole compatibility run.
pub struct CompatibilityOrchestrator<'a, B: ?Sized, A: ?Sized> {
    matrix: &'a VersionMatrix,
    builder: &'a B,
    backend: &'a A,
    secrets: &'a Secrets,
    settings: &'a BackendSettings,
    extra_env: &'a BTreeMap<String, String>,
}

impl<'a, B, A> CompatibilityOrchestrator<'a, B, A>
where
    B: BinaryBuilder + ?Sized,
    A: BackendAdmin + ?Sized,
{
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(
        matrix: &'a VersionMatrix,
        builder: &'a B,
        backend: &'a A,
        secrets: &'a Secrets,
        settings: &'a BackendSettings,
        extra_env: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            matrix,
            builder,
            backend,
            secrets,
            settings,
            extra_env,
        }
    }

    /// Builds every version, then runs every planned pair in order.
    ///
    /// No backend call is made before all builds succeed.
    ///
    /// # Errors
    ///
    /// Returns the first build, configuration, backend, or scenario error.
    /// Scenario errors identify the failing `(version, scenario)` pair.
    pub fn execute(&self, profile: &BuildProfile) -> Result<RunSummary> {
        let started = Instant::now();
        let baseline = self.matrix.baseline();

        let binaries = build_all(self.builder, self.matrix, profile)?;
        let environment = TestEnvironment::establish(self.secrets, self.extra_env)?;

        for version in self.matrix.historical_versions() {
            let unmatched = self.matrix.unmatched_scenarios(version)?;
            if !unmatched.is_empty() {
                let names: Vec<&str> = unmatched.iter().map(|s| s.as_str()).collect();
                warn!(
                    %version,
                    %baseline,
                    scenarios = %names.join(", "),
                    "scenarios not declared by the baseline will not run"
                );
            }
        }

        let runner = ScenarioRunner::new(
            self.backend,
            self.settings,
            self.secrets.trustchaind_url(),
            &environment,
        );
        let next = binaries.get(baseline)?;
        let plan = self.matrix.plan();
        info!(pairs = plan.len(), %baseline, "starting compatibility checks");

        let mut outcomes = Vec::with_capacity(plan.len());
        for run in plan {
            let base = binaries.get(run.version)?;
            runner.run(base, next, run.version, run.scenario)?;

            let outcome = ScenarioOutcome {
                version: run.version.clone(),
                scenario: run.scenario.clone(),
                baseline: baseline.clone(),
            };
            info!("{outcome}");
            outcomes.push(outcome);
        }

        Ok(RunSummary {
            outcomes,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::config::{ADMIND_URL_ENV, ID_TOKEN_ENV, TRUSTCHAIND_URL_ENV};
    use crate::error::CompatError;
    use crate::testing::{FixedBuilder, RecordingBackend};

    fn secrets() -> Secrets {
        Secrets::from_lookup(|name| match name {
            ADMIND_URL_ENV => Some("https://admin.example".to_string()),
            TRUSTCHAIND_URL_ENV => Some("https://api.example".to_string()),
            ID_TOKEN_ENV => Some("id-token".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_outcome_display() {
        let outcome = ScenarioOutcome {
            version: VersionTag::new("2.0.0").unwrap(),
            scenario: ScenarioName::new("encrypt").unwrap(),
            baseline: VersionTag::new("dev").unwrap(),
        };
        assert_eq!(outcome.to_string(), "compat encrypt 2.0.0 -> dev success");
    }

    #[test]
    fn test_build_failure_happens_before_backend_calls() {
        let matrix = VersionMatrix::builtin();
        let builder = FixedBuilder::new("/nonexistent/compat-").fail_on("2.0.0");
        let backend = RecordingBackend::new();
        let secrets = secrets();
        let settings = BackendSettings::default();
        let extra = BTreeMap::new();

        let orchestrator = CompatibilityOrchestrator::new(
            &matrix, &builder, &backend, &secrets, &settings, &extra,
        );
        let err = orchestrator
            .execute(&BuildProfile::new("linux-release").unwrap())
            .unwrap_err();

        assert!(matches!(err, CompatError::Build { .. }));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_invalid_environment_aborts_before_backend_calls() {
        let matrix = VersionMatrix::builtin();
        let builder = FixedBuilder::new("/nonexistent/compat-");
        let backend = RecordingBackend::new();
        let secrets = secrets();
        let settings = BackendSettings::default();
        let extra = BTreeMap::from([(ID_TOKEN_ENV.to_string(), "leak".to_string())]);

        let orchestrator = CompatibilityOrchestrator::new(
            &matrix, &builder, &backend, &secrets, &settings, &extra,
        );
        let err = orchestrator
            .execute(&BuildProfile::new("linux-release").unwrap())
            .unwrap_err();

        assert!(matches!(err, CompatError::Configuration { .. }));
        assert_eq!(builder.built().len(), 5);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_baseline_only_matrix_runs_nothing() {
        let matrix = VersionMatrix::from_toml(
            r#"
            baseline = "dev"

            [[versions]]
            tag = "dev"
            scenarios = ["encrypt"]
            "#,
        )
        .unwrap();
        let builder = FixedBuilder::new("/nonexistent/compat-");
        let backend = RecordingBackend::new();
        let secrets = secrets();
        let settings = BackendSettings::default();
        let extra = BTreeMap::new();

        let summary =
            CompatibilityOrchestrator::new(&matrix, &builder, &backend, &secrets, &settings, &extra)
                .execute(&BuildProfile::new("linux-release").unwrap())
                .unwrap();

        assert!(summary.outcomes.is_empty());
        assert_eq!(builder.built(), ["dev"]);
        assert!(backend.calls().is_empty());
    }

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[test]
    #[serial]
    fn test_missing_binary_surfaces_as_scenario_failure() {
        let matrix = VersionMatrix::builtin();
        let builder = FixedBuilder::new("/nonexistent/compat-");
        let backend = RecordingBackend::new();
        let secrets = secrets();
        let settings = BackendSettings::default();
        let extra = BTreeMap::new();

        let err =
            CompatibilityOrchestrator::new(&matrix, &builder, &backend, &secrets, &settings, &extra)
                .execute(&BuildProfile::new("linux-release").unwrap())
                .unwrap_err();

        let (version, scenario) = err.failed_pair().unwrap();
        assert_eq!(version.as_str(), "2.3.0");
        assert_eq!(scenario.as_str(), "encrypt");
        assert_eq!(backend.deletes(), ["app-1"]);
    }
}
