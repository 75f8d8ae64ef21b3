//! End-to-end runs of the orchestrator against fake compat binaries and an
//! in-memory backend.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use compat_core::config::{ADMIND_URL_ENV, BackendSettings, ID_TOKEN_ENV, TRUSTCHAIND_URL_ENV};
use compat_core::testing::{BackendCall, RecordingBackend, write_fake_binary};
use compat_core::{
    BinaryBuilder, BuildProfile, CompatError, CompatibilityOrchestrator, Result, Role,
    RunSummary, Secrets, VersionMatrix, VersionTag,
};
use serial_test::serial;
use tempfile::TempDir;

/// Hands out one fake script per version, all logging to the same file.
struct ScriptBuilder {
    dir: TempDir,
    log: PathBuf,
    failing: BTreeMap<String, String>,
}

impl ScriptBuilder {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        Self {
            dir,
            log,
            failing: BTreeMap::new(),
        }
    }

    /// The base binary of `version` fails whenever its arguments contain
    /// every word of `words`.
    fn fail(mut self, version: &str, words: &str) -> Self {
        self.failing.insert(version.to_string(), words.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(|line| {
                // Keep "<version> <scenario> <role>" only.
                let words: Vec<&str> = line.split_whitespace().collect();
                format!("{} {} {}", words[0], words[1], words[words.len() - 1])
            })
            .collect()
    }
}

impl BinaryBuilder for ScriptBuilder {
    fn build(&self, version: &VersionTag, _profile: &BuildProfile) -> Result<PathBuf> {
        Ok(write_fake_binary(
            self.dir.path(),
            version.as_str(),
            &self.log,
            self.failing.get(version.as_str()).map(String::as_str),
        ))
    }
}

fn secrets() -> Secrets {
    Secrets::from_lookup(|name| match name {
        ADMIND_URL_ENV => Some("https://admin.example".to_string()),
        TRUSTCHAIND_URL_ENV => Some("https://api.example".to_string()),
        ID_TOKEN_ENV => Some("id-token".to_string()),
        _ => None,
    })
    .unwrap()
}

fn execute(
    matrix: &VersionMatrix,
    builder: &ScriptBuilder,
    backend: &RecordingBackend,
) -> Result<RunSummary> {
    let secrets = secrets();
    let settings = BackendSettings::default();
    let extra = BTreeMap::new();
    CompatibilityOrchestrator::new(matrix, builder, backend, &secrets, &settings, &extra)
        .execute(&BuildProfile::new("linux-release").unwrap())
}

fn matrix(toml: &str) -> VersionMatrix {
    VersionMatrix::from_toml(toml).unwrap()
}

#[test]
#[serial]
fn test_single_pair_success() {
    let matrix = matrix(
        r#"
        baseline = "dev"

        [[versions]]
        tag = "dev"
        scenarios = ["encrypt", "group"]

        [[versions]]
        tag = "2.0.0"
        scenarios = ["encrypt"]
        "#,
    );
    let builder = ScriptBuilder::new();
    let backend = RecordingBackend::new();

    let summary = execute(&matrix, &builder, &backend).unwrap();

    let lines: Vec<String> = summary.outcomes.iter().map(ToString::to_string).collect();
    assert_eq!(lines, ["compat encrypt 2.0.0 -> dev success"]);
    assert_eq!(builder.calls(), ["2.0.0 encrypt --base", "dev encrypt --next"]);
    assert_eq!(backend.deletes(), ["app-1"]);
}

#[test]
#[serial]
fn test_scenarios_follow_baseline_order_and_skip_unmatched() {
    let matrix = matrix(
        r#"
        baseline = "dev"

        [[versions]]
        tag = "dev"
        scenarios = ["encrypt", "group", "unlock"]

        [[versions]]
        tag = "2.0.0"
        scenarios = ["unlock", "retired", "encrypt"]
        "#,
    );
    let builder = ScriptBuilder::new();
    let backend = RecordingBackend::new();

    execute(&matrix, &builder, &backend).unwrap();

    assert_eq!(
        builder.calls(),
        [
            "2.0.0 encrypt --base",
            "dev encrypt --next",
            "2.0.0 unlock --base",
            "dev unlock --next",
        ]
    );
}

#[test]
#[serial]
fn test_base_failure_aborts_the_run() {
    let builder = ScriptBuilder::new().fail("2.2.0", "unlock");
    let backend = RecordingBackend::new();

    let err = execute(&VersionMatrix::builtin(), &builder, &backend).unwrap_err();

    match &err {
        CompatError::ScenarioExecution {
            version,
            scenario,
            role,
            ..
        } => {
            assert_eq!(version.as_str(), "2.2.0");
            assert_eq!(scenario.as_str(), "unlock");
            assert_eq!(*role, Role::Base);
        },
        other => panic!("unexpected error: {other}"),
    }

    let calls = builder.calls();
    assert_eq!(calls.last().map(String::as_str), Some("2.2.0 unlock --base"));
    // Only 2.3.0 reached the next side of unlock.
    assert_eq!(calls.iter().filter(|c| *c == "dev unlock --next").count(), 1);
    assert!(!calls.iter().any(|c| c == "2.2.0 unlock --next"));
    assert!(!calls.iter().any(|c| c.starts_with("2.2.0 preshare-and-claim")));
    assert!(!calls.iter().any(|c| c.starts_with("2.1.0 ")));

    // 2.3.0: 8 pairs, 2.2.0: encrypt and group pass, unlock fails.
    assert_eq!(backend.deletes().len(), 11);
}

#[test]
#[serial]
fn test_empty_intersection_runs_nothing() {
    let matrix = matrix(
        r#"
        baseline = "dev"

        [[versions]]
        tag = "dev"
        scenarios = ["encrypt"]

        [[versions]]
        tag = "2.0.0"
        scenarios = ["group"]
        "#,
    );
    let builder = ScriptBuilder::new();
    let backend = RecordingBackend::new();

    let summary = execute(&matrix, &builder, &backend).unwrap();

    assert!(summary.outcomes.is_empty());
    assert!(builder.calls().is_empty());
    assert!(backend.calls().is_empty());
}

#[test]
#[serial]
fn test_every_app_is_deleted_exactly_once() {
    let matrix = matrix(
        r#"
        baseline = "dev"

        [[versions]]
        tag = "dev"
        scenarios = ["encrypt", "group"]

        [[versions]]
        tag = "2.1.0"
        scenarios = ["encrypt", "group"]

        [[versions]]
        tag = "2.0.0"
        scenarios = ["group"]
        "#,
    );
    let builder = ScriptBuilder::new();
    let backend = RecordingBackend::new();

    let summary = execute(&matrix, &builder, &backend).unwrap();
    assert_eq!(summary.outcomes.len(), 3);

    // create, code, delete for one app before the next is created
    let calls = backend.calls();
    assert_eq!(calls.len(), 9);
    for (i, chunk) in calls.chunks(3).enumerate() {
        let id = format!("app-{}", i + 1);
        assert_eq!(chunk[0], BackendCall::Create("compat-native".to_string()));
        assert_eq!(
            chunk[1],
            BackendCall::VerificationCode(id.clone(), "bob@tanker.io".to_string())
        );
        assert_eq!(chunk[2], BackendCall::Delete(id));
    }
}

#[test]
#[serial]
fn test_build_failure_precedes_backend_use() {
    struct Broken;

    impl BinaryBuilder for Broken {
        fn build(&self, version: &VersionTag, _profile: &BuildProfile) -> Result<PathBuf> {
            if version.as_str() == "2.1.0" {
                return Err(CompatError::Build {
                    version: version.clone(),
                    step: compat_core::BuildStep::Configure,
                    message: "cmake exited with 1".to_string(),
                });
            }
            Ok(Path::new("/nonexistent").join(version.as_str()))
        }
    }

    let backend = RecordingBackend::new();
    let secrets = secrets();
    let settings = BackendSettings::default();
    let extra = BTreeMap::new();
    let matrix = VersionMatrix::builtin();

    let err =
        CompatibilityOrchestrator::new(&matrix, &Broken, &backend, &secrets, &settings, &extra)
            .execute(&BuildProfile::new("linux-release").unwrap())
            .unwrap_err();

    assert!(err.to_string().contains("build of compat 2.1.0 failed at configure"));
    assert!(backend.calls().is_empty());
}
