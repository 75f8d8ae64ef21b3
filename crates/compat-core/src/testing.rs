//! Test doubles for the build and backend seams.
//!
//! Available to this crate's unit tests and, through the `test-utils`
//! feature, to integration tests.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use secrecy::SecretString;

use crate::backend::{AppCredentials, BackendAdmin};
use crate::build::BinaryBuilder;
use crate::config::BuildProfile;
use crate::error::{BuildStep, CompatError, Result};
use crate::matrix::VersionTag;

// ============================================================================
// Backend
// ============================================================================

/// One admin call observed by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `create_app(name)`.
    Create(String),
    /// `get_verification_code(app_id, email)`.
    VerificationCode(String, String),
    /// `delete_app(app_id)`.
    Delete(String),
}

#[derive(Debug, Default)]
struct RecordingState {
    calls: Vec<BackendCall>,
    next_id: usize,
}

/// In-memory backend that records every call.
///
/// Apps are numbered `app-1`, `app-2`, ... in creation order; their auth
/// token, secret, and verification code are derived from the id.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    state: Mutex<RecordingState>,
    fail_create: bool,
    fail_verification_code: bool,
    fail_delete: bool,
}

impl RecordingBackend {
    /// A backend on which every call succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create_app` fail.
    #[must_use]
    pub const fn fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Makes `get_verification_code` fail.
    #[must_use]
    pub const fn fail_verification_code(mut self) -> Self {
        self.fail_verification_code = true;
        self
    }

    /// Makes `delete_app` fail (after recording the call).
    #[must_use]
    pub const fn fail_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Every call so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Ids passed to `delete_app`, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn injected(operation: &'static str) -> CompatError {
    CompatError::Backend {
        operation,
        message: "injected failure".to_string(),
    }
}

impl BackendAdmin for RecordingBackend {
    fn create_app(&self, name: &str, _is_test: bool) -> Result<AppCredentials> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(BackendCall::Create(name.to_string()));
        if self.fail_create {
            return Err(injected("create_app"));
        }
        state.next_id += 1;
        let id = format!("app-{}", state.next_id);
        Ok(AppCredentials {
            auth_token: SecretString::from(format!("auth-token-{id}")),
            secret: SecretString::from(format!("secret-{id}")),
            id,
        })
    }

    fn delete_app(&self, app_id: &str) -> Result<()> {
        self.record(BackendCall::Delete(app_id.to_string()));
        if self.fail_delete {
            return Err(injected("delete_app"));
        }
        Ok(())
    }

    fn get_verification_code(&self, app: &AppCredentials, email: &str) -> Result<SecretString> {
        self.record(BackendCall::VerificationCode(
            app.id.clone(),
            email.to_string(),
        ));
        if self.fail_verification_code {
            return Err(injected("get_verification_code"));
        }
        Ok(SecretString::from(format!("code-for-{}", app.id)))
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder that "produces" `<prefix><version>` without running anything.
#[derive(Debug)]
pub struct FixedBuilder {
    prefix: String,
    fail_on: BTreeSet<String>,
    built: Mutex<Vec<String>>,
}

impl FixedBuilder {
    /// Binaries resolve to `format!("{prefix}{version}")`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            fail_on: BTreeSet::new(),
            built: Mutex::new(Vec::new()),
        }
    }

    /// Makes the build of `version` fail.
    #[must_use]
    pub fn fail_on(mut self, version: &str) -> Self {
        self.fail_on.insert(version.to_string());
        self
    }

    /// Versions attempted so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }
}

impl BinaryBuilder for FixedBuilder {
    fn build(&self, version: &VersionTag, _profile: &BuildProfile) -> Result<PathBuf> {
        self.built.lock().unwrap().push(version.to_string());
        if self.fail_on.contains(version.as_str()) {
            return Err(CompatError::Build {
                version: version.clone(),
                step: BuildStep::Build,
                message: "injected failure".to_string(),
            });
        }
        Ok(PathBuf::from(format!("{}{version}", self.prefix)))
    }
}

// ============================================================================
// Fake compat binaries
// ============================================================================

/// Writes an executable shell script standing in for a compat binary.
///
/// Each invocation appends one line to `log`: `label` followed by its
/// arguments. The script exits with status 1 when its arguments contain
/// every word of `fail_when` (space separated), 0 otherwise.
///
/// # Panics
///
/// Panics if the script cannot be written.
#[cfg(unix)]
pub fn write_fake_binary(dir: &Path, label: &str, log: &Path, fail_when: Option<&str>) -> PathBuf {
    use std::fmt::Write as _;
    use std::os::unix::fs::PermissionsExt;

    let mut script = String::from("#!/bin/sh\n");
    let _ = writeln!(script, "echo \"{label} $*\" >> '{}'", log.display());
    if let Some(words) = fail_when {
        let checks: Vec<String> = words
            .split_whitespace()
            .map(|w| format!("case \" $* \" in *\" {w} \"*) ;; *) exit 0 ;; esac"))
            .collect();
        for check in checks {
            let _ = writeln!(script, "{check}");
        }
        script.push_str("exit 1\n");
    }

    let path = dir.join(format!("compat-{label}"));
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
