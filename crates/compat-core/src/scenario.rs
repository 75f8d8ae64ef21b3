//! Running one scenario: `base` then `next` against a fresh backend app.
//!
//! Per run:
//!
//! 1. A temporary directory `<scenario>-XXXX` is created; it is removed when
//!    the run ends, whatever the outcome.
//! 2. A backend application is provisioned and the verification code of the
//!    test identity fetched.
//! 3. `trustchain-config.json` is written into the directory.
//! 4. The historical binary runs with `--base`, then the baseline binary
//!    with `--next`. Both share the directory and `state.json` inside it.
//! 5. The application is deleted.
//!
//! `next` only starts after `base` has exited successfully.

use std::ffi::{OsStr, OsString};
use std::path::Path;

use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::backend::{BackendAdmin, BackendSession};
use crate::config::BackendSettings;
use crate::environment::TestEnvironment;
use crate::error::{CompatError, Result};
use crate::matrix::{ScenarioName, VersionTag};
use crate::process::{ProcessSpec, Role, describe_status, run_to_completion};
use crate::redact::redact_command_line;

/// File name of the trustchain configuration inside the scenario directory.
pub const TRUSTCHAIN_CONFIG_FILE: &str = "trustchain-config.json";

/// File name of the state `base` leaves for `next`.
pub const STATE_FILE: &str = "state.json";

/// Everything a scenario invocation needs besides the binary and its role.
struct Invocation<'a> {
    scenario: &'a ScenarioName,
    dir: &'a Path,
    state: &'a Path,
    trustchain_config: &'a Path,
    bob_code: &'a str,
}

/// `<flag>=<value>` without going through a lossy string conversion.
fn flag_arg(flag: &str, value: impl AsRef<OsStr>) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push("=");
    arg.push(value);
    arg
}

impl Invocation<'_> {
    fn spec(&self, binary: &Path, role: Role, environment: &TestEnvironment) -> ProcessSpec {
        ProcessSpec::builder(binary)
            .arg(self.scenario.as_str())
            .arg(flag_arg("--path", self.dir))
            .arg(flag_arg("--state", self.state))
            .arg(flag_arg("--bob-code", self.bob_code))
            .arg(flag_arg("--tc-temp-config", self.trustchain_config))
            .arg(role.flag())
            .envs(environment.vars())
            .build()
    }
}

/// Runs scenarios against a backend.
pub struct ScenarioRunner<'a, A: ?Sized> {
    backend: &'a A,
    settings: &'a BackendSettings,
    trustchain_url: &'a str,
    environment: &'a TestEnvironment,
}

impl<'a, A: BackendAdmin + ?Sized> ScenarioRunner<'a, A> {
    /// Creates a runner.
    ///
    /// `trustchain_url` is written into each scenario's trustchain
    /// configuration.
    #[must_use]
    pub const fn new(
        backend: &'a A,
        settings: &'a BackendSettings,
        trustchain_url: &'a str,
        environment: &'a TestEnvironment,
    ) -> Self {
        Self {
            backend,
            settings,
            trustchain_url,
            environment,
        }
    }

    /// Runs `scenario` with `base` (the historical binary of `version`) then
    /// `next` (the baseline binary).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the temporary directory or trustchain configuration cannot be
    ///   written
    /// - the backend application cannot be provisioned or deleted
    /// - either invocation cannot be launched or exits unsuccessfully
    ///   ([`CompatError::ScenarioExecution`])
    pub fn run(
        &self,
        base: &Path,
        next: &Path,
        version: &VersionTag,
        scenario: &ScenarioName,
    ) -> Result<()> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{scenario}-"))
            .tempdir()
            .map_err(|e| CompatError::io("failed to create scenario directory", e))?;
        debug!(dir = %dir.path().display(), %scenario, "created scenario directory");

        BackendSession::scoped(self.backend, self.settings, |session| {
            let trustchain_config = dir.path().join(TRUSTCHAIN_CONFIG_FILE);
            session
                .trustchain_config(self.trustchain_url)
                .write_to(&trustchain_config)?;

            let state = dir.path().join(STATE_FILE);
            let invocation = Invocation {
                scenario,
                dir: dir.path(),
                state: &state,
                trustchain_config: &trustchain_config,
                bob_code: session.verification_code().expose_secret(),
            };

            self.invoke(&invocation, base, Role::Base, version)?;
            self.invoke(&invocation, next, Role::Next, version)
        })
    }

    fn invoke(
        &self,
        invocation: &Invocation<'_>,
        binary: &Path,
        role: Role,
        version: &VersionTag,
    ) -> Result<()> {
        let spec = invocation.spec(binary, role, self.environment);
        info!(
            %version,
            scenario = %invocation.scenario,
            %role,
            command = %redact_command_line(&spec.command_line()),
            "running compat binary"
        );

        let failure = |status: String| CompatError::ScenarioExecution {
            version: version.clone(),
            scenario: invocation.scenario.clone(),
            role,
            status,
        };

        let status =
            run_to_completion(&spec).map_err(|e| failure(format!("failed to launch: {e}")))?;
        if !status.success() {
            return Err(failure(describe_status(status)));
        }
        Ok(())
    }
}
