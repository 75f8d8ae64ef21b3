//! Shared environment handed to every compat binary.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{ADMIND_URL_ENV, RESERVED_ENV_NAMES, Secrets, TRUSTCHAIND_URL_ENV};
use crate::error::{CompatError, Result};
use crate::redact::redact_env_value;

/// Environment variables applied to each base/next invocation, on top of the
/// inherited process environment.
///
/// Established once per run, before the first scenario. The admin id token is
/// never part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEnvironment {
    vars: BTreeMap<String, String>,
}

impl TestEnvironment {
    /// Builds the environment from the run secrets and configured extras.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an extra variable name is empty,
    /// contains `=` or NUL, or names one of the reserved secret variables.
    pub fn establish(secrets: &Secrets, extra: &BTreeMap<String, String>) -> Result<Self> {
        let mut vars = BTreeMap::new();

        for (name, value) in extra {
            if name.is_empty() || name.contains('=') || name.contains('\0') {
                return Err(CompatError::configuration(format!(
                    "invalid environment variable name '{name}'"
                )));
            }
            if value.contains('\0') {
                return Err(CompatError::configuration(format!(
                    "environment variable '{name}' contains a NUL byte"
                )));
            }
            if RESERVED_ENV_NAMES.contains(&name.as_str()) {
                return Err(CompatError::configuration(format!(
                    "environment variable '{name}' is managed by the run and cannot be configured"
                )));
            }
            vars.insert(name.clone(), value.clone());
        }

        vars.insert(
            TRUSTCHAIND_URL_ENV.to_string(),
            secrets.trustchaind_url().to_string(),
        );
        vars.insert(ADMIND_URL_ENV.to_string(), secrets.admind_url().to_string());

        for (name, value) in &vars {
            debug!(name = %name, value = %redact_env_value(name, value), "test environment");
        }

        Ok(Self { vars })
    }

    /// The variables to apply.
    #[must_use]
    pub const fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}
