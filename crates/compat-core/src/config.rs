//! Configuration for compatibility runs.
//!
//! Two sources feed a run:
//! - [`Secrets`]: the three environment values needed to reach the backend,
//!   read once at startup and never mutated.
//! - [`CompatConfig`]: an optional TOML file overriding the built-in matrix,
//!   backend naming, build knobs, Conan settings, and extra child
//!   environment.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{CompatError, Result};
use crate::matrix::{MatrixSpec, VersionMatrix};

/// Backend admin endpoint URL.
pub const ADMIND_URL_ENV: &str = "TANKER_ADMIND_URL";

/// Identity-server endpoint URL. Also handed to the compat binaries.
pub const TRUSTCHAIND_URL_ENV: &str = "TANKER_TRUSTCHAIND_URL";

/// Token authenticating against the admin API.
pub const ID_TOKEN_ENV: &str = "TANKER_ID_TOKEN";

/// Environment names the run owns; config files cannot set them.
pub const RESERVED_ENV_NAMES: &[&str] = &[ADMIND_URL_ENV, TRUSTCHAIND_URL_ENV, ID_TOKEN_ENV];

/// Default backend application name.
pub const DEFAULT_APP_NAME: &str = "compat-native";

/// Default synthetic identity whose verification code is fetched.
pub const DEFAULT_TEST_EMAIL: &str = "bob@tanker.io";

/// Default directory holding one source snapshot per version.
pub const DEFAULT_SOURCE_ROOT: &str = "compat";

// ============================================================================
// Secrets
// ============================================================================

/// Externally supplied values needed to reach the backend.
#[derive(Debug, Clone)]
pub struct Secrets {
    admind_url: String,
    trustchaind_url: String,
    id_token: SecretString,
}

impl Secrets {
    /// Reads all three values from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming every missing or empty variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads all three values through `lookup`.
    ///
    /// An empty value counts as missing.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming every missing or empty variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let fetch = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let admind_url = fetch(ADMIND_URL_ENV);
        let trustchaind_url = fetch(TRUSTCHAIND_URL_ENV);
        let id_token = fetch(ID_TOKEN_ENV);

        match (admind_url, trustchaind_url, id_token) {
            (Some(admind_url), Some(trustchaind_url), Some(id_token)) => Ok(Self {
                admind_url,
                trustchaind_url,
                id_token: SecretString::from(id_token),
            }),
            (admind_url, trustchaind_url, id_token) => {
                let missing: Vec<&str> = [
                    (ADMIND_URL_ENV, admind_url.is_none()),
                    (TRUSTCHAIND_URL_ENV, trustchaind_url.is_none()),
                    (ID_TOKEN_ENV, id_token.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, is_missing)| is_missing.then_some(name))
                .collect();
                Err(CompatError::configuration(format!(
                    "{} should be set before running tests",
                    missing.join(", ")
                )))
            },
        }
    }

    /// Backend admin endpoint URL.
    #[must_use]
    pub fn admind_url(&self) -> &str {
        &self.admind_url
    }

    /// Identity-server endpoint URL.
    #[must_use]
    pub fn trustchaind_url(&self) -> &str {
        &self.trustchaind_url
    }

    /// Admin API token.
    #[must_use]
    pub const fn id_token(&self) -> &SecretString {
        &self.id_token
    }
}

// ============================================================================
// Build profile
// ============================================================================

/// Name of the Conan profile every version is built with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildProfile(String);

impl BuildProfile {
    /// Creates a build profile identifier.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is empty or contains
    /// whitespace.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(CompatError::configuration(format!(
                "invalid build profile '{name}'"
            )));
        }
        Ok(Self(name))
    }

    /// Returns the profile name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Config file
// ============================================================================

/// Top-level compat configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompatConfig {
    /// Version matrix; the built-in matrix is used when absent.
    #[serde(default)]
    pub matrix: Option<MatrixSpec>,

    /// Backend application settings.
    #[serde(default)]
    pub backend: BackendSettings,

    /// Build settings.
    #[serde(default)]
    pub build: BuildSettings,

    /// Conan settings.
    #[serde(default)]
    pub conan: ConanSettings,

    /// Extra variables exported to every compat binary.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl CompatConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CompatError::io(format!("failed to read {}", path.display()), e))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CompatError::Serialization {
            context: "failed to parse compat configuration".to_string(),
            source: Box::new(e),
        })
    }

    /// The validated version matrix.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured matrix is invalid.
    pub fn matrix(&self) -> Result<VersionMatrix> {
        self.matrix
            .clone()
            .map_or_else(|| Ok(VersionMatrix::builtin()), VersionMatrix::try_from)
    }
}

/// Backend application settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSettings {
    /// Name given to each ephemeral application.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Identity whose verification code is handed to the binaries.
    #[serde(default = "default_test_email")]
    pub test_email: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            test_email: default_test_email(),
        }
    }
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_test_email() -> String {
    DEFAULT_TEST_EMAIL.to_string()
}

/// Build settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    /// Directory containing one source snapshot per version, relative to the
    /// workspace.
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    /// Build with coverage instrumentation.
    #[serde(default)]
    pub coverage: bool,

    /// Treat compiler warnings as errors.
    #[serde(default)]
    pub warn_as_error: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            coverage: false,
            warn_as_error: false,
        }
    }
}

fn default_source_root() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCE_ROOT)
}

/// Conan settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConanSettings {
    /// Source passed to `conan config install` after isolating the Conan
    /// home.
    #[serde(default)]
    pub config_url: Option<String>,

    /// Isolated Conan home; defaults to `<workspace>/.cache/conan`.
    #[serde(default)]
    pub isolated_home: Option<PathBuf>,
}
