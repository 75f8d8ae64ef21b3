//! Ephemeral backend applications.
//!
//! Each scenario run gets a fresh backend application. [`BackendSession::scoped`]
//! pairs creation with deletion so that the application is torn down exactly
//! once on every exit path, success or failure.
//!
//! ```text
//! create_app ──► get_verification_code ──► body ──► delete_app
//!      │                  │                  │           ▲
//!      └─ error: nothing  └──── error ───────┴───────────┘
//!         to tear down
//! ```

mod http;

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::BackendSettings;
use crate::error::{CompatError, Result};

pub use http::HttpBackendAdmin;

/// Identity of one backend application.
#[derive(Debug, Clone)]
pub struct AppCredentials {
    /// Application id (the trustchain id).
    pub id: String,
    /// Token authenticating calls scoped to this application.
    pub auth_token: SecretString,
    /// Application secret (the trustchain private key).
    pub secret: SecretString,
}

/// Admin operations the compatibility run needs from the backend.
///
/// Any client offering these three calls can drive a run.
pub trait BackendAdmin {
    /// Creates a fresh application.
    ///
    /// # Errors
    ///
    /// Returns [`CompatError::Backend`] if the application cannot be created.
    fn create_app(&self, name: &str, is_test: bool) -> Result<AppCredentials>;

    /// Deletes an application.
    ///
    /// # Errors
    ///
    /// Returns [`CompatError::Backend`] if the application cannot be deleted.
    fn delete_app(&self, app_id: &str) -> Result<()>;

    /// Fetches the verification code for `email` within `app`.
    ///
    /// # Errors
    ///
    /// Returns [`CompatError::Backend`] if the query fails.
    fn get_verification_code(&self, app: &AppCredentials, email: &str) -> Result<SecretString>;
}

/// A provisioned application plus the verification code of the synthetic
/// test identity. Only valid inside [`BackendSession::scoped`].
#[derive(Debug)]
pub struct BackendSession<'a> {
    app: &'a AppCredentials,
    email: &'a str,
    verification_code: SecretString,
}

impl<'a> BackendSession<'a> {
    /// Provisions an application, runs `body`, then deletes the application.
    ///
    /// Deletion runs exactly once whenever creation succeeded, even if the
    /// verification code query or `body` fails. If both `body` and deletion
    /// fail, the `body` error is returned and the deletion error is logged.
    ///
    /// # Errors
    ///
    /// Returns the first of: creation error, verification code error, `body`
    /// error, deletion error.
    pub fn scoped<A, T, F>(admin: &A, settings: &BackendSettings, body: F) -> Result<T>
    where
        A: BackendAdmin + ?Sized,
        F: FnOnce(&BackendSession<'_>) -> Result<T>,
    {
        let app = admin.create_app(&settings.app_name, true)?;
        info!(app_id = %app.id, name = %settings.app_name, "created backend app");

        let outcome = admin
            .get_verification_code(&app, &settings.test_email)
            .and_then(|verification_code| {
                body(&BackendSession {
                    app: &app,
                    email: &settings.test_email,
                    verification_code,
                })
            });

        let teardown = teardown(admin, app);

        match (outcome, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
            (Err(e), Err(teardown_err)) => {
                warn!(error = %teardown_err, "backend app teardown failed after run failure");
                Err(e)
            },
        }
    }

    /// The provisioned application.
    #[must_use]
    pub const fn app(&self) -> &'a AppCredentials {
        self.app
    }

    /// The synthetic identity the code belongs to.
    #[must_use]
    pub const fn email(&self) -> &'a str {
        self.email
    }

    /// Verification code for [`Self::email`].
    #[must_use]
    pub const fn verification_code(&self) -> &SecretString {
        &self.verification_code
    }

    /// Trustchain configuration for this application on `url`.
    #[must_use]
    pub fn trustchain_config<'s>(&'s self, url: &'s str) -> TrustchainConfig<'s> {
        TrustchainConfig {
            trustchain_id: &self.app.id,
            url,
            auth_token: self.app.auth_token.expose_secret(),
            trustchain_private_key: self.app.secret.expose_secret(),
        }
    }
}

/// Consumes the credentials so an application cannot be deleted twice.
fn teardown<A: BackendAdmin + ?Sized>(admin: &A, app: AppCredentials) -> Result<()> {
    admin.delete_app(&app.id)?;
    info!(app_id = %app.id, "deleted backend app");
    Ok(())
}

/// Configuration file read by both compat binaries of a scenario.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustchainConfig<'a> {
    trustchain_id: &'a str,
    url: &'a str,
    auth_token: &'a str,
    trustchain_private_key: &'a str,
}

impl TrustchainConfig<'_> {
    /// Serializes the configuration to JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CompatError::Serialization {
            context: "failed to encode trustchain config".to_string(),
            source: Box::new(e),
        })
    }

    /// Writes the configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .map_err(|e| CompatError::io(format!("failed to write {}", path.display()), e))
    }
}
