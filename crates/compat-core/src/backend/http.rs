//! Blocking HTTP client for the backend admin API.

use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AppCredentials, BackendAdmin};
use crate::config::Secrets;
use crate::error::{CompatError, Result};

/// Per-request timeout. Provisioning is a single round trip, never retried.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct CreateAppRequest<'a> {
    name: &'a str,
    is_test: bool,
}

#[derive(Debug, Deserialize)]
struct CreateAppResponse {
    app: AppPayload,
}

#[derive(Debug, Deserialize)]
struct AppPayload {
    id: String,
    auth_token: String,
    secret: String,
}

#[derive(Serialize)]
struct VerificationCodeRequest<'a> {
    app_id: &'a str,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerificationCodeResponse {
    verification_code: String,
}

/// Admin client talking to the admin and identity servers over HTTPS.
#[derive(Debug)]
pub struct HttpBackendAdmin {
    client: Client,
    admind_url: Url,
    trustchaind_url: Url,
    id_token: SecretString,
}

impl HttpBackendAdmin {
    /// Creates a client from the run secrets.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either URL is invalid, or a backend
    /// error if the HTTP client cannot be initialised.
    pub fn new(secrets: &Secrets) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| backend_error("init", &e))?;

        Ok(Self {
            client,
            admind_url: parse_base_url(secrets.admind_url())?,
            trustchaind_url: parse_base_url(secrets.trustchaind_url())?,
            id_token: secrets.id_token().clone(),
        })
    }

    fn send<T: DeserializeOwned>(operation: &'static str, request: RequestBuilder) -> Result<T> {
        let body = request
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(|e| backend_error(operation, &e))?;
        decode(operation, &body)
    }
}

impl BackendAdmin for HttpBackendAdmin {
    fn create_app(&self, name: &str, is_test: bool) -> Result<AppCredentials> {
        let url = endpoint(&self.admind_url, &["v1", "apps"])?;
        debug!(%url, name, "creating backend app");

        let response: CreateAppResponse = Self::send(
            "create_app",
            self.client
                .post(url)
                .bearer_auth(self.id_token.expose_secret())
                .json(&CreateAppRequest { name, is_test }),
        )?;

        Ok(AppCredentials {
            id: response.app.id,
            auth_token: SecretString::from(response.app.auth_token),
            secret: SecretString::from(response.app.secret),
        })
    }

    fn delete_app(&self, app_id: &str) -> Result<()> {
        let url = endpoint(&self.admind_url, &["v1", "apps", app_id])?;
        debug!(%url, "deleting backend app");

        self.client
            .delete(url)
            .bearer_auth(self.id_token.expose_secret())
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| backend_error("delete_app", &e))?;
        Ok(())
    }

    fn get_verification_code(&self, app: &AppCredentials, email: &str) -> Result<SecretString> {
        let url = endpoint(&self.trustchaind_url, &["verification", "email", "code"])?;
        debug!(%url, app_id = %app.id, "fetching verification code");

        let response: VerificationCodeResponse = Self::send(
            "get_verification_code",
            self.client
                .post(url)
                .bearer_auth(app.auth_token.expose_secret())
                .json(&VerificationCodeRequest {
                    app_id: &app.id,
                    email,
                }),
        )?;

        Ok(SecretString::from(response.verification_code))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| CompatError::configuration(format!("invalid backend URL '{raw}': {e}")))?;
    if url.cannot_be_a_base() {
        return Err(CompatError::configuration(format!(
            "backend URL '{raw}' cannot be used as a base"
        )));
    }
    Ok(url)
}

/// Appends path segments to `base`, percent-encoding each segment.
///
/// App ids are base64 and may contain `/`, so they must stay one segment.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| CompatError::configuration(format!("backend URL '{base}' cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn decode<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| CompatError::Backend {
        operation,
        message: format!("unexpected response body: {e}"),
    })
}

fn backend_error(operation: &'static str, err: &reqwest::Error) -> CompatError {
    // reqwest errors carry the URL but never headers, so bearer tokens stay out.
    CompatError::Backend {
        operation,
        message: err.to_string(),
    }
}
