//! Login flows against the cloud.
//!
//! Two flows produce a bearer token: user credentials (email plus SHA-1
//! password digest) and hub tokens. Successful logins store the token and
//! remember how to log in again for the automatic refresh path.

use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::{debug, info, warn};

use lightwire_protocol::constants::{ERR_LOGIN_EMAIL_NOT_VERIFIED, ERR_LOGIN_FAILED};

use crate::credentials::CredentialStore;
use crate::types::{CachedLogin, SseConfig};

/// Errors from the login flows.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("login endpoint returned {status}")]
    Status { status: u16, body: String },

    #[error("email address has not been verified")]
    EmailNotVerified,

    #[error("incorrect email or password")]
    InvalidCredentials,

    #[error("login rejected: {code}")]
    Unauthorized { code: String },

    #[error("no cached credentials to retry login")]
    NoCredentials,
}

/// Success body of both login endpoints.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    /// The bearer token.
    id: String,
    #[serde(default)]
    ttl: Option<i64>,
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "statusCode")]
    status_code: Option<u16>,
    code: Option<String>,
}

/// Hex SHA-1 digest, the form the login endpoint expects passwords in.
pub(crate) fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

/// Performs login requests and maintains the credential store.
pub(crate) struct Authenticator {
    http: reqwest::Client,
    login_url: String,
    hub_login_base: String,
    credentials: Arc<CredentialStore>,
}

impl Authenticator {
    pub(crate) fn new(config: &SseConfig, credentials: Arc<CredentialStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            login_url: config.login_url.clone(),
            hub_login_base: config.hub_login_base.clone(),
            credentials,
        }
    }

    /// Hashes the password and delegates to [`Self::login_hashed`]. The
    /// plaintext never leaves the process.
    pub(crate) async fn login(&self, email: &str, password: &str) -> Result<(), LoginError> {
        self.login_hashed(email, &sha1_hex(password)).await
    }

    /// Logs in with an email and a precomputed SHA-1 password digest.
    pub(crate) async fn login_hashed(&self, email: &str, hash: &str) -> Result<(), LoginError> {
        self.credentials.cache_login(CachedLogin::User {
            email: email.to_string(),
            hashed_password: hash.to_string(),
        });
        let token = self.request_user_login(email, hash).await?;
        self.credentials.set_token(&token);
        Ok(())
    }

    /// Logs in with a pre-shared hub token.
    pub(crate) async fn hub_login(&self, hub_id: &str, hub_token: &str) -> Result<(), LoginError> {
        self.credentials.cache_login(CachedLogin::Hub {
            hub_id: hub_id.to_string(),
            hub_token: hub_token.to_string(),
        });
        let token = self.request_hub_login(hub_id, hub_token).await?;
        self.credentials.set_token(&token);
        Ok(())
    }

    /// Replays the cached login flow and returns the fresh token without
    /// storing it. The caller decides whether the result is still wanted;
    /// a refresh that resolves after `stop()` must be discarded.
    pub(crate) async fn retry_login(&self) -> Result<String, LoginError> {
        match self.credentials.cached_login() {
            None => Err(LoginError::NoCredentials),
            Some(CachedLogin::User {
                email,
                hashed_password,
            }) => self.request_user_login(&email, &hashed_password).await,
            Some(CachedLogin::Hub { hub_id, hub_token }) => {
                self.request_hub_login(&hub_id, &hub_token).await
            }
        }
    }

    async fn request_user_login(&self, email: &str, hash: &str) -> Result<String, LoginError> {
        info!(url = %self.login_url, "logging in with user credentials");
        let body = serde_json::json!({ "email": email, "password": hash });
        let resp = self
            .http
            .post(&self.login_url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        handle_login_response(resp).await
    }

    async fn request_hub_login(&self, hub_id: &str, hub_token: &str) -> Result<String, LoginError> {
        let url = format!("{}{}/login?token={}", self.hub_login_base, hub_id, hub_token);
        info!(hub = %hub_id, "logging in with hub token");
        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        handle_login_response(resp).await
    }
}

/// Maps a login response to a bearer token or a classified failure.
async fn handle_login_response(resp: reqwest::Response) -> Result<String, LoginError> {
    let status = resp.status();
    let body = resp.text().await?;

    let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
    let body_status = envelope.error.as_ref().and_then(|e| e.status_code);

    if status.as_u16() == 401 || body_status == Some(401) {
        let code = envelope.error.and_then(|e| e.code);
        let err = match code.as_deref() {
            Some(ERR_LOGIN_EMAIL_NOT_VERIFIED) => LoginError::EmailNotVerified,
            Some(ERR_LOGIN_FAILED) => LoginError::InvalidCredentials,
            other => LoginError::Unauthorized {
                code: other.unwrap_or("unknown").to_string(),
            },
        };
        warn!(error = %err, "login rejected");
        return Err(err);
    }

    if !status.is_success() {
        warn!(status = %status, "login endpoint returned an error");
        return Err(LoginError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: LoginResponse = serde_json::from_str(&body)?;
    debug!(ttl = ?parsed.ttl, user = ?parsed.user_id, "login accepted");
    Ok(parsed.id)
}
