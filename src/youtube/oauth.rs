//! OAuth credentials for the upload API.
//!
//! Tokens are kept in the "authorized user" JSON layout so an existing
//! `token.json` from other Google tooling can be reused as is.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::session::AuthSessions;
use crate::config::Config;
use crate::constants::{OOB_REDIRECT_URI, YOUTUBE_UPLOAD_SCOPE};
use crate::error::TransferError;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens closer than this to expiry are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Client configuration as downloaded from the Google Cloud console.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientSecretsFile {
    pub installed: Option<ClientSecrets>,
    pub web: Option<ClientSecrets>,
}

impl ClientSecretsFile {
    /// The `installed` section, else the `web` one.
    #[must_use]
    pub fn client(&self) -> Option<&ClientSecrets> {
        self.installed.as_ref().or(self.web.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Persisted authorized-user token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Whether the access token can be used right now.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let has_token = self.token.as_deref().is_some_and(|t| !t.is_empty());
        has_token && !self.is_expired()
    }

    /// Whether the token has an expiry that is (nearly) reached.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expiry
            .is_some_and(|expiry| expiry <= Utc::now() + TimeDelta::seconds(EXPIRY_MARGIN_SECS))
    }

    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Bearer credentials for one API call sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub access_token: String,
}

/// Handed to the user when an authorization starts.
#[derive(Debug, Clone)]
pub struct AuthorizationStart {
    pub session_token: String,
    pub authorization_url: String,
    pub expires_at: DateTime<Utc>,
}

/// State kept between starting and completing an authorization.
#[derive(Debug, Clone)]
struct PendingAuthorization {
    client: ClientSecrets,
}

/// Source of upload credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Whether a usable access token exists without any network call.
    async fn is_auth_valid(&self) -> bool;

    /// Return a usable access token, refreshing it first when needed.
    async fn access_context(&self) -> Result<AuthContext, TransferError>;

    /// Exchange the refresh token for a new access token and persist it.
    async fn refresh(&self) -> Result<(), TransferError>;
}

/// File-backed OAuth client for the installed-app flow.
pub struct OAuthClient {
    http: reqwest::Client,
    client_secrets_file: PathBuf,
    token_file: PathBuf,
    sessions: AuthSessions<PendingAuthorization>,
}

impl OAuthClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, TransferError> {
        let http = reqwest::Client::builder()
            .timeout(config.page_timeout)
            .build()
            .map_err(|e| TransferError::network("failed to build HTTP client", e))?;

        Ok(Self {
            http,
            client_secrets_file: config.client_secrets_file.clone(),
            token_file: config.token_file.clone(),
            sessions: AuthSessions::new(config.auth_session_ttl),
        })
    }

    /// Wrap in an `Arc` for sharing with an uploader.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Read the token file. `None` if missing or unreadable.
    pub async fn load_token(&self) -> Option<StoredToken> {
        match read_token_file(&self.token_file).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable token file");
                None
            }
        }
    }

    /// Begin an authorization: returns the URL to open and the session token
    /// that [`OAuthClient::complete_authorization`] expects back.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Auth`] if the client configuration is missing or
    /// invalid.
    pub async fn start_authorization(&self) -> Result<AuthorizationStart, TransferError> {
        let client = self.load_client_secrets().await?;

        let mut authorization_url = url::Url::parse_with_params(
            &client.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", OOB_REDIRECT_URI),
                ("scope", YOUTUBE_UPLOAD_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| TransferError::Auth(format!("invalid auth_uri in client configuration: {e}")))?;

        let (session_token, expires_at) = self.sessions.begin(PendingAuthorization { client });

        authorization_url
            .query_pairs_mut()
            .append_pair("state", &session_token);

        info!(
            expires_at = %expires_at,
            pending = self.sessions.pending(),
            "Authorization session started"
        );
        Ok(AuthorizationStart {
            session_token,
            authorization_url: authorization_url.to_string(),
            expires_at,
        })
    }

    /// Finish an authorization with the code the user copied from the browser.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Auth`] for an unknown, used or expired session and
    /// for a rejected code.
    pub async fn complete_authorization(
        &self,
        session_token: &str,
        code: &str,
    ) -> Result<StoredToken, TransferError> {
        let pending = self.sessions.take(session_token)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(TransferError::Auth("authorization code is empty".to_string()));
        }

        let client = pending.client;
        let response = self
            .request_token(
                &client.token_uri,
                &[
                    ("code", code),
                    ("client_id", client.client_id.as_str()),
                    ("client_secret", client.client_secret.as_str()),
                    ("redirect_uri", OOB_REDIRECT_URI),
                    ("grant_type", "authorization_code"),
                ],
            )
            .await?;

        let token = StoredToken {
            token: Some(response.access_token),
            refresh_token: response.refresh_token,
            token_uri: client.token_uri,
            client_id: client.client_id,
            client_secret: client.client_secret,
            scopes: scopes_from(response.scope.as_deref()),
            expiry: expiry_from(response.expires_in),
        };
        self.save_token(&token).await?;

        info!(path = %self.token_file.display(), "Authorization complete, token saved");
        Ok(token)
    }

    async fn load_client_secrets(&self) -> Result<ClientSecrets, TransferError> {
        let content = tokio::fs::read_to_string(&self.client_secrets_file)
            .await
            .map_err(|e| {
                TransferError::Auth(format!(
                    "cannot read OAuth client file {}: {e}",
                    self.client_secrets_file.display()
                ))
            })?;
        let file: ClientSecretsFile = serde_json::from_str(&content).map_err(|e| {
            TransferError::Auth(format!(
                "invalid OAuth client file {}: {e}",
                self.client_secrets_file.display()
            ))
        })?;
        file.client().cloned().ok_or_else(|| {
            TransferError::Auth(format!(
                "OAuth client file {} has no 'installed' or 'web' section",
                self.client_secrets_file.display()
            ))
        })
    }

    async fn request_token(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, TransferError> {
        let response = self
            .http
            .post(token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| TransferError::network("token request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransferError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TransferError::Auth(format!("invalid token response: {e}")))
    }

    async fn save_token(&self, token: &StoredToken) -> Result<(), TransferError> {
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| TransferError::Auth(format!("failed to encode token: {e}")))?;
        if let Some(parent) = self.token_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TransferError::io(format!("failed to create {}", parent.display()), e)
            })?;
        }
        tokio::fs::write(&self.token_file, json).await.map_err(|e| {
            TransferError::io(format!("failed to write {}", self.token_file.display()), e)
        })
    }

    async fn refreshed(&self, mut token: StoredToken) -> Result<StoredToken, TransferError> {
        let Some(refresh_token) = token.refresh_token.clone().filter(|t| !t.is_empty()) else {
            return Err(TransferError::Auth(
                "token expired and has no refresh token; run the auth command".to_string(),
            ));
        };

        debug!(token_uri = %token.token_uri, "Refreshing access token");
        let response = self
            .request_token(
                &token.token_uri,
                &[
                    ("client_id", token.client_id.as_str()),
                    ("client_secret", token.client_secret.as_str()),
                    ("refresh_token", refresh_token.as_str()),
                    ("grant_type", "refresh_token"),
                ],
            )
            .await?;

        token.token = Some(response.access_token);
        token.expiry = expiry_from(response.expires_in);
        if let Some(new_refresh) = response.refresh_token.filter(|t| !t.is_empty()) {
            token.refresh_token = Some(new_refresh);
        }
        if response.scope.is_some() {
            token.scopes = scopes_from(response.scope.as_deref());
        }
        self.save_token(&token).await?;

        info!("Access token refreshed");
        Ok(token)
    }
}

#[async_trait]
impl CredentialProvider for OAuthClient {
    async fn is_auth_valid(&self) -> bool {
        self.load_token().await.is_some_and(|t| t.is_valid())
    }

    async fn access_context(&self) -> Result<AuthContext, TransferError> {
        let token = self.load_token().await.ok_or_else(|| {
            TransferError::Auth("not authorized yet; run the auth command".to_string())
        })?;

        let token = if token.is_valid() {
            token
        } else {
            self.refreshed(token).await?
        };

        token
            .token
            .filter(|t| !t.is_empty())
            .map(|access_token| AuthContext { access_token })
            .ok_or_else(|| TransferError::Auth("token file holds no access token".to_string()))
    }

    async fn refresh(&self) -> Result<(), TransferError> {
        let token = self.load_token().await.ok_or_else(|| {
            TransferError::Auth("not authorized yet; run the auth command".to_string())
        })?;
        self.refreshed(token).await.map(|_| ())
    }
}

/// Read and decode a token file; `Ok(None)` when it does not exist.
///
/// # Errors
///
/// Returns a message describing why an existing file could not be used.
pub async fn read_token_file(path: &Path) -> Result<Option<StoredToken>, String> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(format!("cannot read {}: {e}", path.display())),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| format!("cannot parse {}: {e}", path.display()))
}

fn expiry_from(expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
}

fn scopes_from(scope: Option<&str>) -> Vec<String> {
    scope.map_or_else(
        || vec![YOUTUBE_UPLOAD_SCOPE.to_string()],
        |s| s.split_whitespace().map(str::to_string).collect(),
    )
}
