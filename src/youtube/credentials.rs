//! Status report for the three credential files the tool depends on.

use std::path::Path;

use serde::Serialize;

use super::oauth::{read_token_file, ClientSecretsFile};
use crate::config::Config;
use crate::cookies::has_cookie_lines;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub name: &'static str,
    pub exists: bool,
    pub valid: bool,
    pub message: String,
    pub path: String,
}

impl CredentialStatus {
    fn new(name: &'static str, path: &Path, exists: bool, valid: bool, message: impl Into<String>) -> Self {
        Self {
            name,
            exists,
            valid,
            message: message.into(),
            path: path.display().to_string(),
        }
    }
}

/// Check the cookie jar, the OAuth client file and the token file.
pub async fn check_credentials(config: &Config) -> Vec<CredentialStatus> {
    vec![
        cookie_status(&config.cookies_file).await,
        client_secrets_status(&config.client_secrets_file).await,
        token_status(&config.token_file).await,
    ]
}

async fn cookie_status(path: &Path) -> CredentialStatus {
    const NAME: &str = "Source site cookies";
    match tokio::fs::read_to_string(path).await {
        Ok(content) if has_cookie_lines(&content) => {
            CredentialStatus::new(NAME, path, true, true, "configured")
        }
        Ok(_) => CredentialStatus::new(NAME, path, true, false, "file is empty or only has comments"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CredentialStatus::new(NAME, path, false, false, "file not found")
        }
        Err(e) => CredentialStatus::new(NAME, path, true, false, format!("unreadable: {e}")),
    }
}

async fn client_secrets_status(path: &Path) -> CredentialStatus {
    const NAME: &str = "Google OAuth client";
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return CredentialStatus::new(NAME, path, false, false, "file not found");
        }
        Err(e) => return CredentialStatus::new(NAME, path, true, false, format!("unreadable: {e}")),
    };

    match serde_json::from_str::<ClientSecretsFile>(&content) {
        Ok(file) if file.client().is_some() => CredentialStatus::new(NAME, path, true, true, "configured"),
        Ok(_) => CredentialStatus::new(NAME, path, true, false, "no 'installed' or 'web' section"),
        Err(e) => CredentialStatus::new(NAME, path, true, false, format!("invalid JSON: {e}")),
    }
}

async fn token_status(path: &Path) -> CredentialStatus {
    const NAME: &str = "YouTube token";
    match read_token_file(path).await {
        Ok(None) => CredentialStatus::new(
            NAME,
            path,
            false,
            false,
            "not authorized yet; run the auth command",
        ),
        Ok(Some(token)) if token.is_valid() => CredentialStatus::new(NAME, path, true, true, "valid"),
        Ok(Some(token)) if token.is_expired() && token.can_refresh() => {
            CredentialStatus::new(NAME, path, true, false, "expired, needs refresh")
        }
        Ok(Some(_)) => CredentialStatus::new(NAME, path, true, false, "invalid"),
        Err(e) => CredentialStatus::new(NAME, path, true, false, format!("unreadable: {e}")),
    }
}
