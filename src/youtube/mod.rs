//! YouTube side of a transfer: credentials, authorization sessions and upload.

pub mod credentials;
pub mod oauth;
pub mod session;
pub mod uploader;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::YOUTUBE_WATCH_URL;
use crate::error::TransferError;

pub use credentials::{check_credentials, CredentialStatus};
pub use oauth::{AuthContext, AuthorizationStart, CredentialProvider, OAuthClient};
pub use session::{generate_session_token, AuthSessions, SessionError};
pub use uploader::YouTubeUploader;

/// Video visibility on the destination channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Unlisted,
    Private,
}

impl Privacy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privacy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "unlisted" => Ok(Self::Unlisted),
            "private" => Ok(Self::Private),
            other => Err(format!(
                "unknown privacy status '{other}' (expected public, unlisted or private)"
            )),
        }
    }
}

/// Metadata sent along with an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
}

/// The video created by an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedVideo {
    pub id: String,
    pub url: String,
}

impl UploadedVideo {
    #[must_use]
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let url = watch_url(&id);
        Self { id, url }
    }
}

/// Public watch URL of a video.
#[must_use]
pub fn watch_url(video_id: &str) -> String {
    format!("{YOUTUBE_WATCH_URL}{video_id}")
}

/// Publishes a local file as a video.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload `file` and return the created video.
    ///
    /// `on_progress` receives the uploaded fraction (0.0–1.0).
    async fn upload(
        &self,
        file: &Path,
        metadata: &VideoMetadata,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<UploadedVideo, TransferError>;
}
