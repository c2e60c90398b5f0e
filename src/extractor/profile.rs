//! Listing of a user's video notes from their profile page.

use std::path::Path;
use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::state::{collect_note_entries, parse_initial_state, unwrap_reactive};
use crate::constants::RECORD_TIMESTAMP_FORMAT;
use crate::error::TransferError;
use crate::source::SourceClient;

static PROFILE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"user/profile/([a-f0-9]+)").unwrap());

/// One video note as written to the batch input document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoListEntry {
    pub note_id: String,
    pub title: String,
    pub url: String,
    pub xsec_token: String,
    pub desc: String,
}

/// The batch input document produced for one profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoList {
    pub user_id: String,
    pub fetch_time: String,
    pub total_count: usize,
    pub videos: Vec<VideoListEntry>,
}

/// Extract the profile identifier from a profile URL.
#[must_use]
pub fn extract_profile_id(url: &str) -> Option<String> {
    PROFILE_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Note URL, carrying the access token when there is one.
#[must_use]
pub fn note_url(base_url: &str, note_id: &str, xsec_token: &str) -> String {
    if xsec_token.is_empty() {
        format!("{base_url}/explore/{note_id}")
    } else {
        format!(
            "{base_url}/explore/{note_id}?xsec_token={}&xsec_source=pc_user",
            urlencoding::encode(xsec_token)
        )
    }
}

/// Real user id from `user.userInfo.userId`, if present.
fn state_user_id(state: &Value) -> Option<&str> {
    state
        .get("user")?
        .get("userInfo")?
        .get("userId")?
        .as_str()
}

fn str_field<'a>(card: &'a Value, key: &str) -> &'a str {
    card.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Video entries from a decoded profile state, in page order.
#[must_use]
pub fn video_entries(state: &Value, base_url: &str) -> Vec<VideoListEntry> {
    let Some(notes) = state.get("user").and_then(|u| u.get("notes")) else {
        return Vec::new();
    };

    collect_note_entries(unwrap_reactive(notes))
        .into_iter()
        .filter_map(|entry| {
            let card = entry.get("noteCard")?;
            if str_field(card, "type") != "video" {
                return None;
            }
            let note_id = str_field(card, "noteId");
            if note_id.is_empty() {
                return None;
            }

            let title = match str_field(card, "displayTitle") {
                "" => str_field(card, "title"),
                display => display,
            };
            let xsec_token = str_field(card, "xsecToken");

            Some(VideoListEntry {
                note_id: note_id.to_string(),
                title: title.to_string(),
                url: note_url(base_url, note_id, xsec_token),
                xsec_token: xsec_token.to_string(),
                desc: str_field(card, "desc").to_string(),
            })
        })
        .collect()
}

/// Builds batch input documents from profile pages.
pub struct ProfileLister {
    source: SourceClient,
}

impl ProfileLister {
    #[must_use]
    pub fn new(source: SourceClient) -> Self {
        Self { source }
    }

    /// Fetch a profile and list its video notes.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidInput`] for a URL without a profile id or a
    /// page without decodable state, and [`TransferError::Network`] on fetch failure.
    pub async fn list(&self, profile_url: &str) -> Result<VideoList, TransferError> {
        let url_id = extract_profile_id(profile_url).ok_or_else(|| {
            TransferError::InvalidInput(format!("cannot find a profile id in {profile_url}"))
        })?;
        info!(profile_id = %url_id, "Fetching profile");

        let mut state = self.fetch_state(&url_id).await?.ok_or_else(|| {
            TransferError::InvalidInput(
                "profile page has no initial state; login may be required".to_string(),
            )
        })?;

        let user_id = state_user_id(&state).unwrap_or(&url_id).to_string();
        if user_id != url_id {
            // Notes are often empty when the page is requested by the public id
            debug!(user_id = %user_id, "Refetching profile with real user id");
            match self.fetch_state(&user_id).await {
                Ok(Some(second)) => state = second,
                Ok(None) => debug!("Refetched profile has no state, keeping first"),
                Err(e) => warn!(error = %e, "Refetch failed, keeping first profile state"),
            }
        }

        let videos = video_entries(&state, self.source.base_url());
        info!(user_id = %user_id, count = videos.len(), "Found video notes");

        Ok(VideoList {
            user_id,
            fetch_time: Local::now().format(RECORD_TIMESTAMP_FORMAT).to_string(),
            total_count: videos.len(),
            videos,
        })
    }

    /// List a profile and write the document as pretty JSON to `output`.
    ///
    /// # Errors
    ///
    /// See [`ProfileLister::list`]; also fails if the document cannot be written.
    pub async fn list_to_file(
        &self,
        profile_url: &str,
        output: &Path,
    ) -> Result<VideoList, TransferError> {
        let list = self.list(profile_url).await?;
        let json = serde_json::to_string_pretty(&list)
            .map_err(|e| TransferError::InvalidInput(format!("failed to encode video list: {e}")))?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::io(format!("failed to create {}", parent.display()), e))?;
        }
        tokio::fs::write(output, json)
            .await
            .map_err(|e| TransferError::io(format!("failed to write {}", output.display()), e))?;

        info!(path = %output.display(), "Saved video list");
        Ok(list)
    }

    async fn fetch_state(&self, profile_id: &str) -> Result<Option<Value>, TransferError> {
        let url = format!("{}/user/profile/{profile_id}", self.source.base_url());
        let page = self.source.fetch_page(&url).await?;
        Ok(parse_initial_state(&page))
    }
}
