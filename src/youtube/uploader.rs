//! Resumable uploads to the YouTube Data API v3.
//!
//! An upload is two phases: a POST with the video resource opens a session whose
//! URI comes back in `Location`, then the file is PUT to that URI in chunks, each
//! tagged with its `Content-Range`. The server answers `308` until the last chunk
//! lands and then returns the created video resource.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use super::oauth::CredentialProvider;
use super::{UploadedVideo, Uploader, VideoMetadata};
use crate::config::Config;
use crate::error::TransferError;

/// Bytes sent per PUT. Must be a multiple of 256 KiB.
const CHUNK_SIZE: u64 = 1024 * 1024;

const DEFAULT_CONTENT_TYPE: &str = "video/*";

/// Consecutive `308`s without progress tolerated before giving up.
const MAX_STALLED_CHUNKS: u32 = 3;

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

/// Uploader backed by the YouTube Data API.
pub struct YouTubeUploader {
    http: reqwest::Client,
    upload_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl YouTubeUploader {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: &Config,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, TransferError> {
        // 308 is the resume protocol's "continue", never a redirect
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.upload_timeout)
            .build()
            .map_err(|e| TransferError::network("failed to build HTTP client", e))?;

        Ok(Self {
            http,
            upload_url: config.youtube_upload_url.clone(),
            credentials,
        })
    }

    async fn open_session(
        &self,
        access_token: &str,
        metadata: &VideoMetadata,
        content_type: &str,
        file_size: u64,
    ) -> Result<String, TransferError> {
        let body = json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "tags": metadata.tags,
                "categoryId": metadata.category_id,
            },
            "status": {
                "privacyStatus": metadata.privacy.as_str(),
                "selfDeclaredMadeForKids": false,
            },
        });

        let response = self
            .http
            .post(&self.upload_url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| TransferError::Upload(format!("failed to start upload: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error("upload initiation", status, response).await);
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                TransferError::Upload("upload initiation returned no session URI".to_string())
            })
    }

    async fn send_chunks(
        &self,
        session_uri: &str,
        access_token: &str,
        file: &Path,
        content_type: &str,
        file_size: u64,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<String, TransferError> {
        let mut reader = tokio::fs::File::open(file)
            .await
            .map_err(|e| TransferError::io(format!("failed to open {}", file.display()), e))?;
        let mut offset = 0u64;
        let mut stalled = 0u32;

        loop {
            let len = CHUNK_SIZE.min(file_size - offset);
            let mut buffer = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
            reader
                .seek(std::io::SeekFrom::Start(offset))
                .await
                .map_err(|e| TransferError::io(format!("failed to seek {}", file.display()), e))?;
            (&mut reader)
                .take(len)
                .read_to_end(&mut buffer)
                .await
                .map_err(|e| TransferError::io(format!("failed to read {}", file.display()), e))?;

            let end = offset + buffer.len() as u64;
            if end == offset {
                return Err(TransferError::Upload(format!(
                    "file {} shrank during upload",
                    file.display()
                )));
            }

            let response = self
                .http
                .put(session_uri)
                .bearer_auth(access_token)
                .header(CONTENT_TYPE, content_type)
                .header(CONTENT_RANGE, format!("bytes {offset}-{}/{file_size}", end - 1))
                .body(buffer)
                .send()
                .await
                .map_err(|e| TransferError::Upload(format!("chunk at byte {offset} failed: {e}")))?;

            let status = response.status();
            match status.as_u16() {
                200 | 201 => {
                    on_progress(1.0);
                    let video: VideoResource = response.json().await.map_err(|e| {
                        TransferError::Upload(format!("invalid upload response: {e}"))
                    })?;
                    return Ok(video.id);
                }
                308 => {
                    // No Range header: the server has stored nothing yet
                    let confirmed = response
                        .headers()
                        .get(RANGE)
                        .and_then(|v| v.to_str().ok())
                        .and_then(next_offset_from_range)
                        .unwrap_or(0)
                        .min(end);

                    if confirmed > offset {
                        stalled = 0;
                        on_progress(confirmed as f64 / file_size as f64);
                    } else {
                        stalled += 1;
                        if stalled > MAX_STALLED_CHUNKS {
                            return Err(TransferError::Upload(format!(
                                "server stopped accepting data at byte {confirmed}"
                            )));
                        }
                        warn!(offset, confirmed, "Upload chunk not stored, resending");
                    }
                    offset = confirmed;
                    debug!(offset, file_size, "Upload chunk accepted");
                    if offset >= file_size {
                        return Err(TransferError::Upload(
                            "server accepted every byte but returned no video".to_string(),
                        ));
                    }
                }
                _ => return Err(status_error("chunk upload", status, response).await),
            }
        }
    }
}

/// Next byte to send given a `Range: bytes=0-N` response header.
fn next_offset_from_range(range: &str) -> Option<u64> {
    let (_, last) = range.trim().strip_prefix("bytes=")?.split_once('-')?;
    last.trim().parse::<u64>().ok().map(|n| n + 1)
}

async fn status_error(stage: &str, status: StatusCode, response: reqwest::Response) -> TransferError {
    let body = response.text().await.unwrap_or_default();
    let message = format!("{stage} returned {status}: {body}");
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        TransferError::Auth(message)
    } else {
        TransferError::Upload(message)
    }
}

#[async_trait]
impl Uploader for YouTubeUploader {
    async fn upload(
        &self,
        file: &Path,
        metadata: &VideoMetadata,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<UploadedVideo, TransferError> {
        let file_size = tokio::fs::metadata(file)
            .await
            .map_err(|e| TransferError::io(format!("failed to stat {}", file.display()), e))?
            .len();
        if file_size == 0 {
            return Err(TransferError::Upload(format!("{} is empty", file.display())));
        }

        let content_type = mime_guess::from_path(file)
            .first()
            .map_or_else(|| DEFAULT_CONTENT_TYPE.to_string(), |m| m.essence_str().to_string());

        let auth = self.credentials.access_context().await?;

        info!(
            file = %file.display(),
            size_mb = file_size / 1_024 / 1_024,
            title = %metadata.title,
            privacy = %metadata.privacy,
            "Starting YouTube upload"
        );

        let session_uri = self
            .open_session(&auth.access_token, metadata, &content_type, file_size)
            .await?;
        debug!(session_uri = %session_uri, "Upload session opened");

        let id = self
            .send_chunks(
                &session_uri,
                &auth.access_token,
                file,
                &content_type,
                file_size,
                on_progress,
            )
            .await?;

        let video = UploadedVideo::from_id(id);
        info!(video_id = %video.id, url = %video.url, "Upload complete");
        Ok(video)
    }
}
