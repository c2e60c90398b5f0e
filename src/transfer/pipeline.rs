//! Single-item transfer: page → metadata → file → upload → cleanup.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::progress::{
    stage_percent, Progress, DONE, DOWNLOAD_START, FETCH_START, PREPARE_START, UPLOAD_START,
};
use crate::constants::ATTRIBUTION_LINE;
use crate::downloader::Downloader;
use crate::error::TransferError;
use crate::extractor::{extract, ExtractedMetadata};
use crate::source::SourceClient;
use crate::youtube::{Privacy, Uploader, VideoMetadata};

/// Everything needed to copy one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source_url: String,
    /// Used instead of the page title when non-empty.
    pub title: Option<String>,
    /// Used instead of the page description when non-empty.
    pub description: Option<String>,
    pub english_title: Option<String>,
    /// Replaces the generated description entirely when non-empty.
    pub custom_description: Option<String>,
    pub tags: Vec<String>,
    pub privacy: Privacy,
    pub keep_local_file: bool,
}

impl TransferRequest {
    #[must_use]
    pub fn new(source_url: impl Into<String>, privacy: Privacy) -> Self {
        Self {
            source_url: source_url.into(),
            title: None,
            description: None,
            english_title: None,
            custom_description: None,
            tags: Vec::new(),
            privacy,
            keep_local_file: false,
        }
    }
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub destination_id: String,
    pub destination_url: String,
    /// Title the video was published under.
    pub title: String,
    /// Title of the note itself, before composition.
    pub source_title: String,
    /// Path of the downloaded file when it was kept.
    pub local_file: Option<PathBuf>,
}

/// Published title: `【original】english` when an English title is given.
#[must_use]
pub fn compose_title(original: &str, english: Option<&str>) -> String {
    match english.filter(|e| !e.is_empty()) {
        Some(english) => format!("【{original}】{english}"),
        None => original.to_string(),
    }
}

/// Published description: the custom text, else the original plus the
/// attribution line.
#[must_use]
pub fn compose_description(original: &str, custom: Option<&str>) -> String {
    if let Some(custom) = custom.filter(|c| !c.is_empty()) {
        return custom.to_string();
    }
    if original.is_empty() {
        ATTRIBUTION_LINE.to_string()
    } else {
        format!("{original}\n\n{ATTRIBUTION_LINE}")
    }
}

/// Anything that can carry one item end to end.
#[async_trait]
pub trait ItemTransfer: Send + Sync {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome, TransferError>;
}

/// The production transfer: source site → local file → uploader.
pub struct TransferPipeline {
    source: SourceClient,
    downloader: Downloader,
    uploader: Arc<dyn Uploader>,
    category_id: String,
    progress: Progress,
}

impl TransferPipeline {
    #[must_use]
    pub fn new(
        source: SourceClient,
        downloader: Downloader,
        uploader: Arc<dyn Uploader>,
        category_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            downloader,
            uploader,
            category_id: category_id.into(),
            progress: Progress::silent(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Fetch a note page and extract its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Network`] if the page cannot be fetched and
    /// [`TransferError::NoPlayableStream`] if it holds no video.
    pub async fn fetch_metadata(
        &self,
        source_url: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<ExtractedMetadata, TransferError> {
        self.progress.report(FETCH_START, "Fetching note page");
        let page = self.source.fetch_page(source_url).await?;
        let metadata = extract(&page, title, description)?;
        info!(
            title = %metadata.title,
            stream = %metadata.stream_info,
            duration_secs = metadata.duration_secs,
            "Resolved note"
        );
        Ok(metadata)
    }
}

#[async_trait]
impl ItemTransfer for TransferPipeline {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome, TransferError> {
        info!(url = %request.source_url, "Starting transfer");

        let metadata = self
            .fetch_metadata(
                &request.source_url,
                request.title.as_deref(),
                request.description.as_deref(),
            )
            .await?;

        self.progress.report(DOWNLOAD_START, "Downloading video");
        let progress = self.progress.clone();
        let asset = self
            .downloader
            .download(&metadata.stream_url, &move |fraction: f64| {
                progress.report(
                    stage_percent(DOWNLOAD_START, PREPARE_START, fraction),
                    "Downloading video",
                );
            })
            .await?;

        let title = compose_title(&metadata.title, request.english_title.as_deref());
        let description =
            compose_description(&metadata.description, request.custom_description.as_deref());
        let video = VideoMetadata {
            title: title.clone(),
            description,
            tags: request.tags.clone(),
            category_id: self.category_id.clone(),
            privacy: request.privacy,
        };

        self.progress.report(PREPARE_START, "Preparing upload");
        debug!(title = %video.title, privacy = %video.privacy, "Prepared upload metadata");

        self.progress.report(UPLOAD_START, "Uploading video");
        let progress = self.progress.clone();
        let uploaded = self
            .uploader
            .upload(&asset.path, &video, &move |fraction: f64| {
                progress.report(stage_percent(UPLOAD_START, DONE, fraction), "Uploading video");
            })
            .await
            .inspect_err(|e| {
                debug!(path = %asset.path.display(), error = %e, "Upload failed, local file kept");
            })?;

        let local_file = if request.keep_local_file {
            Some(asset.path)
        } else {
            match tokio::fs::remove_file(&asset.path).await {
                Ok(()) => debug!(path = %asset.path.display(), "Removed local file"),
                Err(e) => warn!(path = %asset.path.display(), error = %e, "Failed to remove local file"),
            }
            None
        };

        self.progress.report(DONE, "Done");
        info!(video_id = %uploaded.id, url = %uploaded.url, "Transfer complete");

        Ok(TransferOutcome {
            destination_id: uploaded.id,
            destination_url: uploaded.url,
            title,
            source_title: metadata.title,
            local_file,
        })
    }
}
