//! Streaming media download to a local file.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::BROWSER_USER_AGENT;
use crate::error::TransferError;

/// Bytes written per write call.
const CHUNK_SIZE: usize = 8 * 1024;

/// Length of the random file stem.
const FILE_ID_LEN: usize = 8;

/// A downloaded file owned by the current transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Random file name for a new download.
fn random_file_name() -> String {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(FILE_ID_LEN)
        .map(char::from)
        .collect();
    format!("{id}.mp4")
}

/// Fetches media files into a directory.
#[derive(Clone)]
pub struct Downloader {
    http: reqwest::Client,
    output_dir: PathBuf,
}

impl Downloader {
    /// `download_timeout` bounds connecting and each wait for body bytes, not the
    /// whole transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, TransferError> {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .connect_timeout(config.download_timeout)
            .read_timeout(config.download_timeout)
            .build()
            .map_err(|e| TransferError::network("failed to build HTTP client", e))?;

        Ok(Self {
            http,
            output_dir: config.videos_dir.clone(),
        })
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Stream `url` into a freshly named file under the output directory.
    ///
    /// `on_progress` receives the downloaded fraction (0.0–1.0) whenever its whole
    /// percentage changes; it is never called when the size is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Network`] for connection, timeout or status
    /// failures and [`TransferError::Io`] for local write failures. A partially
    /// written file is removed.
    pub async fn download(
        &self,
        url: &str,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<LocalAsset, TransferError> {
        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            TransferError::io(format!("failed to create {}", self.output_dir.display()), e)
        })?;

        let path = self.output_dir.join(random_file_name());
        info!(url = %url, path = %path.display(), "Downloading video");

        match self.stream_to_file(url, &path, on_progress).await {
            Ok(size_bytes) => {
                info!(
                    path = %path.display(),
                    size_mb = %format!("{:.2}", size_bytes as f64 / (1024.0 * 1024.0)),
                    "Download complete"
                );
                Ok(LocalAsset { path, size_bytes })
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %path.display(), error = %remove_err, "Failed to remove partial download");
                    }
                }
                Err(e)
            }
        }
    }

    async fn stream_to_file(
        &self,
        url: &str,
        path: &Path,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<u64, TransferError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransferError::network(format!("failed to request {url}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Network(format!(
                "download returned {status} for {url}"
            )));
        }

        let total_size = response.content_length().filter(|&n| n > 0);
        debug!(total_size = ?total_size, "Download started");

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| TransferError::io(format!("failed to create {}", path.display()), e))?;

        let mut downloaded: u64 = 0;
        let mut last_percent: Option<u64> = None;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransferError::network("error reading download body", e))?;

            for piece in chunk.chunks(CHUNK_SIZE) {
                file.write_all(piece)
                    .await
                    .map_err(|e| TransferError::io(format!("failed to write {}", path.display()), e))?;
                downloaded += piece.len() as u64;

                if let Some(total) = total_size {
                    let fraction = (downloaded as f64 / total as f64).min(1.0);
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let percent = (fraction * 100.0) as u64;
                    if last_percent != Some(percent) {
                        last_percent = Some(percent);
                        on_progress(fraction);
                    }
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| TransferError::io(format!("failed to flush {}", path.display()), e))?;

        Ok(downloaded)
    }
}
