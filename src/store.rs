//! Upload record store.
//!
//! A single JSON document maps source item ids to the video they became:
//!
//! ```json
//! { "records": { "<note id>": { "youtube_id": "…", "youtube_url": "…",
//!                               "title": "…", "uploaded_at": "YYYY-MM-DD HH:MM:SS" } } }
//! ```
//!
//! Every save reads the document, merges one record and rewrites the whole file.
//! Callers must not run two writers against the same path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::RECORD_TIMESTAMP_FORMAT;
use crate::error::TransferError;

/// A completed upload of one source item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub source_id: String,
    pub destination_id: String,
    pub destination_url: String,
    pub title: String,
    pub uploaded_at: String,
}

impl UploadRecord {
    /// Record stamped with the current local time.
    #[must_use]
    pub fn now(
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        destination_url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            destination_url: destination_url.into(),
            title: title.into(),
            uploaded_at: Local::now().format(RECORD_TIMESTAMP_FORMAT).to_string(),
        }
    }

    fn from_stored(source_id: String, stored: StoredRecord) -> Self {
        Self {
            source_id,
            destination_id: stored.youtube_id,
            destination_url: stored.youtube_url,
            title: stored.title,
            uploaded_at: stored.uploaded_at,
        }
    }

    fn to_stored(&self) -> StoredRecord {
        StoredRecord {
            youtube_id: self.destination_id.clone(),
            youtube_url: self.destination_url.clone(),
            title: self.title.clone(),
            uploaded_at: self.uploaded_at.clone(),
        }
    }
}

/// On-disk shape of one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(default)]
    youtube_id: String,
    #[serde(default)]
    youtube_url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    uploaded_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    records: BTreeMap<String, StoredRecord>,
}

#[derive(Debug, Error)]
enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt record document {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistent mapping from source id to upload record.
#[derive(Debug, Clone)]
pub struct UploadRecordStore {
    path: PathBuf,
}

impl UploadRecordStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record. A missing, unreadable or corrupt document yields an
    /// empty mapping.
    pub async fn load(&self) -> BTreeMap<String, UploadRecord> {
        match self.read_document().await {
            Ok(document) => document
                .records
                .into_iter()
                .map(|(id, stored)| (id.clone(), UploadRecord::from_stored(id, stored)))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Ignoring unusable upload record document");
                BTreeMap::new()
            }
        }
    }

    /// Look up the record for one source id.
    pub async fn is_uploaded(&self, source_id: &str) -> Option<UploadRecord> {
        self.load().await.remove(source_id)
    }

    /// Merge a record into the document, replacing any record with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub async fn save(&self, record: &UploadRecord) -> Result<(), TransferError> {
        let mut document = match self.read_document().await {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Rewriting unusable upload record document");
                StoreDocument::default()
            }
        };
        document
            .records
            .insert(record.source_id.clone(), record.to_stored());

        let json = serde_json::to_string_pretty(&document).map_err(|e| {
            TransferError::InvalidInput(format!("failed to encode upload records: {e}"))
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TransferError::io(format!("failed to create {}", parent.display()), e)
            })?;
        }
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            TransferError::io(format!("failed to write {}", self.path.display()), e)
        })?;

        info!(
            source_id = %record.source_id,
            destination_id = %record.destination_id,
            "Saved upload record"
        );
        Ok(())
    }

    async fn read_document(&self) -> Result<StoreDocument, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No upload record document yet");
                return Ok(StoreDocument::default());
            }
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}
