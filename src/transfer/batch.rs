//! Sequential batch transfer with skip-if-uploaded bookkeeping.
//!
//! Items run strictly one at a time with a random pause between them; a failed
//! item is recorded and the batch moves on.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use super::delay::DelayRange;
use super::pipeline::{ItemTransfer, TransferRequest};
use crate::constants::UNKNOWN_TITLE;
use crate::error::TransferError;
use crate::store::{UploadRecord, UploadRecordStore};
use crate::youtube::Privacy;

/// One entry of the batch input document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    #[serde(rename = "note_id", default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "desc", default)]
    pub description: Option<String>,
    #[serde(rename = "url", default, deserialize_with = "null_as_empty")]
    pub source_url: String,
    #[serde(rename = "xsec_token", default)]
    pub access_token: Option<String>,
}

/// Read a string field that list producers sometimes write as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl SourceItem {
    fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_TITLE)
    }
}

#[derive(Debug, Default, Deserialize)]
struct BatchInput {
    #[serde(default)]
    videos: Vec<SourceItem>,
}

/// Read the items of a batch input document.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable or not a batch document.
pub async fn load_batch_input(path: &Path) -> Result<Vec<SourceItem>, TransferError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TransferError::io(format!("failed to read video list {}", path.display()), e))?;
    let input: BatchInput = serde_json::from_str(&content).map_err(|e| {
        TransferError::InvalidInput(format!("invalid video list {}: {e}", path.display()))
    })?;
    Ok(input.videos)
}

/// Options shared by every item of a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub interval: DelayRange,
    pub privacy: Privacy,
    pub keep_local_file: bool,
    pub skip_if_uploaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub source_id: String,
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchResult {
    fn fail(&mut self, item: &SourceItem, error: impl Into<String>) {
        let error = error.into();
        warn!(note_id = %item.id, error = %error, "Item failed");
        self.failed += 1;
        self.failures.push(BatchFailure {
            source_id: item.id.clone(),
            title: item.display_title().to_string(),
            error,
        });
    }
}

/// Transfer every item in order. Never fails; per-item errors land in the result.
pub async fn run_batch(
    transfer: &dyn ItemTransfer,
    store: &UploadRecordStore,
    items: &[SourceItem],
    options: &BatchOptions,
) -> BatchResult {
    let mut result = BatchResult {
        total: items.len(),
        ..BatchResult::default()
    };
    if items.is_empty() {
        warn!("Video list is empty");
        return result;
    }

    let mut uploaded = if options.skip_if_uploaded {
        store.load().await
    } else {
        Default::default()
    };
    info!(total = items.len(), known = uploaded.len(), "Starting batch");

    for (i, item) in items.iter().enumerate() {
        info!(
            index = i + 1,
            total = items.len(),
            note_id = %item.id,
            title = %item.display_title(),
            "Processing item"
        );

        if options.skip_if_uploaded {
            if let Some(record) = uploaded.get(&item.id) {
                info!(note_id = %item.id, url = %record.destination_url, "Already uploaded, skipping");
                result.skipped += 1;
                continue;
            }
        }

        if item.source_url.is_empty() {
            result.fail(item, "missing URL");
            continue;
        }

        if i > 0 {
            options.interval.wait().await;
        }

        let request = TransferRequest {
            title: item.title.clone(),
            description: item.description.clone(),
            keep_local_file: options.keep_local_file,
            ..TransferRequest::new(item.source_url.clone(), options.privacy)
        };

        let outcome = match transfer.transfer(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                result.fail(item, e.to_string());
                continue;
            }
        };

        let title = item
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or(outcome.source_title);
        let record = UploadRecord::now(
            item.id.clone(),
            outcome.destination_id,
            outcome.destination_url,
            title,
        );

        if let Err(e) = store.save(&record).await {
            result.fail(
                item,
                format!("uploaded to {} but failed to record it: {e}", record.destination_url),
            );
            continue;
        }

        info!(note_id = %item.id, url = %record.destination_url, "Item uploaded");
        uploaded.insert(item.id.clone(), record);
        result.succeeded += 1;
    }

    info!(
        total = result.total,
        succeeded = result.succeeded,
        skipped = result.skipped,
        failed = result.failed,
        "Batch finished"
    );
    result
}
