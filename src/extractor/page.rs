//! Note page metadata extraction.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::streams::select_best_stream;
use super::unescape_js_string;
use crate::constants::{BOILERPLATE_TITLE_MARKER, SITE_NAME, SITE_TITLE_SUFFIX, UNKNOWN_TITLE};
use crate::error::TransferError;

static HTML_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>([^<]+)</title>").unwrap());

static DISPLAY_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""displayTitle"\s*:\s*"([^"]*)""#).unwrap());

static DESC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""desc"\s*:\s*"([^"\\]*(?:\\.[^"\\]*)*)""#).unwrap());

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""duration"\s*:\s*(\d+)"#).unwrap());

/// Everything the transfer needs to know about one note page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMetadata {
    pub title: String,
    pub description: String,
    pub duration_secs: u64,
    pub stream_url: String,
    pub stream_info: String,
}

/// Extract title, description, duration and the best stream from a note page.
///
/// Non-empty overrides replace the page's own title/description.
///
/// # Errors
///
/// Returns [`TransferError::NoPlayableStream`] if the page has no stream entries.
pub fn extract(
    page_text: &str,
    title_override: Option<&str>,
    description_override: Option<&str>,
) -> Result<ExtractedMetadata, TransferError> {
    let title = match non_empty(title_override) {
        Some(title) => title.to_string(),
        None => resolve_title(page_text),
    };
    let description = match non_empty(description_override) {
        Some(desc) => desc.to_string(),
        None => description(page_text).unwrap_or_default(),
    };
    let duration_secs = raw_duration(page_text).map_or(0, normalize_duration);

    let selected = select_best_stream(page_text).ok_or(TransferError::NoPlayableStream)?;

    debug!(
        title = %title,
        duration_secs,
        stream = %selected.info,
        "Extracted note metadata"
    );

    Ok(ExtractedMetadata {
        title,
        description,
        duration_secs,
        stream_url: selected.stream.url,
        stream_info: selected.info,
    })
}

/// Convert a raw duration to seconds.
///
/// The page gives no unit; values of 1000 and above are taken as milliseconds.
#[must_use]
pub fn normalize_duration(raw: u64) -> u64 {
    if raw < 1000 {
        raw
    } else {
        raw / 1000
    }
}

/// Title from the HTML `<title>`, then the embedded `displayTitle`, then a sentinel.
#[must_use]
pub fn resolve_title(page_text: &str) -> String {
    if let Some(title) = html_title(page_text) {
        if !is_unusable_title(&title) {
            return title;
        }
    }
    display_title(page_text).unwrap_or_else(|| UNKNOWN_TITLE.to_string())
}

fn is_unusable_title(title: &str) -> bool {
    // Substring match; a real title containing the marker is misread as boilerplate.
    title.is_empty() || title == UNKNOWN_TITLE || title.contains(BOILERPLATE_TITLE_MARKER)
}

/// `<title>` content with the site suffix removed.
#[must_use]
pub fn html_title(page_text: &str) -> Option<String> {
    let raw = HTML_TITLE.captures(page_text)?.get(1)?.as_str();

    let title = if let Some((head, _)) = raw.split_once(SITE_TITLE_SUFFIX) {
        head.trim().to_string()
    } else if raw.contains(SITE_NAME) && raw.chars().count() > 10 {
        raw.replace(SITE_NAME, "").trim().to_string()
    } else {
        raw.trim().to_string()
    };
    Some(title)
}

/// Non-empty `displayTitle` from the embedded state.
#[must_use]
pub fn display_title(page_text: &str) -> Option<String> {
    DISPLAY_TITLE
        .captures(page_text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|t| !t.is_empty())
        .map(unescape_js_string)
}

/// First `desc` string in the embedded state, unescaped.
#[must_use]
pub fn description(page_text: &str) -> Option<String> {
    DESC.captures(page_text)
        .and_then(|c| c.get(1))
        .map(|m| unescape_js_string(m.as_str()))
}

/// First integer `duration` field, in whatever unit the page uses.
#[must_use]
pub fn raw_duration(page_text: &str) -> Option<u64> {
    DURATION
        .captures(page_text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
