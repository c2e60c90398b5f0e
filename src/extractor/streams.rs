//! Video stream discovery and watermark-aware selection.
//!
//! Note pages embed a `"stream"` object with one array per codec family:
//!
//! ```text
//! "stream":{"h264":[{"masterUrl":"http://…","streamDesc":"WM_X264_MP4",…}],
//!           "h265":[{"masterUrl":"…","streamDesc":"X265_MP4_WEB_114",…}],"av1":[]}
//! ```
//!
//! Entries whose descriptor carries the watermark marker are the overlay copies
//! the web player shows; the others are the clean originals.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::unescape_js_string;
use crate::constants::{WATERMARK_INFIX, WATERMARK_PREFIX};

static H264_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"h264"\s*:\s*\[(.*?)\]\s*(?:,\s*"h265"|\})"#).unwrap()
});

static H265_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"h265"\s*:\s*\[(.*?)\]\s*(?:,\s*"av1"|,\s*"h266"|\})"#).unwrap()
});

static MASTER_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""masterUrl"\s*:\s*"([^"]+)""#).unwrap());

static STREAM_DESC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""streamDesc"\s*:\s*"([^"]+)""#).unwrap());

/// Codec family a stream belongs to, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    H264,
    H265,
}

impl Codec {
    /// Families in the order their entries are considered.
    pub const ALL: [Codec; 2] = [Codec::H264, Codec::H265];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
        }
    }

    fn block_pattern(self) -> &'static Regex {
        match self {
            Self::H264 => &H264_BLOCK,
            Self::H265 => &H265_BLOCK,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playable candidate found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    /// Absolute, unescaped media URL.
    pub url: String,
    pub codec: Codec,
    /// Descriptor string as published by the site (e.g. `X264_MP4`).
    pub description: String,
    pub is_watermarked: bool,
}

/// The chosen stream plus a human-readable summary of the choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedStream {
    pub stream: MediaStream,
    pub info: String,
}

/// Whether a stream descriptor denotes a watermarked copy.
#[must_use]
pub fn is_watermarked(description: &str) -> bool {
    description.starts_with(WATERMARK_PREFIX) || description.contains(WATERMARK_INFIX)
}

/// Collect every stream entry of every codec family, in family-then-position order.
///
/// A family whose block is absent contributes nothing.
#[must_use]
pub fn find_streams(page_text: &str) -> Vec<MediaStream> {
    Codec::ALL
        .iter()
        .flat_map(|&codec| family_streams(page_text, codec))
        .collect()
}

fn family_streams(page_text: &str, codec: Codec) -> Vec<MediaStream> {
    let Some(block) = family_block(page_text, codec) else {
        return Vec::new();
    };

    let urls = MASTER_URL
        .captures_iter(block)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str());
    let descriptions = STREAM_DESC
        .captures_iter(block)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str());

    urls.zip(descriptions)
        .map(|(url, description)| MediaStream {
            url: unescape_js_string(url),
            codec,
            description: description.to_string(),
            is_watermarked: is_watermarked(description),
        })
        .collect()
}

fn family_block(page_text: &str, codec: Codec) -> Option<&str> {
    codec
        .block_pattern()
        .captures(page_text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Pick the first unwatermarked stream, falling back to the first stream overall.
#[must_use]
pub fn choose_stream(streams: &[MediaStream]) -> Option<&MediaStream> {
    streams
        .iter()
        .find(|s| !s.is_watermarked)
        .or_else(|| streams.first())
}

/// Find the best playable stream on a page.
///
/// Returns `None` when neither family holds any entry; callers treat that as an
/// image note or a login wall.
#[must_use]
pub fn select_best_stream(page_text: &str) -> Option<SelectedStream> {
    let streams = find_streams(page_text);
    let best = choose_stream(&streams)?.clone();

    let info = if best.is_watermarked {
        debug!(desc = %best.description, "No unwatermarked stream, using first available");
        format!("{} ({})", best.codec, best.description)
    } else {
        debug!(desc = %best.description, "Found unwatermarked stream");
        format!("{} unwatermarked ({})", best.codec, best.description)
    };

    Some(SelectedStream { stream: best, info })
}
