//! Xiaohongshu → YouTube video copier.
//!
//! Scrapes a note's share page for its best (preferably unwatermarked) video
//! stream, downloads it and re-publishes it through the YouTube Data API, either
//! one note at a time or over a list with skip-if-uploaded bookkeeping.

#![allow(clippy::needless_raw_string_hashes)]

pub mod config;
pub mod constants;
pub mod cookies;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod source;
pub mod store;
pub mod transfer;
pub mod youtube;

pub use error::TransferError;
