//! Shared constants used across the application.

/// User agent string used for requests against the source site.
///
/// The share pages only embed the stream manifest for ordinary desktop browsers.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Site name appended to every page `<title>`.
pub const SITE_NAME: &str = "小红书";

/// Suffix the site appends to page titles (`"<title> - 小红书"`).
pub const SITE_TITLE_SUFFIX: &str = " - 小红书";

/// Title used when nothing usable can be extracted.
pub const UNKNOWN_TITLE: &str = "未知标题";

/// Substring that marks a page title as a licence/boilerplate notice.
pub const BOILERPLATE_TITLE_MARKER: &str = "ICP";

/// Attribution line appended to every generated description ("original content").
pub const ATTRIBUTION_LINE: &str = "原创";

/// Stream descriptors starting with this token carry a visible watermark.
pub const WATERMARK_PREFIX: &str = "WM";

/// Stream descriptors containing this token anywhere carry a visible watermark.
pub const WATERMARK_INFIX: &str = "WM_";

/// Public watch URL prefix for uploaded videos.
pub const YOUTUBE_WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// OAuth scope required for uploads.
pub const YOUTUBE_UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// Out-of-band redirect URI: the user copies the code from the browser.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Timestamp layout used in the upload record document.
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
