//! Netscape-format cookie jar loading.
//!
//! Exported `cookies.txt` files carry one cookie per line as seven tab-separated
//! fields; the sixth and seventh are the name and value. Comment lines (including
//! the `#HttpOnly_` prefixed ones some exporters write) and blank lines are skipped.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

/// Cookie name → value mapping for the source site.
pub type CookieMap = BTreeMap<String, String>;

/// Parse the contents of a Netscape cookie jar.
#[must_use]
pub fn parse_netscape_cookies(content: &str) -> CookieMap {
    let mut cookies = CookieMap::new();
    for line in content.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.trim().split('\t').collect();
        if parts.len() >= 7 {
            cookies.insert(parts[5].to_string(), parts[6].to_string());
        }
    }
    cookies
}

/// Load a cookie jar from disk. A missing or unreadable file yields no cookies.
pub async fn load_cookie_file(path: &Path) -> CookieMap {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let cookies = parse_netscape_cookies(&content);
            debug!(path = %path.display(), count = cookies.len(), "Loaded cookies");
            cookies
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No cookie file, continuing without cookies");
            CookieMap::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read cookie file");
            CookieMap::new()
        }
    }
}

/// Build a `Cookie` request header value, or `None` when the jar is empty.
#[must_use]
pub fn cookie_header(cookies: &CookieMap) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Whether the jar text holds at least one non-comment, non-blank line.
#[must_use]
pub fn has_cookie_lines(content: &str) -> bool {
    content
        .lines()
        .any(|line| !line.trim().is_empty() && !line.starts_with('#'))
}
