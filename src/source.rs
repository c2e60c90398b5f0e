//! HTTP access to the source site.

use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use tracing::debug;

use crate::config::Config;
use crate::constants::BROWSER_USER_AGENT;
use crate::cookies::{cookie_header, load_cookie_file, CookieMap};
use crate::error::TransferError;

/// Page fetcher that presents the user's cookies and a desktop browser identity.
#[derive(Clone)]
pub struct SourceClient {
    http: reqwest::Client,
    base_url: String,
    cookie_count: usize,
}

impl SourceClient {
    /// Build a client from configuration and an already-loaded cookie jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or a cookie value is not
    /// a valid header.
    pub fn new(config: &Config, cookies: &CookieMap) -> Result<Self, TransferError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie_header(cookies) {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| TransferError::InvalidInput(format!("unusable cookie value: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .timeout(config.page_timeout)
            .build()
            .map_err(|e| TransferError::network("failed to build HTTP client", e))?;

        Ok(Self {
            http,
            base_url: config.source_base_url.clone(),
            cookie_count: cookies.len(),
        })
    }

    /// Build a client, loading the cookie jar named in the configuration.
    ///
    /// # Errors
    ///
    /// See [`SourceClient::new`].
    pub async fn from_config(config: &Config) -> Result<Self, TransferError> {
        let cookies = load_cookie_file(&config.cookies_file).await;
        Self::new(config, &cookies)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn cookie_count(&self) -> usize {
        self.cookie_count
    }

    /// Fetch a page and return its body text.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Network`] on connection failure, timeout or a
    /// non-success status.
    pub async fn fetch_page(&self, url: &str) -> Result<String, TransferError> {
        debug!(url = %url, cookies = self.cookie_count, "Fetching page");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransferError::network(format!("failed to fetch {url}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Network(format!(
                "page fetch returned {status} for {url}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| TransferError::network(format!("failed to read body of {url}"), e))
    }
}
