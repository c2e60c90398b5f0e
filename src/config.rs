use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::youtube::Privacy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Files
    pub cookies_file: PathBuf,
    pub client_secrets_file: PathBuf,
    pub token_file: PathBuf,
    pub videos_dir: PathBuf,
    pub uploaded_file: PathBuf,
    pub video_list_file: PathBuf,

    // Endpoints
    pub source_base_url: String,
    pub youtube_upload_url: String,

    // Timeouts
    pub page_timeout: Duration,
    pub download_timeout: Duration,
    pub upload_timeout: Duration,

    // Batch
    pub batch_interval_min_secs: u64,
    pub batch_interval_max_secs: u64,
    pub skip_uploaded: bool,
    pub keep_local_files: bool,

    // Upload defaults
    pub default_privacy: Privacy,
    pub youtube_category_id: String,

    // Authorization
    pub auth_session_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = PathBuf::from(env_or_default("DATA_DIR", "."));

        Ok(Self {
            // Files
            cookies_file: env_path_or("COOKIES_FILE", &data_dir, "cookies.txt"),
            client_secrets_file: env_path_or("CLIENT_SECRETS_FILE", &data_dir, "credentials.json"),
            token_file: env_path_or("TOKEN_FILE", &data_dir, "token.json"),
            videos_dir: env_path_or("VIDEOS_DIR", &data_dir, "videos"),
            uploaded_file: env_path_or("UPLOADED_FILE", &data_dir, "uploaded.json"),
            video_list_file: env_path_or("VIDEO_LIST_FILE", &data_dir, "video_list.json"),

            // Endpoints
            source_base_url: env_or_default("SOURCE_BASE_URL", "https://www.xiaohongshu.com")
                .trim_end_matches('/')
                .to_string(),
            youtube_upload_url: env_or_default(
                "YOUTUBE_UPLOAD_URL",
                "https://www.googleapis.com/upload/youtube/v3/videos",
            ),

            // Timeouts
            page_timeout: Duration::from_secs(parse_env_u64("PAGE_TIMEOUT_SECS", 30)?),
            download_timeout: Duration::from_secs(parse_env_u64("DOWNLOAD_TIMEOUT_SECS", 120)?),
            upload_timeout: Duration::from_secs(parse_env_u64("UPLOAD_TIMEOUT_SECS", 300)?),

            // Batch
            batch_interval_min_secs: parse_env_u64("BATCH_INTERVAL_MIN_SECS", 10)?,
            batch_interval_max_secs: parse_env_u64("BATCH_INTERVAL_MAX_SECS", 30)?,
            skip_uploaded: parse_env_bool("SKIP_UPLOADED", true)?,
            keep_local_files: parse_env_bool("KEEP_LOCAL_FILES", false)?,

            // Upload defaults
            default_privacy: parse_privacy(&env_or_default("DEFAULT_PRIVACY", "public"))?,
            youtube_category_id: env_or_default("YOUTUBE_CATEGORY_ID", "22"),

            // Authorization
            auth_session_ttl: Duration::from_secs(parse_env_u64("AUTH_SESSION_TTL_SECS", 600)?),
        })
    }

    /// Configuration rooted in `dir`, with production defaults otherwise.
    #[must_use]
    pub fn for_testing(dir: &Path) -> Self {
        Self {
            cookies_file: dir.join("cookies.txt"),
            client_secrets_file: dir.join("credentials.json"),
            token_file: dir.join("token.json"),
            videos_dir: dir.join("videos"),
            uploaded_file: dir.join("uploaded.json"),
            video_list_file: dir.join("video_list.json"),
            source_base_url: "https://www.xiaohongshu.com".to_string(),
            youtube_upload_url: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
            page_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(5),
            upload_timeout: Duration::from_secs(5),
            batch_interval_min_secs: 0,
            batch_interval_max_secs: 0,
            skip_uploaded: true,
            keep_local_files: false,
            default_privacy: Privacy::Private,
            youtube_category_id: "22".to_string(),
            auth_session_ttl: Duration::from_secs(600),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_interval_min_secs > self.batch_interval_max_secs {
            return Err(ConfigError::InvalidValue {
                name: "BATCH_INTERVAL_MIN_SECS".to_string(),
                message: format!(
                    "must not exceed BATCH_INTERVAL_MAX_SECS ({} > {})",
                    self.batch_interval_min_secs, self.batch_interval_max_secs
                ),
            });
        }
        if self.youtube_category_id.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "YOUTUBE_CATEGORY_ID".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.auth_session_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "AUTH_SESSION_TTL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_string())
}

fn env_path_or(name: &str, data_dir: &Path, file_name: &str) -> PathBuf {
    optional_env(name).map_or_else(|| data_dir.join(file_name), PathBuf::from)
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

fn parse_privacy(value: &str) -> Result<Privacy, ConfigError> {
    value.parse().map_err(|message| ConfigError::InvalidValue {
        name: "DEFAULT_PRIVACY".to_string(),
        message,
    })
}
