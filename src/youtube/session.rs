//! Pending authorization sessions.
//!
//! Starting an authorization hands the caller a random session token; the code
//! the user brings back is only accepted together with that token, once, and
//! before the session expires.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use thiserror::Error;
use tracing::debug;

use crate::error::TransferError;

/// Generate a random 64-character session token.
#[must_use]
pub fn generate_session_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown authorization session; start a new authorization")]
    Unknown,
    #[error("authorization session expired; start a new authorization")]
    Expired,
}

impl From<SessionError> for TransferError {
    fn from(err: SessionError) -> Self {
        Self::Auth(err.to_string())
    }
}

struct Entry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

/// Token-keyed store of pending sessions with a fixed lifetime.
pub struct AuthSessions<T> {
    ttl: TimeDelta,
    entries: Mutex<HashMap<String, Entry<T>>>,
}

impl<T> AuthSessions<T> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a session and return its token and expiry.
    pub fn begin(&self, value: T) -> (String, DateTime<Utc>) {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let token = generate_session_token();

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(token.clone(), Entry { value, expires_at });
        debug!(pending = entries.len(), "Authorization session started");

        (token, expires_at)
    }

    /// Consume a session. A token can be taken at most once.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unknown`] for a token never issued or already used
    /// and [`SessionError::Expired`] for one past its expiry.
    pub fn take(&self, token: &str) -> Result<T, SessionError> {
        let entry = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .ok_or(SessionError::Unknown)?;

        if Utc::now() >= entry.expires_at {
            return Err(SessionError::Expired);
        }
        Ok(entry.value)
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
