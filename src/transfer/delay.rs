//! Randomized pause between batch items.

use std::time::Duration;

use rand::Rng;
use tracing::info;

/// Inclusive range of whole seconds to wait between source-site requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min_secs: u64,
    max_secs: u64,
}

impl DelayRange {
    /// Create a range; reversed bounds are swapped.
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: min_secs.max(max_secs),
        }
    }

    /// A range that never waits.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    #[must_use]
    pub fn min_secs(&self) -> u64 {
        self.min_secs
    }

    #[must_use]
    pub fn max_secs(&self) -> u64 {
        self.max_secs
    }

    /// Draw a uniformly random whole-second delay from the range.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs(rng.gen_range(self.min_secs..=self.max_secs))
    }

    /// Sleep for a random delay from the range.
    pub async fn wait(&self) {
        let delay = self.pick(&mut rand::thread_rng());
        if delay.is_zero() {
            return;
        }
        info!(secs = delay.as_secs(), "Waiting before next item");
        tokio::time::sleep(delay).await;
    }
}
