//! Job progress reporting.
//!
//! One job runs 0 → 100 in fixed stages: page fetch 0–10, download 10–50,
//! authorization and preparation 50–60, upload 60–100. Sinks are called inline
//! with the work; a misbehaving sink never affects the job.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

pub const FETCH_START: f64 = 0.0;
pub const DOWNLOAD_START: f64 = 10.0;
pub const PREPARE_START: f64 = 50.0;
pub const UPLOAD_START: f64 = 60.0;
pub const DONE: f64 = 100.0;

/// Receiver of progress updates.
pub trait ProgressSink: Send + Sync {
    fn update(&self, percent: f64, status: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn update(&self, percent: f64, status: &str) {
        self(percent, status);
    }
}

/// Map a fraction of one stage onto the overall percentage.
#[must_use]
pub fn stage_percent(start: f64, end: f64, fraction: f64) -> f64 {
    start + (end - start) * fraction.clamp(0.0, 1.0)
}

/// Cloneable handle to an optional sink.
#[derive(Clone, Default)]
pub struct Progress {
    sink: Option<Arc<dyn ProgressSink>>,
}

impl Progress {
    #[must_use]
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// A handle that discards every update.
    #[must_use]
    pub fn silent() -> Self {
        Self::default()
    }

    /// Report overall progress. Panics raised by the sink are caught and logged.
    pub fn report(&self, percent: f64, status: &str) {
        let Some(sink) = &self.sink else {
            return;
        };
        let percent = percent.clamp(0.0, DONE);
        if catch_unwind(AssertUnwindSafe(|| sink.update(percent, status))).is_err() {
            warn!(percent, status, "Progress sink panicked, ignoring");
        }
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
