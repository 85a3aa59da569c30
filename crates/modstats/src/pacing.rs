//! Fixed-duration pauses used as the pipeline's only rate-limiting device.
//!
//! Components never call `tokio::time::sleep` directly; they go through a
//! [`Pacer`] so tests can count pauses instead of waiting them out.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Why a component is pausing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Backoff between two failed session warm-up attempts.
    SessionRetry,
    /// Grace period after a successful warm-up.
    SessionSettle,
    /// Between two dependents-page fetches.
    PageFetch,
    /// After every full batch of enrichment lookups.
    ResolutionBatch,
}

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, reason: PauseReason, duration: Duration);
}

/// Blocks the pipeline for the requested duration.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepPacer;

#[async_trait]
impl Pacer for SleepPacer {
    async fn pause(&self, reason: PauseReason, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tracing::debug!("pausing {:?} ({reason:?})", duration);
        tokio::time::sleep(duration).await;
    }
}

/// Records pauses without sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<(PauseReason, Duration)>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded pause, in order.
    pub fn pauses(&self) -> Vec<(PauseReason, Duration)> {
        self.pauses
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Number of recorded pauses with the given reason.
    pub fn count(&self, reason: PauseReason) -> usize {
        self.pauses().iter().filter(|(r, _)| *r == reason).count()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, reason: PauseReason, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push((reason, duration));
        }
    }
}
