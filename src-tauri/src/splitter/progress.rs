//! Progress notifications for a running split.
//!
//! Percent is derived from how far the reader has scanned into the input, so
//! no counting pre-pass is needed and the value never goes backwards.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Progress event emitted while a split runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// 0 to 100, non-decreasing within one run.
    pub percent: u8,
    pub message: String,
}

/// Receiver of progress events.
///
/// Delivery is best-effort: a reporter that drops events does not affect the
/// split.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Discards every event.
impl ProgressReporter for () {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Adapts a closure into a [`ProgressReporter`].
pub struct ProgressFn<F>(pub F);

impl<F> ProgressReporter for ProgressFn<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) {
        (self.0)(event)
    }
}

impl ProgressReporter for UnboundedSender<ProgressEvent> {
    fn report(&self, event: &ProgressEvent) {
        // Receiver gone means nobody is listening
        let _ = self.send(event.clone());
    }
}

/// Turns scan positions into monotonic, de-duplicated progress events.
pub(crate) struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    total_bytes: u64,
    last_percent: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(reporter: &'a dyn ProgressReporter, total_bytes: u64) -> Self {
        Self {
            reporter,
            total_bytes,
            last_percent: None,
        }
    }

    pub(crate) fn percent_of(&self, bytes_consumed: u64) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let done = bytes_consumed.min(self.total_bytes) as u128;
        (done * 100 / self.total_bytes as u128) as u8
    }

    /// Emits `message` when the percent derived from `bytes_consumed` is higher
    /// than the last one reported.
    pub(crate) fn advance(&mut self, bytes_consumed: u64, message: impl FnOnce() -> String) {
        let percent = self.percent_of(bytes_consumed);
        if self.last_percent.is_some_and(|last| percent <= last) {
            return;
        }
        self.emit(percent, message());
    }

    /// Emits unconditionally, clamped so the sequence stays non-decreasing.
    pub(crate) fn emit(&mut self, percent: u8, message: String) {
        let percent = percent.min(100).max(self.last_percent.unwrap_or(0));
        self.last_percent = Some(percent);
        self.reporter.report(&ProgressEvent { percent, message });
    }
}
