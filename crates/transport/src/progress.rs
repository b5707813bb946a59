//! Progress reporting from a transport back to whoever tracks the task.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

type Sink = dyn Fn(u8) + Send + Sync;

/// Per-upload progress callback.
///
/// Values are clamped to 0–100 and only forwarded when they're higher than
/// anything reported before, so a transport can't make progress go
/// backwards even if it tries. Clones report into the same sink.
#[derive(Clone)]
pub struct Progress {
    last: Arc<AtomicU8>,
    sink: Arc<Sink>,
}

impl Progress {
    pub fn new(sink: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self { last: Arc::new(AtomicU8::new(0)), sink: Arc::new(sink) }
    }

    /// A reporter that discards everything.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            (self.sink)(percent);
        }
    }

    /// Reports `sent` out of `total` bytes. An empty file is complete as soon
    /// as it's reported.
    pub fn report_bytes(&self, sent: u64, total: u64) {
        let percent = match total {
            0 => 100,
            total => (sent.min(total).saturating_mul(100) / total) as u8,
        };
        self.report(percent);
    }

    /// Highest value reported so far.
    pub fn last(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress").field("last", &self.last()).finish_non_exhaustive()
    }
}
