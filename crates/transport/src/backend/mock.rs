use crate::error::{ErrorKind, Result};
use crate::{CancellationToken, Progress, ServerPath, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;
use updrop_source::SourceFile;

/// What a [`MockTransport`] does with an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Report 100% and succeed immediately.
    Succeed,
    /// Fail with a network error carrying this message.
    Fail(String),
    /// Report each value in order, then wait until [`MockTransport::release`]
    /// lets the upload finish or its token is cancelled.
    Hold { progress: Vec<u8> },
}

impl Behavior {
    pub fn hold() -> Self {
        Self::Hold { progress: Vec::new() }
    }
}

/// In-memory transport for testing.
///
/// Behaviour is configured per relative path with a fallback default.
/// Records the order uploads started in and how many ran at the same time.
#[derive(Debug)]
pub struct MockTransport {
    default: Behavior,
    paths: HashMap<String, Behavior>,
    calls: Mutex<Vec<String>>,
    gate: Semaphore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_default(Behavior::Succeed)
    }

    pub fn with_default(default: Behavior) -> Self {
        Self {
            default,
            paths: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_path(mut self, relative_path: impl Into<String>, behavior: Behavior) -> Self {
        self.paths.insert(relative_path.into(), behavior);
        self
    }

    /// Lets `count` held uploads finish successfully.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Relative paths in the order their uploads started.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of uploads that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn behavior(&self, relative_path: &str) -> &Behavior {
        self.paths.get(relative_path).unwrap_or(&self.default)
    }
}

/// Counts an upload as running until dropped, which also covers futures that
/// are dropped mid-upload.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<F: SourceFile> Transport<F> for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, _file: F, relative_path: &str, progress: Progress, cancel: CancellationToken) -> Result<ServerPath> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(relative_path.to_string());
        }
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);
        match self.behavior(relative_path) {
            Behavior::Succeed => {},
            Behavior::Fail(message) => exn::bail!(ErrorKind::Network(message.clone())),
            Behavior::Hold { progress: steps } => {
                for step in steps {
                    progress.report(*step);
                    // Give observers a chance to see intermediate values.
                    tokio::task::yield_now().await;
                }
                tokio::select! {
                    permit = self.gate.acquire() => match permit {
                        Ok(permit) => permit.forget(),
                        Err(_) => exn::bail!(ErrorKind::Network("transport closed".to_string())),
                    },
                    () = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
                }
            },
        }
        progress.report(100);
        Ok(ServerPath::new(format!("mock://{relative_path}")))
    }
}
