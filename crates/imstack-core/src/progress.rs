use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Thread-safe progress reporting for stack loads.
///
/// Purely observational: the loader never reads anything back from the sink.
/// All methods have default no-op implementations.
pub trait ProgressSink: Send + Sync {
    /// A new phase with `total_steps` work items has started.
    fn init(&self, _total_steps: usize, _label: &str) {}

    /// `n` more work items completed. May be called from worker threads.
    fn advance(&self, _n: usize) {}

    /// The current phase is finished.
    fn close(&self) {}
}

/// One reporting phase; closes the sink when dropped, early error
/// returns included.
pub struct Phase<'a> {
    sink: &'a dyn ProgressSink,
}

impl<'a> Phase<'a> {
    pub fn start(sink: &'a dyn ProgressSink, total_steps: usize, label: &str) -> Self {
        sink.init(total_steps, label);
        Self { sink }
    }

    pub fn advance(&self, n: usize) {
        self.sink.advance(n);
    }
}

impl Drop for Phase<'_> {
    fn drop(&mut self) {
        self.sink.close();
    }
}

/// Sink that drops every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Sink that records what it was told; useful for tests and summaries.
#[derive(Debug, Default)]
pub struct CountingProgress {
    advanced: AtomicUsize,
    phases: Mutex<Vec<(String, usize)>>,
    closed: AtomicUsize,
}

impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total of every `advance` call across all phases.
    pub fn advanced(&self) -> usize {
        self.advanced.load(Ordering::Relaxed)
    }

    /// `(label, total_steps)` per `init` call, in order.
    pub fn phases(&self) -> Vec<(String, usize)> {
        self.phases
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::Relaxed)
    }
}

impl ProgressSink for CountingProgress {
    fn init(&self, total_steps: usize, label: &str) {
        if let Ok(mut phases) = self.phases.lock() {
            phases.push((label.to_string(), total_steps));
        }
    }

    fn advance(&self, n: usize) {
        self.advanced.fetch_add(n, Ordering::Relaxed);
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }
}
