//! UI execution contexts
//!
//! Display state that backs a UI must only be mutated on the UI's own
//! thread. Sinks hand their mutations to a [`UiExecutor`] instead of
//! applying them on the delivery thread.

use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;

pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

pub trait UiExecutor: Send + Sync {
    fn execute(&self, job: UiJob);
}

/// Runs jobs on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateExecutor;

impl UiExecutor for ImmediateExecutor {
    fn execute(&self, job: UiJob) {
        job();
    }
}

/// Queues jobs until the UI loop drains them with [`run_pending`].
///
/// [`run_pending`]: QueuedExecutor::run_pending
pub struct QueuedExecutor {
    tx: mpsc::UnboundedSender<UiJob>,
    rx: Mutex<mpsc::UnboundedReceiver<UiJob>>,
}

impl QueuedExecutor {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Run every queued job in submission order. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut jobs = Vec::new();
        {
            let mut rx = self.rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            while let Ok(job) = rx.try_recv() {
                jobs.push(job);
            }
        }
        let ran = jobs.len();
        for job in jobs {
            job();
        }
        ran
    }
}

impl Default for QueuedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl UiExecutor for QueuedExecutor {
    fn execute(&self, job: UiJob) {
        if self.tx.send(job).is_err() {
            tracing::warn!("UI queue closed; dropping job");
        }
    }
}

impl fmt::Debug for QueuedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedExecutor").finish_non_exhaustive()
    }
}
