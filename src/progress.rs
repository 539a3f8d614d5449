//! Progress reporting and cooperative cancellation.
//!
//! Long runs are meant to be driven from a worker thread. The worker talks to
//! its orchestrator through two one-way channels:
//!
//! - a [`ProgressSink`] the engines push status messages into, which must never
//!   block the computation;
//! - a [`RunFlag`] the orchestrator can lower to ask the worker to stop at the
//!   next iteration boundary.
//!
//! ```rust
//! use std::sync::mpsc;
//! use hueshift::progress::{ProgressEvent, ProgressSink, RunFlag};
//!
//! let (tx, rx) = mpsc::channel::<ProgressEvent>();
//! let flag = RunFlag::new();
//! tx.status("Shifting centroids");
//! flag.halt();
//!
//! assert!(!flag.is_running());
//! assert_eq!(rx.recv().unwrap(), ProgressEvent::Status("Shifting centroids".into()));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, SyncSender};
use std::sync::Arc;

/// A message from a running engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Human-readable status line.
    Status(String),
    /// Final clustering quality.
    SumSquaredError(f64),
}

/// Destination for progress events.
///
/// Implementations must return promptly: dropping a message is acceptable,
/// stalling the computation is not.
pub trait ProgressSink {
    /// Deliver one event.
    fn emit(&self, event: ProgressEvent);

    /// Deliver a status line.
    fn status(&self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.emit(ProgressEvent::Status(message.into()));
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Unbounded channel. A hung-up receiver is ignored.
impl ProgressSink for Sender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

/// Bounded channel. When the queue is full the event is dropped.
impl ProgressSink for SyncSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // Full or disconnected: the event is dropped.
        let _ = self.try_send(event);
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &S {
    fn emit(&self, event: ProgressEvent) {
        (**self).emit(event);
    }
}

/// Shared "keep going" flag.
///
/// Starts raised. Clones share state, so the orchestrator keeps one clone and
/// hands another to the worker. Engines only ever read it.
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    /// A raised flag.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Ask the worker to stop at its next iteration boundary.
    pub fn halt(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Whether the worker should keep iterating.
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// How a driven run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunStatus {
    /// The stopping rule was met.
    Converged,
    /// The [`RunFlag`] was lowered; the result is the state at that point.
    Cancelled,
    /// The configured iteration cap was reached first.
    IterationLimit,
}

/// Outcome of a driven run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// How the run ended.
    pub status: RunStatus,
    /// Iterations performed by this call.
    pub iterations: usize,
    /// Largest centroid movement in the last iteration.
    pub max_shift: f64,
}
