//! Events emitted by a batch writer, and the callbacks that receive them.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Totals for one completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Number of items handed to the batch.
    pub total: usize,
    /// Tasks spawned and joined: one per item, or one per worker.
    pub tasks: usize,
    /// Lines the sink accepted.
    pub written: usize,
    /// Items that failed, including permit and task failures.
    pub failed: usize,
    /// Errors discarded because the error slot was already claimed.
    pub dropped_errors: usize,
    /// Wall time from fan-out to the last join.
    pub duration: Duration,
}

/// Events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// An item is about to be handed to the sink. Under
    /// [`FanOutStrategy::TaskPerItem`](crate::FanOutStrategy::TaskPerItem)
    /// this follows a successful permit acquisition; under
    /// [`FanOutStrategy::WorkerPool`](crate::FanOutStrategy::WorkerPool) it
    /// follows a worker taking the item off the queue.
    WriteStarted {
        writer_name: String,
        timestamp: Instant,
        index: usize,
        in_flight: usize,
    },
    /// The sink accepted a line.
    LineWritten {
        writer_name: String,
        timestamp: Instant,
        index: usize,
        duration: Duration,
    },
    /// An item could not be written.
    WriteFailed {
        writer_name: String,
        timestamp: Instant,
        index: Option<usize>,
        message: String,
    },
    /// A failure lost the race for the error slot.
    ErrorDropped {
        writer_name: String,
        timestamp: Instant,
        index: Option<usize>,
        dropped: usize,
    },
    /// Every task has been joined.
    BatchFinished {
        writer_name: String,
        timestamp: Instant,
        summary: BatchSummary,
    },
}

impl BatchEvent {
    /// Short snake_case name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            BatchEvent::WriteStarted { .. } => "write_started",
            BatchEvent::LineWritten { .. } => "line_written",
            BatchEvent::WriteFailed { .. } => "write_failed",
            BatchEvent::ErrorDropped { .. } => "error_dropped",
            BatchEvent::BatchFinished { .. } => "batch_finished",
        }
    }

    /// When the event was emitted.
    pub fn timestamp(&self) -> Instant {
        match self {
            BatchEvent::WriteStarted { timestamp, .. }
            | BatchEvent::LineWritten { timestamp, .. }
            | BatchEvent::WriteFailed { timestamp, .. }
            | BatchEvent::ErrorDropped { timestamp, .. }
            | BatchEvent::BatchFinished { timestamp, .. } => *timestamp,
        }
    }

    /// Name of the writer that emitted the event.
    pub fn writer_name(&self) -> &str {
        match self {
            BatchEvent::WriteStarted { writer_name, .. }
            | BatchEvent::LineWritten { writer_name, .. }
            | BatchEvent::WriteFailed { writer_name, .. }
            | BatchEvent::ErrorDropped { writer_name, .. }
            | BatchEvent::BatchFinished { writer_name, .. } => writer_name,
        }
    }
}

type Callback = Arc<dyn Fn(&BatchEvent) + Send + Sync>;

/// Callbacks registered on a writer. Each one sees every event and filters
/// for the kinds it cares about.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    callbacks: Vec<Callback>,
}

impl Listeners {
    pub(crate) fn push<F>(&mut self, f: F)
    where
        F: Fn(&BatchEvent) + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(f));
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Runs every callback on the calling task. A panicking callback is
    /// caught so it cannot take a writer task down with it.
    pub(crate) fn emit(&self, event: &BatchEvent) {
        for callback in &self.callbacks {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| callback(event)));

            #[cfg(feature = "tracing")]
            {
                if outcome.is_err() {
                    tracing::warn!(
                        writer = event.writer_name(),
                        event = event.event_type(),
                        "event callback panicked"
                    );
                }
            }
            #[cfg(not(feature = "tracing"))]
            let _ = outcome;
        }
    }
}
