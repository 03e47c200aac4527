//! Bounded fan-out of line writes and the join that follows.

use crate::config::{BatchWriterConfig, BatchWriterConfigBuilder, FanOutStrategy};
use crate::error::{BatchError, Result};
use crate::events::{BatchEvent, BatchSummary};
use crate::sink::LineSink;
use crate::slot::{Deposit, ErrorDepositor, ErrorSlot};
use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Writes batches of items to a shared sink with bounded concurrency.
///
/// Cheap to clone; clones share the same configuration.
#[derive(Clone, Debug)]
pub struct BatchWriter {
    config: Arc<BatchWriterConfig>,
}

impl BatchWriter {
    pub(crate) fn new(config: BatchWriterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Creates a new builder for configuring a batch writer.
    ///
    /// # Examples
    ///
    /// ```
    /// use fanout_writer::BatchWriter;
    /// use std::time::Duration;
    ///
    /// let writer = BatchWriter::builder()
    ///     .max_concurrent_writes(4)
    ///     .max_wait_duration(Some(Duration::from_secs(5)))
    ///     .build();
    /// ```
    pub fn builder() -> BatchWriterConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "fanout_lines_written_total",
                    "Total number of lines accepted by the sink"
                );
                describe_counter!(
                    "fanout_writes_failed_total",
                    "Total number of items that could not be written"
                );
                describe_counter!(
                    "fanout_errors_dropped_total",
                    "Total number of errors discarded because the error slot was occupied"
                );
                describe_gauge!(
                    "fanout_writes_in_flight",
                    "Current number of writes in flight"
                );
                describe_histogram!(
                    "fanout_write_duration_seconds",
                    "Time spent in the sink for one line"
                );
                describe_histogram!(
                    "fanout_batch_duration_seconds",
                    "Time from fan-out until every task has been joined"
                );
            });
        }
        BatchWriterConfigBuilder::new()
    }

    /// Returns the configuration this writer runs with.
    pub fn config(&self) -> &BatchWriterConfig {
        &self.config
    }

    /// Writes every item to `sink` as `"{item}\n"`, concurrently.
    ///
    /// Returns once every task has been joined. Lines land in the sink in
    /// no particular order. If any item fails, exactly one error is
    /// returned: the first one deposited in the error slot. Other items
    /// are still written.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fanout_writer::{BatchWriter, WriterSink};
    /// use std::sync::Arc;
    ///
    /// # async fn example() -> fanout_writer::Result<()> {
    /// let sink = Arc::new(WriterSink::new(Vec::new()));
    /// BatchWriter::default().run(["one", "two"], Arc::clone(&sink)).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<I, S>(&self, items: I, sink: Arc<S>) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Display,
        S: LineSink + ?Sized,
    {
        let lines: Vec<String> = items.into_iter().map(|item| format!("{}\n", item)).collect();
        let total = lines.len();
        let start = Instant::now();
        let slot = ErrorSlot::new();
        let outcomes = Arc::new(Outcomes::new(Arc::clone(&self.config), slot.depositor()));

        let tasks = if total == 0 {
            0
        } else {
            let joinset = match self.config.strategy {
                FanOutStrategy::TaskPerItem => self.spawn_per_item(lines, sink, &outcomes),
                FanOutStrategy::WorkerPool => self.spawn_workers(lines, sink, &outcomes),
            };
            join_all(joinset, &outcomes).await
        };

        let summary = BatchSummary {
            total,
            tasks,
            written: outcomes.written.load(Ordering::SeqCst),
            failed: outcomes.failed.load(Ordering::SeqCst),
            dropped_errors: slot.dropped(),
            duration: start.elapsed(),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            writer = %self.config.name,
            total = summary.total,
            tasks = summary.tasks,
            written = summary.written,
            failed = summary.failed,
            dropped_errors = summary.dropped_errors,
            "batch finished"
        );

        #[cfg(feature = "metrics")]
        histogram!("fanout_batch_duration_seconds", "writer" => self.config.name.clone())
            .record(summary.duration.as_secs_f64());

        self.config.listeners.emit(&BatchEvent::BatchFinished {
            writer_name: self.config.name.clone(),
            timestamp: Instant::now(),
            summary,
        });

        match slot.drain() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// One task per line, throttled by a permit pool shared across the batch.
    fn spawn_per_item<S>(
        &self,
        lines: Vec<String>,
        sink: Arc<S>,
        outcomes: &Arc<Outcomes>,
    ) -> JoinSet<()>
    where
        S: LineSink + ?Sized,
    {
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_writes));
        let mut tasks = JoinSet::new();

        for (index, line) in lines.into_iter().enumerate() {
            let writer = ItemWriter {
                sink: Arc::clone(&sink),
                outcomes: Arc::clone(outcomes),
            };
            let permits = Arc::clone(&permits);
            tasks.spawn(async move { writer.write_permitted(index, line, permits).await });
        }

        tasks
    }

    /// A fixed set of workers draining a shared queue. A panicking sink
    /// costs the item being written, not the worker.
    fn spawn_workers<S>(
        &self,
        lines: Vec<String>,
        sink: Arc<S>,
        outcomes: &Arc<Outcomes>,
    ) -> JoinSet<()>
    where
        S: LineSink + ?Sized,
    {
        let workers = self.config.max_concurrent_writes.min(lines.len());
        let queue = Arc::new(Mutex::new(lines.into_iter().enumerate()));
        let mut tasks = JoinSet::new();

        for _ in 0..workers {
            let writer = ItemWriter {
                sink: Arc::clone(&sink),
                outcomes: Arc::clone(outcomes),
            };
            let queue = Arc::clone(&queue);
            tasks.spawn(async move {
                loop {
                    let next = queue.lock().await.next();
                    let Some((index, line)) = next else {
                        break;
                    };
                    writer.write(index, line.as_bytes()).await;
                }
            });
        }

        tasks
    }
}

impl Default for BatchWriter {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Waits for every task and returns how many were joined.
async fn join_all(mut tasks: JoinSet<()>, outcomes: &Outcomes) -> usize {
    let mut completed = 0;
    while let Some(joined) = tasks.join_next().await {
        completed += 1;
        if let Err(error) = joined {
            outcomes.record_failure(
                None,
                BatchError::TaskFailed {
                    index: None,
                    message: task_failure_message(error),
                },
            );
        }
    }
    completed
}

fn task_failure_message(error: JoinError) -> String {
    if !error.is_panic() {
        return "task cancelled".to_string();
    }
    panic_message(&*error.into_panic())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

/// Per-task handle: the shared sink plus the shared bookkeeping.
struct ItemWriter<S: ?Sized> {
    sink: Arc<S>,
    outcomes: Arc<Outcomes>,
}

impl<S> ItemWriter<S>
where
    S: LineSink + ?Sized,
{
    async fn write_permitted(self, index: usize, line: String, permits: Arc<Semaphore>) {
        let permit = match self.acquire(permits).await {
            Ok(permit) => permit,
            Err(error) => {
                self.outcomes.record_failure(Some(index), error);
                return;
            }
        };

        self.write(index, line.as_bytes()).await;

        drop(permit);
    }

    async fn acquire(&self, permits: Arc<Semaphore>) -> Result<OwnedSemaphorePermit> {
        let config = &self.outcomes.config;
        match config.max_wait_duration {
            Some(duration) => match tokio::time::timeout(duration, permits.acquire_owned()).await
            {
                Ok(Ok(permit)) => Ok(permit),
                Ok(Err(_)) => Err(BatchError::PermitPoolClosed),
                Err(_) => Err(BatchError::PermitTimeout {
                    max_concurrent_writes: config.max_concurrent_writes,
                }),
            },
            None => permits
                .acquire_owned()
                .await
                .map_err(|_| BatchError::PermitPoolClosed),
        }
    }

    async fn write(&self, index: usize, line: &[u8]) {
        let in_flight = self.outcomes.start_write(index);
        let started = Instant::now();
        let result = AssertUnwindSafe(async { self.sink.write_line(line).await })
            .catch_unwind()
            .await;
        drop(in_flight);

        match result {
            Ok(Ok(())) => self.outcomes.record_written(index, started.elapsed()),
            Ok(Err(source)) => self
                .outcomes
                .record_failure(Some(index), BatchError::Write { index, source }),
            Err(payload) => self.outcomes.record_failure(
                Some(index),
                BatchError::TaskFailed {
                    index: Some(index),
                    message: panic_message(&*payload),
                },
            ),
        }
    }
}

/// Counters, events and the error slot handle shared by every task.
struct Outcomes {
    config: Arc<BatchWriterConfig>,
    errors: ErrorDepositor,
    written: AtomicUsize,
    failed: AtomicUsize,
    in_flight: AtomicUsize,
}

impl Outcomes {
    fn new(config: Arc<BatchWriterConfig>, errors: ErrorDepositor) -> Self {
        Self {
            config,
            errors,
            written: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    fn start_write(&self, index: usize) -> InFlight<'_> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;

        #[cfg(feature = "metrics")]
        gauge!("fanout_writes_in_flight", "writer" => self.config.name.clone())
            .set(in_flight as f64);

        self.config.listeners.emit(&BatchEvent::WriteStarted {
            writer_name: self.config.name.clone(),
            timestamp: Instant::now(),
            index,
            in_flight,
        });

        InFlight { outcomes: self }
    }

    fn record_written(&self, index: usize, duration: Duration) {
        self.written.fetch_add(1, Ordering::SeqCst);

        #[cfg(feature = "tracing")]
        tracing::trace!(writer = %self.config.name, index, ?duration, "line written");

        #[cfg(feature = "metrics")]
        {
            counter!("fanout_lines_written_total", "writer" => self.config.name.clone())
                .increment(1);
            histogram!("fanout_write_duration_seconds", "writer" => self.config.name.clone())
                .record(duration.as_secs_f64());
        }

        self.config.listeners.emit(&BatchEvent::LineWritten {
            writer_name: self.config.name.clone(),
            timestamp: Instant::now(),
            index,
            duration,
        });
    }

    fn record_failure(&self, index: Option<usize>, error: BatchError) {
        self.failed.fetch_add(1, Ordering::SeqCst);

        #[cfg(feature = "tracing")]
        tracing::warn!(writer = %self.config.name, index = ?index, error = %error, "write failed");

        #[cfg(feature = "metrics")]
        counter!("fanout_writes_failed_total", "writer" => self.config.name.clone()).increment(1);

        self.config.listeners.emit(&BatchEvent::WriteFailed {
            writer_name: self.config.name.clone(),
            timestamp: Instant::now(),
            index,
            message: error.to_string(),
        });

        if self.errors.deposit(error) == Deposit::Dropped {
            let dropped = self.errors.dropped();

            #[cfg(feature = "tracing")]
            tracing::debug!(writer = %self.config.name, index = ?index, dropped, "error slot occupied, dropping error");

            #[cfg(feature = "metrics")]
            counter!("fanout_errors_dropped_total", "writer" => self.config.name.clone())
                .increment(1);

            self.config.listeners.emit(&BatchEvent::ErrorDropped {
                writer_name: self.config.name.clone(),
                timestamp: Instant::now(),
                index,
                dropped,
            });
        }
    }
}

/// Decrements the in-flight count when a write ends, even by panic.
struct InFlight<'a> {
    outcomes: &'a Outcomes,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let _remaining = self.outcomes.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;

        #[cfg(feature = "metrics")]
        gauge!("fanout_writes_in_flight", "writer" => self.outcomes.config.name.clone())
            .set(_remaining as f64);
    }
}
