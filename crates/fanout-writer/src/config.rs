//! Configuration for batch writers.

use crate::events::{BatchEvent, BatchSummary, Listeners};
use std::time::Duration;

/// How a batch spreads its items over tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanOutStrategy {
    /// Spawn one task per item; a shared permit pool bounds how many write
    /// at once.
    #[default]
    TaskPerItem,
    /// Spawn `max_concurrent_writes` workers that pull items from a shared
    /// queue until it is empty.
    WorkerPool,
}

/// Configuration for a batch writer.
#[derive(Clone)]
pub struct BatchWriterConfig {
    /// Capacity of the permit pool, or the number of workers.
    pub(crate) max_concurrent_writes: usize,
    /// Maximum time a task waits for a permit.
    pub(crate) max_wait_duration: Option<Duration>,
    /// Task layout.
    pub(crate) strategy: FanOutStrategy,
    /// Name of this writer instance.
    pub(crate) name: String,
    /// Event listeners.
    pub(crate) listeners: Listeners,
}

impl BatchWriterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BatchWriterConfigBuilder {
        BatchWriterConfigBuilder::new()
    }

    /// Capacity of the permit pool.
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_concurrent_writes
    }

    /// Maximum time a task waits for a permit.
    pub fn max_wait_duration(&self) -> Option<Duration> {
        self.max_wait_duration
    }

    /// Task layout.
    pub fn strategy(&self) -> FanOutStrategy {
        self.strategy
    }

    /// Name of this writer instance.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for BatchWriterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchWriterConfig")
            .field("max_concurrent_writes", &self.max_concurrent_writes)
            .field("max_wait_duration", &self.max_wait_duration)
            .field("strategy", &self.strategy)
            .field("name", &self.name)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Builder for batch writer configuration.
pub struct BatchWriterConfigBuilder {
    max_concurrent_writes: usize,
    max_wait_duration: Option<Duration>,
    strategy: FanOutStrategy,
    name: String,
    listeners: Listeners,
}

impl BatchWriterConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_concurrent_writes: 4,
            max_wait_duration: None,
            strategy: FanOutStrategy::TaskPerItem,
            name: "fanout".to_string(),
            listeners: Listeners::default(),
        }
    }

    /// Sets the maximum number of writes in flight at once.
    ///
    /// Zero is treated as one.
    /// Default: 4
    pub fn max_concurrent_writes(mut self, max: usize) -> Self {
        self.max_concurrent_writes = max.max(1);
        self
    }

    /// Sets the maximum time a task waits for a permit.
    ///
    /// If `None`, tasks wait indefinitely. Only applies to
    /// [`FanOutStrategy::TaskPerItem`].
    /// Default: None
    pub fn max_wait_duration(mut self, duration: Option<Duration>) -> Self {
        self.max_wait_duration = duration;
        self
    }

    /// Sets how items are spread over tasks.
    ///
    /// Default: [`FanOutStrategy::TaskPerItem`]
    pub fn strategy(mut self, strategy: FanOutStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the name of this writer instance.
    ///
    /// Default: "fanout"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when an item is handed to the sink.
    ///
    /// Fires after a permit is acquired under [`FanOutStrategy::TaskPerItem`],
    /// and when a worker takes an item under [`FanOutStrategy::WorkerPool`].
    ///
    /// # Callback Signature
    /// `Fn(usize)` - Called with the number of writes in flight, this one
    /// included. Never exceeds `max_concurrent_writes`.
    ///
    /// # Example
    /// ```rust,no_run
    /// use fanout_writer::BatchWriterConfig;
    ///
    /// let writer = BatchWriterConfig::builder()
    ///     .max_concurrent_writes(4)
    ///     .on_write_started(|in_flight| {
    ///         println!("{} writes in flight", in_flight);
    ///     })
    ///     .build();
    /// ```
    pub fn on_write_started<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.listeners.push(move |event| {
            if let BatchEvent::WriteStarted { in_flight, .. } = event {
                f(*in_flight);
            }
        });
        self
    }

    /// Registers a callback when the sink accepts a line.
    ///
    /// # Callback Signature
    /// `Fn(usize, Duration)` - Called with the item's batch position and the
    /// time spent in the sink.
    pub fn on_line_written<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.listeners.push(move |event| {
            if let BatchEvent::LineWritten {
                index, duration, ..
            } = event
            {
                f(*index, *duration);
            }
        });
        self
    }

    /// Registers a callback when an item fails.
    ///
    /// Fires for every failure, including those whose error is later
    /// dropped by the error slot.
    ///
    /// # Callback Signature
    /// `Fn(Option<usize>, &str)` - Called with the item's batch position
    /// (unknown for a failed task) and the error message.
    ///
    /// # Example
    /// ```rust,no_run
    /// use fanout_writer::BatchWriterConfig;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let failures = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&failures);
    ///
    /// let writer = BatchWriterConfig::builder()
    ///     .on_write_failed(move |index, message| {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///         eprintln!("item {:?} failed: {}", index, message);
    ///     })
    ///     .build();
    /// ```
    pub fn on_write_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<usize>, &str) + Send + Sync + 'static,
    {
        self.listeners.push(move |event| {
            if let BatchEvent::WriteFailed { index, message, .. } = event {
                f(*index, message.as_str());
            }
        });
        self
    }

    /// Registers a callback when an error is discarded because another
    /// failure already claimed the error slot.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - Called with the number of errors dropped so far.
    pub fn on_error_dropped<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.listeners.push(move |event| {
            if let BatchEvent::ErrorDropped { dropped, .. } = event {
                f(*dropped);
            }
        });
        self
    }

    /// Registers a callback when a batch has joined every task.
    ///
    /// # Callback Signature
    /// `Fn(BatchSummary)` - Called with the batch totals.
    pub fn on_batch_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(BatchSummary) + Send + Sync + 'static,
    {
        self.listeners.push(move |event| {
            if let BatchEvent::BatchFinished { summary, .. } = event {
                f(*summary);
            }
        });
        self
    }

    /// Registers a callback that receives every [`BatchEvent`].
    ///
    /// # Example
    /// ```rust,no_run
    /// use fanout_writer::BatchWriterConfig;
    ///
    /// let writer = BatchWriterConfig::builder()
    ///     .on_event(|event| println!("{} from {}", event.event_type(), event.writer_name()))
    ///     .build();
    /// ```
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&BatchEvent) + Send + Sync + 'static,
    {
        self.listeners.push(f);
        self
    }

    /// Builds the configuration and returns a [`BatchWriter`](crate::BatchWriter).
    pub fn build(self) -> crate::batch::BatchWriter {
        let config = BatchWriterConfig {
            max_concurrent_writes: self.max_concurrent_writes,
            max_wait_duration: self.max_wait_duration,
            strategy: self.strategy,
            name: self.name,
            listeners: self.listeners,
        };
        crate::batch::BatchWriter::new(config)
    }
}

impl Default for BatchWriterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
