//! Bounded concurrent line writer.
//!
//! A [`BatchWriter`] takes a list of printable items and a shared
//! [`LineSink`], fans the items out over concurrent tasks, writes each one as
//! a line, and joins every task before returning. A permit pool created once
//! per batch bounds how many writes are in flight, and failures are
//! collected in a capacity-one error slot: the caller sees at most one
//! error, the first one deposited.
//!
//! # Basic Example
//!
//! ```rust
//! use fanout_writer::{BatchWriter, WriterSink};
//! use std::sync::Arc;
//!
//! # async fn example() -> fanout_writer::Result<()> {
//! let writer = BatchWriter::builder()
//!     .max_concurrent_writes(4)
//!     .name("words")
//!     .build();
//!
//! let sink = Arc::new(WriterSink::stdout());
//! writer.run(["one", "two", "three"], sink).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Worker Pool
//!
//! With [`FanOutStrategy::WorkerPool`] the batch spawns only
//! `max_concurrent_writes` tasks, which pull items from a shared queue:
//!
//! ```rust
//! use fanout_writer::{BatchWriter, FanOutStrategy, WriterSink};
//! use std::sync::Arc;
//!
//! # async fn example() -> fanout_writer::Result<()> {
//! let writer = BatchWriter::builder()
//!     .strategy(FanOutStrategy::WorkerPool)
//!     .max_concurrent_writes(2)
//!     .build();
//!
//! let sink = Arc::new(WriterSink::new(Vec::new()));
//! writer.run(1..=100, sink).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Observing Failures
//!
//! Only one error is returned, but every failure is visible to listeners:
//!
//! ```rust
//! use fanout_writer::BatchWriter;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let failures = Arc::new(AtomicUsize::new(0));
//! let f = Arc::clone(&failures);
//!
//! let writer = BatchWriter::builder()
//!     .on_write_failed(move |_, _| {
//!         f.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .on_batch_finished(|summary| {
//!         println!("{} of {} written", summary.written, summary.total);
//!     })
//!     .build();
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod events;
pub mod sink;
pub mod slot;

pub use batch::BatchWriter;
pub use config::{BatchWriterConfig, BatchWriterConfigBuilder, FanOutStrategy};
pub use error::{BatchError, Result};
pub use events::{BatchEvent, BatchSummary};
pub use sink::{LineSink, WriterSink};
pub use slot::{Deposit, ErrorDepositor, ErrorSlot};

