//! Error types for batch writes.

use std::io;

/// Errors a batch can surface.
///
/// A batch reports at most one of these, no matter how many items failed.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// No write permit became available within the configured wait.
    #[error("timeout waiting for write permit: max concurrent writes ({max_concurrent_writes}) reached")]
    PermitTimeout {
        /// Capacity of the permit pool.
        max_concurrent_writes: usize,
    },
    /// The permit pool was closed while a task was waiting on it.
    #[error("permit pool closed while waiting for a write permit")]
    PermitPoolClosed,
    /// The sink rejected a line.
    #[error("failed to write item {index}: {source}")]
    Write {
        /// Position of the item in the batch.
        index: usize,
        /// The I/O error returned by the sink.
        #[source]
        source: io::Error,
    },
    /// A writer task panicked or was cancelled before finishing.
    #[error("writer task failed: {message}")]
    TaskFailed {
        /// Position of the item being written, when known.
        index: Option<usize>,
        /// Panic payload or cancellation reason.
        message: String,
    },
}

impl BatchError {
    /// Returns true if the sink rejected a write.
    pub fn is_write(&self) -> bool {
        matches!(self, BatchError::Write { .. })
    }

    /// Returns true if a permit could not be acquired.
    pub fn is_permit_error(&self) -> bool {
        matches!(
            self,
            BatchError::PermitTimeout { .. } | BatchError::PermitPoolClosed
        )
    }

    /// Returns the underlying I/O error for write failures.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            BatchError::Write { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns the batch position of the failed item, when known.
    pub fn index(&self) -> Option<usize> {
        match self {
            BatchError::Write { index, .. } => Some(*index),
            BatchError::TaskFailed { index, .. } => *index,
            _ => None,
        }
    }
}

/// Result type for batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;
