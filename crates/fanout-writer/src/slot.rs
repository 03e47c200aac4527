//! Single-error holder shared by every task of a batch.
//!
//! The slot is a bounded channel of capacity one. Deposits use `try_send`,
//! so a task never waits on it: the first deposit to land claims the slot
//! and every later deposit is dropped and counted.

use crate::error::BatchError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of a deposit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deposit {
    /// The error now occupies the slot.
    Claimed,
    /// The slot was already occupied; the error was discarded.
    Dropped,
}

/// Cloneable handle that tasks use to report an error.
#[derive(Debug, Clone)]
pub struct ErrorDepositor {
    tx: mpsc::Sender<BatchError>,
    dropped: Arc<AtomicUsize>,
}

impl ErrorDepositor {
    /// Offers an error to the slot without blocking.
    pub fn deposit(&self, error: BatchError) -> Deposit {
        match self.tx.try_send(error) {
            Ok(()) => Deposit::Claimed,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                Deposit::Dropped
            }
        }
    }

    /// Number of errors discarded so far.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Capacity-one error holder, drained once after the batch joins.
#[derive(Debug)]
pub struct ErrorSlot {
    rx: mpsc::Receiver<BatchError>,
    depositor: ErrorDepositor,
}

impl ErrorSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            rx,
            depositor: ErrorDepositor {
                tx,
                dropped: Arc::new(AtomicUsize::new(0)),
            },
        }
    }

    /// Returns a handle for depositing errors into this slot.
    pub fn depositor(&self) -> ErrorDepositor {
        self.depositor.clone()
    }

    /// Number of errors discarded because the slot was occupied.
    pub fn dropped(&self) -> usize {
        self.depositor.dropped()
    }

    /// Closes the slot and returns the error it holds, if any.
    ///
    /// Deposits made after this call are dropped.
    pub fn drain(mut self) -> Option<BatchError> {
        self.rx.close();
        self.rx.try_recv().ok()
    }
}

impl Default for ErrorSlot {
    fn default() -> Self {
        Self::new()
    }
}
