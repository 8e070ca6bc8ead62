//! Bounded admission queue.

use crate::error::TaskError;
use crate::types::TaskId;
use tokio::sync::mpsc::{self, error::TrySendError, Permit, Receiver, Sender};

/// FIFO of admitted task ids waiting for a worker slot.
///
/// Admission never waits: a slot is reserved up front and the caller only
/// creates the task once it holds one, so a full queue leaves no trace.
#[derive(Debug)]
pub struct AdmissionQueue {
    tx: Sender<TaskId>,
    capacity: usize,
}

impl AdmissionQueue {
    /// A queue holding at most `capacity` ids, plus the receiving end for
    /// the dispatcher. `capacity` must be at least 1.
    pub fn new(capacity: usize) -> (Self, Receiver<TaskId>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, capacity }, rx)
    }

    /// Reserve a slot for one id.
    pub fn reserve(&self) -> Result<Permit<'_, TaskId>, TaskError> {
        self.tx.try_reserve().map_err(|err| match err {
            TrySendError::Full(()) => TaskError::QueueFull,
            TrySendError::Closed(()) => TaskError::ShuttingDown,
        })
    }

    /// Ids parked in the queue, counting reserved slots.
    pub fn depth(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
