#![forbid(unsafe_code)]

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::trace;

use crate::traits::AppendSlot;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("append for segment {got} arrived out of order (expected {expected})")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("an append is already buffered behind the in-flight one")]
    Backlogged,
}

/// Single-writer discipline over the append slot.
///
/// Appends are emitted in strict ascending segment order and never while
/// the slot's `updating` flag is up. At most one request is buffered
/// behind the in-flight one; the progress policy guarantees that is
/// enough in steady operation.
pub struct AppendQueue {
    slot: Arc<dyn AppendSlot>,
    next_index: u64,
    in_flight: Option<u64>,
    pending: Option<(u64, Bytes)>,
    appended: u64,
}

impl AppendQueue {
    pub fn new(slot: Arc<dyn AppendSlot>) -> Self {
        Self {
            slot,
            next_index: 0,
            in_flight: None,
            pending: None,
            appended: 0,
        }
    }

    /// Accept an append request for the segment at `index`.
    ///
    /// Dispatches immediately when the slot is idle, otherwise buffers
    /// the request for the next idle transition.
    ///
    /// # Errors
    ///
    /// `OutOfOrder` when `index` skips or rewinds the sequence,
    /// `Backlogged` when a request is already buffered.
    pub fn enqueue(&mut self, index: u64, data: Bytes) -> Result<(), QueueError> {
        if index != self.next_index {
            return Err(QueueError::OutOfOrder {
                expected: self.next_index,
                got: index,
            });
        }
        if self.pending.is_some() {
            return Err(QueueError::Backlogged);
        }
        self.next_index += 1;

        if self.in_flight.is_some() || self.slot.updating() {
            trace!(segment = index, "slot busy; buffering append");
            self.pending = Some((index, data));
        } else {
            self.dispatch(index, data);
        }
        Ok(())
    }

    /// Handle the slot's idle transition: account for the finished
    /// append and dispatch the buffered request, if any.
    pub fn on_update_end(&mut self) {
        if let Some(index) = self.in_flight.take() {
            self.appended += 1;
            trace!(segment = index, appended = self.appended, "append applied");
        }
        if !self.slot.updating() {
            if let Some((index, data)) = self.pending.take() {
                self.dispatch(index, data);
            }
        }
    }

    fn dispatch(&mut self, index: u64, data: Bytes) {
        trace!(segment = index, bytes = data.len(), "dispatching append");
        self.in_flight = Some(index);
        self.slot.append(data);
    }

    /// True while an append has been issued but its idle transition has
    /// not been observed yet.
    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Number of appends that have completed.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// True while a request is buffered behind the in-flight append.
    /// The next enqueue would be refused as [`QueueError::Backlogged`].
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// True when nothing is in flight and nothing is buffered.
    pub fn is_drained(&self) -> bool {
        self.in_flight.is_none() && self.pending.is_none()
    }

    /// Index the next enqueue must carry.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}
