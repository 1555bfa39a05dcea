//! Pending call registry.
//!
//! Maps a call identifier to the oneshot slot that settles the caller's
//! future. Entries are created when an outbound call is issued and removed
//! when a matching reply arrives (or when the abandoned future is dropped).
//! At most one entry exists per identifier: registration retries the draw
//! while it collides with a call still in flight.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::envelope::next_call_id;

/// Terminal outcome of a pending call, as carried by a reply envelope.
pub(crate) type Settlement = std::result::Result<Value, String>;

/// Registry of in-flight outbound calls.
///
/// The lock guards only map operations and is never held across an await
/// point.
#[derive(Default)]
pub(crate) struct PendingCalls {
    slots: Mutex<HashMap<u64, oneshot::Sender<Settlement>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending call.
    ///
    /// Returns the allocated identifier and the receiving half of its
    /// settlement slot.
    pub fn register(&self) -> (u64, oneshot::Receiver<Settlement>) {
        let (tx, rx) = oneshot::channel();
        let mut slots = self.slots.lock();

        let mut id = next_call_id();
        while slots.contains_key(&id) {
            id = next_call_id();
        }
        slots.insert(id, tx);

        (id, rx)
    }

    /// Settle and remove the entry for `id`.
    ///
    /// Returns `false` when no entry exists (stale or unknown correlation);
    /// the caller decides whether that is worth logging. A settlement sent
    /// into a slot whose future was dropped is discarded.
    pub fn settle(&self, id: u64, outcome: Settlement) -> bool {
        let slot = self.slots.lock().remove(&id);
        match slot {
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `id` without settling it.
    ///
    /// Used when the caller abandons the future; a reply arriving later
    /// becomes a stale correlation and is dropped.
    pub fn evict(&self, id: u64) {
        self.slots.lock().remove(&id);
    }

    /// Number of calls currently in flight.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }
}
