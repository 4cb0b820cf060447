//! Single-slot, latest-wins hand-off between the tone hook and the worker.
//!
//! The producer overwrites the slot on every matched tone and never waits.
//! The consumer polls with the id it handled last and only sees a request
//! whose id differs. Anything published between two polls except the most
//! recent value is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::tools::lock;

/// Id meaning "nothing handled yet". Published ids start at 1.
pub const NO_REQUEST: u64 = 0;

/// One pending progress tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackRequest {
    pub frequency: f64,
    pub id: u64,
}

/// Latest-wins mailbox holding at most one request.
#[derive(Debug, Default)]
pub struct RequestChannel {
    slot: Mutex<Option<PlaybackRequest>>,
    last_id: AtomicU64,
    published: AtomicU64,
}

impl RequestChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending request with `frequency` and return its id.
    ///
    /// The id is drawn while the slot lock is held, so ids stored in the slot
    /// are strictly increasing even with several producers.
    pub fn publish(&self, frequency: f64) -> u64 {
        let mut slot = lock(&self.slot);
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = Some(PlaybackRequest { frequency, id });
        drop(slot);
        self.published.fetch_add(1, Ordering::Relaxed);
        id
    }

    /// Return the pending request if its id differs from `last_seen`.
    pub fn try_take_if_new(&self, last_seen: u64) -> Option<PlaybackRequest> {
        let slot = lock(&self.slot);
        match *slot {
            Some(request) if request.id != last_seen => Some(request),
            _ => None,
        }
    }

    /// Id of the most recent publish, or [`NO_REQUEST`].
    pub fn latest_id(&self) -> u64 {
        self.last_id.load(Ordering::SeqCst)
    }

    /// Total number of publishes over the channel's lifetime.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
