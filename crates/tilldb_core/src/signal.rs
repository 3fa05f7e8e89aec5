//! Invalidation signaling for destructive bulk operations.
//!
//! A restore or a master-catalog refresh replaces whole tables underneath
//! any state a caller has cached. Rather than forcing callers to restart,
//! the database emits an [`InvalidationEvent`] on its feed; subscribers
//! drop their caches and re-read.
//!
//! ```rust,ignore
//! let rx = db.subscribe_invalidations();
//! std::thread::spawn(move || {
//!     while let Ok(event) = rx.recv() {
//!         if event.affects(StoreKind::Business) {
//!             // drop cached customer/inventory views
//!         }
//!     }
//! });
//! ```

use std::sync::mpsc::{self, Receiver, Sender};

use parking_lot::RwLock;

use crate::keygen;
use crate::schema::StoreKind;

/// Why cached reads became stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationCause {
    /// The business store was replaced from a backup snapshot.
    Restored,
    /// The master catalog was cleared and reseeded.
    MastersRefreshed,
}

/// A single invalidation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationEvent {
    /// Event time in unix milliseconds.
    pub at_millis: u64,
    /// What happened.
    pub cause: InvalidationCause,
}

impl InvalidationEvent {
    /// Returns true if caches over the given store are stale.
    #[must_use]
    pub const fn affects(&self, kind: StoreKind) -> bool {
        match self.cause {
            InvalidationCause::Restored => matches!(kind, StoreKind::Business),
            InvalidationCause::MastersRefreshed => matches!(kind, StoreKind::Reference),
        }
    }
}

/// Distributes invalidation events to subscribers.
///
/// Thread-safe; disconnected subscribers are pruned on the next emit. The
/// most recent event is retained so a subscriber attaching late can tell
/// whether it missed a reset.
pub struct InvalidationFeed {
    subscribers: RwLock<Vec<Sender<InvalidationEvent>>>,
    last: RwLock<Option<InvalidationEvent>>,
}

impl InvalidationFeed {
    /// Creates an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            last: RwLock::new(None),
        }
    }

    /// Subscribes to future invalidation events.
    pub fn subscribe(&self) -> Receiver<InvalidationEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to every live subscriber.
    pub fn emit(&self, cause: InvalidationCause) {
        let event = InvalidationEvent {
            at_millis: keygen::now_millis(),
            cause,
        };
        *self.last.write() = Some(event);

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Returns the most recent event, if any.
    #[must_use]
    pub fn last(&self) -> Option<InvalidationEvent> {
        *self.last.read()
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for InvalidationFeed {
    fn default() -> Self {
        Self::new()
    }
}
