//! # Sync Events
//!
//! Broadcast notifications for presentation layers that cache catalog or
//! queue state. Subscribers refresh on the events they care about;
//! a lagging subscriber loses the oldest events, never blocks a sync run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use outpost_core::{SyncMode, SyncProgress};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// One catalog page applied (or the run completed).
    CatalogProgress(SyncProgress),

    /// A catalog run finished and its cursor was persisted.
    CatalogSynced {
        outlet_id: String,
        mode: SyncMode,
        updated_count: usize,
    },

    /// Retries were exhausted; sync for the outlet is paused.
    CatalogPaused {
        outlet_id: String,
        until: DateTime<Utc>,
    },

    /// A replay pass finished.
    TransactionsSynced { synced: usize, remaining: i64 },

    /// A sale was stored for later replay.
    TransactionQueued { offline_id: String, outlet_id: String },
}

/// Cloneable handle to the event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        if self.sender.send(event).is_err() {
            trace!("No event subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(DEFAULT_CAPACITY)
    }
}
