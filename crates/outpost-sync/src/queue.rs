//! # Transaction Queue Manager
//!
//! Sends sales to the server exactly once, whether they are rung up online
//! or replayed from the offline queue.
//!
//! ## Guarantees
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_transaction                                                     │
//! │    offline_id ──► idempotency key (deterministic)                      │
//! │    concurrent calls for (outlet, key) ──► ONE gateway call,            │
//! │                                           every caller sees its result │
//! │                                                                         │
//! │  sync_offline_transactions (single-flight)                             │
//! │    caller A ──┐                                                         │
//! │    caller B ──┼──► one replay pass ──► same synced count for all       │
//! │    caller C ──┘                                                         │
//! │                                                                         │
//! │    per queued sale:                                                     │
//! │      accepted ──► cache row + queue delete (one SQLite transaction)    │
//! │      failed   ──► attempts += 1, last_error kept, stays queued         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use outpost_core::idempotency::new_offline_id;
use outpost_core::validation::validate_transaction_request;
use outpost_core::{
    idempotency_key, OfflineTransactionRecord, RemoteTransaction, SyncedTransaction,
    TransactionPayload, TransactionRequest, TransactionStatus,
};
use outpost_db::Database;

use crate::clock::Clock;
use crate::connectivity::Connectivity;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, SyncEvent};
use crate::gateway::RemoteGateway;

type SharedCreate = Shared<BoxFuture<'static, SyncResult<RemoteTransaction>>>;
type SharedReplay = Shared<BoxFuture<'static, SyncResult<usize>>>;

/// What happened to a sale handed to [`TransactionQueue::submit_or_queue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleOutcome {
    /// The server accepted it now.
    Accepted(RemoteTransaction),
    /// The server was unreachable; the sale is queued for replay.
    Queued { offline_id: String },
}

/// Cheap to clone: clones share the queue state.
#[derive(Clone)]
pub struct TransactionQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    db: Option<Database>,
    gateway: Arc<dyn RemoteGateway>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    connectivity: Connectivity,
    in_flight: Mutex<HashMap<(String, String), SharedCreate>>,
    replay: Mutex<Option<SharedReplay>>,
}

impl TransactionQueue {
    /// `db` is `None` when the local store failed to open; online sales
    /// still work, offline storage reports `NotReady`.
    pub fn new(
        db: Option<Database>,
        gateway: Arc<dyn RemoteGateway>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        connectivity: Connectivity,
    ) -> Self {
        TransactionQueue {
            inner: Arc::new(QueueInner {
                db,
                gateway,
                clock,
                events,
                connectivity,
                in_flight: Mutex::new(HashMap::new()),
                replay: Mutex::new(None),
            }),
        }
    }

    // =========================================================================
    // Online path
    // =========================================================================

    /// Sends one sale to the server.
    ///
    /// A request without `offline_id` gets a fresh one, so only requests
    /// that carry an id are collapsed with each other.
    pub async fn create_transaction(
        &self,
        request: TransactionRequest,
    ) -> SyncResult<RemoteTransaction> {
        validate_transaction_request(&request)?;

        let offline_id = request.offline_id.clone().unwrap_or_else(new_offline_id);
        let key = idempotency_key(&offline_id);
        let slot = (request.outlet_id.clone(), key.as_str().to_string());

        let call = {
            let mut in_flight = lock(&self.inner.in_flight);
            match in_flight.get(&slot) {
                Some(existing) => {
                    debug!(offline_id = %offline_id, key = %key, "Joining in-flight transaction");
                    existing.clone()
                }
                None => {
                    let payload =
                        TransactionPayload::from_request(&request, offline_id, self.inner.clock.now());
                    let inner = Arc::clone(&self.inner);
                    let slot_key = slot.clone();
                    let call = async move {
                        let result = inner.gateway.create_transaction(&payload, &key).await;
                        inner.connectivity.observe(&result);
                        lock(&inner.in_flight).remove(&slot_key);
                        result.map_err(SyncError::from)
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(slot, call.clone());
                    call
                }
            }
        };

        call.await
    }

    /// Tries the server first and queues the sale when it is unreachable.
    pub async fn submit_or_queue(&self, mut request: TransactionRequest) -> SyncResult<SaleOutcome> {
        let offline_id = request.offline_id.get_or_insert_with(new_offline_id).clone();
        if request.created_at.is_none() {
            request.created_at = Some(self.inner.clock.now());
        }

        if !self.inner.connectivity.is_online() {
            self.store_offline_transaction(request).await?;
            return Ok(SaleOutcome::Queued { offline_id });
        }

        match self.create_transaction(request.clone()).await {
            Ok(remote) => Ok(SaleOutcome::Accepted(remote)),
            Err(err) if err.is_retryable() => {
                info!(offline_id = %offline_id, error = %err, "Server unreachable, queueing sale");
                self.store_offline_transaction(request).await?;
                Ok(SaleOutcome::Queued { offline_id })
            }
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Offline path
    // =========================================================================

    /// Persists an unsent sale and returns its `offline_id`.
    ///
    /// Storing the same `offline_id` twice keeps the first record.
    pub async fn store_offline_transaction(&self, request: TransactionRequest) -> SyncResult<String> {
        let db = self.inner.db.as_ref().ok_or(SyncError::NotReady)?;
        validate_transaction_request(&request)?;

        let offline_id = request.offline_id.clone().unwrap_or_else(new_offline_id);
        let record = OfflineTransactionRecord {
            offline_id: offline_id.clone(),
            outlet_id: request.outlet_id.clone(),
            cashier_id: request.cashier_id,
            items: request.items,
            payment: request.payment,
            created_at: request.created_at.unwrap_or_else(|| self.inner.clock.now()),
            status: TransactionStatus::Offline,
            attempts: 0,
            last_error: None,
        };

        if db.offline_transactions().insert(&record).await? {
            info!(offline_id = %offline_id, outlet_id = %record.outlet_id, "Sale stored offline");
            self.inner.events.emit(SyncEvent::TransactionQueued {
                offline_id: offline_id.clone(),
                outlet_id: record.outlet_id,
            });
        } else {
            debug!(offline_id = %offline_id, "Sale already queued");
        }

        Ok(offline_id)
    }

    /// Replays queued sales. Concurrent callers share one pass.
    ///
    /// Returns how many sales the pass moved out of the queue.
    pub async fn sync_offline_transactions(&self) -> SyncResult<usize> {
        if self.inner.db.is_none() {
            return Ok(0);
        }

        let pass = {
            let mut replay = lock(&self.inner.replay);
            match replay.as_ref() {
                Some(running) => {
                    debug!("Joining running replay pass");
                    running.clone()
                }
                None => {
                    let queue = self.clone();
                    let pass = async move {
                        let result = queue.replay_pass().await;
                        *lock(&queue.inner.replay) = None;
                        result
                    }
                    .boxed()
                    .shared();
                    *replay = Some(pass.clone());
                    pass
                }
            }
        };

        pass.await
    }

    pub async fn get_offline_transaction_count(&self) -> SyncResult<i64> {
        match &self.inner.db {
            Some(db) => Ok(db.offline_transactions().count_pending().await?),
            None => Ok(0),
        }
    }

    async fn replay_pass(&self) -> SyncResult<usize> {
        let db = self.inner.db.as_ref().ok_or(SyncError::NotReady)?;
        let repo = db.offline_transactions();
        let pending = repo.list_pending(None).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        info!(pending = pending.len(), "Replaying offline sales");
        let mut synced = 0;

        for record in pending {
            match self.create_transaction(record.to_request()).await {
                Ok(remote) => {
                    let payload = TransactionPayload::from_request(
                        &record.to_request(),
                        record.offline_id.clone(),
                        record.created_at,
                    );
                    let cached = SyncedTransaction {
                        server_id: remote.id.clone(),
                        offline_id: record.offline_id.clone(),
                        outlet_id: record.outlet_id.clone(),
                        total_cents: remote.total_cents,
                        payload: serde_json::to_string(&payload)?,
                        accepted_at: self.inner.clock.now(),
                    };
                    if repo.accept(&cached).await? {
                        synced += 1;
                        debug!(offline_id = %record.offline_id, server_id = %remote.id, "Offline sale accepted");
                    }
                }
                Err(err) => {
                    warn!(
                        offline_id = %record.offline_id,
                        attempts = record.attempts + 1,
                        error = %err,
                        "Offline sale not accepted"
                    );
                    repo.record_failure(&record.offline_id, &err.to_string()).await?;
                    if err.is_retryable() {
                        // The rest would hit the same outage.
                        break;
                    }
                }
            }
        }

        let remaining = repo.count_pending().await?;
        info!(synced = synced, remaining = remaining, "Replay pass finished");
        self.inner.events.emit(SyncEvent::TransactionsSynced { synced, remaining });

        Ok(synced)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
