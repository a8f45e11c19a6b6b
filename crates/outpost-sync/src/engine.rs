//! # Offline Core
//!
//! The facade presentation layers talk to. It wires the local store, the
//! gateway and the clock into the catalog synchronizer, the transaction
//! queue and the lookup resolver.
//!
//! ## Degraded Mode
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Local store opened?                                                    │
//! │                                                                         │
//! │  YES  is_ready() = true     every operation available                  │
//! │                                                                         │
//! │  NO   is_ready() = false    sync_catalog / store_offline ─► NotReady   │
//! │                             cached products / search    ─► empty      │
//! │                             offline count / replay      ─► 0          │
//! │                             barcode lookup, online sale ─► remote only │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let core = OfflineCore::open(DbConfig::new(path), gateway, &config, Arc::new(SystemClock)).await;
//! let mut events = core.subscribe();
//! core.sync_catalog("outlet-7", CatalogSyncOptions::default()).await?;
//! let scheduler = core.spawn_scheduler("outlet-7", config.sync.interval());
//! ```

use futures_util::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use outpost_core::validation::validate_search_query;
use outpost_core::{ProductRecord, RemoteTransaction, TransactionRequest};
use outpost_db::{Database, DbConfig};

use crate::catalog::{CatalogSettings, CatalogSyncOptions, CatalogSyncOutcome, CatalogSynchronizer};
use crate::clock::Clock;
use crate::config::TerminalConfig;
use crate::connectivity::Connectivity;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, SyncEvent};
use crate::gateway::RemoteGateway;
use crate::queue::{SaleOutcome, TransactionQueue};
use crate::resolver::{LookupResolver, ResolverSettings};
use crate::retry::RetryPolicy;
use crate::scheduler::{SchedulerHandle, SyncJob, SyncScheduler};

/// Tuning for every component behind the facade.
#[derive(Debug, Clone, Default)]
pub struct CoreSettings {
    pub catalog: CatalogSettings,
    pub resolver: ResolverSettings,
    /// Default result cap for local search.
    pub search_limit: u32,
}

impl From<&TerminalConfig> for CoreSettings {
    fn from(config: &TerminalConfig) -> Self {
        let sync = &config.sync;
        CoreSettings {
            catalog: CatalogSettings {
                page_size: sync.page_size,
                max_pages: sync.max_pages,
                retry: RetryPolicy::new(sync.retry_delays()),
                cooldown: sync.cooldown(),
            },
            resolver: ResolverSettings {
                search_limit: sync.search_limit,
                accept_lone_candidate: sync.accept_lone_candidate,
            },
            search_limit: sync.search_limit,
        }
    }
}

pub struct OfflineCore {
    db: Option<Database>,
    catalog: Option<Arc<CatalogSynchronizer>>,
    queue: TransactionQueue,
    resolver: LookupResolver,
    clock: Arc<dyn Clock>,
    events: EventBus,
    connectivity: Connectivity,
    search_limit: u32,
}

impl OfflineCore {
    /// Opens the local store and builds the core. A store that fails to
    /// open leaves the core in degraded mode instead of failing.
    pub async fn open(
        db_config: DbConfig,
        gateway: Arc<dyn RemoteGateway>,
        config: &TerminalConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let db = match Database::new(db_config).await {
            Ok(db) => Some(db),
            Err(err) => {
                error!(error = %err, "Local store unavailable, running without offline support");
                None
            }
        };
        OfflineCore::new(db, gateway, CoreSettings::from(config), clock)
    }

    pub fn new(
        db: Option<Database>,
        gateway: Arc<dyn RemoteGateway>,
        settings: CoreSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = EventBus::default();
        let connectivity = Connectivity::default();

        let catalog = db.clone().map(|db| {
            Arc::new(CatalogSynchronizer::new(
                db,
                Arc::clone(&gateway),
                Arc::clone(&clock),
                events.clone(),
                connectivity.clone(),
                settings.catalog.clone(),
            ))
        });
        let queue = TransactionQueue::new(
            db.clone(),
            Arc::clone(&gateway),
            Arc::clone(&clock),
            events.clone(),
            connectivity.clone(),
        );
        let resolver = LookupResolver::new(db.clone(), gateway, connectivity.clone(), settings.resolver);

        OfflineCore {
            db,
            catalog,
            queue,
            resolver,
            clock,
            events,
            connectivity,
            search_limit: if settings.search_limit == 0 { 20 } else { settings.search_limit },
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn is_ready(&self) -> bool {
        self.db.is_some()
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn sync_catalog(
        &self,
        outlet_id: &str,
        options: CatalogSyncOptions,
    ) -> SyncResult<CatalogSyncOutcome> {
        let catalog = self.catalog.as_ref().ok_or(SyncError::NotReady)?;
        catalog.sync_catalog(outlet_id, options).await
    }

    /// Active products of the outlet from the local store.
    pub async fn get_cached_products(&self, outlet_id: &str) -> SyncResult<Vec<ProductRecord>> {
        match &self.db {
            Some(db) => Ok(db.products().get_active_products(outlet_id).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn search_local_products(
        &self,
        outlet_id: &str,
        query: &str,
        limit: Option<u32>,
    ) -> SyncResult<Vec<ProductRecord>> {
        let query = validate_search_query(query)?;
        let Some(db) = &self.db else {
            return Ok(Vec::new());
        };
        let limit = limit.unwrap_or(self.search_limit);
        Ok(db.products().search_products(outlet_id, &query, limit).await?)
    }

    pub async fn get_product_by_barcode(
        &self,
        barcode: &str,
        outlet_id: &str,
    ) -> SyncResult<ProductRecord> {
        self.resolver.get_product_by_barcode(barcode, outlet_id).await
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub async fn create_transaction(
        &self,
        request: TransactionRequest,
    ) -> SyncResult<RemoteTransaction> {
        self.queue.create_transaction(request).await
    }

    pub async fn submit_or_queue(&self, request: TransactionRequest) -> SyncResult<SaleOutcome> {
        self.queue.submit_or_queue(request).await
    }

    pub async fn store_offline_transaction(&self, request: TransactionRequest) -> SyncResult<String> {
        self.queue.store_offline_transaction(request).await
    }

    pub async fn sync_offline_transactions(&self) -> SyncResult<usize> {
        self.queue.sync_offline_transactions().await
    }

    pub async fn get_offline_transaction_count(&self) -> SyncResult<i64> {
        self.queue.get_offline_transaction_count().await
    }

    // =========================================================================
    // Background sync
    // =========================================================================

    /// Starts periodic delta sync of `outlet_id` and offline replay.
    pub fn spawn_scheduler(&self, outlet_id: &str, interval: Duration) -> SchedulerHandle {
        let mut scheduler = SyncScheduler::new(Arc::clone(&self.clock), interval);

        if let Some(catalog) = &self.catalog {
            scheduler = scheduler.job("catalog", catalog_job(Arc::clone(catalog), outlet_id.to_string()));
        } else {
            warn!("Local store not ready, catalog sync not scheduled");
        }
        scheduler = scheduler.job("replay", replay_job(self.queue.clone()));

        info!(outlet_id = %outlet_id, interval_secs = interval.as_secs(), "Background sync scheduled");
        scheduler.spawn()
    }

    pub async fn close(&self) {
        if let Some(db) = &self.db {
            db.close().await;
        }
    }
}

fn catalog_job(catalog: Arc<CatalogSynchronizer>, outlet_id: String) -> SyncJob {
    Arc::new(move || {
        let catalog = Arc::clone(&catalog);
        let outlet_id = outlet_id.clone();
        async move {
            if let Err(err) = catalog.sync_catalog(&outlet_id, CatalogSyncOptions::default()).await {
                warn!(outlet_id = %outlet_id, error = %err, "Scheduled catalog sync failed");
            }
        }
        .boxed()
    })
}

fn replay_job(queue: TransactionQueue) -> SyncJob {
    Arc::new(move || {
        let queue = queue.clone();
        async move {
            if let Err(err) = queue.sync_offline_transactions().await {
                warn!(error = %err, "Scheduled offline replay failed");
            }
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{catalog, sale, transient, ts, MockGateway};
    use outpost_core::SyncMode;

    async fn core_with(gateway: Arc<MockGateway>) -> OfflineCore {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        OfflineCore::new(
            Some(db),
            gateway,
            CoreSettings::from(&TerminalConfig::default()),
            Arc::new(ManualClock::new(ts(0))),
        )
    }

    #[tokio::test]
    async fn test_bootstrap_then_lookup_and_search() {
        let gateway = Arc::new(MockGateway::with_catalog(catalog("o1", 30)));
        let core = core_with(gateway.clone()).await;
        let mut events = core.subscribe();
        assert!(core.is_ready());

        let outcome = core
            .sync_catalog("o1", CatalogSyncOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.mode, SyncMode::Full);
        assert_eq!(core.get_cached_products("o1").await.unwrap().len(), 30);

        let calls = gateway.network_calls();
        let found = core.get_product_by_barcode("BCp0007", "o1").await.unwrap();
        assert_eq!(found.id, "p0007");
        let hits = core.search_local_products("o1", "product p001", None).await.unwrap();
        assert_eq!(hits.len(), 10);
        assert_eq!(gateway.network_calls(), calls);

        let mut saw_synced = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SyncEvent::CatalogSynced { updated_count: 30, .. }) {
                saw_synced = true;
            }
        }
        assert!(saw_synced);
    }

    #[tokio::test]
    async fn test_offline_sale_round_trip() {
        let gateway = Arc::new(MockGateway::default());
        let core = core_with(gateway.clone()).await;

        gateway.set_create_outage(Some(transient()));
        let outcome = core.submit_or_queue(sale("o1", None)).await.unwrap();
        assert!(matches!(outcome, SaleOutcome::Queued { .. }));
        assert_eq!(core.get_offline_transaction_count().await.unwrap(), 1);
        assert!(!core.connectivity().is_online());

        gateway.set_create_outage(None);
        assert_eq!(core.sync_offline_transactions().await.unwrap(), 1);
        assert_eq!(core.get_offline_transaction_count().await.unwrap(), 0);
        assert!(core.connectivity().is_online());
    }

    #[tokio::test]
    async fn test_degraded_mode_without_store() {
        let gateway = Arc::new(MockGateway::with_catalog(catalog("o1", 3)));
        let core = OfflineCore::new(
            None,
            gateway.clone(),
            CoreSettings::default(),
            Arc::new(ManualClock::default()),
        );

        assert!(!core.is_ready());
        assert!(matches!(
            core.sync_catalog("o1", CatalogSyncOptions::default()).await,
            Err(SyncError::NotReady)
        ));
        assert!(core.get_cached_products("o1").await.unwrap().is_empty());
        assert!(core.search_local_products("o1", "product", None).await.unwrap().is_empty());
        assert_eq!(core.get_offline_transaction_count().await.unwrap(), 0);
        assert_eq!(core.sync_offline_transactions().await.unwrap(), 0);
        assert!(matches!(
            core.store_offline_transaction(sale("o1", None)).await,
            Err(SyncError::NotReady)
        ));

        // Remote paths still work.
        let found = core.get_product_by_barcode("BCp0002", "o1").await.unwrap();
        assert_eq!(found.id, "p0002");
        assert!(core.create_transaction(sale("o1", None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_open_degrades_on_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let core = OfflineCore::open(
            DbConfig::new(dir.path()),
            Arc::new(MockGateway::default()),
            &TerminalConfig::default(),
            Arc::new(ManualClock::default()),
        )
        .await;

        assert!(!core.is_ready());
    }

    #[tokio::test]
    async fn test_scheduler_runs_delta_sync_and_replay() {
        let gateway = Arc::new(MockGateway::with_catalog(catalog("o1", 5)));
        let core = core_with(gateway.clone()).await;
        core.sync_catalog("o1", CatalogSyncOptions::default()).await.unwrap();
        core.store_offline_transaction(sale("o1", Some("queued-1"))).await.unwrap();
        let mut events = core.subscribe();

        let handle = core.spawn_scheduler("o1", Duration::from_secs(300));
        loop {
            match events.recv().await {
                Ok(SyncEvent::TransactionsSynced { synced: 1, .. }) => break,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(err) => panic!("event bus closed: {err}"),
            }
        }
        handle.shutdown().await;

        assert_eq!(core.get_offline_transaction_count().await.unwrap(), 0);
        assert!(gateway
            .queries()
            .iter()
            .skip(1)
            .all(|q| q.updated_after == Some(ts(5))));
    }
}
