//! # Catalog Synchronizer
//!
//! Replicates an outlet's product catalog into the local store.
//!
//! ## Run Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          sync_catalog(outlet)                           │
//! │                                                                         │
//! │  paused? ──yes──► { updated: 0, paused: true }   (no network call)     │
//! │     │                                                                   │
//! │     no                                                                  │
//! │     ▼                                                                   │
//! │  cursor stored && !force_full ?                                        │
//! │     │                                 │                                 │
//! │     ▼ FULL                            ▼ DELTA                           │
//! │  page 1..N into a buffer           page 1..N with updated_after=cursor │
//! │  (short page or max_pages ends)    upsert each page as it arrives      │
//! │  replace_outlet_partition(buffer)                                      │
//! │     │                                 │                                 │
//! │     └──────────────┬──────────────────┘                                 │
//! │                    ▼                                                    │
//! │        persist cursor = max(cursor, max updated_at)                    │
//! │                                                                         │
//! │  Transient page failure: retried per RetryPolicy. Exhausted: the      │
//! │  outlet is paused for the cooldown window and the run returns          │
//! │  { updated: partial-or-zero, paused: true } without an error.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use outpost_core::validation::validate_id;
use outpost_core::{ProductRecord, SyncMode, SyncProgress, SyncStage};
use outpost_db::Database;

use crate::clock::{add_duration, Clock};
use crate::connectivity::Connectivity;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, SyncEvent};
use crate::gateway::{ProductPage, ProductQuery, RemoteGateway};
use crate::retry::{retry_transient, RetryError, RetryPolicy};

/// Called once per applied page and once on completion.
pub type ProgressCallback = Arc<dyn Fn(&SyncProgress) + Send + Sync>;

#[derive(Clone, Default)]
pub struct CatalogSyncOptions {
    /// Ignore the stored cursor and replace the whole partition.
    pub force_full: bool,
    /// Overrides the configured page limit for this run.
    pub max_pages: Option<u32>,
    pub on_progress: Option<ProgressCallback>,
}

impl CatalogSyncOptions {
    pub fn full() -> Self {
        CatalogSyncOptions {
            force_full: true,
            ..Default::default()
        }
    }
}

impl fmt::Debug for CatalogSyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogSyncOptions")
            .field("force_full", &self.force_full)
            .field("max_pages", &self.max_pages)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSyncOutcome {
    pub mode: SyncMode,
    pub updated_count: usize,
    /// True when the outlet is (now) in its cooldown window.
    pub paused: bool,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub page_size: u32,
    pub max_pages: u32,
    pub retry: RetryPolicy,
    pub cooldown: Duration,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            page_size: 100,
            max_pages: 1_000,
            retry: RetryPolicy::default(),
            cooldown: Duration::from_secs(60),
        }
    }
}

/// How a run ended before its cursor could be persisted.
enum PageLoop {
    Completed,
    Exhausted,
}

pub struct CatalogSynchronizer {
    db: Database,
    gateway: Arc<dyn RemoteGateway>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    connectivity: Connectivity,
    settings: CatalogSettings,
    paused_until: Mutex<HashMap<String, DateTime<Utc>>>,
    outlet_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CatalogSynchronizer {
    pub fn new(
        db: Database,
        gateway: Arc<dyn RemoteGateway>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        connectivity: Connectivity,
        settings: CatalogSettings,
    ) -> Self {
        CatalogSynchronizer {
            db,
            gateway,
            clock,
            events,
            connectivity,
            settings,
            paused_until: Mutex::new(HashMap::new()),
            outlet_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Brings the outlet's local catalog up to date with the server.
    pub async fn sync_catalog(
        &self,
        outlet_id: &str,
        options: CatalogSyncOptions,
    ) -> SyncResult<CatalogSyncOutcome> {
        validate_id("outlet_id", outlet_id)?;

        let lock = self.outlet_lock(outlet_id);
        let _guard = lock.lock().await;

        let cursor = self.db.settings().get_cursor(outlet_id).await?;
        let mode = if options.force_full || cursor.is_none() {
            SyncMode::Full
        } else {
            SyncMode::Delta
        };

        if let Some(until) = self.paused_until(outlet_id) {
            debug!(outlet_id = %outlet_id, until = %until, "Catalog sync paused, skipping");
            return Ok(CatalogSyncOutcome {
                mode,
                updated_count: 0,
                paused: true,
            });
        }

        let max_pages = options.max_pages.unwrap_or(self.settings.max_pages).max(1);
        info!(outlet_id = %outlet_id, mode = %mode, cursor = ?cursor, "Starting catalog sync");

        let mut run = Run {
            outlet_id,
            mode,
            max_pages,
            cursor,
            updated_count: 0,
            page: 0,
            on_progress: options.on_progress,
        };

        let ended = match mode {
            SyncMode::Full => self.run_full(&mut run).await?,
            SyncMode::Delta => self.run_delta(&mut run).await?,
        };

        if let PageLoop::Exhausted = ended {
            let until = self.pause(outlet_id);
            warn!(
                outlet_id = %outlet_id,
                updated = run.updated_count,
                until = %until,
                "Catalog sync paused after exhausting retries"
            );
            return Ok(CatalogSyncOutcome {
                mode,
                updated_count: run.updated_count,
                paused: true,
            });
        }

        if let Some(new_cursor) = run.cursor {
            if cursor != Some(new_cursor) {
                self.db.settings().put_cursor(outlet_id, new_cursor).await?;
            }
        }

        self.report(&run, run.page, SyncStage::Completed);
        self.events.emit(SyncEvent::CatalogSynced {
            outlet_id: outlet_id.to_string(),
            mode,
            updated_count: run.updated_count,
        });
        info!(outlet_id = %outlet_id, mode = %mode, updated = run.updated_count, "Catalog sync complete");

        Ok(CatalogSyncOutcome {
            mode,
            updated_count: run.updated_count,
            paused: false,
        })
    }

    /// Returns the end of the outlet's cooldown window, if it is paused.
    pub fn paused_until(&self, outlet_id: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let mut paused = self.paused_until.lock().unwrap_or_else(|e| e.into_inner());
        match paused.get(outlet_id) {
            Some(until) if *until > now => Some(*until),
            Some(_) => {
                paused.remove(outlet_id);
                None
            }
            None => None,
        }
    }

    /// Lifts a cooldown early (e.g. the host saw the network come back).
    pub fn resume(&self, outlet_id: &str) {
        self.paused_until
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(outlet_id);
    }

    // =========================================================================
    // Page loops
    // =========================================================================

    /// Buffers every page, then swaps the partition in one transaction.
    async fn run_full(&self, run: &mut Run<'_>) -> SyncResult<PageLoop> {
        let mut buffer: Vec<ProductRecord> = Vec::new();
        let mut page = 1;

        loop {
            let query = ProductQuery::page(page, self.settings.page_size).with_total();
            let Some(fetched) = self.fetch_page(run.outlet_id, &query).await? else {
                // Nothing of a failed full run reaches the store.
                run.updated_count = 0;
                return Ok(PageLoop::Exhausted);
            };

            let short = fetched.items.len() < self.settings.page_size as usize;
            if page == 1 {
                if let Some(total) = fetched.total {
                    buffer.reserve(reserve_hint(total, self.settings.page_size, run.max_pages));
                }
            }
            let items = self.absorb(run, fetched.items);
            buffer.extend(items);
            run.updated_count = buffer.len();
            run.page = page;
            self.report(run, page, SyncStage::Syncing);

            if short {
                break;
            }
            if page >= run.max_pages {
                warn!(outlet_id = %run.outlet_id, max_pages = run.max_pages, "Catalog page limit reached");
                break;
            }
            page += 1;
        }

        let stored = self
            .db
            .products()
            .replace_outlet_partition(run.outlet_id, &buffer)
            .await?;
        debug!(outlet_id = %run.outlet_id, stored = stored, "Catalog partition replaced");

        Ok(PageLoop::Completed)
    }

    /// Applies each changed page as soon as it arrives.
    async fn run_delta(&self, run: &mut Run<'_>) -> SyncResult<PageLoop> {
        let since = run.cursor;
        let mut page = 1;

        loop {
            let query = ProductQuery::page(page, self.settings.page_size).updated_after(since);
            let Some(fetched) = self.fetch_page(run.outlet_id, &query).await? else {
                return Ok(PageLoop::Exhausted);
            };

            let short = fetched.items.len() < self.settings.page_size as usize;
            let items = self.absorb(run, fetched.items);
            if !items.is_empty() {
                self.db.products().upsert_products(&items).await?;
            }
            run.updated_count += items.len();
            run.page = page;
            self.report(run, page, SyncStage::Syncing);

            if short {
                break;
            }
            if page >= run.max_pages {
                warn!(outlet_id = %run.outlet_id, max_pages = run.max_pages, "Catalog page limit reached");
                break;
            }
            page += 1;
        }

        Ok(PageLoop::Completed)
    }

    /// One page with retries. `None` means retries were exhausted.
    async fn fetch_page(&self, outlet_id: &str, query: &ProductQuery) -> SyncResult<Option<ProductPage>> {
        let result = retry_transient(&self.settings.retry, self.clock.as_ref(), "fetch_products", move || {
            self.gateway.fetch_products(outlet_id, query)
        })
        .await;

        match result {
            Ok(page) => {
                self.connectivity.set_online(true);
                Ok(Some(page))
            }
            Err(RetryError::Exhausted { .. }) => {
                self.connectivity.set_online(false);
                Ok(None)
            }
            Err(RetryError::Fatal(err)) => {
                self.connectivity.set_online(true);
                warn!(outlet_id = %outlet_id, page = query.page, error = %err, "Catalog page rejected");
                Err(SyncError::Gateway(err))
            }
        }
    }

    /// Stamps the partition onto server records and advances the run cursor.
    fn absorb(&self, run: &mut Run<'_>, mut items: Vec<ProductRecord>) -> Vec<ProductRecord> {
        for item in &mut items {
            item.outlet_id = run.outlet_id.to_string();
            if run.cursor.map_or(true, |c| item.updated_at > c) {
                run.cursor = Some(item.updated_at);
            }
        }
        items
    }

    fn report(&self, run: &Run<'_>, page: u32, stage: SyncStage) {
        let progress = SyncProgress {
            outlet_id: run.outlet_id.to_string(),
            mode: run.mode,
            page,
            updated_count: run.updated_count,
            stage,
        };
        if let Some(callback) = &run.on_progress {
            callback(&progress);
        }
        self.events.emit(SyncEvent::CatalogProgress(progress));
    }

    fn pause(&self, outlet_id: &str) -> DateTime<Utc> {
        let until = add_duration(self.clock.now(), self.settings.cooldown);
        self.paused_until
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(outlet_id.to_string(), until);
        self.events.emit(SyncEvent::CatalogPaused {
            outlet_id: outlet_id.to_string(),
            until,
        });
        until
    }

    fn outlet_lock(&self, outlet_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.outlet_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(outlet_id.to_string())
            .or_default()
            .clone()
    }
}

/// Buffer capacity for a full run. The server's `total` is only a hint and
/// never exceeds what the page limit can deliver.
fn reserve_hint(total: u64, page_size: u32, max_pages: u32) -> usize {
    let ceiling = u64::from(page_size).saturating_mul(u64::from(max_pages));
    usize::try_from(total.min(ceiling)).unwrap_or(0)
}

/// State of one sync run.
struct Run<'a> {
    outlet_id: &'a str,
    mode: SyncMode,
    max_pages: u32,
    cursor: Option<DateTime<Utc>>,
    updated_count: usize,
    page: u32,
    on_progress: Option<ProgressCallback>,
}
