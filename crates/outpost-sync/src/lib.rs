//! # outpost-sync: Offline Sync Engine
//!
//! Keeps a terminal selling while the central server is unreachable and
//! reconciles once it returns, without double-charging sales or dropping
//! catalog updates.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           OfflineCore (facade)                          │
//! │                                                                         │
//! │   ┌───────────────────┐  ┌───────────────────┐  ┌───────────────────┐  │
//! │   │ CatalogSynchronizer│  │ TransactionQueue  │  │  LookupResolver   │  │
//! │   │  full | delta     │  │  collapse + replay │  │  local → remote   │  │
//! │   └─────────┬─────────┘  └─────────┬─────────┘  └─────────┬─────────┘  │
//! │             │                      │                      │            │
//! │     ┌───────▼──────────────────────▼──────────────────────▼───────┐    │
//! │     │  outpost-db (SQLite)          │  RemoteGateway (HTTP)       │    │
//! │     └───────────────────────────────┴─────────────────────────────┘    │
//! │                                                                         │
//! │   SyncScheduler ── periodic delta sync + replay                        │
//! │   EventBus      ── CatalogProgress / CatalogSynced / TransactionsSynced │
//! │   Clock         ── SystemClock | ManualClock                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//! ```rust,ignore
//! use outpost_sync::{HttpGateway, OfflineCore, SystemClock, TerminalConfig};
//!
//! let config = TerminalConfig::load(None)?;
//! let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
//! let core = OfflineCore::open(DbConfig::new(config.database_path()), gateway, &config,
//!     Arc::new(SystemClock)).await;
//!
//! match core.submit_or_queue(request).await? {
//!     SaleOutcome::Accepted(remote) => println!("sale {}", remote.id),
//!     SaleOutcome::Queued { offline_id } => println!("queued {offline_id}"),
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod http;
pub mod queue;
pub mod resolver;
pub mod retry;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{
    CatalogSettings, CatalogSyncOptions, CatalogSyncOutcome, CatalogSynchronizer, ProgressCallback,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TerminalConfig;
pub use connectivity::Connectivity;
pub use engine::{CoreSettings, OfflineCore};
pub use error::{GatewayError, GatewayResult, SyncError, SyncResult};
pub use events::{EventBus, SyncEvent};
pub use gateway::{ProductPage, ProductQuery, RemoteGateway};
pub use http::HttpGateway;
pub use queue::{SaleOutcome, TransactionQueue};
pub use resolver::{LookupResolver, ResolverSettings};
pub use retry::RetryPolicy;
pub use scheduler::{SchedulerHandle, SyncJob, SyncScheduler};
