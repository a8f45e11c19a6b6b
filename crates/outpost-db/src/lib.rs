//! # outpost-db: Local Store for the Outpost Offline Core
//!
//! SQLite persistence for everything a terminal needs while disconnected.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Outpost Data Flow                                │
//! │                                                                         │
//! │  CatalogSynchronizer / TransactionQueue / LookupResolver               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    outpost-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐ │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │ │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │ │   │
//! │  │   │               │    │ ProductRepository  │  │            │ │   │
//! │  │   │ SqlitePool    │◄───│ SettingsRepository │  │ 001..003   │ │   │
//! │  │   │ WAL           │    │ OfflineTxRepository│  │            │ │   │
//! │  │   │               │    │ SyncQueueRepository│  │            │ │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite file, shared by every terminal process on the device   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use outpost_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/outpost.db")).await?;
//!
//! db.products().upsert_products(&page).await?;
//! let hits = db.products().search_products("outlet-1", "coca", 20).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::offline::OfflineTransactionRepository;
pub use repository::product::ProductRepository;
pub use repository::settings::SettingsRepository;
pub use repository::sync_queue::SyncQueueRepository;
