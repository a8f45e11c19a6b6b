//! # Repository Module
//!
//! Local store repositories.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Owns Which Table                                 │
//! │                                                                         │
//! │  ProductRepository            products, product_tokens,                │
//! │                               products_staging                          │
//! │  SettingsRepository           settings (cursors: products_cursor_*)    │
//! │  OfflineTransactionRepository offline_transactions,                    │
//! │                               synced_transactions                       │
//! │  SyncQueueRepository          sync_queue                                │
//! │                                                                         │
//! │  Nothing outside this module writes SQL.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog partitions and search
//! - [`SettingsRepository`](settings::SettingsRepository) - Key/value settings
//! - [`OfflineTransactionRepository`](offline::OfflineTransactionRepository) - Offline queue
//! - [`SyncQueueRepository`](sync_queue::SyncQueueRepository) - Deferred operations

pub mod offline;
pub mod product;
pub mod settings;
pub mod sync_queue;
