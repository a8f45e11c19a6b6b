//! # outpost-core: Pure Domain Logic for the Outpost Offline Core
//!
//! Everything the local store and the sync engine agree on lives here as
//! plain data and pure functions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Outpost Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Presentation layer (external collaborator)           │   │
//! │  │    Scan ──► Lookup ──► Cart ──► Tender ──► Receipt              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  outpost-sync (OfflineCore)                     │   │
//! │  │   CatalogSynchronizer  TransactionQueue  LookupResolver         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ outpost-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌─────────────┐ ┌──────────┐ ┌────────────┐    │   │
//! │  │   │  types   │ │ idempotency │ │ matching │ │ validation │    │   │
//! │  │   │ Product  │ │  offline_id │ │ loose_key│ │  requests  │    │   │
//! │  │   │ Offline  │ │   → UUID    │ │ tokens   │ │            │    │   │
//! │  │   └──────────┘ └─────────────┘ └──────────┘ └────────────┘    │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records (ProductRecord, OfflineTransactionRecord, ...)
//! - [`money`] - Integer-cent money used for sale totals
//! - [`idempotency`] - Deterministic idempotency keys for offline sales
//! - [`matching`] - Loose barcode/SKU matching and name tokenisation
//! - [`validation`] - Transaction request validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use outpost_core::idempotency::idempotency_key;
//!
//! // Legacy free-form ids always map to the same UUID-shaped key
//! let a = idempotency_key("T1-000042");
//! let b = idempotency_key("T1-000042");
//! assert_eq!(a, b);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod idempotency;
pub mod matching;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use idempotency::{idempotency_key, IdempotencyKey};
pub use matching::{codes_match, loose_key, tokenize_name};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items accepted in a single sale.
pub const MAX_LINE_ITEMS: usize = 200;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Catches a mistyped quantity (1000 instead of 10) before it is queued
/// offline, where nobody would notice until replay.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Prefix of the per-outlet catalog cursor setting key.
pub const CURSOR_KEY_PREFIX: &str = "products_cursor_";
