//! # Domain Types
//!
//! Records shared by the local store, the sync engine and the presentation
//! layer.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌────────────────┐   │
//! │  │  ProductRecord  │   │ TransactionRequest   │   │  SyncProgress  │   │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ────────────  │   │
//! │  │  (outlet, id)   │   │  offline_id?         │   │  mode          │   │
//! │  │  sku, barcode?  │   │  items, payment      │   │  page, count   │   │
//! │  │  updated_at ◄───┼── cursor                 │   │  stage         │   │
//! │  └─────────────────┘   └──────────┬───────────┘   └────────────────┘   │
//! │                                   │ server unreachable                  │
//! │                        ┌──────────▼───────────┐                         │
//! │                        │ OfflineTransaction   │  status: offline        │
//! │                        │ Record (queue row)   │  attempts, last_error   │
//! │                        └──────────┬───────────┘                         │
//! │                                   │ server accepted                     │
//! │                        ┌──────────▼───────────┐                         │
//! │                        │ SyncedTransaction    │  cache row              │
//! │                        └──────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Partitioning
//! Every product and transaction belongs to exactly one outlet. Product
//! identity is the pair `(outlet_id, id)`; ids are assigned by the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::CURSOR_KEY_PREFIX;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 825 bps = 8.25%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

// =============================================================================
// Product Record
// =============================================================================

/// A catalog product as replicated from the server into one outlet partition.
///
/// `updated_at` is the server's change timestamp and doubles as the delta
/// sync cursor value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductRecord {
    /// Server-assigned id, unique within the outlet partition.
    pub id: String,
    pub outlet_id: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub unit_price_cents: i64,
    pub cost_price_cents: i64,
    pub tax_rate_bps: i64,
    pub quantity_on_hand: i64,
    pub reorder_level: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns true when stock has fallen to the reorder level.
    pub fn needs_reorder(&self) -> bool {
        self.quantity_on_hand <= self.reorder_level
    }
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Vouchers, mobile wallets and anything else settled outside the terminal.
    Other,
}

/// Payment captured at the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    /// Amount paid in cents.
    pub amount_cents: i64,
    /// External reference (card auth code, voucher number).
    pub reference: Option<String>,
}

// =============================================================================
// Line Item
// =============================================================================

/// A line in a sale, with product data frozen at the time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_rate_bps: u32,
}

impl LineItem {
    /// Snapshot a product into a sale line.
    pub fn from_product(product: &ProductRecord, quantity: i64) -> Self {
        Self {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity,
            unit_price_cents: product.unit_price_cents,
            tax_rate_bps: u32::try_from(product.tax_rate_bps).unwrap_or(0),
        }
    }

    /// unit price × quantity, before tax.
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents) * self.quantity
    }

    pub fn tax(&self) -> Money {
        self.line_total()
            .calculate_tax(TaxRate::from_bps(self.tax_rate_bps))
    }
}

// =============================================================================
// Transaction Request
// =============================================================================

/// A sale as submitted by the presentation layer.
///
/// `offline_id` is generated locally. When absent, the queue assigns a
/// fresh UUID before the sale is sent or stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionRequest {
    pub offline_id: Option<String>,
    pub outlet_id: String,
    pub cashier_id: String,
    pub items: Vec<LineItem>,
    pub payment: PaymentInfo,
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TransactionRequest {
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(LineItem::line_total).sum()
    }

    pub fn tax_total(&self) -> Money {
        self.items.iter().map(LineItem::tax).sum()
    }

    pub fn total(&self) -> Money {
        self.subtotal() + self.tax_total()
    }
}

/// The body posted to the server when creating a transaction.
///
/// Totals are computed once on the terminal so a replayed sale carries the
/// same amounts it was rung up with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionPayload {
    pub offline_id: String,
    pub outlet_id: String,
    pub cashier_id: String,
    pub items: Vec<LineItem>,
    pub payment: PaymentInfo,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl TransactionPayload {
    pub fn from_request(
        request: &TransactionRequest,
        offline_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let subtotal = request.subtotal();
        let tax = request.tax_total();
        Self {
            offline_id: offline_id.into(),
            outlet_id: request.outlet_id.clone(),
            cashier_id: request.cashier_id.clone(),
            items: request.items.clone(),
            payment: request.payment.clone(),
            subtotal_cents: subtotal.cents(),
            tax_cents: tax.cents(),
            total_cents: (subtotal + tax).cents(),
            created_at: request.created_at.unwrap_or(created_at),
        }
    }
}

/// A transaction as acknowledged by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RemoteTransaction {
    /// Server-assigned id.
    pub id: String,
    pub offline_id: Option<String>,
    pub outlet_id: String,
    pub total_cents: i64,
    pub status: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Offline Queue
// =============================================================================

/// Status of a queued sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Completed locally, not yet accepted by the server.
    Offline,
    /// Accepted by the server; the row is about to leave the queue.
    Synced,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Offline
    }
}

/// A sale completed while the server was unreachable.
///
/// Immutable apart from `status` and the replay bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OfflineTransactionRecord {
    pub offline_id: String,
    pub outlet_id: String,
    pub cashier_id: String,
    pub items: Vec<LineItem>,
    pub payment: PaymentInfo,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub status: TransactionStatus,
    /// Number of replay attempts so far.
    pub attempts: i64,
    pub last_error: Option<String>,
}

impl OfflineTransactionRecord {
    /// Rebuild the request this record was stored from.
    pub fn to_request(&self) -> TransactionRequest {
        TransactionRequest {
            offline_id: Some(self.offline_id.clone()),
            outlet_id: self.outlet_id.clone(),
            cashier_id: self.cashier_id.clone(),
            items: self.items.clone(),
            payment: self.payment.clone(),
            created_at: Some(self.created_at),
        }
    }
}

/// Local cache row for a sale the server accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SyncedTransaction {
    pub server_id: String,
    pub offline_id: String,
    pub outlet_id: String,
    pub total_cents: i64,
    /// The accepted payload as JSON.
    pub payload: String,
    #[ts(as = "String")]
    pub accepted_at: DateTime<Utc>,
}

// =============================================================================
// Catalog Sync Progress
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Whole catalog fetched and swapped in atomically.
    Full,
    /// Only records changed strictly after the stored cursor.
    Delta,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Full => write!(f, "full"),
            SyncMode::Delta => write!(f, "delta"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Syncing,
    Completed,
}

/// Per-page progress report. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncProgress {
    pub outlet_id: String,
    pub mode: SyncMode,
    pub page: u32,
    pub updated_count: usize,
    pub stage: SyncStage,
}

// =============================================================================
// Settings & Deferred Operations
// =============================================================================

/// Key/value row owned by the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SettingItem {
    pub key: String,
    pub value: String,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A generic deferred operation waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SyncQueueItem {
    pub id: i64,
    /// Operation kind, e.g. "stock_adjustment".
    pub kind: String,
    /// Operation data as JSON.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Setting key holding the catalog cursor of `outlet_id`.
pub fn cursor_key(outlet_id: &str) -> String {
    format!("{CURSOR_KEY_PREFIX}{outlet_id}")
}

// =============================================================================
// Unit Tests
// =============================================================================
