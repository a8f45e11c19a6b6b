//! # Remote Gateway
//!
//! The contract between the offline core and the central server.
//!
//! ```text
//! ┌────────────────┐   fetch_products            ┌──────────────────┐
//! │ Catalog sync   │ ──────────────────────────► │                  │
//! │ Lookup resolver│   fetch_product_by_barcode  │  RemoteGateway   │ ──► server
//! │ Txn queue      │   create_transaction        │                  │
//! └────────────────┘ ──────────────────────────► └──────────────────┘
//! ```
//!
//! Every failure crosses this boundary already classified as a
//! [`GatewayError`]. [`HttpGateway`](crate::http::HttpGateway) is the
//! production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use outpost_core::{IdempotencyKey, ProductRecord, RemoteTransaction, TransactionPayload};

use crate::error::GatewayResult;

/// Query parameters of a catalog page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductQuery {
    /// 1-based page number.
    pub page: u32,
    pub size: u32,
    pub active_only: bool,
    /// Only records changed strictly after this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_after: Option<DateTime<Utc>>,
    pub include_total: bool,
    /// Free-text search over code and name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ProductQuery {
    /// First page of an unfiltered catalog walk.
    pub fn page(page: u32, size: u32) -> Self {
        ProductQuery {
            page,
            size,
            active_only: false,
            updated_after: None,
            include_total: false,
            search: None,
        }
    }

    pub fn updated_after(mut self, cursor: Option<DateTime<Utc>>) -> Self {
        self.updated_after = cursor;
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    pub fn with_total(mut self) -> Self {
        self.include_total = true;
        self
    }
}

/// One page of catalog records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductPage {
    pub items: Vec<ProductRecord>,
    /// Total matching records, when requested.
    #[serde(default)]
    pub total: Option<u64>,
}

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn fetch_products(
        &self,
        outlet_id: &str,
        query: &ProductQuery,
    ) -> GatewayResult<ProductPage>;

    /// Creates a sale. The server deduplicates on `idempotency_key`.
    async fn create_transaction(
        &self,
        payload: &TransactionPayload,
        idempotency_key: &IdempotencyKey,
    ) -> GatewayResult<RemoteTransaction>;

    /// Exact barcode lookup. An unknown code is `GatewayError::NotFound`.
    async fn fetch_product_by_barcode(
        &self,
        barcode: &str,
        outlet_id: &str,
    ) -> GatewayResult<ProductRecord>;
}
