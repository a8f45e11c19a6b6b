//! Scripted in-memory gateway and fixtures for sync tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use outpost_core::{
    loose_key, IdempotencyKey, LineItem, PaymentInfo, PaymentMethod, ProductRecord,
    RemoteTransaction, TransactionPayload, TransactionRequest,
};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{ProductPage, ProductQuery, RemoteGateway};

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
}

pub fn product(outlet_id: &str, id: &str, updated_secs: i64) -> ProductRecord {
    ProductRecord {
        id: id.to_string(),
        outlet_id: outlet_id.to_string(),
        sku: format!("SKU-{id}"),
        barcode: Some(format!("BC{id}")),
        name: format!("Product {id}"),
        category: None,
        unit_price_cents: 1_000,
        cost_price_cents: 600,
        tax_rate_bps: 0,
        quantity_on_hand: 10,
        reorder_level: 2,
        is_active: true,
        updated_at: ts(updated_secs),
    }
}

/// `count` products p0001.. with increasing timestamps.
pub fn catalog(outlet_id: &str, count: usize) -> Vec<ProductRecord> {
    (1..=count)
        .map(|i| product(outlet_id, &format!("p{i:04}"), i as i64))
        .collect()
}

pub fn sale(outlet_id: &str, offline_id: Option<&str>) -> TransactionRequest {
    TransactionRequest {
        offline_id: offline_id.map(str::to_string),
        outlet_id: outlet_id.to_string(),
        cashier_id: "cashier-1".to_string(),
        items: vec![LineItem {
            product_id: "p0001".into(),
            sku: "SKU-p0001".into(),
            name: "Product p0001".into(),
            quantity: 2,
            unit_price_cents: 1_000,
            tax_rate_bps: 0,
        }],
        payment: PaymentInfo {
            method: PaymentMethod::Cash,
            amount_cents: 2_000,
            reference: None,
        },
        created_at: Some(ts(0)),
    }
}

pub fn transient() -> GatewayError {
    GatewayError::TransientNetwork("connection refused".into())
}

/// A fake server: a catalog, scripted failures and call counters.
#[derive(Default)]
pub struct MockGateway {
    catalog: Mutex<Vec<ProductRecord>>,
    /// Failures returned by `fetch_products` for a given page, front first.
    page_failures: Mutex<HashMap<u32, VecDeque<GatewayError>>>,
    /// Returned by every `fetch_products` call while set.
    fetch_outage: Mutex<Option<GatewayError>>,
    create_failures: Mutex<VecDeque<GatewayError>>,
    create_outage: Mutex<Option<GatewayError>>,
    /// Replaces the real `total` in every product page while set.
    reported_total: Mutex<Option<u64>>,
    accepted: Mutex<HashMap<String, RemoteTransaction>>,
    fetch_calls: AtomicUsize,
    create_calls: AtomicUsize,
    barcode_calls: AtomicUsize,
    queries: Mutex<Vec<ProductQuery>>,
}

impl MockGateway {
    pub fn with_catalog(products: Vec<ProductRecord>) -> Self {
        let gateway = MockGateway::default();
        gateway.set_catalog(products);
        gateway
    }

    pub fn set_catalog(&self, products: Vec<ProductRecord>) {
        *self.catalog.lock().unwrap() = products;
    }

    pub fn fail_page(&self, page: u32, errors: Vec<GatewayError>) {
        self.page_failures
            .lock()
            .unwrap()
            .insert(page, errors.into_iter().collect());
    }

    pub fn set_fetch_outage(&self, error: Option<GatewayError>) {
        *self.fetch_outage.lock().unwrap() = error;
    }

    pub fn report_total(&self, total: Option<u64>) {
        *self.reported_total.lock().unwrap() = total;
    }

    pub fn fail_next_creates(&self, errors: Vec<GatewayError>) {
        self.create_failures.lock().unwrap().extend(errors);
    }

    pub fn set_create_outage(&self, error: Option<GatewayError>) {
        *self.create_outage.lock().unwrap() = error;
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn barcode_calls(&self) -> usize {
        self.barcode_calls.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.fetch_calls() + self.create_calls() + self.barcode_calls()
    }

    /// Distinct sales the server has recorded.
    pub fn accepted_count(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<ProductQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn fetch_products(
        &self,
        outlet_id: &str,
        query: &ProductQuery,
    ) -> GatewayResult<ProductPage> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());

        if let Some(err) = self.fetch_outage.lock().unwrap().clone() {
            return Err(err);
        }
        if let Some(queue) = self.page_failures.lock().unwrap().get_mut(&query.page) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }

        let mut matching: Vec<ProductRecord> = self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.outlet_id == outlet_id)
            .filter(|p| !query.active_only || p.is_active)
            .filter(|p| query.updated_after.map_or(true, |c| p.updated_at > c))
            .filter(|p| match &query.search {
                None => true,
                Some(text) => {
                    let text = text.to_lowercase();
                    p.name.to_lowercase().contains(&text)
                        || p.sku.to_lowercase().contains(&text)
                        || p.barcode
                            .as_deref()
                            .is_some_and(|b| loose_key(b).contains(&loose_key(&text)))
                }
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let start = (query.page.saturating_sub(1) as usize) * query.size as usize;
        let items = matching
            .into_iter()
            .skip(start)
            .take(query.size as usize)
            .collect();

        let total = self
            .reported_total
            .lock()
            .unwrap()
            .or(query.include_total.then_some(total));
        Ok(ProductPage { items, total })
    }

    async fn create_transaction(
        &self,
        payload: &TransactionPayload,
        idempotency_key: &IdempotencyKey,
    ) -> GatewayResult<RemoteTransaction> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        // Let concurrent callers reach the collapsing point.
        tokio::task::yield_now().await;

        if let Some(err) = self.create_outage.lock().unwrap().clone() {
            return Err(err);
        }
        if let Some(err) = self.create_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut accepted = self.accepted.lock().unwrap();
        let next_id = accepted.len() + 1;
        let remote = accepted
            .entry(idempotency_key.as_str().to_string())
            .or_insert_with(|| RemoteTransaction {
                id: format!("srv-{next_id}"),
                offline_id: Some(payload.offline_id.clone()),
                outlet_id: payload.outlet_id.clone(),
                total_cents: payload.total_cents,
                status: "completed".into(),
                created_at: payload.created_at,
            });
        Ok(remote.clone())
    }

    async fn fetch_product_by_barcode(
        &self,
        barcode: &str,
        outlet_id: &str,
    ) -> GatewayResult<ProductRecord> {
        self.barcode_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.fetch_outage.lock().unwrap().clone() {
            return Err(err);
        }

        self.catalog
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.outlet_id == outlet_id && p.barcode.as_deref() == Some(barcode))
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(barcode.to_string()))
    }
}

