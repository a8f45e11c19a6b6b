//! # Lookup Resolver
//!
//! Turns a scanned or typed code into a product.
//!
//! ```text
//! code ──trim──► local store: exact barcode → exact SKU → loose barcode → loose SKU
//!                   │ hit: done, no network
//!                   ▼ miss
//!              offline? ──yes──► Offline (retryable, never "not found")
//!                   │
//!                   ▼ online
//!              GET barcode endpoint ──hit──► cache locally, done
//!                   │ NotFound
//!                   ▼
//!              remote search: candidate whose barcode/SKU matches (strict or
//!              loose), else the lone candidate ──► cache locally, done
//!                   │ nothing
//!                   ▼
//!              NotFound
//! ```

use std::sync::Arc;
use tracing::{debug, info, warn};

use outpost_core::validation::validate_id;
use outpost_core::{codes_match, ProductRecord, ValidationError};
use outpost_db::Database;

use crate::connectivity::Connectivity;
use crate::error::{GatewayError, SyncError, SyncResult};
use crate::gateway::{ProductQuery, RemoteGateway};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Candidates requested by the remote search fallback.
    pub search_limit: u32,
    /// Accept a single search result even when its codes do not match.
    pub accept_lone_candidate: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            search_limit: 20,
            accept_lone_candidate: true,
        }
    }
}

#[derive(Clone)]
pub struct LookupResolver {
    db: Option<Database>,
    gateway: Arc<dyn RemoteGateway>,
    connectivity: Connectivity,
    settings: ResolverSettings,
}

impl LookupResolver {
    pub fn new(
        db: Option<Database>,
        gateway: Arc<dyn RemoteGateway>,
        connectivity: Connectivity,
        settings: ResolverSettings,
    ) -> Self {
        LookupResolver {
            db,
            gateway,
            connectivity,
            settings,
        }
    }

    pub async fn get_product_by_barcode(
        &self,
        barcode: &str,
        outlet_id: &str,
    ) -> SyncResult<ProductRecord> {
        validate_id("outlet_id", outlet_id)?;
        let code = barcode.trim();
        if code.is_empty() {
            return Err(ValidationError::Required {
                field: "barcode".into(),
            }
            .into());
        }

        if let Some(product) = self.find_local(outlet_id, code).await {
            debug!(outlet_id = %outlet_id, code = %code, product_id = %product.id, "Resolved locally");
            return Ok(product);
        }

        if !self.connectivity.is_online() {
            debug!(outlet_id = %outlet_id, code = %code, "Local miss while offline");
            return Err(SyncError::Offline);
        }

        let exact = self.gateway.fetch_product_by_barcode(code, outlet_id).await;
        self.connectivity.observe(&exact);
        match exact {
            Ok(product) => return Ok(self.cache(outlet_id, product).await),
            Err(GatewayError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let query = ProductQuery::page(1, self.settings.search_limit.max(1))
            .active_only()
            .search(code);
        let page = self.gateway.fetch_products(outlet_id, &query).await;
        self.connectivity.observe(&page);
        let candidates = page?.items;

        match self.pick_candidate(code, candidates) {
            Some(product) => Ok(self.cache(outlet_id, product).await),
            None => {
                debug!(outlet_id = %outlet_id, code = %code, "Not found locally or remotely");
                Err(GatewayError::NotFound(code.to_string()).into())
            }
        }
    }

    async fn find_local(&self, outlet_id: &str, code: &str) -> Option<ProductRecord> {
        let db = self.db.as_ref()?;
        match db.products().find_by_code(outlet_id, code).await {
            Ok(found) => found,
            Err(err) => {
                warn!(outlet_id = %outlet_id, error = %err, "Local lookup failed, trying remote");
                None
            }
        }
    }

    fn pick_candidate(&self, code: &str, candidates: Vec<ProductRecord>) -> Option<ProductRecord> {
        let lone = candidates.len() == 1;
        let mut candidates = candidates.into_iter();

        if lone {
            let only = candidates.next()?;
            if match_rank(&only, code).is_some() {
                return Some(only);
            }
            if self.settings.accept_lone_candidate {
                info!(code = %code, product_id = %only.id, "Accepting lone search candidate");
                return Some(only);
            }
            return None;
        }

        candidates
            .filter_map(|p| match_rank(&p, code).map(|rank| (rank, p)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, p)| p)
    }

    /// Stores a remote hit so the next scan is served locally.
    async fn cache(&self, outlet_id: &str, mut product: ProductRecord) -> ProductRecord {
        product.outlet_id = outlet_id.to_string();
        if let Some(db) = &self.db {
            if let Err(err) = db.products().upsert_products(std::slice::from_ref(&product)).await {
                warn!(product_id = %product.id, error = %err, "Failed to cache remote product");
            }
        }
        product
    }
}

/// Same precedence as the local index: exact barcode, exact SKU, loose
/// barcode, loose SKU. `None` when nothing matches.
fn match_rank(product: &ProductRecord, code: &str) -> Option<u8> {
    let barcode = product.barcode.as_deref().map(str::trim);
    let sku = product.sku.trim();

    if barcode == Some(code) {
        Some(0)
    } else if sku == code {
        Some(1)
    } else if barcode.is_some_and(|b| codes_match(b, code)) {
        Some(2)
    } else if codes_match(sku, code) {
        Some(3)
    } else {
        None
    }
}
