//! # HTTP Gateway
//!
//! [`RemoteGateway`] over the central server's REST API.
//!
//! | Operation                  | Request                                            |
//! |----------------------------|----------------------------------------------------|
//! | `fetch_products`           | `GET  /api/outlets/{outlet}/products?page=..`      |
//! | `fetch_product_by_barcode` | `GET  /api/outlets/{outlet}/products/barcode/{code}` |
//! | `create_transaction`       | `POST /api/transactions` + `Idempotency-Key`       |

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use outpost_core::{IdempotencyKey, ProductRecord, RemoteTransaction, TransactionPayload};

use crate::config::GatewaySettings;
use crate::error::{GatewayError, GatewayResult, SyncError, SyncResult};
use crate::gateway::{ProductPage, ProductQuery, RemoteGateway};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(settings: &GatewaySettings) -> SyncResult<Self> {
        let base_url = Url::parse(&settings.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(settings.base_url.clone()));
        }

        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(HttpGateway {
            client,
            base_url,
            api_key: settings.api_key.clone(),
        })
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Validation(format!("bad base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> GatewayResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        // A body cut off mid-stream is a network failure, not a bad payload.
        let body = response.bytes().await.map_err(transport_error)?;

        serde_json::from_slice(&body).map_err(|e| GatewayError::ServerRejected {
            status: status.as_u16(),
            message: format!("malformed response body: {e}"),
        })
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_products(
        &self,
        outlet_id: &str,
        query: &ProductQuery,
    ) -> GatewayResult<ProductPage> {
        let url = self.endpoint(&["api", "outlets", outlet_id, "products"])?;

        let mut params: Vec<(&str, String)> = vec![
            ("page", query.page.to_string()),
            ("size", query.size.to_string()),
            ("active_only", query.active_only.to_string()),
            ("include_total", query.include_total.to_string()),
        ];
        if let Some(cursor) = query.updated_after {
            params.push((
                "updated_after",
                cursor.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ));
        }
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }

        debug!(outlet_id = %outlet_id, page = query.page, "GET products page");

        let response = self
            .authorize(self.client.get(url).query(&params))
            .send()
            .await
            .map_err(transport_error)?;
        Self::handle_response(response).await
    }

    async fn create_transaction(
        &self,
        payload: &TransactionPayload,
        idempotency_key: &IdempotencyKey,
    ) -> GatewayResult<RemoteTransaction> {
        let url = self.endpoint(&["api", "transactions"])?;

        debug!(
            offline_id = %payload.offline_id,
            key = %idempotency_key,
            "POST transaction"
        );

        let response = self
            .authorize(self.client.post(url).json(payload))
            .header(IDEMPOTENCY_HEADER, idempotency_key.as_str())
            .send()
            .await
            .map_err(transport_error)?;
        Self::handle_response(response).await
    }

    async fn fetch_product_by_barcode(
        &self,
        barcode: &str,
        outlet_id: &str,
    ) -> GatewayResult<ProductRecord> {
        let url = self.endpoint(&["api", "outlets", outlet_id, "products", "barcode", barcode])?;

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(transport_error)?;
        Self::handle_response(response).await
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Maps a non-success HTTP status to the error taxonomy.
pub fn classify_status(status: StatusCode, body: String) -> GatewayError {
    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(body),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => GatewayError::Validation(body),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            GatewayError::TransientNetwork(format!("{status}: {body}"))
        }
        s if s.is_server_error() => GatewayError::TransientNetwork(format!("{status}: {body}")),
        s => GatewayError::ServerRejected {
            status: s.as_u16(),
            message: body,
        },
    }
}

/// Failures before a status line arrives are all transient.
fn transport_error(err: reqwest::Error) -> GatewayError {
    GatewayError::TransientNetwork(err.to_string())
}
