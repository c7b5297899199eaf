//! HTTP client for the Selling Partner API, one instance per region/profile.

use crate::config::Config;
use crate::error::RemoteError;
use crate::marketplace::regions::RegionKey;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use wreq::Client;

const USER_AGENT: &str = concat!("catalog-fanout/", env!("CARGO_PKG_VERSION"));

/// Remote operation descriptor: operation name plus path and query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub operation: &'static str,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
}

impl RemoteRequest {
    /// `getListingsRestrictions` for one ASIN in one marketplace.
    pub fn restrictions(
        asin: &str,
        seller_id: &str,
        marketplace_id: &str,
        condition_type: &str,
    ) -> Self {
        Self {
            operation: "getListingsRestrictions",
            path: "/listings/2021-08-01/restrictions".to_string(),
            query: vec![
                ("asin", asin.to_string()),
                ("sellerId", seller_id.to_string()),
                ("marketplaceIds", marketplace_id.to_string()),
                ("conditionType", condition_type.to_string()),
            ],
        }
    }

    /// `getItemOffers` for one ASIN in one marketplace.
    pub fn offers(asin: &str, marketplace_id: &str, item_condition: &str) -> Self {
        Self {
            operation: "getItemOffers",
            path: format!("/products/pricing/v0/items/{}/offers", urlencoding::encode(asin)),
            query: vec![
                ("MarketplaceId", marketplace_id.to_string()),
                ("ItemCondition", item_condition.to_string()),
            ],
        }
    }

    /// Renders the path with its url-encoded query string.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }

        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

/// Trait for remote catalog calls - enables mocking for tests.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Performs one read operation and returns the decoded JSON body.
    async fn invoke(&self, request: &RemoteRequest) -> Result<Value, RemoteError>;

    /// Returns the region/profile this handle is bound to.
    fn region_key(&self) -> RegionKey;
}

/// Selling Partner API client bound to one region and profile.
pub struct SpApiClient {
    client: Client,
    key: RegionKey,
    base_url: String,
    access_token: Option<String>,
}

impl SpApiClient {
    /// Creates a client for the region, honouring endpoint overrides from config.
    pub fn new(config: &Config, key: RegionKey) -> Result<Self> {
        Self::with_base_url(config, key, config.endpoint_for(key))
    }

    /// Creates a client with an optional custom base URL (for testing).
    pub fn with_base_url(config: &Config, key: RegionKey, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .with_context(|| format!("Failed to build HTTP client for {}", key))?;

        let base_url = base_url
            .unwrap_or_else(|| key.region.endpoint().to_string())
            .trim_end_matches('/')
            .to_string();
        debug!("Client for {} -> {}", key, base_url);

        Ok(Self { client, key, base_url, access_token: config.access_token_for(key) })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CatalogApi for SpApiClient {
    async fn invoke(&self, request: &RemoteRequest) -> Result<Value, RemoteError> {
        let url = format!("{}{}", self.base_url, request.path_and_query());
        debug!("{} GET {}", request.operation, url);

        let mut builder = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        if let Some(token) = &self.access_token {
            builder = builder.header("x-amz-access-token", token);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!("{} response status: {}", request.operation, status);

        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let err = status_error(status.as_u16(), &body);
            if status.as_u16() == 429 {
                warn!("Rate limited on {} ({})", self.key, request.operation);
            }
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn region_key(&self) -> RegionKey {
        self.key
    }
}

fn transport_error(err: wreq::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout(err.to_string())
    } else if err.is_connect() {
        RemoteError::Unreachable(err.to_string())
    } else {
        RemoteError::Transport(err.to_string())
    }
}

/// Builds a status error, lifting `code`/`message` out of the API's
/// `{ "errors": [...] }` envelope when present.
fn status_error(status: u16, body: &str) -> RemoteError {
    let first = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("errors").and_then(Value::as_array).and_then(|e| e.first()).cloned());

    let code = first.as_ref().and_then(|e| e.get("code")).and_then(Value::as_str).map(str::to_string);
    let message = first
        .as_ref()
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        });

    RemoteError::Status { status, code, message }
}
