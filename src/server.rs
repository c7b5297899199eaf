//! HTTP surface: JSON endpoints over [`CatalogService`].

use crate::error::Error;
use crate::marketplace::models::{OfferSummary, RestrictionStatus};
use crate::service::{BatchRequest, CatalogService, LookupRequest, LookupResponse, ScanResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Largest accepted request body.
pub const BODY_LIMIT: usize = 1024 * 1024;

pub type AppState = Arc<CatalogService>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::MalformedInput(reason) => ApiError::BadRequest(reason),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(reason) => {
                error!("Request failed: {}", reason);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/restrictions", post(restrictions))
        .route("/offers", post(offers))
        .route("/batch/scan", post(batch_scan))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn restrictions(
    State(service): State<AppState>,
    body: Result<Json<LookupRequest>, JsonRejection>,
) -> ApiResult<LookupResponse<RestrictionStatus>> {
    let Json(request) = body?;
    Ok(Json(service.restrictions(request).await?))
}

async fn offers(
    State(service): State<AppState>,
    body: Result<Json<LookupRequest>, JsonRejection>,
) -> ApiResult<LookupResponse<OfferSummary>> {
    let Json(request) = body?;
    Ok(Json(service.offers(request).await?))
}

async fn batch_scan(
    State(service): State<AppState>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<ScanResponse> {
    let Json(request) = body?;
    Ok(Json(service.scan(request).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::RemoteError;
    use crate::marketplace::client::{CatalogApi, RemoteRequest};
    use crate::marketplace::regions::RegionKey;
    use crate::marketplace::router::{ClientFactory, ClientHandle, RegionRouter};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use tower::ServiceExt;

    struct OpenApi(RegionKey);

    #[async_trait]
    impl CatalogApi for OpenApi {
        async fn invoke(&self, request: &RemoteRequest) -> Result<Value, RemoteError> {
            match request.operation {
                "getListingsRestrictions" => Ok(json!({ "restrictions": [] })),
                _ => Ok(json!({ "payload": { "Summary": {
                    "TotalOfferCount": 1,
                    "BuyBoxPrices": [{ "LandedPrice": { "Amount": 9.5, "CurrencyCode": "EUR" } }]
                }}})),
            }
        }

        fn region_key(&self) -> RegionKey {
            self.0
        }
    }

    struct OpenFactory;

    #[async_trait]
    impl ClientFactory for OpenFactory {
        async fn connect(&self, key: RegionKey) -> anyhow::Result<ClientHandle> {
            Ok(Arc::new(OpenApi(key)))
        }
    }

    fn app(seller_id: Option<&str>) -> Router {
        let config = Config { seller_id: seller_id.map(str::to_string), ..Config::default() };
        let router = Arc::new(RegionRouter::new(Arc::new(OpenFactory)));
        app_router(Arc::new(CatalogService::new(&config, router)))
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(None)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_batch_scan() {
        let (status, body) = post_json(
            app(Some("SELLER1")),
            "/batch/scan",
            r#"{"asins":["B08N5WRWNW"],"marketplaceIds":["de","XX"],"concurrency":3}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        let entity = &body["results"]["B08N5WRWNW"];
        assert_eq!(entity["restrictions"]["de"]["state"], "success");
        assert_eq!(entity["restrictions"]["de"]["allowed"], true);
        assert_eq!(entity["offers"]["de"]["buyBoxPrice"]["amount"], 9.5);
        assert_eq!(entity["restrictions"]["XX"]["state"], "failure");
        assert_eq!(entity["restrictions"]["XX"]["allowed"], false);
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
        assert_eq!(body["errors"][0]["marketplaceId"], "XX");
    }

    #[tokio::test]
    async fn test_batch_scan_missing_asins() {
        let (status, body) =
            post_json(app(Some("SELLER1")), "/batch/scan", r#"{"marketplaceIds":["us"]}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("body.asins"));

        let (status, body) =
            post_json(app(Some("SELLER1")), "/batch/scan", r#"{"asins":["B08N5WRWNW"]}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("body.marketplaceIds"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let (status, body) = post_json(app(None), "/offers", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_seller_id_is_server_error() {
        let (status, body) = post_json(
            app(None),
            "/restrictions",
            r#"{"asin":"B08N5WRWNW","marketplaceIds":["us"]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("seller id"));
    }

    #[tokio::test]
    async fn test_offers_lookup() {
        let (status, body) = post_json(
            app(None),
            "/offers",
            r#"{"asin":"B08N5WRWNW","marketplaceIds":["fr","it"],"itemCondition":"Used"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"]["fr"]["offerCount"], 1);
        assert_eq!(body["results"]["it"]["available"], true);
        assert!(body["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_scan_clamps_concurrency() {
        for concurrency in ["-3", "0", "500", r#""5""#, "2.5", r#""many""#, "null"] {
            let body = format!(
                r#"{{"asins":["B08N5WRWNW"],"marketplaceIds":["us","de"],"concurrency":{}}}"#,
                concurrency
            );
            let (status, body) = post_json(app(Some("SELLER1")), "/batch/scan", &body).await;
            assert_eq!(status, StatusCode::OK, "concurrency {}", concurrency);
            assert_eq!(body["count"], 1);
            assert_eq!(body["results"]["B08N5WRWNW"]["offers"]["us"]["state"], "success");
        }
    }

    #[tokio::test]
    async fn test_batch_scan_too_many_marketplaces() {
        let keys: Vec<String> = (0..30).map(|i| format!(r#""M{}""#, i)).collect();
        let body = format!(r#"{{"asins":["B08N5WRWNW"],"marketplaceIds":[{}]}}"#, keys.join(","));
        let (status, body) = post_json(app(Some("SELLER1")), "/batch/scan", &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("At most"));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let huge = format!(r#"{{"asins":["{}"],"marketplaceIds":["us"]}}"#, "A".repeat(BODY_LIMIT));
        let (status, _) = post_json(app(Some("SELLER1")), "/batch/scan", &huge).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
