//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use emporium_api::config::Service;
use emporium_api::extract::USER_ID_HEADER;
use emporium_api::server;
use emporium_api::state::AppState;
use emporium_broker::InMemoryBroker;
use emporium_core::clock::Clock;
use emporium_store::MemoryDocumentStore;
use emporium_test_support::{FixedClock, in_memory_client};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Build one service over its own in-memory store, sharing `broker` with the
/// other services, and start its consumers. Uses the same wiring as `main.rs`.
pub async fn build_service(service: Service, broker: &InMemoryBroker) -> Router {
    let client = in_memory_client(broker, &format!("{service}-service"));
    let state = AppState::new(Arc::new(MemoryDocumentStore::new()), client, fixed_clock());
    server::start_consumers(service, &state).await;
    server::build_router(service, state)
}

/// The four services wired to one log.
pub struct Storefront {
    pub broker: InMemoryBroker,
    pub product: Router,
    pub user: Router,
    pub cart: Router,
    pub order: Router,
}

impl Storefront {
    pub async fn start() -> Self {
        let broker = InMemoryBroker::new();
        Self {
            product: build_service(Service::Product, &broker).await,
            user: build_service(Service::User, &broker).await,
            cart: build_service(Service::Cart, &broker).await,
            order: build_service(Service::Order, &broker).await,
            broker,
        }
    }

    /// Wait until every consumer has caught up with the log.
    pub async fn settle(&self) {
        assert!(
            self.broker.settle(Duration::from_secs(5)).await,
            "consumers did not catch up"
        );
    }
}

/// Send a request with an optional JSON body and caller, returning the
/// status and the JSON response body.
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    caller: Option<Uuid>,
    body: Option<&Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header(USER_ID_HEADER, caller.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: &Router,
    uri: &str,
    caller: Option<Uuid>,
    body: &Value,
) -> (StatusCode, Value) {
    send_json(app, "POST", uri, caller, Some(body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: &Router, uri: &str, caller: Option<Uuid>) -> (StatusCode, Value) {
    send_json(app, "GET", uri, caller, None).await
}

/// Extract the `id` field of a response body.
pub fn id_of(json: &Value) -> Uuid {
    Uuid::parse_str(json["id"].as_str().unwrap()).unwrap()
}
