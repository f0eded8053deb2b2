//! Management API: admin authentication, error bodies and the token/tracking
//! routes, driven through the router without binding a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use courier_sync::api::{self, AppState};
use courier_sync::config::CourierConfig;
use courier_sync::courier::{CourierClient, CourierService, SystemClock, TokenManager};
use courier_sync::store::memory::MemoryStore;

const ADMIN_KEY: &str = "test-admin-key-0123456789";

fn router(server: &MockServer, store: &MemoryStore, admin_key: Option<&str>) -> Router {
    let client = Arc::new(
        CourierClient::new(&CourierConfig {
            base_url: server.uri(),
            ..CourierConfig::default()
        })
        .unwrap(),
    );
    let tokens = Arc::new(TokenManager::new(
        Arc::new(store.clone()),
        client.clone(),
        Arc::new(SystemClock),
        false,
    ));
    let courier = CourierService::new(tokens, client, Arc::new(store.clone()));
    api::app(Arc::new(AppState {
        courier,
        admin_key: admin_key.map(String::from),
    }))
}

fn connected_store() -> MemoryStore {
    let expires = (Utc::now() + Duration::days(2)).timestamp_millis().to_string();
    MemoryStore::new().with_settings([
        ("pathao_client_id", "A"),
        ("pathao_client_secret", "super-secret"),
        ("pathao_username", "u"),
        ("pathao_password", "hunter2"),
        ("pathao_access_token", "tok-access-abc"),
        ("pathao_refresh_token", "tok-refresh-xyz"),
        ("pathao_token_expires_at", expires.as_str()),
    ])
}

fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-admin-key", ADMIN_KEY);
    match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn read_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_healthz_needs_no_key() {
    let server = MockServer::start().await;
    let app = router(&server, &MemoryStore::new(), None);

    let resp = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_admin_key_enforcement() {
    let server = MockServer::start().await;
    let store = connected_store();

    let unconfigured = router(&server, &store, None);
    let resp = unconfigured
        .oneshot(authed("GET", "/api/v1/courier/token", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let app = router(&server, &store, Some(ADMIN_KEY));

    let missing = Request::get("/api/v1/courier/token").body(Body::empty()).unwrap();
    assert_eq!(
        app.clone().oneshot(missing).await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );

    let wrong = Request::get("/api/v1/courier/token")
        .header("x-admin-key", "not-the-key")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app.clone().oneshot(wrong).await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );

    let bearer = Request::get("/api/v1/courier/token")
        .header("authorization", format!("Bearer {}", ADMIN_KEY))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.oneshot(bearer).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_status_never_exposes_secrets() {
    let server = MockServer::start().await;
    let app = router(&server, &connected_store(), Some(ADMIN_KEY));

    let resp = app
        .oneshot(authed("GET", "/api/v1/courier/token", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = read_json(resp).await;
    assert_eq!(body["configured"], true);
    assert_eq!(body["usable"], true);
    assert_eq!(body["has_refresh_token"], true);

    let text = body.to_string();
    for secret in ["tok-access-abc", "tok-refresh-xyz", "super-secret", "hunter2"] {
        assert!(!text.contains(secret), "{} leaked in {}", secret, text);
    }
}

#[tokio::test]
async fn test_blank_credentials_are_bad_request() {
    let server = MockServer::start().await;
    let store = MemoryStore::new();
    let app = router(&server, &store, Some(ADMIN_KEY));

    let resp = app
        .oneshot(authed(
            "PUT",
            "/api/v1/courier/credentials",
            Some(json!({
                "client_id": "A",
                "client_secret": " ",
                "username": "u",
                "password": "p"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.setting_writes(), 0);
}

#[tokio::test]
async fn test_store_credentials() {
    let server = MockServer::start().await;
    let store = MemoryStore::new();
    let app = router(&server, &store, Some(ADMIN_KEY));

    let resp = app
        .oneshot(authed(
            "PUT",
            "/api/v1/courier/credentials",
            Some(json!({
                "client_id": "A",
                "client_secret": "B",
                "username": "u",
                "password": "p"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(store.setting("pathao_client_id").as_deref(), Some("A"));
    assert_eq!(store.setting("pathao_password").as_deref(), Some("p"));
}

#[tokio::test]
async fn test_unconfigured_courier_maps_to_503() {
    let server = MockServer::start().await;
    let app = router(&server, &MemoryStore::new(), Some(ADMIN_KEY));

    let resp = app
        .oneshot(authed("GET", "/api/v1/courier/cities", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = read_json(resp).await;
    assert_eq!(body["error"]["type"], "configuration_error");
    assert_eq!(body["error"]["code"], "courier_not_configured");
}

#[tokio::test]
async fn test_track_route_syncs_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/C1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"consignment_id": "C1", "order_status": "Delivered"}
        })))
        .mount(&server)
        .await;

    let store = connected_store();
    let order_id = store.new_order("in_transit", Some("C1"));
    let app = router(&server, &store, Some(ADMIN_KEY));

    let resp = app
        .clone()
        .oneshot(authed("GET", &format!("/api/v1/orders/{}/tracking", order_id), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = read_json(resp).await;
    assert_eq!(body["courier_status"], "Delivered");
    assert_eq!(body["local_status"], "completed");
    assert_eq!(body["order_id"], order_id.to_string());
    assert_eq!(store.order(order_id).unwrap().status, "completed");

    let resp = app
        .oneshot(authed(
            "POST",
            "/api/v1/courier/track",
            Some(json!({"consignment_id": "C1"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_tracking_errors_use_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/C1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let store = connected_store();
    let linked = store.new_order("sent_to_courier", Some("C1"));
    let unlinked = store.new_order("processing", None);
    let app = router(&server, &store, Some(ADMIN_KEY));

    let resp = app
        .clone()
        .oneshot(authed("GET", "/api/v1/orders/not-a-uuid/tracking", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(authed("GET", &format!("/api/v1/orders/{}/tracking", unlinked), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(resp).await["error"]["code"], "shipment_not_found");

    let resp = app
        .oneshot(authed("GET", &format!("/api/v1/orders/{}/tracking", linked), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = read_json(resp).await;
    assert_eq!(body["error"]["type"], "upstream_error");
    assert_eq!(body["error"]["provider_status"], 500);
    assert_eq!(store.order(linked).unwrap().pathao_status, None);
}
