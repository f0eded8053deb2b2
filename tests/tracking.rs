//! Shipment registration and tracking against a mocked courier API.
//!
//! The courier is served by wiremock; orders and settings live in the
//! in-memory store so every write can be inspected.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use courier_sync::config::CourierConfig;
use courier_sync::courier::status::LocalStatus;
use courier_sync::courier::{CourierClient, CourierService, SystemClock, TokenManager};
use courier_sync::errors::CourierError;
use courier_sync::models::order::OrderRef;
use courier_sync::models::shipment::{DeliveryType, ItemType, ShipmentRequest};
use courier_sync::store::memory::MemoryStore;

fn service_for(server: &MockServer, store: &MemoryStore) -> CourierService {
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
    CourierService::new(tokens, client, Arc::new(store.clone()))
}

/// Credentials plus an access token valid for two more days.
fn connected_store() -> MemoryStore {
    let expires = (Utc::now() + Duration::days(2)).timestamp_millis().to_string();
    MemoryStore::new().with_settings([
        ("pathao_client_id", "A"),
        ("pathao_client_secret", "B"),
        ("pathao_username", "u"),
        ("pathao_password", "p"),
        ("pathao_access_token", "T1"),
        ("pathao_refresh_token", "R1"),
        ("pathao_token_expires_at", expires.as_str()),
    ])
}

async fn mount_status(server: &MockServer, consignment: &str, status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/orders/{}", consignment)))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "success",
            "code": 200,
            "data": {"consignment_id": consignment, "order_status": status}
        })))
        .mount(server)
        .await;
}

fn shipment_request() -> ShipmentRequest {
    ShipmentRequest {
        store_id: 7,
        merchant_order_id: None,
        sender_name: None,
        sender_phone: None,
        recipient_name: "Rahim".into(),
        recipient_phone: "01700000000".into(),
        recipient_address: "House 1, Road 2, Dhanmondi".into(),
        recipient_city: 1,
        recipient_zone: 52,
        recipient_area: None,
        delivery_type: DeliveryType::Normal,
        item_type: ItemType::Parcel,
        special_instruction: None,
        item_quantity: 1,
        item_weight: 0.5,
        amount_to_collect: 950,
        item_description: None,
    }
}

#[tokio::test]
async fn test_delivered_updates_both_status_fields() {
    let server = MockServer::start().await;
    mount_status(&server, "C1", "Delivered").await;

    let store = connected_store();
    let order_id = store.new_order("in_transit", Some("C1"));
    let service = service_for(&server, &store);

    let outcome = service.track_and_sync(&OrderRef::by_order(order_id)).await.unwrap();
    assert_eq!(outcome.courier_status, "Delivered");
    assert_eq!(outcome.local_status, Some(LocalStatus::Completed));
    assert_eq!(outcome.order_id, Some(order_id));
    assert!(outcome.status_applied);

    let order = store.order(order_id).unwrap();
    assert_eq!(order.status, "completed");
    assert_eq!(order.pathao_status.as_deref(), Some("Delivered"));
}

#[tokio::test]
async fn test_unmapped_status_leaves_local_status_untouched() {
    let server = MockServer::start().await;
    mount_status(&server, "C1", "Some_New_Status").await;

    let store = connected_store();
    let order_id = store.new_order("picked_up", Some("C1"));
    let service = service_for(&server, &store);

    let outcome = service.track_and_sync(&OrderRef::by_order(order_id)).await.unwrap();
    assert_eq!(outcome.local_status, None);
    assert!(!outcome.status_applied);

    let order = store.order(order_id).unwrap();
    assert_eq!(order.status, "picked_up");
    assert_eq!(order.pathao_status.as_deref(), Some("Some_New_Status"));
}

#[tokio::test]
async fn test_reverse_lookup_by_consignment() {
    let server = MockServer::start().await;
    mount_status(&server, "C9", "Picked").await;

    let store = connected_store();
    let order_id = store.new_order("sent_to_courier", Some("C9"));
    let service = service_for(&server, &store);

    let outcome = service.track_and_sync(&OrderRef::by_consignment("C9")).await.unwrap();
    assert_eq!(outcome.order_id, Some(order_id));
    assert_eq!(store.order(order_id).unwrap().status, "picked_up");
}

#[tokio::test]
async fn test_unlinked_consignment_still_reports_status() {
    let server = MockServer::start().await;
    mount_status(&server, "ORPHAN", "In_Transit").await;

    let store = connected_store();
    let other = store.new_order("processing", Some("C1"));
    let service = service_for(&server, &store);

    let outcome = service
        .track_and_sync(&OrderRef::by_consignment("ORPHAN"))
        .await
        .unwrap();
    assert_eq!(outcome.courier_status, "In_Transit");
    assert_eq!(outcome.local_status, Some(LocalStatus::InTransit));
    assert_eq!(outcome.order_id, None);
    assert!(!outcome.status_applied);

    let untouched = store.order(other).unwrap();
    assert_eq!(untouched.status, "processing");
    assert_eq!(untouched.pathao_status, None);
}

#[tokio::test]
async fn test_unresolvable_reference_is_not_found_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = connected_store();
    let unlinked = store.new_order("processing", None);
    let service = service_for(&server, &store);

    for order_ref in [
        OrderRef::default(),
        OrderRef::by_order(unlinked),
        OrderRef::by_order(Uuid::new_v4()),
        OrderRef::by_consignment("   "),
    ] {
        let err = service.track_and_sync(&order_ref).await.unwrap_err();
        assert!(matches!(err, CourierError::NotFound(_)), "{:?} gave {:?}", order_ref, err);
    }
}

#[tokio::test]
async fn test_status_regression_is_not_applied() {
    let server = MockServer::start().await;
    mount_status(&server, "C1", "In_Transit").await;

    let store = connected_store();
    let order_id = store.new_order("completed", Some("C1"));
    let service = service_for(&server, &store);

    let outcome = service.track_and_sync(&OrderRef::by_order(order_id)).await.unwrap();
    assert_eq!(outcome.local_status, Some(LocalStatus::InTransit));
    assert!(!outcome.status_applied);

    let order = store.order(order_id).unwrap();
    assert_eq!(order.status, "completed");
    assert_eq!(order.pathao_status.as_deref(), Some("In_Transit"));
}

#[tokio::test]
async fn test_missing_order_status_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/C1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"consignment_id": "C1"}})))
        .mount(&server)
        .await;

    let store = connected_store();
    let order_id = store.new_order("sent_to_courier", Some("C1"));
    let service = service_for(&server, &store);

    let err = service.track_and_sync(&OrderRef::by_order(order_id)).await.unwrap_err();
    assert!(matches!(err, CourierError::Gateway { .. }));
    assert_eq!(store.order(order_id).unwrap().pathao_status, None);
}

#[tokio::test]
async fn test_stale_token_without_refresh_blocks_tracking() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = MemoryStore::new().with_settings([
        ("pathao_client_id", "A"),
        ("pathao_client_secret", "B"),
        ("pathao_username", "u"),
        ("pathao_password", "p"),
        ("pathao_access_token", "T0"),
        ("pathao_token_expires_at", "0"),
    ]);
    let order_id = store.new_order("sent_to_courier", Some("C1"));
    let service = service_for(&server, &store);

    let err = service.track_and_sync(&OrderRef::by_order(order_id)).await.unwrap_err();
    assert!(matches!(err, CourierError::Auth(_)));
}

#[tokio::test]
async fn test_created_shipment_can_be_tracked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Order Created Successfully",
            "type": "success",
            "code": 200,
            "data": {
                "consignment_id": "DL121224VS8TTJ",
                "merchant_order_id": "ignored",
                "order_status": "Pending",
                "delivery_fee": 60
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server, "DL121224VS8TTJ", "Delivered").await;

    let store = connected_store();
    let order_id = store.new_order("processing", None);
    let service = service_for(&server, &store);

    let created = service
        .create_shipment_for_order(order_id, shipment_request())
        .await
        .unwrap();
    assert_eq!(created.consignment_id, "DL121224VS8TTJ");
    assert_eq!(created.courier["delivery_fee"], 60);

    let order = store.order(order_id).unwrap();
    assert_eq!(order.pathao_consignment_id.as_deref(), Some("DL121224VS8TTJ"));
    assert_eq!(order.pathao_status.as_deref(), Some("Pending"));
    assert_eq!(order.status, "sent_to_courier");

    let outcome = service.track_and_sync(&OrderRef::by_order(order_id)).await.unwrap();
    assert_eq!(outcome.consignment_id, "DL121224VS8TTJ");
    assert_eq!(store.order(order_id).unwrap().status, "completed");
}

#[tokio::test]
async fn test_second_shipment_for_order_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = connected_store();
    let order_id = store.new_order("sent_to_courier", Some("C1"));
    let service = service_for(&server, &store);

    let err = service
        .create_shipment_for_order(order_id, shipment_request())
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::Conflict(_)));
}

#[tokio::test]
async fn test_provider_rejection_does_not_link_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Please fix the given errors",
            "type": "error",
            "code": 422,
            "errors": {"recipient_phone": ["The recipient phone format is invalid."]}
        })))
        .mount(&server)
        .await;

    let store = connected_store();
    let order_id = store.new_order("processing", None);
    let service = service_for(&server, &store);

    match service.create_shipment_for_order(order_id, shipment_request()).await {
        Err(CourierError::Gateway { message, status }) => {
            assert_eq!(message, "Please fix the given errors");
            assert_eq!(status, Some(422));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    let order = store.order(order_id).unwrap();
    assert_eq!(order.pathao_consignment_id, None);
    assert_eq!(order.status, "processing");
}

/// Hands out a new consignment id per created shipment.
struct NumberedConsignments(AtomicUsize);

impl Respond for NumberedConsignments {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        let n = self.0.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(200)
            .set_body_json(json!({"data": {"consignment_id": format!("C{}", n), "order_status": "Pending"}}))
            .set_delay(std::time::Duration::from_millis(200))
    }
}

#[tokio::test]
async fn test_concurrent_registrations_link_only_one_consignment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(NumberedConsignments(AtomicUsize::new(0)))
        .expect(2)
        .mount(&server)
        .await;

    let store = connected_store();
    let order_id = store.new_order("processing", None);
    let service = service_for(&server, &store);

    let (a, b) = tokio::join!(
        service.create_shipment_for_order(order_id, shipment_request()),
        service.create_shipment_for_order(order_id, shipment_request()),
    );

    let (won, lost) = match (a, b) {
        (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
        other => panic!("expected exactly one registration to win, got {:?}", other),
    };
    assert!(matches!(lost, CourierError::Conflict(_)), "got {:?}", lost);

    let order = store.order(order_id).unwrap();
    assert_eq!(order.pathao_consignment_id.as_deref(), Some(won.consignment_id.as_str()));
    assert_eq!(order.status, "sent_to_courier");
}

#[tokio::test]
async fn test_mismatched_consignment_for_order_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = connected_store();
    let order_id = store.new_order("sent_to_courier", Some("C1"));
    let service = service_for(&server, &store);

    let err = service
        .track_and_sync(&OrderRef {
            order_id: Some(order_id),
            consignment_id: Some("C2".into()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::Conflict(_)), "got {:?}", err);

    let order = store.order(order_id).unwrap();
    assert_eq!(order.pathao_status, None);
    assert_eq!(order.status, "sent_to_courier");
}

#[tokio::test]
async fn test_matching_consignment_for_order_is_tracked() {
    let server = MockServer::start().await;
    mount_status(&server, "C1", "Picked").await;

    let store = connected_store();
    let order_id = store.new_order("sent_to_courier", Some("C1"));
    let service = service_for(&server, &store);

    let outcome = service
        .track_and_sync(&OrderRef {
            order_id: Some(order_id),
            consignment_id: Some(" C1 ".into()),
        })
        .await
        .unwrap();
    assert_eq!(outcome.order_id, Some(order_id));
    assert_eq!(store.order(order_id).unwrap().status, "picked_up");
}
