use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::courier::service::CreatedShipment;
use crate::errors::{AppError, CourierError};
use crate::models::order::{OrderRef, TrackingOutcome};
use crate::models::shipment::{Location, ShipmentRequest};
use crate::models::token::{Credentials, TokenStatus};

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

fn parse_order_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        tracing::warn!("invalid order id: {}", raw);
        AppError::BadRequest(format!("'{}' is not a valid order id", raw))
    })
}

// ── Handlers ─────────────────────────────────────────────────

/// PUT /api/v1/courier/credentials: store the courier credential set
pub async fn store_credentials(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let req = body(payload)?;
    let creds = Credentials {
        client_id: req.client_id,
        client_secret: req.client_secret,
        username: req.username,
        password: req.password,
    };
    state
        .courier
        .tokens()
        .store_credentials(&creds)
        .await
        .map_err(|e| match e {
            CourierError::Config(msg) => AppError::BadRequest(msg),
            other => other.into(),
        })?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/courier/connect: issue a fresh token from the credential set
pub async fn connect(State(state): State<Arc<AppState>>) -> Result<Json<TokenStatus>, AppError> {
    let status = state.courier.tokens().connect().await?;
    Ok(Json(status))
}

/// GET /api/v1/courier/token: token presence and expiry (never the token itself)
pub async fn token_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TokenStatus>, AppError> {
    let status = state.courier.tokens().status().await?;
    Ok(Json(status))
}

/// GET /api/v1/courier/cities
pub async fn list_cities(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Location>>, AppError> {
    Ok(Json(state.courier.cities().await?))
}

/// GET /api/v1/courier/cities/:id/zones
pub async fn list_zones(
    State(state): State<Arc<AppState>>,
    Path(city_id): Path<i64>,
) -> Result<Json<Vec<Location>>, AppError> {
    Ok(Json(state.courier.zones(city_id).await?))
}

/// GET /api/v1/courier/zones/:id/areas
pub async fn list_areas(
    State(state): State<Arc<AppState>>,
    Path(zone_id): Path<i64>,
) -> Result<Json<Vec<Location>>, AppError> {
    Ok(Json(state.courier.areas(zone_id).await?))
}

/// POST /api/v1/orders/:id/shipment: register the order with the courier
pub async fn create_shipment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ShipmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedShipment>), AppError> {
    let order_id = parse_order_id(&id)?;
    let request = body(payload)?;
    request.validate().map_err(AppError::BadRequest)?;

    let created = state
        .courier
        .create_shipment_for_order(order_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/orders/:id/tracking: track the order's consignment and sync it
pub async fn track_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TrackingOutcome>, AppError> {
    let order_id = parse_order_id(&id)?;
    let outcome = state
        .courier
        .track_and_sync(&OrderRef::by_order(order_id))
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/courier/track: track by order id and/or consignment id
pub async fn track(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OrderRef>, JsonRejection>,
) -> Result<Json<TrackingOutcome>, AppError> {
    let order_ref = body(payload)?;
    let outcome = state.courier.track_and_sync(&order_ref).await?;
    Ok(Json(outcome))
}
