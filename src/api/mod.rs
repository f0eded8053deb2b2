use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::courier::CourierService;

pub mod handlers;

/// Shared state passed to handlers and middleware.
pub struct AppState {
    pub courier: CourierService,
    /// `None` means the management API rejects every request.
    pub admin_key: Option<String>,
}

/// Full application router: health check plus the management API under
/// `/api/v1`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/api/v1", api_router(state.clone()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Build the Management API router.
/// Routes are relative; `app` mounts them under `/api/v1`.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/courier/credentials", put(handlers::store_credentials))
        .route("/courier/connect", post(handlers::connect))
        .route("/courier/token", get(handlers::token_status))
        .route("/courier/cities", get(handlers::list_cities))
        .route("/courier/cities/:id/zones", get(handlers::list_zones))
        .route("/courier/zones/:id/areas", get(handlers::list_areas))
        .route("/courier/track", post(handlers::track))
        .route("/orders/:id/shipment", post(handlers::create_shipment))
        .route("/orders/:id/tracking", get(handlers::track_order))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth))
        .fallback(fallback_404)
        .with_state(state)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: validates `X-Admin-Key` (or a bearer token) against the
/// configured admin key. Returns 401 if missing/invalid, 503 if no key is
/// configured.
async fn admin_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided_key = req
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim())
        });

    let Some(expected) = state.admin_key.as_deref() else {
        tracing::error!("COURIER_ADMIN_KEY is not set; rejecting management API call");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    match provided_key {
        Some(k) if k == expected => Ok(next.run(req).await),
        Some(k) => {
            // Never log the expected key or the full provided key.
            let chars: Vec<char> = k.chars().collect();
            let masked = if chars.len() > 8 {
                let head: String = chars[..4].iter().collect();
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("{}…{}", head, tail)
            } else {
                "****".to_string()
            };
            tracing::warn!("admin API: invalid key (provided: '{}')", masked);
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("admin API: missing X-Admin-Key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
