//! HTTP client for the courier provider API.
//!
//! Every call is bounded by the configured timeout and never retried here;
//! failures surface to the caller as `CourierError::Gateway`.

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::envelope::{project_locations, provider_message, truncate, unwrap_data, unwrap_list};
use crate::config::CourierConfig;
use crate::errors::CourierError;
use crate::models::shipment::{Location, LocationKind, ShipmentRequest};
use crate::models::token::Credentials;

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Longest token lifetime accepted from the provider: one year.
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

/// Token grant returned by `issue-token` for both grant types.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    username: &'a str,
    password: &'a str,
    grant_type: &'static str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
    grant_type: &'static str,
}

pub struct CourierClient {
    base_url: String,
    country_id: u32,
    http: Client,
}

impl CourierClient {
    pub fn new(config: &CourierConfig) -> Result<Self, CourierError> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(std::time::Duration::from_secs(5)))
            .build()
            .map_err(|e| CourierError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            country_id: config.country_id,
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and returns the parsed JSON body of a 2xx response.
    async fn send(&self, op: &'static str, req: RequestBuilder) -> Result<Value, CourierError> {
        let started = std::time::Instant::now();
        let resp = req
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| transport_error(op, e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| transport_error(op, e))?;

        tracing::debug!(
            op,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "courier call finished"
        );

        if !status.is_success() {
            let message = provider_message(&body).unwrap_or_else(|| {
                format!("{}: {}", status, truncate(&body, MAX_ERROR_BODY_CHARS))
            });
            tracing::warn!(op, status = status.as_u16(), %message, "courier call rejected");
            return Err(CourierError::gateway(message, Some(status.as_u16())));
        }

        serde_json::from_str(&body).map_err(|e| {
            CourierError::gateway(
                format!("malformed response from {}: {}", op, e),
                Some(status.as_u16()),
            )
        })
    }

    /// Password grant: exchanges the operator credential set for a token.
    pub async fn issue_token(&self, credentials: &Credentials) -> Result<TokenGrant, CourierError> {
        let body = PasswordGrant {
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
            username: &credentials.username,
            password: &credentials.password,
            grant_type: "password",
        };
        let payload = self
            .send("issue_token", self.http.post(self.url("/issue-token")).json(&body))
            .await?;
        parse_grant(payload)
    }

    /// Refresh grant: trades a refresh token for a new access token.
    pub async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenGrant, CourierError> {
        let body = RefreshGrant {
            client_id,
            client_secret,
            refresh_token,
            grant_type: "refresh_token",
        };
        let payload = self
            .send("refresh_token", self.http.post(self.url("/issue-token")).json(&body))
            .await?;
        parse_grant(payload)
    }

    pub async fn list_cities(&self, token: &str) -> Result<Vec<Location>, CourierError> {
        let path = format!("/countries/{}/city-list", self.country_id);
        self.list("list_cities", token, &path, LocationKind::City).await
    }

    pub async fn list_zones(&self, token: &str, city_id: i64) -> Result<Vec<Location>, CourierError> {
        let path = format!("/cities/{}/zone-list", city_id);
        self.list("list_zones", token, &path, LocationKind::Zone).await
    }

    pub async fn list_areas(&self, token: &str, zone_id: i64) -> Result<Vec<Location>, CourierError> {
        let path = format!("/zones/{}/area-list", zone_id);
        self.list("list_areas", token, &path, LocationKind::Area).await
    }

    async fn list(
        &self,
        op: &'static str,
        token: &str,
        path: &str,
        kind: LocationKind,
    ) -> Result<Vec<Location>, CourierError> {
        let payload = self
            .send(op, self.http.get(self.url(path)).bearer_auth(token))
            .await?;
        let items = unwrap_list(payload).ok_or_else(|| {
            CourierError::gateway(format!("malformed response from {}: no list found", op), None)
        })?;
        Ok(project_locations(items, kind))
    }

    /// Registers a shipment. Returns the provider's `data` payload (or the raw
    /// payload if unwrapped), which includes the consignment id.
    pub async fn create_shipment(
        &self,
        token: &str,
        request: &ShipmentRequest,
    ) -> Result<Value, CourierError> {
        let payload = self
            .send(
                "create_shipment",
                self.http.post(self.url("/orders")).bearer_auth(token).json(request),
            )
            .await?;
        Ok(unwrap_data(payload))
    }

    /// Fetches the current status record for a consignment.
    pub async fn track_shipment(
        &self,
        token: &str,
        consignment_id: &str,
    ) -> Result<Value, CourierError> {
        let path = format!("/orders/{}", urlencode_segment(consignment_id));
        let payload = self
            .send("track_shipment", self.http.get(self.url(&path)).bearer_auth(token))
            .await?;
        Ok(unwrap_data(payload))
    }
}

fn parse_grant(payload: Value) -> Result<TokenGrant, CourierError> {
    let payload = if payload.get("access_token").is_some() {
        payload
    } else {
        unwrap_data(payload)
    };
    let grant: TokenGrant = serde_json::from_value(payload).map_err(|e| {
        CourierError::gateway(format!("malformed token response: {}", e), None)
    })?;
    if grant.access_token.trim().is_empty() {
        return Err(CourierError::gateway("token response carried an empty access_token", None));
    }
    if grant.expires_in <= 0 || grant.expires_in > MAX_TOKEN_LIFETIME_SECS {
        return Err(CourierError::gateway(
            format!("token response carried an out-of-range expires_in ({})", grant.expires_in),
            None,
        ));
    }
    Ok(grant)
}

fn transport_error(op: &'static str, e: reqwest::Error) -> CourierError {
    if e.is_timeout() {
        tracing::warn!(op, "courier call timed out");
        return CourierError::timed_out();
    }
    // Drop the URL to keep the message short.
    let e = e.without_url();
    tracing::warn!(op, error = %e, "courier call failed");
    CourierError::gateway(format!("request failed: {}", e), None)
}

/// Consignment ids come from callers; keep them to a single path segment.
fn urlencode_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.trim().as_bytes()).collect()
}
