//! Access-token lifecycle for the courier provider.
//!
//! The token record lives in the settings store and is shared by every caller.
//! A cached token is handed out while more than an hour of lifetime remains;
//! otherwise it is refreshed with the stored refresh token. Refreshes are
//! single-flight per `client_id`: concurrent callers that observe a stale
//! token queue behind one refresh and then reuse its result.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::client::{CourierClient, TokenGrant};
use crate::errors::CourierError;
use crate::models::token::{Credentials, SettingKey, TokenRecord, TokenStatus};
use crate::store::SettingsStore;

/// Time source, swappable so expiry boundaries can be tested exactly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|n| *n).unwrap_or_else(|p| *p.into_inner())
    }
}

/// Everything read from settings in one batch.
struct Snapshot {
    credentials: Credentials,
    token: TokenRecord,
}

pub struct TokenManager {
    settings: Arc<dyn SettingsStore>,
    client: Arc<CourierClient>,
    clock: Arc<dyn Clock>,
    auto_reissue: bool,
    refresh_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl TokenManager {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        client: Arc<CourierClient>,
        clock: Arc<dyn Clock>,
        auto_reissue: bool,
    ) -> Self {
        Self {
            settings,
            client,
            clock,
            auto_reissue,
            refresh_locks: DashMap::new(),
        }
    }

    async fn load(&self) -> Result<Snapshot, CourierError> {
        let settings = self.settings.get_many(&SettingKey::all_keys()).await?;
        let credentials = Credentials::from_settings(&settings).map_err(|missing| {
            CourierError::Config(format!(
                "courier credentials incomplete, missing: {}",
                missing.join(", ")
            ))
        })?;
        Ok(Snapshot {
            credentials,
            token: TokenRecord::from_settings(&settings),
        })
    }

    fn lock_for(&self, client_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.refresh_locks
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Returns an access token with more than an hour of lifetime left,
    /// refreshing it first if needed.
    ///
    /// Fails with `Config` when the credential set is incomplete (before any
    /// network call) and with `Auth` when the token is stale and there is no
    /// refresh token to renew it with.
    pub async fn get_valid_token(&self) -> Result<String, CourierError> {
        let snapshot = self.load().await?;
        if let Some(token) = snapshot.token.usable_token(self.clock.now()) {
            return Ok(token.to_string());
        }

        let lock = self.lock_for(&snapshot.credentials.client_id);
        let _guard = lock.lock().await;

        // Whoever held the lock before us may already have refreshed.
        let snapshot = self.load().await?;
        if let Some(token) = snapshot.token.usable_token(self.clock.now()) {
            tracing::debug!("reusing courier token refreshed by a concurrent caller");
            return Ok(token.to_string());
        }

        let creds = &snapshot.credentials;
        let grant = match snapshot.token.refresh_token.as_deref() {
            Some(refresh_token) => {
                tracing::info!(client_id = %creds.client_id, "refreshing courier access token");
                self.client
                    .refresh_token(&creds.client_id, &creds.client_secret, refresh_token)
                    .await?
            }
            None if self.auto_reissue => {
                tracing::info!(client_id = %creds.client_id, "no refresh token, re-issuing with password grant");
                self.client.issue_token(creds).await?
            }
            None => {
                tracing::warn!(client_id = %creds.client_id, "courier token stale and no refresh token stored");
                return Err(CourierError::reconnect_required());
            }
        };

        let record = self.persist(grant, snapshot.token.refresh_token).await?;
        Ok(record.access_token.unwrap_or_default())
    }

    /// Operator re-authentication: exchanges the stored credential set for a
    /// fresh token regardless of the cached record.
    pub async fn connect(&self) -> Result<TokenStatus, CourierError> {
        let snapshot = self.load().await?;
        let lock = self.lock_for(&snapshot.credentials.client_id);
        let _guard = lock.lock().await;

        tracing::info!(client_id = %snapshot.credentials.client_id, "connecting to courier");
        let grant = self.client.issue_token(&snapshot.credentials).await?;
        // A fresh login starts a new session; an old refresh token is not carried over.
        self.persist(grant, None).await?;
        self.status().await
    }

    /// Stores a new credential set. Changing the client or user drops the
    /// cached token so the next call cannot use one minted for other
    /// credentials.
    pub async fn store_credentials(&self, credentials: &Credentials) -> Result<(), CourierError> {
        let mut entries = credentials.to_settings();
        if let Some((key, _)) = entries.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(CourierError::Config(format!("{} must not be blank", key)));
        }

        let previous = self
            .settings
            .get_many(&[SettingKey::ClientId.as_str(), SettingKey::Username.as_str()])
            .await?;
        let changed_identity = previous.get(SettingKey::ClientId.as_str()) != Some(&credentials.client_id)
            || previous.get(SettingKey::Username.as_str()) != Some(&credentials.username);
        if changed_identity {
            entries.extend(TokenRecord::default().to_settings());
        }

        self.settings.set_many(&entries).await?;
        tracing::info!(
            client_id = %credentials.client_id,
            token_cleared = changed_identity,
            "stored courier credentials"
        );
        Ok(())
    }

    /// Summary of the cached token without revealing it.
    pub async fn status(&self) -> Result<TokenStatus, CourierError> {
        let settings = self.settings.get_many(&SettingKey::all_keys()).await?;
        let token = TokenRecord::from_settings(&settings);
        Ok(TokenStatus {
            configured: Credentials::from_settings(&settings).is_ok(),
            has_access_token: token.access_token.is_some(),
            has_refresh_token: token.refresh_token.is_some(),
            expires_at: token.expires_at(),
            usable: token.is_usable(self.clock.now()),
        })
    }

    /// Writes the new token record. The provider may omit the refresh token,
    /// in which case `previous_refresh` is kept.
    async fn persist(
        &self,
        grant: TokenGrant,
        previous_refresh: Option<String>,
    ) -> Result<TokenRecord, CourierError> {
        let expires_at_ms = grant
            .expires_in
            .checked_mul(1000)
            .and_then(|lifetime_ms| self.clock.now().timestamp_millis().checked_add(lifetime_ms))
            .ok_or_else(|| {
                CourierError::gateway(
                    format!("token lifetime out of range (expires_in {})", grant.expires_in),
                    None,
                )
            })?;
        let record = TokenRecord {
            access_token: Some(grant.access_token),
            refresh_token: grant
                .refresh_token
                .filter(|r| !r.trim().is_empty())
                .or(previous_refresh),
            expires_at_ms: Some(expires_at_ms),
        };
        self.settings.set_many(&record.to_settings()).await?;
        tracing::info!(expires_at = ?record.expires_at(), "stored courier token");
        Ok(record)
    }
}
