// Credential set and cached token record for the courier provider.
// Both live as plain string rows in the settings table; see `SettingKey`.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A token is only handed out while more than this much lifetime remains.
pub const TOKEN_SAFETY_MARGIN_MS: i64 = 3_600_000;

/// Settings rows owned by the courier integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    ClientId,
    ClientSecret,
    Username,
    Password,
    AccessToken,
    RefreshToken,
    TokenExpiresAt,
}

impl SettingKey {
    pub const ALL: [SettingKey; 7] = [
        SettingKey::ClientId,
        SettingKey::ClientSecret,
        SettingKey::Username,
        SettingKey::Password,
        SettingKey::AccessToken,
        SettingKey::RefreshToken,
        SettingKey::TokenExpiresAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::ClientId => "pathao_client_id",
            SettingKey::ClientSecret => "pathao_client_secret",
            SettingKey::Username => "pathao_username",
            SettingKey::Password => "pathao_password",
            SettingKey::AccessToken => "pathao_access_token",
            SettingKey::RefreshToken => "pathao_refresh_token",
            SettingKey::TokenExpiresAt => "pathao_token_expires_at",
        }
    }

    pub fn all_keys() -> Vec<&'static str> {
        Self::ALL.iter().map(SettingKey::as_str).collect()
    }
}

/// Operator-supplied provider credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

// Secrets must never reach logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Builds the credential set from settings rows. Returns the names of the
    /// missing or blank keys when the set is incomplete.
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self, Vec<&'static str>> {
        let mut missing = Vec::new();
        let mut take = |key: SettingKey| match non_blank(settings, key) {
            Some(v) => v,
            None => {
                missing.push(key.as_str());
                String::new()
            }
        };

        let creds = Credentials {
            client_id: take(SettingKey::ClientId),
            client_secret: take(SettingKey::ClientSecret),
            username: take(SettingKey::Username),
            password: take(SettingKey::Password),
        };

        if missing.is_empty() {
            Ok(creds)
        } else {
            Err(missing)
        }
    }

    pub fn to_settings(&self) -> Vec<(&'static str, String)> {
        vec![
            (SettingKey::ClientId.as_str(), self.client_id.clone()),
            (SettingKey::ClientSecret.as_str(), self.client_secret.clone()),
            (SettingKey::Username.as_str(), self.username.clone()),
            (SettingKey::Password.as_str(), self.password.clone()),
        ]
    }
}

/// Cached access/refresh token pair.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct TokenRecord {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Absolute expiry, milliseconds since the Unix epoch.
    pub expires_at_ms: Option<i64>,
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

impl TokenRecord {
    pub fn from_settings(settings: &HashMap<String, String>) -> Self {
        let expires_at_ms = non_blank(settings, SettingKey::TokenExpiresAt).and_then(|raw| {
            match raw.trim().parse::<i64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    tracing::warn!(value = %raw, "ignoring unparsable token expiry");
                    None
                }
            }
        });

        Self {
            access_token: non_blank(settings, SettingKey::AccessToken),
            refresh_token: non_blank(settings, SettingKey::RefreshToken),
            expires_at_ms,
        }
    }

    /// Milliseconds of lifetime left at `now`, if an expiry is known.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at_ms.map(|exp| exp - now.timestamp_millis())
    }

    /// A token is usable only while strictly more than the safety margin
    /// remains before expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_some()
            && self
                .remaining_ms(now)
                .map(|left| left > TOKEN_SAFETY_MARGIN_MS)
                .unwrap_or(false)
    }

    pub fn usable_token(&self, now: DateTime<Utc>) -> Option<&str> {
        if self.is_usable(now) {
            self.access_token.as_deref()
        } else {
            None
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    pub fn to_settings(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                SettingKey::AccessToken.as_str(),
                self.access_token.clone().unwrap_or_default(),
            ),
            (
                SettingKey::RefreshToken.as_str(),
                self.refresh_token.clone().unwrap_or_default(),
            ),
            (
                SettingKey::TokenExpiresAt.as_str(),
                self.expires_at_ms.map(|ms| ms.to_string()).unwrap_or_default(),
            ),
        ]
    }
}

/// Token summary safe to expose over the management API.
#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    pub configured: bool,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub usable: bool,
}

fn non_blank(settings: &HashMap<String, String>, key: SettingKey) -> Option<String> {
    settings
        .get(key.as_str())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
}
