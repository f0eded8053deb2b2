use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_PATHAO_BASE_URL: &str = "https://api-hermes.pathao.com/aladdin/api/v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Key required on every management API call.
    /// Set via COURIER_ADMIN_KEY. Required when COURIER_ENV=production.
    pub admin_key: Option<String>,
    pub courier: CourierConfig,
    /// `text` (default) or `json`.
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct CourierConfig {
    /// Base URL of the courier provider API, without a trailing slash.
    pub base_url: String,
    /// Upper bound for any single provider call. Default: 10s.
    pub timeout: Duration,
    /// Country whose city list is served by `list_cities`.
    pub country_id: u32,
    /// Re-issue a token with the stored username/password when the cached
    /// token is stale and no refresh token exists. Off by default: a missing
    /// refresh token normally requires an operator to reconnect.
    pub auto_reissue: bool,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PATHAO_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            country_id: 1,
            auto_reissue: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn is_production() -> bool {
        std::env::var("COURIER_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .map(|v| v == "production")
            .unwrap_or(false)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let admin_key = std::env::var("COURIER_ADMIN_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    if admin_key.is_none() {
        if Config::is_production() {
            anyhow::bail!("COURIER_ADMIN_KEY must be set before running in production.");
        }
        eprintln!("⚠️  COURIER_ADMIN_KEY is not set; the management API will reject every request.");
    }

    let base_url = std::env::var("PATHAO_BASE_URL")
        .unwrap_or_else(|_| DEFAULT_PATHAO_BASE_URL.into());
    let base_url = normalize_base_url(&base_url)?;

    Ok(Config {
        port: std::env::var("COURIER_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/storefront".into()),
        admin_key,
        courier: CourierConfig {
            base_url,
            timeout: Duration::from_secs(
                std::env::var("PATHAO_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(10),
            ),
            country_id: std::env::var("PATHAO_COUNTRY_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            auto_reissue: std::env::var("PATHAO_AUTO_REISSUE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        },
        log_format: match std::env::var("COURIER_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        },
    })
}

/// Validates the provider base URL and strips any trailing slash so that
/// endpoint paths can be appended with `format!`.
pub fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let parsed = url::Url::parse(raw.trim())
        .with_context(|| format!("PATHAO_BASE_URL is not a valid URL: '{}'", raw))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("PATHAO_BASE_URL must use http or https, got '{}'", parsed.scheme());
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
