use anyhow::{Context, Result};

use crate::billing::models::PlanPricing;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
///
/// Credentials for the LLM and the payment gateway are optional: the service
/// still boots without them and the affected routes answer with a fixed
/// configuration error instead.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Session mirror backend. Falls back to the in-process store when unset.
    pub redis_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub auth_jwt_secret: String,
    pub auth_jwt_audience: Option<String>,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
    pub pricing: PlanPricing,
    pub session_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            auth_jwt_secret: require_env("AUTH_JWT_SECRET")?,
            auth_jwt_audience: optional_env("AUTH_JWT_AUDIENCE"),
            razorpay_key_id: optional_env("RAZORPAY_KEY_ID"),
            razorpay_key_secret: optional_env("RAZORPAY_KEY_SECRET"),
            pricing: PlanPricing {
                monthly_amount: parse_env("PRO_MONTHLY_PRICE", 29_900)?,
                yearly_amount: parse_env("PRO_YEARLY_PRICE", 249_900)?,
                currency: optional_env("BILLING_CURRENCY").unwrap_or_else(|| "INR".to_string()),
            },
            session_ttl_secs: parse_env("SESSION_TTL_SECS", 7 * 24 * 60 * 60)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
