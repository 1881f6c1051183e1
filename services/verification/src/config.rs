use std::str::FromStr;

use chrono::Duration;

use crate::domain::types::{
    DEFAULT_CODE_LENGTH, DEFAULT_CODE_PURGE_GRACE_SECS, DEFAULT_CODE_REQUEST_LIMIT,
    DEFAULT_CODE_TTL_SECS, DEFAULT_CODE_VERIFY_LIMIT, DEFAULT_RATE_LIMIT_WINDOW_SECS,
    DEFAULT_TOKEN_TTL_SECS, RateLimitPolicies, RateLimitPolicy, VerificationPolicy,
};
use crate::infra::delivery::DeliveryMode;

fn parse_var<T: FromStr>(raw: Option<&str>) -> Result<Option<T>, T::Err> {
    raw.map(|v| v.trim().parse::<T>()).transpose()
}

/// Unset means `default`. A value that does not parse also falls back, with a warning.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).ok();
    match parse_var::<T>(raw.as_deref()) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            tracing::warn!(
                var = name,
                value = raw.as_deref().unwrap_or_default(),
                error = %e,
                "ignoring unparsable environment variable, using default"
            );
            default
        }
    }
}

/// Verification service configuration loaded from environment variables.
#[derive(Debug)]
pub struct VerificationConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// HMAC secret for signing sensitive-data tokens. No fallback.
    pub jwt_secret: String,
    /// TCP port to listen on (default 3114). Env var: `VERIFICATION_PORT`.
    pub verification_port: u16,
    /// Digits per code (default 6, clamped to 4..=12). Env var: `CODE_LENGTH`.
    pub code_length: usize,
    /// Env var: `CODE_TTL_SECS` (default 600).
    pub code_ttl_secs: i64,
    /// Env var: `CODE_PURGE_GRACE_SECS` (default 3600).
    pub code_purge_grace_secs: i64,
    /// Env var: `TOKEN_TTL_SECS` (default 900).
    pub token_ttl_secs: i64,
    pub code_request_limit: u32,
    pub code_request_window_secs: i64,
    pub code_verify_limit: u32,
    pub code_verify_window_secs: i64,
    /// Env var: `ATOMIC_RATE_LIMIT` (default false).
    pub atomic_rate_limit: bool,
    /// Env var: `CODE_DELIVERY`, `outbox` (default) or `log`.
    pub code_delivery: DeliveryMode,
    /// Background purge period. Env var: `CLEANUP_INTERVAL_SECS` (default 300).
    pub cleanup_interval_secs: u64,
    /// Apply pending migrations before serving. Env var: `RUN_MIGRATIONS` (default false).
    pub run_migrations: bool,
}

impl VerificationConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            jwt_secret: std::env::var("JWT_SECRET").expect("JWT_SECRET"),
            verification_port: env_or("VERIFICATION_PORT", 3114),
            code_length: env_or("CODE_LENGTH", DEFAULT_CODE_LENGTH).clamp(4, 12),
            code_ttl_secs: env_or("CODE_TTL_SECS", DEFAULT_CODE_TTL_SECS),
            code_purge_grace_secs: env_or("CODE_PURGE_GRACE_SECS", DEFAULT_CODE_PURGE_GRACE_SECS),
            token_ttl_secs: env_or("TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS),
            code_request_limit: env_or("CODE_REQUEST_LIMIT", DEFAULT_CODE_REQUEST_LIMIT),
            code_request_window_secs: env_or(
                "CODE_REQUEST_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            ),
            code_verify_limit: env_or("CODE_VERIFY_LIMIT", DEFAULT_CODE_VERIFY_LIMIT),
            code_verify_window_secs: env_or(
                "CODE_VERIFY_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            ),
            atomic_rate_limit: env_or("ATOMIC_RATE_LIMIT", false),
            code_delivery: env_or("CODE_DELIVERY", DeliveryMode::Outbox),
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECS", 300),
            run_migrations: env_or("RUN_MIGRATIONS", false),
        }
    }

    pub fn policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            code_length: self.code_length,
            code_ttl: Duration::seconds(self.code_ttl_secs),
            code_purge_grace: Duration::seconds(self.code_purge_grace_secs),
            token_ttl: Duration::seconds(self.token_ttl_secs),
            rate_limits: RateLimitPolicies {
                code_request: RateLimitPolicy {
                    limit: self.code_request_limit,
                    window: Duration::seconds(self.code_request_window_secs),
                },
                code_verify: RateLimitPolicy {
                    limit: self.code_verify_limit,
                    window: Duration::seconds(self.code_verify_window_secs),
                },
            },
            atomic_rate_limit: self.atomic_rate_limit,
        }
    }
}
