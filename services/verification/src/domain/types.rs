use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stepup_domain::id::UserId;

/// User data needed to deliver a verification code.
#[derive(Debug, Clone)]
pub struct VerificationUser {
    pub id: UserId,
    pub email: String,
}

/// One-time numeric code issued to step up a session.
#[derive(Debug, Clone)]
pub struct VerificationCode {
    pub id: Uuid,
    pub user_id: UserId,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    /// Strictly past `expires_at`. A code is still accepted at the exact expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && !self.is_expired_at(now)
    }
}

/// Action kinds counted by the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    CodeRequest,
    CodeVerify,
}

impl ActionKind {
    pub const ALL: [ActionKind; 2] = [ActionKind::CodeRequest, ActionKind::CodeVerify];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeRequest => "code_request",
            Self::CodeVerify => "code_verify",
        }
    }
}

/// One appended rate-limit row. Rows are never updated; the active count is a sum.
#[derive(Debug, Clone)]
pub struct RateLimitRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub action_kind: ActionKind,
    pub window_start: DateTime<Utc>,
    pub count: i32,
}

impl RateLimitRecord {
    pub fn unit(user_id: UserId, action_kind: ActionKind, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            action_kind,
            window_start: at,
            count: 1,
        }
    }
}

/// `limit` actions permitted within the trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    /// Seconds a rejected caller is told to wait: the full window.
    pub fn retry_after_secs(&self) -> u64 {
        self.window.num_seconds().max(0) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicies {
    pub code_request: RateLimitPolicy,
    pub code_verify: RateLimitPolicy,
}

impl RateLimitPolicies {
    pub fn get(&self, kind: ActionKind) -> RateLimitPolicy {
        match kind {
            ActionKind::CodeRequest => self.code_request,
            ActionKind::CodeVerify => self.code_verify,
        }
    }
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self {
            code_request: RateLimitPolicy {
                limit: DEFAULT_CODE_REQUEST_LIMIT,
                window: Duration::seconds(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            },
            code_verify: RateLimitPolicy {
                limit: DEFAULT_CODE_VERIFY_LIMIT,
                window: Duration::seconds(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            },
        }
    }
}

/// Tunables shared by code issuance, verification and token minting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    /// Digits per code.
    pub code_length: usize,
    pub code_ttl: Duration,
    /// How long an expired code row survives before purge, so late submissions
    /// still observe `Expired` instead of `NotFoundOrInvalid`.
    pub code_purge_grace: Duration,
    pub token_ttl: Duration,
    pub rate_limits: RateLimitPolicies,
    /// Gate `code_request` with the single-transaction acquire instead of allow + record.
    pub atomic_rate_limit: bool,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            code_length: DEFAULT_CODE_LENGTH,
            code_ttl: Duration::seconds(DEFAULT_CODE_TTL_SECS),
            code_purge_grace: Duration::seconds(DEFAULT_CODE_PURGE_GRACE_SECS),
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
            rate_limits: RateLimitPolicies::default(),
            atomic_rate_limit: false,
        }
    }
}

/// Audit event types, persisted as their SCREAMING_SNAKE names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    CodeRequested,
    CodeRequestRateLimited,
    CodeVerifyInvalidFormat,
    CodeVerifyRateLimited,
    CodeVerifyInvalid,
    CodeVerifyExpired,
    CodeVerifiedSuccess,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeRequested => "CODE_REQUESTED",
            Self::CodeRequestRateLimited => "CODE_REQUEST_RATE_LIMITED",
            Self::CodeVerifyInvalidFormat => "CODE_VERIFY_INVALID_FORMAT",
            Self::CodeVerifyRateLimited => "CODE_VERIFY_RATE_LIMITED",
            Self::CodeVerifyInvalid => "CODE_VERIFY_INVALID",
            Self::CodeVerifyExpired => "CODE_VERIFY_EXPIRED",
            Self::CodeVerifiedSuccess => "CODE_VERIFIED_SUCCESS",
        }
    }
}

/// Append-only audit row.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub event: AuditEvent,
    /// JSON text; never carries a full code value.
    pub event_data: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Caller network context recorded on every audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub ip_address: String,
    pub user_agent: String,
}

impl RequestContext {
    pub const UNKNOWN: &'static str = "unknown";
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            ip_address: Self::UNKNOWN.to_owned(),
            user_agent: Self::UNKNOWN.to_owned(),
        }
    }
}

/// Pending delivery of an issued code, picked up by the mail relay.
///
/// The relay must drop events whose `deliver_until` has passed: the code they
/// carry can no longer be redeemed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub kind: String,
    pub user_id: UserId,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub deliver_until: DateTime<Utc>,
}

/// Keep the first two characters of a submitted code for audit trails.
pub fn redact_code(code: &str) -> String {
    let prefix: String = code.chars().take(2).collect();
    format!("{prefix}****")
}

pub const DEFAULT_CODE_LENGTH: usize = 6;
pub const DEFAULT_CODE_TTL_SECS: i64 = 600;
pub const DEFAULT_CODE_PURGE_GRACE_SECS: i64 = 3600;
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 900;
pub const DEFAULT_CODE_REQUEST_LIMIT: u32 = 3;
pub const DEFAULT_CODE_VERIFY_LIMIT: u32 = 5;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: i64 = 900;
