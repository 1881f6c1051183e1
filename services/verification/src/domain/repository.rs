#![allow(async_fn_in_trait)]

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use stepup_domain::id::UserId;

use crate::domain::types::{
    ActionKind, AuditEntry, RateLimitRecord, VerificationCode, VerificationUser,
};
use crate::error::VerificationServiceError;

/// Port for looking up the user a code is delivered to.
pub trait UserPort: Send + Sync {
    async fn find_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<VerificationUser>, VerificationServiceError>;
}

/// Durable store for one-time verification codes.
pub trait VerificationCodeRepository: Send + Sync {
    async fn create(&self, code: &VerificationCode) -> Result<(), VerificationServiceError>;

    /// Find an unused code by user + exact code string. Expiry is not filtered here;
    /// the caller decides between `Expired` and success.
    async fn find_unused(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<Option<VerificationCode>, VerificationServiceError>;

    /// Set `used_at` if the code is still unused. Returns `false` when another
    /// request consumed it first.
    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>)
    -> Result<bool, VerificationServiceError>;

    /// Delete codes whose `expires_at` is before `before`. Returns the number removed.
    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, VerificationServiceError>;
}

/// Append-only store of rate-limit rows.
pub trait RateLimitRepository: Send + Sync {
    async fn insert(&self, record: &RateLimitRecord) -> Result<(), VerificationServiceError>;

    /// Sum of `count` for rows with `window_start > since`.
    async fn sum_since(
        &self,
        user_id: UserId,
        kind: ActionKind,
        since: DateTime<Utc>,
    ) -> Result<i64, VerificationServiceError>;

    async fn delete_older_than(
        &self,
        kind: ActionKind,
        before: DateTime<Utc>,
    ) -> Result<u64, VerificationServiceError>;

    /// Count and insert in one serializable transaction. Returns `false` (and inserts
    /// nothing) when the sum since `since` has already reached `limit`.
    async fn acquire(
        &self,
        record: &RateLimitRecord,
        limit: u32,
        since: DateTime<Utc>,
    ) -> Result<bool, VerificationServiceError>;
}

/// Append-only audit trail.
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), VerificationServiceError>;
}

/// Hands an issued code to whatever delivers it to the user.
pub trait CodeDelivery: Send + Sync {
    async fn dispatch(
        &self,
        code: &VerificationCode,
        address: &str,
        lifetime: Duration,
    ) -> Result<(), VerificationServiceError>;
}
