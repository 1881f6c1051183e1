use stepup_domain::clock::SharedClock;
use stepup_domain::id::UserId;

use crate::domain::repository::RateLimitRepository;
use crate::domain::types::{ActionKind, RateLimitPolicies, RateLimitPolicy, RateLimitRecord};
use crate::error::VerificationServiceError;

/// Trailing-window counter per (user, action kind).
///
/// `allow` followed by `record` is two separate storage round trips, so two
/// concurrent callers can both pass `allow` before either records. Callers that
/// need a hard cap use [`RateLimiter::try_acquire`].
pub struct RateLimiter<R>
where
    R: RateLimitRepository,
{
    pub repo: R,
    pub policies: RateLimitPolicies,
    pub clock: SharedClock,
}

impl<R> RateLimiter<R>
where
    R: RateLimitRepository,
{
    pub fn policy(&self, kind: ActionKind) -> RateLimitPolicy {
        self.policies.get(kind)
    }

    /// Delete rows of every kind whose window start is older than that kind's window.
    pub async fn purge_expired(&self) -> Result<u64, VerificationServiceError> {
        let now = self.clock.now();
        let mut purged = 0;
        for kind in ActionKind::ALL {
            let window = self.policy(kind).window;
            purged += self.repo.delete_older_than(kind, now - window).await?;
        }
        Ok(purged)
    }

    /// Purge, then report whether `user_id` is still under the limit for `kind`.
    pub async fn allow(
        &self,
        user_id: UserId,
        kind: ActionKind,
    ) -> Result<bool, VerificationServiceError> {
        self.purge_expired().await?;

        let policy = self.policy(kind);
        let since = self.clock.now() - policy.window;
        let used = self.repo.sum_since(user_id, kind, since).await?;
        Ok(used < i64::from(policy.limit))
    }

    /// Append a unit-count row stamped with the current time.
    pub async fn record(
        &self,
        user_id: UserId,
        kind: ActionKind,
    ) -> Result<(), VerificationServiceError> {
        let record = RateLimitRecord::unit(user_id, kind, self.clock.now());
        self.repo.insert(&record).await
    }

    /// Check and record in one transaction. Returns `false` without recording when
    /// the limit is already reached.
    pub async fn try_acquire(
        &self,
        user_id: UserId,
        kind: ActionKind,
    ) -> Result<bool, VerificationServiceError> {
        self.purge_expired().await?;

        let policy = self.policy(kind);
        let now = self.clock.now();
        let record = RateLimitRecord::unit(user_id, kind, now);
        self.repo
            .acquire(&record, policy.limit, now - policy.window)
            .await
    }
}
