use chrono::Duration;

use stepup_domain::clock::SharedClock;

use crate::domain::repository::{RateLimitRepository, VerificationCodeRepository};
use crate::error::VerificationServiceError;
use crate::usecase::rate_limit::RateLimiter;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub codes: u64,
    pub rate_limits: u64,
}

/// Background purge of expired codes and rate-limit rows.
pub struct CleanupUseCase<C, R>
where
    C: VerificationCodeRepository,
    R: RateLimitRepository,
{
    pub codes: C,
    pub limiter: RateLimiter<R>,
    pub code_purge_grace: Duration,
    pub clock: SharedClock,
}

impl<C, R> CleanupUseCase<C, R>
where
    C: VerificationCodeRepository,
    R: RateLimitRepository,
{
    pub async fn execute(&self) -> Result<CleanupReport, VerificationServiceError> {
        let before = self.clock.now() - self.code_purge_grace;
        let codes = self.codes.delete_expired(before).await?;
        let rate_limits = self.limiter.purge_expired().await?;
        Ok(CleanupReport { codes, rate_limits })
    }
}
