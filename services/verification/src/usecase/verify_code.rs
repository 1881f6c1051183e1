use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use stepup_domain::clock::SharedClock;
use stepup_domain::id::UserId;

use crate::domain::repository::{
    AuditLogRepository, RateLimitRepository, VerificationCodeRepository,
};
use crate::domain::types::{
    ActionKind, AuditEvent, RequestContext, VerificationPolicy, redact_code,
};
use crate::error::VerificationServiceError;
use crate::usecase::audit::AuditLog;
use crate::usecase::rate_limit::RateLimiter;
use crate::usecase::token::TokenService;

fn is_well_formed(code: &str, length: usize) -> bool {
    code.len() == length && code.bytes().all(|b| b.is_ascii_digit())
}

pub struct VerifyCodeInput {
    pub user_id: UserId,
    pub code: String,
    pub context: RequestContext,
}

#[derive(Debug)]
pub struct VerifyCodeOutput {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub session_duration: Duration,
}

pub struct VerifyCodeUseCase<C, R, A>
where
    C: VerificationCodeRepository,
    R: RateLimitRepository,
    A: AuditLogRepository,
{
    pub codes: C,
    pub limiter: RateLimiter<R>,
    pub audit: AuditLog<A>,
    pub tokens: TokenService,
    pub policy: VerificationPolicy,
    pub clock: SharedClock,
}

impl<C, R, A> VerifyCodeUseCase<C, R, A>
where
    C: VerificationCodeRepository,
    R: RateLimitRepository,
    A: AuditLogRepository,
{
    pub async fn execute(
        &self,
        input: VerifyCodeInput,
    ) -> Result<VerifyCodeOutput, VerificationServiceError> {
        let VerifyCodeInput {
            user_id,
            code,
            context,
        } = input;
        let redacted = json!({ "code": redact_code(&code) });

        // 1. Format check → 400, touches neither storage nor the limiter
        if !is_well_formed(&code, self.policy.code_length) {
            self.audit
                .record(
                    user_id,
                    AuditEvent::CodeVerifyInvalidFormat,
                    Some(redacted),
                    &context,
                )
                .await;
            return Err(VerificationServiceError::InvalidCodeFormat);
        }

        // 2. Purge codes past expiry plus grace
        let now = self.clock.now();
        self.codes
            .delete_expired(now - self.policy.code_purge_grace)
            .await?;

        // 3. Rate-limit gate → 429
        if !self.limiter.allow(user_id, ActionKind::CodeVerify).await? {
            self.audit
                .record(user_id, AuditEvent::CodeVerifyRateLimited, None, &context)
                .await;
            let retry_after = self.limiter.policy(ActionKind::CodeVerify).retry_after_secs();
            return Err(VerificationServiceError::TooManyVerifyAttempts { retry_after });
        }

        // 4. Unknown or mismatched code → 400, counted as an attempt
        let Some(found) = self.codes.find_unused(user_id, &code).await? else {
            return Err(self
                .reject(
                    user_id,
                    AuditEvent::CodeVerifyInvalid,
                    redacted,
                    &context,
                    VerificationServiceError::InvalidCode,
                )
                .await?);
        };

        // 5. Expired → 400, consumed so it cannot be replayed
        if found.is_expired_at(now) {
            self.codes.mark_used(found.id, now).await?;
            return Err(self
                .reject(
                    user_id,
                    AuditEvent::CodeVerifyExpired,
                    redacted,
                    &context,
                    VerificationServiceError::CodeExpired,
                )
                .await?);
        }

        // 6. Consume; a concurrent request that got there first wins
        if !self.codes.mark_used(found.id, now).await? {
            return Err(self
                .reject(
                    user_id,
                    AuditEvent::CodeVerifyInvalid,
                    redacted,
                    &context,
                    VerificationServiceError::InvalidCode,
                )
                .await?);
        }

        self.audit
            .record(
                user_id,
                AuditEvent::CodeVerifiedSuccess,
                Some(redacted),
                &context,
            )
            .await;

        let minted = self.tokens.mint(user_id)?;
        Ok(VerifyCodeOutput {
            token: minted.token,
            expires_at: minted.expires_at,
            session_duration: self.tokens.ttl(),
        })
    }

    /// Count the failed attempt and audit it, handing back the outcome to return.
    async fn reject(
        &self,
        user_id: UserId,
        event: AuditEvent,
        redacted: serde_json::Value,
        context: &RequestContext,
        outcome: VerificationServiceError,
    ) -> Result<VerificationServiceError, VerificationServiceError> {
        self.limiter.record(user_id, ActionKind::CodeVerify).await?;
        self.audit
            .record(user_id, event, Some(redacted), context)
            .await;
        Ok(outcome)
    }
}
