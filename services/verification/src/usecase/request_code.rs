use chrono::{DateTime, Utc};
use rand::RngExt;
use serde_json::json;
use uuid::Uuid;

use stepup_domain::clock::SharedClock;
use stepup_domain::id::UserId;

use crate::domain::repository::{
    AuditLogRepository, CodeDelivery, RateLimitRepository, UserPort, VerificationCodeRepository,
};
use crate::domain::types::{
    ActionKind, AuditEvent, RequestContext, VerificationCode, VerificationPolicy,
};
use crate::error::VerificationServiceError;
use crate::usecase::audit::AuditLog;
use crate::usecase::rate_limit::RateLimiter;

/// Uniform draw from `10^(len-1)..=10^len - 1`, so a leading zero never occurs.
pub(crate) fn generate_code(length: usize) -> String {
    let length = length.clamp(1, 18) as u32;
    let low = 10u64.pow(length - 1);
    let high = 10u64.pow(length) - 1;
    rand::rng().random_range(low..=high).to_string()
}

pub struct RequestCodeInput {
    pub user_id: UserId,
    pub context: RequestContext,
}

/// The code value itself never leaves the issuer except through delivery.
#[derive(Debug)]
pub struct RequestCodeOutput {
    pub expires_at: DateTime<Utc>,
}

pub struct RequestCodeUseCase<U, C, R, A, D>
where
    U: UserPort,
    C: VerificationCodeRepository,
    R: RateLimitRepository,
    A: AuditLogRepository,
    D: CodeDelivery,
{
    pub users: U,
    pub codes: C,
    pub limiter: RateLimiter<R>,
    pub audit: AuditLog<A>,
    pub delivery: D,
    pub policy: VerificationPolicy,
    pub clock: SharedClock,
}

impl<U, C, R, A, D> RequestCodeUseCase<U, C, R, A, D>
where
    U: UserPort,
    C: VerificationCodeRepository,
    R: RateLimitRepository,
    A: AuditLogRepository,
    D: CodeDelivery,
{
    pub async fn execute(
        &self,
        input: RequestCodeInput,
    ) -> Result<RequestCodeOutput, VerificationServiceError> {
        let RequestCodeInput { user_id, context } = input;

        // 1. Purge codes past expiry plus grace
        let now = self.clock.now();
        self.codes
            .delete_expired(now - self.policy.code_purge_grace)
            .await?;

        // 2. Rate-limit gate → 429
        let allowed = if self.policy.atomic_rate_limit {
            self.limiter
                .try_acquire(user_id, ActionKind::CodeRequest)
                .await?
        } else {
            self.limiter.allow(user_id, ActionKind::CodeRequest).await?
        };
        if !allowed {
            self.audit
                .record(user_id, AuditEvent::CodeRequestRateLimited, None, &context)
                .await;
            let retry_after = self.limiter.policy(ActionKind::CodeRequest).retry_after_secs();
            return Err(VerificationServiceError::TooManyCodeRequests { retry_after });
        }

        // 3. Generate + persist, then count the request
        let code = VerificationCode {
            id: Uuid::new_v4(),
            user_id,
            code: generate_code(self.policy.code_length),
            expires_at: now + self.policy.code_ttl,
            used_at: None,
            created_at: now,
        };
        self.codes.create(&code).await?;
        if !self.policy.atomic_rate_limit {
            self.limiter.record(user_id, ActionKind::CodeRequest).await?;
        }

        // 4. Deliver exactly once
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {user_id} not found for code delivery"))?;
        self.delivery
            .dispatch(&code, &user.email, self.policy.code_ttl)
            .await?;

        self.audit
            .record(
                user_id,
                AuditEvent::CodeRequested,
                Some(json!({ "email": user.email })),
                &context,
            )
            .await;

        Ok(RequestCodeOutput {
            expires_at: code.expires_at,
        })
    }
}
