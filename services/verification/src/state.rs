use sea_orm::DatabaseConnection;

use stepup_domain::clock::SharedClock;

use crate::domain::types::VerificationPolicy;
use crate::infra::db::{
    DbAuditLogRepository, DbRateLimitRepository, DbUserRepository, DbVerificationCodeRepository,
};
use crate::infra::delivery::{
    ConfiguredDelivery, DeliveryMode, LogCodeDelivery, OutboxCodeDelivery,
};
use crate::usecase::audit::AuditLog;
use crate::usecase::rate_limit::RateLimiter;
use crate::usecase::token::TokenService;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub jwt_secret: String,
    pub policy: VerificationPolicy,
    pub delivery_mode: DeliveryMode,
    pub clock: SharedClock,
}

impl AppState {
    pub fn user_port(&self) -> DbUserRepository {
        DbUserRepository {
            db: self.db.clone(),
        }
    }

    pub fn code_repo(&self) -> DbVerificationCodeRepository {
        DbVerificationCodeRepository {
            db: self.db.clone(),
        }
    }

    pub fn rate_limiter(&self) -> RateLimiter<DbRateLimitRepository> {
        RateLimiter {
            repo: DbRateLimitRepository {
                db: self.db.clone(),
            },
            policies: self.policy.rate_limits,
            clock: self.clock.clone(),
        }
    }

    pub fn audit_log(&self) -> AuditLog<DbAuditLogRepository> {
        AuditLog {
            repo: DbAuditLogRepository {
                db: self.db.clone(),
            },
            clock: self.clock.clone(),
        }
    }

    pub fn code_delivery(&self) -> ConfiguredDelivery {
        match self.delivery_mode {
            DeliveryMode::Outbox => ConfiguredDelivery::Outbox(OutboxCodeDelivery {
                db: self.db.clone(),
            }),
            DeliveryMode::Log => ConfiguredDelivery::Log(LogCodeDelivery),
        }
    }

    pub fn token_service(&self) -> TokenService {
        TokenService::new(
            self.jwt_secret.clone(),
            self.policy.token_ttl,
            self.clock.clone(),
        )
    }
}
