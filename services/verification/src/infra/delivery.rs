use anyhow::Context as _;
use chrono::Duration;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use serde_json::json;
use uuid::Uuid;

use stepup_verification_schema::outbox_events;

use crate::domain::repository::CodeDelivery;
use crate::domain::types::{OutboxEvent, VerificationCode};
use crate::error::VerificationServiceError;

pub const VERIFICATION_CODE_CREATED: &str = "verification_code_created";

/// How issued codes reach the user. Env var: `CODE_DELIVERY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Enqueue an outbox event for the mail relay.
    Outbox,
    /// Development only: log the code instead of sending it.
    Log,
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "outbox" => Ok(Self::Outbox),
            "log" => Ok(Self::Log),
            other => Err(format!("unknown code delivery mode: {other}")),
        }
    }
}

pub fn code_created_event(code: &VerificationCode, address: &str, lifetime: Duration) -> OutboxEvent {
    OutboxEvent {
        id: Uuid::new_v4(),
        kind: VERIFICATION_CODE_CREATED.to_owned(),
        user_id: code.user_id,
        payload: json!({
            "userId": code.user_id,
            "email": address,
            "code": code.code,
            "expiresInSecs": lifetime.num_seconds(),
        }),
        idempotency_key: format!("{VERIFICATION_CODE_CREATED}:{}", code.id),
        created_at: code.created_at,
        deliver_until: code.expires_at,
    }
}

#[derive(Clone)]
pub struct OutboxCodeDelivery {
    pub db: DatabaseConnection,
}

impl CodeDelivery for OutboxCodeDelivery {
    async fn dispatch(
        &self,
        code: &VerificationCode,
        address: &str,
        lifetime: Duration,
    ) -> Result<(), VerificationServiceError> {
        let event = code_created_event(code, address, lifetime);
        outbox_events::ActiveModel {
            id: Set(event.id),
            kind: Set(event.kind),
            user_id: Set(event.user_id.0),
            payload: Set(event.payload),
            idempotency_key: Set(event.idempotency_key),
            attempts: Set(0),
            created_at: Set(event.created_at),
            deliver_until: Set(event.deliver_until),
            delivered_at: Set(None),
        }
        .insert(&self.db)
        .await
        .context("enqueue verification code delivery")?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct LogCodeDelivery;

impl CodeDelivery for LogCodeDelivery {
    async fn dispatch(
        &self,
        code: &VerificationCode,
        address: &str,
        lifetime: Duration,
    ) -> Result<(), VerificationServiceError> {
        tracing::warn!(
            user_id = %code.user_id,
            email = address,
            code = %code.code,
            expires_in_secs = lifetime.num_seconds(),
            "verification code (log delivery, not for production)"
        );
        Ok(())
    }
}

/// Delivery selected at startup.
#[derive(Clone)]
pub enum ConfiguredDelivery {
    Outbox(OutboxCodeDelivery),
    Log(LogCodeDelivery),
}

impl CodeDelivery for ConfiguredDelivery {
    async fn dispatch(
        &self,
        code: &VerificationCode,
        address: &str,
        lifetime: Duration,
    ) -> Result<(), VerificationServiceError> {
        match self {
            Self::Outbox(outbox) => outbox.dispatch(code, address, lifetime).await,
            Self::Log(log) => log.dispatch(code, address, lifetime).await,
        }
    }
}
