use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::error::SqlxError;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, IsolationLevel, QueryFilter, QueryOrder, QuerySelect, RuntimeErr,
    TransactionTrait,
};
use uuid::Uuid;

use stepup_domain::id::UserId;
use stepup_verification_schema::{audit_logs, rate_limits, users, verification_codes};

use crate::domain::repository::{
    AuditLogRepository, RateLimitRepository, UserPort, VerificationCodeRepository,
};
use crate::domain::types::{
    ActionKind, AuditEntry, RateLimitRecord, VerificationCode, VerificationUser,
};
use crate::error::VerificationServiceError;

// ── User lookup ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserPort for DbUserRepository {
    async fn find_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<VerificationUser>, VerificationServiceError> {
        let model = users::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find user by id")?;
        Ok(model.map(|m| VerificationUser {
            id: UserId(m.id),
            email: m.email,
        }))
    }
}

// ── Verification code repository ──────────────────────────────────────────────

#[derive(Clone)]
pub struct DbVerificationCodeRepository {
    pub db: DatabaseConnection,
}

impl VerificationCodeRepository for DbVerificationCodeRepository {
    async fn create(&self, code: &VerificationCode) -> Result<(), VerificationServiceError> {
        verification_codes::ActiveModel {
            id: Set(code.id),
            user_id: Set(code.user_id.0),
            code: Set(code.code.clone()),
            expires_at: Set(code.expires_at),
            used_at: Set(None),
            created_at: Set(code.created_at),
        }
        .insert(&self.db)
        .await
        .context("create verification code")?;
        Ok(())
    }

    async fn find_unused(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<Option<VerificationCode>, VerificationServiceError> {
        let model = verification_codes::Entity::find()
            .filter(verification_codes::Column::UserId.eq(user_id.0))
            .filter(verification_codes::Column::Code.eq(code))
            .filter(verification_codes::Column::UsedAt.is_null())
            .order_by_desc(verification_codes::Column::CreatedAt)
            .one(&self.db)
            .await
            .context("find unused verification code")?;
        Ok(model.map(code_from_model))
    }

    async fn mark_used(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, VerificationServiceError> {
        let result = verification_codes::Entity::update_many()
            .col_expr(verification_codes::Column::UsedAt, Expr::value(at))
            .filter(verification_codes::Column::Id.eq(id))
            .filter(verification_codes::Column::UsedAt.is_null())
            .exec(&self.db)
            .await
            .context("mark verification code used")?;
        Ok(result.rows_affected == 1)
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, VerificationServiceError> {
        let result = verification_codes::Entity::delete_many()
            .filter(verification_codes::Column::ExpiresAt.lt(before))
            .exec(&self.db)
            .await
            .context("delete expired verification codes")?;
        Ok(result.rows_affected)
    }
}

fn code_from_model(model: verification_codes::Model) -> VerificationCode {
    VerificationCode {
        id: model.id,
        user_id: UserId(model.user_id),
        code: model.code,
        expires_at: model.expires_at,
        used_at: model.used_at,
        created_at: model.created_at,
    }
}

// ── Rate limit repository ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbRateLimitRepository {
    pub db: DatabaseConnection,
}

impl RateLimitRepository for DbRateLimitRepository {
    async fn insert(&self, record: &RateLimitRecord) -> Result<(), VerificationServiceError> {
        insert_rate_limit(&self.db, record)
            .await
            .context("insert rate limit record")?;
        Ok(())
    }

    async fn sum_since(
        &self,
        user_id: UserId,
        kind: ActionKind,
        since: DateTime<Utc>,
    ) -> Result<i64, VerificationServiceError> {
        let used = sum_rate_limit(&self.db, user_id, kind, since)
            .await
            .context("sum rate limit window")?;
        Ok(used)
    }

    async fn delete_older_than(
        &self,
        kind: ActionKind,
        before: DateTime<Utc>,
    ) -> Result<u64, VerificationServiceError> {
        let result = rate_limits::Entity::delete_many()
            .filter(rate_limits::Column::ActionKind.eq(kind.as_str()))
            .filter(rate_limits::Column::WindowStart.lt(before))
            .exec(&self.db)
            .await
            .context("delete expired rate limit records")?;
        Ok(result.rows_affected)
    }

    /// Retries once on a serialization conflict. A second conflict means
    /// concurrent requests are racing for the same window, so it counts as denied.
    async fn acquire(
        &self,
        record: &RateLimitRecord,
        limit: u32,
        since: DateTime<Utc>,
    ) -> Result<bool, VerificationServiceError> {
        for attempt in 1..=ACQUIRE_ATTEMPTS {
            match acquire_once(&self.db, record, limit, since).await {
                Err(e) if is_serialization_failure(&e) => {
                    tracing::debug!(
                        user_id = %record.user_id,
                        action_kind = record.action_kind.as_str(),
                        attempt,
                        "rate limit acquire hit a serialization conflict"
                    );
                }
                result => return Ok(result.context("acquire rate limit slot")?),
            }
        }
        Ok(false)
    }
}

const ACQUIRE_ATTEMPTS: u32 = 2;

/// SQLSTATE raised when a serializable transaction loses a conflict.
const SERIALIZATION_FAILURE: &str = "40001";

fn is_serialization_failure(err: &DbErr) -> bool {
    let (DbErr::Exec(RuntimeErr::SqlxError(SqlxError::Database(db)))
    | DbErr::Query(RuntimeErr::SqlxError(SqlxError::Database(db)))
    | DbErr::Conn(RuntimeErr::SqlxError(SqlxError::Database(db)))) = err
    else {
        return false;
    };
    db.code().as_deref() == Some(SERIALIZATION_FAILURE)
}

async fn acquire_once(
    db: &DatabaseConnection,
    record: &RateLimitRecord,
    limit: u32,
    since: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let txn = db
        .begin_with_config(Some(IsolationLevel::Serializable), None)
        .await?;

    let used = sum_rate_limit(&txn, record.user_id, record.action_kind, since).await?;
    if used >= i64::from(limit) {
        txn.rollback().await?;
        return Ok(false);
    }

    insert_rate_limit(&txn, record).await?;
    txn.commit().await?;
    Ok(true)
}

async fn insert_rate_limit<C>(conn: &C, record: &RateLimitRecord) -> Result<(), sea_orm::DbErr>
where
    C: ConnectionTrait,
{
    rate_limits::ActiveModel {
        id: Set(record.id),
        user_id: Set(record.user_id.0),
        action_kind: Set(record.action_kind.as_str().to_owned()),
        window_start: Set(record.window_start),
        count: Set(record.count),
    }
    .insert(conn)
    .await?;
    Ok(())
}

async fn sum_rate_limit<C>(
    conn: &C,
    user_id: UserId,
    kind: ActionKind,
    since: DateTime<Utc>,
) -> Result<i64, sea_orm::DbErr>
where
    C: ConnectionTrait,
{
    // SUM over zero rows is NULL.
    let total: Option<Option<i64>> = rate_limits::Entity::find()
        .select_only()
        .column_as(Expr::col(rate_limits::Column::Count).sum(), "total")
        .filter(rate_limits::Column::UserId.eq(user_id.0))
        .filter(rate_limits::Column::ActionKind.eq(kind.as_str()))
        .filter(rate_limits::Column::WindowStart.gt(since))
        .into_tuple()
        .one(conn)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

// ── Audit log repository ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAuditLogRepository {
    pub db: DatabaseConnection,
}

impl AuditLogRepository for DbAuditLogRepository {
    async fn append(&self, entry: &AuditEntry) -> Result<(), VerificationServiceError> {
        audit_logs::ActiveModel {
            id: Set(entry.id),
            user_id: Set(entry.user_id.0),
            event_type: Set(entry.event.as_str().to_owned()),
            event_data: Set(entry.event_data.clone()),
            ip_address: Set(entry.ip_address.clone()),
            user_agent: Set(entry.user_agent.clone()),
            created_at: Set(entry.created_at),
        }
        .insert(&self.db)
        .await
        .context("append audit entry")?;
        Ok(())
    }
}
