use serde_json::Value;
use uuid::Uuid;

use stepup_domain::clock::SharedClock;
use stepup_domain::id::UserId;

use crate::domain::repository::AuditLogRepository;
use crate::domain::types::{AuditEntry, AuditEvent, RequestContext};

/// Writes audit entries. A failed write is logged and swallowed so it never
/// changes the outcome the caller reports.
pub struct AuditLog<A>
where
    A: AuditLogRepository,
{
    pub repo: A,
    pub clock: SharedClock,
}

impl<A> AuditLog<A>
where
    A: AuditLogRepository,
{
    pub async fn record(
        &self,
        user_id: UserId,
        event: AuditEvent,
        data: Option<Value>,
        context: &RequestContext,
    ) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            user_id,
            event,
            event_data: data.map(|v| v.to_string()),
            ip_address: Some(context.ip_address.clone()),
            user_agent: Some(context.user_agent.clone()),
            created_at: self.clock.now(),
        };

        if let Err(e) = self.repo.append(&entry).await {
            tracing::error!(
                error = ?e,
                user_id = %user_id,
                event = event.as_str(),
                "failed to write audit entry"
            );
        }
    }
}
