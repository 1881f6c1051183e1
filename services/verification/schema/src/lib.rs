//! sea-orm entities for the verification service tables.

pub mod audit_logs;
pub mod outbox_events;
pub mod rate_limits;
pub mod users;
pub mod verification_codes;
