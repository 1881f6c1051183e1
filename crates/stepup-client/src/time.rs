use chrono::{DateTime, Utc};

/// Whole seconds left until `expires_at`, never negative.
pub fn remaining_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).num_seconds().max(0)
}

/// `m:ss`, e.g. `14:05`.
pub fn format_time(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Urgency band of a running countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    /// 0 < s <= 60
    Warning,
    /// 60 < s <= 300
    Caution,
    Normal,
}

impl TimerStatus {
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            1..=60 => Self::Warning,
            61..=300 => Self::Caution,
            _ => Self::Normal,
        }
    }
}
