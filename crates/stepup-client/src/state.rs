//! Pure session transitions. No I/O and no timers: callers feed events and
//! act on the returned state.

use chrono::{DateTime, Utc};

use crate::time::remaining_secs;

pub const RESTORED_MESSAGE: &str = "Session restored from previous verification";
pub const GRANTED_MESSAGE: &str = "Sensitive data access granted!";
pub const ALREADY_EXPIRED_ERROR: &str = "Sensitive data access expired before it could be used";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Locked,
    Unlocked,
    /// Unlocked with the expiry warning on screen.
    UnlockedWarningShown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub phase: Phase,
    pub expires_at: Option<DateTime<Utc>>,
    pub time_remaining: i64,
    /// The warning fired during this unlock episode.
    pub warning_shown: bool,
    /// The user closed the warning during this unlock episode.
    pub warning_dismissed: bool,
    pub request_in_flight: bool,
    pub verify_in_flight: bool,
    pub last_error: Option<String>,
    pub last_message: Option<String>,
}

impl SessionState {
    pub fn is_unlocked(&self) -> bool {
        self.phase != Phase::Locked
    }

    pub fn is_warning_open(&self) -> bool {
        self.phase == Phase::UnlockedWarningShown
    }

    fn lock(self) -> Self {
        Self {
            phase: Phase::Locked,
            expires_at: None,
            time_remaining: 0,
            warning_shown: false,
            warning_dismissed: false,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Enter `Unlocked`, after a successful verify or when restoring a stored token.
    Unlocked {
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
        message: String,
    },
    Tick {
        now: DateTime<Utc>,
    },
    WarningDismissed,
    /// Logout or any other forced lock.
    Locked,
    RequestStarted,
    RequestSucceeded {
        message: String,
    },
    RequestFailed {
        error: String,
    },
    VerifyStarted,
    VerifyFailed {
        error: String,
    },
    ClearError,
    ClearMessage,
}

/// Apply `event`. `warning_threshold_secs` is the remaining time at or below which
/// the expiry warning fires.
pub fn reduce(state: &SessionState, event: SessionEvent, warning_threshold_secs: i64) -> SessionState {
    let state = state.clone();
    match event {
        SessionEvent::Unlocked {
            expires_at,
            now,
            message,
        } => {
            let time_remaining = remaining_secs(expires_at, now);
            if time_remaining == 0 {
                return SessionState {
                    verify_in_flight: false,
                    last_error: Some(ALREADY_EXPIRED_ERROR.to_owned()),
                    ..state.lock()
                };
            }
            SessionState {
                phase: Phase::Unlocked,
                expires_at: Some(expires_at),
                time_remaining,
                warning_shown: false,
                warning_dismissed: false,
                verify_in_flight: false,
                last_error: None,
                last_message: Some(message),
                ..state
            }
        }
        SessionEvent::Tick { now } => {
            let Some(expires_at) = state.expires_at.filter(|_| state.is_unlocked()) else {
                return state;
            };
            let time_remaining = remaining_secs(expires_at, now);
            if time_remaining == 0 {
                return state.lock();
            }
            let warn = time_remaining <= warning_threshold_secs
                && !state.warning_shown
                && !state.warning_dismissed;
            SessionState {
                phase: if warn {
                    Phase::UnlockedWarningShown
                } else {
                    state.phase
                },
                warning_shown: state.warning_shown || warn,
                time_remaining,
                ..state
            }
        }
        SessionEvent::WarningDismissed if state.phase == Phase::UnlockedWarningShown => {
            SessionState {
                phase: Phase::Unlocked,
                warning_dismissed: true,
                ..state
            }
        }
        SessionEvent::WarningDismissed => state,
        SessionEvent::Locked => state.lock(),
        SessionEvent::RequestStarted => SessionState {
            request_in_flight: true,
            last_error: None,
            ..state
        },
        SessionEvent::RequestSucceeded { message } => SessionState {
            request_in_flight: false,
            last_message: Some(message),
            ..state
        },
        SessionEvent::RequestFailed { error } => SessionState {
            request_in_flight: false,
            last_error: Some(error),
            ..state
        },
        SessionEvent::VerifyStarted => SessionState {
            verify_in_flight: true,
            last_error: None,
            ..state
        },
        SessionEvent::VerifyFailed { error } => SessionState {
            verify_in_flight: false,
            last_error: Some(error),
            ..state
        },
        SessionEvent::ClearError => SessionState {
            last_error: None,
            ..state
        },
        SessionEvent::ClearMessage => SessionState {
            last_message: None,
            ..state
        },
    }
}
