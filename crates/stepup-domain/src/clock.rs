//! Wall-clock abstraction.
//!
//! Every time-dependent decision (code expiry, rate-limit windows, token
//! lifetime, client countdown) reads "now" through [`Clock`] so tests can
//! move time deterministically.

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Shared, type-erased clock handle held by services and sessions.
pub type SharedClock = Arc<dyn Clock>;

/// Reads the operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(Self)
    }
}
