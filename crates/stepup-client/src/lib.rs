//! Client side of step-up verification.
//!
//! [`state`] is a pure reducer over [`state::SessionEvent`]s; [`session::SensitiveSession`]
//! drives it with a one-second countdown, the HTTP API and a persisted token.

pub mod api;
pub mod config;
pub mod countdown;
pub mod error;
pub mod session;
pub mod state;
pub mod store;
pub mod time;
