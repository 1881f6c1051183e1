//! Test utilities for Stepup services and clients.
//!
//! Provides `MockIdentity` for gateway headers and `MockClock` for deterministic time.
//! Import in `#[cfg(test)]` blocks or `tests/` only, never in production code.

pub mod auth;
pub mod clock;
