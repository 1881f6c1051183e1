//! HTTP plumbing shared by Stepup services: health probes, request ids,
//! tracing setup and wire-format helpers.

pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
