//! Auth types shared by the verification service and its clients.
//!
//! Provides the scoped sensitive-data token claims, token validation, and the
//! `IdentityHeaders` extractor.

pub mod identity;
pub mod token;
