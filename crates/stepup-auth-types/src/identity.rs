//! Gateway-injected identity header extractor.

use axum::extract::FromRequestParts;
use http::StatusCode;
use http::request::Parts;

use stepup_domain::id::UserId;

/// Header the gateway sets after the primary login session has been checked.
pub const USER_ID_HEADER: &str = "x-user-id";

/// User identity injected by the gateway via the `x-user-id` header.
///
/// Returns 401 if the header is absent or not an integer. Primary credential
/// checks happen upstream; this service only trusts the header.
#[derive(Debug, Clone)]
pub struct IdentityHeaders {
    pub user_id: UserId,
}

impl IdentityHeaders {
    pub fn from_parts(parts: &Parts) -> Option<Self> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<UserId>().ok())
            .map(|user_id| Self { user_id })
    }
}

impl<S> FromRequestParts<S> for IdentityHeaders
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    // axum-core 0.5 defines this as `fn -> impl Future + Send` (not `async fn`).
    // Extract synchronously and return a 'static async block.
    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let identity = Self::from_parts(parts);
        async move { identity.ok_or(StatusCode::UNAUTHORIZED) }
    }
}
