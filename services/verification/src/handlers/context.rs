use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};

use stepup_auth_types::identity::IdentityHeaders;
use stepup_auth_types::token::SENSITIVE_DATA_TOKEN_HEADER;
use stepup_domain::id::UserId;

use crate::domain::types::RequestContext;
use crate::error::VerificationServiceError;
use crate::state::AppState;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl RequestContext {
    /// First hop of `x-forwarded-for`, else `x-real-ip`; `"unknown"` when neither is usable.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = header_str(headers, X_FORWARDED_FOR)
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| header_str(headers, X_REAL_IP))
            .unwrap_or(Self::UNKNOWN)
            .to_owned();
        let user_agent = header_str(headers, USER_AGENT.as_str())
            .unwrap_or(Self::UNKNOWN)
            .to_owned();
        Self {
            ip_address,
            user_agent,
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let context = Self::from_headers(&parts.headers);
        async move { Ok(context) }
    }
}

/// Gate for sensitive handlers: the gateway identity plus a valid scoped token
/// issued to that same user. Rejects with 401 `INVALID_TOKEN`.
#[derive(Debug, Clone)]
pub struct SensitiveAccess {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl FromRequestParts<AppState> for SensitiveAccess {
    type Rejection = VerificationServiceError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let identity = IdentityHeaders::from_parts(parts);
        let validation = header_str(&parts.headers, SENSITIVE_DATA_TOKEN_HEADER)
            .map(|token| state.token_service().validate(token));

        async move {
            let identity = identity.ok_or(VerificationServiceError::InvalidToken)?;
            let validation = validation.ok_or(VerificationServiceError::InvalidToken)?;
            match (validation.valid, validation.user_id, validation.expires_at) {
                (true, Some(user_id), Some(expires_at)) if user_id == identity.user_id => {
                    Ok(Self {
                        user_id,
                        expires_at,
                    })
                }
                _ => Err(VerificationServiceError::InvalidToken),
            }
        }
    }
}
