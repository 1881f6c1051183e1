//! Scoped sensitive-data token: claims, validation, and unverified decoding.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;
#[cfg(any(feature = "USE_ONLY_IN_VERIFICATION_SERVICE", test))]
use serde::Serialize;

use stepup_domain::id::UserId;

/// Value of the `type` claim carried by every sensitive-data token.
pub const SENSITIVE_DATA_TOKEN_TYPE: &str = "sensitive_data_access";

/// Request header carrying the scoped token on sensitive requests.
pub const SENSITIVE_DATA_TOKEN_HEADER: &str = "x-sensitive-data-token";

/// Validation error for a bad signature, malformed token, or passed expiry.
pub const VERIFICATION_FAILED: &str = "verification failed";

/// Validation error for a well-signed token whose `type` claim is wrong.
pub const INVALID_TOKEN_TYPE: &str = "invalid token type";

/// Errors returned while decoding a token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
}

/// JWT claims payload of a sensitive-data token.
///
/// # Fields
///
/// | Field | JWT claim | Rust type | Meaning |
/// |-------|-----------|-----------|---------|
/// | `user_id` | `userId` | integer | verified user |
/// | `token_type` | `type` | string | always [`SENSITIVE_DATA_TOKEN_TYPE`] when minted here |
/// | `iat` | `iat` | seconds since epoch | issue time |
/// | `exp` | `exp` | seconds since epoch | expiry |
///
/// # Feature gate
///
/// [`Deserialize`] is always available: clients decode claims to drive their countdown.
/// [`Serialize`] requires the **`USE_ONLY_IN_VERIFICATION_SERVICE`** cargo feature because
/// the verification service is the sole issuer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[cfg_attr(
    any(feature = "USE_ONLY_IN_VERIFICATION_SERVICE", test),
    derive(Serialize)
)]
pub struct SensitiveDataClaims {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

impl SensitiveDataClaims {
    pub fn has_expected_type(&self) -> bool {
        self.token_type == SENSITIVE_DATA_TOKEN_TYPE
    }

    /// A token is expired once `now` reaches `exp`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Outcome of [`validate_sensitive_data_token`]. Never an error: callers get a
/// structured result and must treat any `valid == false` as "deny".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValidation {
    /// Absent when the token could not be decoded at all.
    pub user_id: Option<UserId>,
    pub valid: bool,
    pub error: Option<&'static str>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenValidation {
    fn rejected(user_id: Option<UserId>, error: &'static str) -> Self {
        Self {
            user_id,
            valid: false,
            error: Some(error),
            expires_at: None,
        }
    }
}

// ── Core decode (private) ────────────────────────────────────────────────

/// Decode a JWT and check its HS256 signature.
///
/// Expiry is deliberately not checked here; callers compare `exp` against their
/// own clock so the boundary has zero leeway and is testable.
fn decode_jwt(token: &str, secret: &str) -> Result<SensitiveDataClaims, AuthError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.required_spec_claims.clear();
    validation.set_required_spec_claims(&["exp"]);

    let data = decode::<SensitiveDataClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        _ => AuthError::Malformed,
    })?;

    Ok(data.claims)
}

// ── Public ───────────────────────────────────────────────────────────────

/// Validate a sensitive-data token against `secret` at instant `now`.
///
/// Signature, structure and expiry failures collapse into a single
/// [`VERIFICATION_FAILED`] outcome with no user id. A token that decodes but
/// carries the wrong `type` reports [`INVALID_TOKEN_TYPE`] and still exposes the
/// decoded user id for diagnostics.
pub fn validate_sensitive_data_token(
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> TokenValidation {
    let claims = match decode_jwt(token, secret) {
        Ok(claims) if !claims.is_expired_at(now) => claims,
        _ => return TokenValidation::rejected(None, VERIFICATION_FAILED),
    };

    if !claims.has_expected_type() {
        return TokenValidation::rejected(Some(claims.user_id), INVALID_TOKEN_TYPE);
    }

    TokenValidation {
        user_id: Some(claims.user_id),
        valid: true,
        error: None,
        expires_at: claims.expires_at(),
    }
}

/// Read the claims of a token WITHOUT checking its signature.
///
/// Only for clients, which never hold the signing secret and need `exp` and
/// `type` to restore their countdown. Never use the result for access control.
pub fn decode_unverified(token: &str) -> Result<SensitiveDataClaims, AuthError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::Malformed);
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)
}
