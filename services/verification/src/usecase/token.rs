use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use stepup_auth_types::token::{
    SENSITIVE_DATA_TOKEN_TYPE, SensitiveDataClaims, TokenValidation,
    validate_sensitive_data_token,
};
use stepup_domain::clock::SharedClock;
use stepup_domain::id::UserId;

use crate::error::VerificationServiceError;

#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints and validates HS256 sensitive-data tokens.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl: Duration,
    clock: SharedClock,
}

impl TokenService {
    pub fn new(secret: impl Into<String>, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn mint(&self, user_id: UserId) -> Result<MintedToken, VerificationServiceError> {
        let iat = self.clock.now().timestamp();
        let exp = iat + self.ttl.num_seconds();
        let claims = SensitiveDataClaims {
            user_id,
            token_type: SENSITIVE_DATA_TOKEN_TYPE.to_owned(),
            iat,
            exp,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| VerificationServiceError::Internal(e.into()))?;

        let expires_at = claims
            .expires_at()
            .ok_or_else(|| anyhow::anyhow!("token expiry {exp} out of range"))?;
        Ok(MintedToken { token, expires_at })
    }

    /// Never fails; inspect `valid` on the result.
    pub fn validate(&self, token: &str) -> TokenValidation {
        validate_sensitive_data_token(token, &self.secret, self.clock.now())
    }
}
