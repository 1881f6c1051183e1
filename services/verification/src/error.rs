use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};

/// Verification service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum VerificationServiceError {
    #[error("Invalid verification code format")]
    InvalidCodeFormat,
    #[error("Rate limit exceeded. Please try again later.")]
    TooManyCodeRequests { retry_after: u64 },
    #[error("Too many verification attempts. Please try again later.")]
    TooManyVerifyAttempts { retry_after: u64 },
    #[error("Invalid or expired verification code")]
    InvalidCode,
    #[error("Verification code has expired")]
    CodeExpired,
    #[error("Invalid sensitive data token")]
    InvalidToken,
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl VerificationServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCodeFormat => "INVALID_CODE_FORMAT",
            Self::TooManyCodeRequests { .. } => "TOO_MANY_CODE_REQUESTS",
            Self::TooManyVerifyAttempts { .. } => "TOO_MANY_VERIFY_ATTEMPTS",
            Self::InvalidCode => "INVALID_CODE",
            Self::CodeExpired => "CODE_EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::TooManyCodeRequests { retry_after }
            | Self::TooManyVerifyAttempts { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl IntoResponse for VerificationServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidCodeFormat | Self::InvalidCode | Self::CodeExpired => {
                StatusCode::BAD_REQUEST
            }
            Self::TooManyCodeRequests { .. } | Self::TooManyVerifyAttempts { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // 4xx outcomes already land in the audit log; only 500s go to the process log.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = ?e, kind = "INTERNAL", "internal error");
        }
        let mut body = serde_json::json!({
            "kind": self.kind(),
            "error": self.to_string(),
        });
        let retry_after = self.retry_after();
        if let Some(secs) = retry_after {
            body["retryAfter"] = secs.into();
        }
        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
