use axum::extract::rejection::JsonRejection;
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stepup_auth_types::identity::IdentityHeaders;
use stepup_core::serde::to_rfc3339_ms;
use stepup_domain::id::UserId;

use crate::domain::types::RequestContext;
use crate::error::VerificationServiceError;
use crate::handlers::context::SensitiveAccess;
use crate::state::AppState;
use crate::usecase::request_code::{RequestCodeInput, RequestCodeUseCase};
use crate::usecase::verify_code::{VerifyCodeInput, VerifyCodeUseCase};

pub const CODE_SENT_MESSAGE: &str = "Verification code sent to your email address";
pub const VERIFIED_MESSAGE: &str = "Verification successful";

// ── POST /verifications/request-code ──────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCodeResponse {
    pub message: &'static str,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
}

pub async fn request_code(
    State(state): State<AppState>,
    identity: IdentityHeaders,
    context: RequestContext,
) -> Result<Json<RequestCodeResponse>, VerificationServiceError> {
    let usecase = RequestCodeUseCase {
        users: state.user_port(),
        codes: state.code_repo(),
        limiter: state.rate_limiter(),
        audit: state.audit_log(),
        delivery: state.code_delivery(),
        policy: state.policy,
        clock: state.clock.clone(),
    };
    let output = usecase
        .execute(RequestCodeInput {
            user_id: identity.user_id,
            context,
        })
        .await?;

    Ok(Json(RequestCodeResponse {
        message: CODE_SENT_MESSAGE,
        expires_at: output.expires_at,
    }))
}

// ── POST /verifications/verify-code ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    /// Any JSON value; only a string can pass the format check.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl VerifyCodeRequest {
    /// The submitted code, or `""` when it is missing or not a string, so the
    /// format check rejects it.
    pub fn into_code(self) -> String {
        match self.code {
            Some(serde_json::Value::String(code)) => code,
            _ => String::new(),
        }
    }
}

/// A body that is not JSON at all is a malformed submission, not a transport error.
fn submitted_code(body: Result<Json<VerifyCodeRequest>, JsonRejection>) -> String {
    match body {
        Ok(Json(req)) => req.into_code(),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable verify-code body");
            String::new()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveDataAccess {
    pub granted: bool,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
    /// Milliseconds.
    pub session_duration: i64,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeResponse {
    pub message: &'static str,
    pub sensitive_data_access: SensitiveDataAccess,
}

pub async fn verify_code(
    State(state): State<AppState>,
    identity: IdentityHeaders,
    context: RequestContext,
    body: Result<Json<VerifyCodeRequest>, JsonRejection>,
) -> Result<Json<VerifyCodeResponse>, VerificationServiceError> {
    let usecase = VerifyCodeUseCase {
        codes: state.code_repo(),
        limiter: state.rate_limiter(),
        audit: state.audit_log(),
        tokens: state.token_service(),
        policy: state.policy,
        clock: state.clock.clone(),
    };
    let output = usecase
        .execute(VerifyCodeInput {
            user_id: identity.user_id,
            code: submitted_code(body),
            context,
        })
        .await?;

    Ok(Json(VerifyCodeResponse {
        message: VERIFIED_MESSAGE,
        sensitive_data_access: SensitiveDataAccess {
            granted: true,
            expires_at: output.expires_at,
            session_duration: output.session_duration.num_milliseconds(),
            token: output.token,
        },
    }))
}

// ── GET /verifications/token ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckTokenResponse {
    pub user_id: UserId,
    pub valid: bool,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
}

pub async fn check_token(access: SensitiveAccess) -> Json<CheckTokenResponse> {
    Json(CheckTokenResponse {
        user_id: access.user_id,
        valid: true,
        expires_at: access.expires_at,
    })
}
