use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;

use stepup_auth_types::token::SENSITIVE_DATA_TOKEN_HEADER;
use stepup_domain::id::UserId;

use crate::config::ClientConfig;
use crate::error::ClientError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCodeResponse {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveDataAccess {
    pub granted: bool,
    pub expires_at: DateTime<Utc>,
    /// Milliseconds.
    pub session_duration: i64,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeResponse {
    pub message: String,
    pub sensitive_data_access: SensitiveDataAccess,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckTokenResponse {
    pub user_id: UserId,
    pub valid: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: Option<String>,
    retry_after: Option<u64>,
}

/// HTTP client for the verification endpoints.
#[derive(Debug, Clone)]
pub struct VerificationClient {
    client: Client,
    base_url: String,
}

impl VerificationClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .default_headers(config.default_headers.clone())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn request_code(&self) -> Result<RequestCodeResponse, ClientError> {
        let resp = self
            .client
            .post(self.url("/verifications/request-code"))
            .send()
            .await?;
        parse(resp, "Failed to request verification code").await
    }

    pub async fn verify_code(&self, code: &str) -> Result<VerifyCodeResponse, ClientError> {
        let resp = self
            .client
            .post(self.url("/verifications/verify-code"))
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await?;
        parse(resp, "Failed to verify code").await
    }

    pub async fn check_token(&self, token: &str) -> Result<CheckTokenResponse, ClientError> {
        let resp = self
            .client
            .get(self.url("/verifications/token"))
            .header(SENSITIVE_DATA_TOKEN_HEADER, token)
            .send()
            .await?;
        parse(resp, "Failed to check token").await
    }
}

async fn parse<T>(resp: Response, fallback: &str) -> Result<T, ClientError>
where
    T: serde::de::DeserializeOwned,
{
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    // Error bodies are best effort; a proxy may answer with HTML.
    let body: ErrorBody = resp.json().await.unwrap_or_default();
    Err(ClientError::Rejected {
        status: status.as_u16(),
        message: body.error.unwrap_or_else(|| fallback.to_owned()),
        retry_after: body.retry_after,
    })
}
