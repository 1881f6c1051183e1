use chrono::{Duration, Utc};

use stepup_client::api::VerificationClient;
use stepup_client::config::ClientConfig;
use stepup_client::error::ClientError;

use crate::helpers::{TEST_USER_ID, VALID_CODE, client_config, spawn_fake_api};

#[tokio::test]
async fn should_parse_request_code_response() {
    let base_url = spawn_fake_api(Utc::now() + Duration::minutes(15)).await;
    let api = VerificationClient::new(&client_config(&base_url)).unwrap();

    let resp = api.request_code().await.unwrap();

    assert_eq!(resp.message, "Verification code sent to your email address");
    assert_eq!(resp.expires_at.to_rfc3339(), "2025-01-01T00:10:00+00:00");
}

#[tokio::test]
async fn should_surface_rate_limit_with_retry_after() {
    let base_url = spawn_fake_api(Utc::now() + Duration::minutes(15)).await;
    let api = VerificationClient::new(&client_config(&base_url)).unwrap();

    for _ in 0..3 {
        api.request_code().await.unwrap();
    }
    let err = api.request_code().await.unwrap_err();

    assert!(
        matches!(
            &err,
            ClientError::Rejected {
                status: 429,
                retry_after: Some(900),
                ..
            }
        ),
        "expected 429 rejection, got {err:?}"
    );
    assert_eq!(err.to_string(), "Rate limit exceeded. Please try again later.");
    assert_eq!(err.retry_after(), Some(900));
}

#[tokio::test]
async fn should_fall_back_to_generic_message_without_error_body() {
    let base_url = spawn_fake_api(Utc::now() + Duration::minutes(15)).await;
    // No identity headers: the fake gateway answers 401 with an empty object.
    let api = VerificationClient::new(&ClientConfig::new(&base_url)).unwrap();

    let err = api.request_code().await.unwrap_err();

    assert_eq!(err.to_string(), "Failed to request verification code");
}

#[tokio::test]
async fn should_return_grant_for_valid_code() {
    let expires_at = Utc::now() + Duration::minutes(15);
    let base_url = spawn_fake_api(expires_at).await;
    let api = VerificationClient::new(&client_config(&base_url)).unwrap();

    let resp = api.verify_code(VALID_CODE).await.unwrap();
    let access = resp.sensitive_data_access;

    assert!(access.granted);
    assert_eq!(access.session_duration, 900_000);
    assert_eq!(access.expires_at.timestamp(), expires_at.timestamp());

    let check = api.check_token(&access.token).await.unwrap();
    assert!(check.valid);
    assert_eq!(check.user_id, TEST_USER_ID);
}

#[tokio::test]
async fn should_report_invalid_code_message() {
    let base_url = spawn_fake_api(Utc::now() + Duration::minutes(15)).await;
    let api = VerificationClient::new(&client_config(&base_url)).unwrap();

    let err = api.verify_code("000000").await.unwrap_err();

    assert!(matches!(err, ClientError::Rejected { status: 400, .. }));
    assert_eq!(err.to_string(), "Invalid or expired verification code");
}
