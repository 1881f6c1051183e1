use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};

use stepup_client::config::ClientConfig;
use stepup_domain::clock::Clock;
use stepup_domain::id::UserId;
use stepup_testing::auth::MockIdentity;

pub const VALID_CODE: &str = "482913";
pub const TEST_USER_ID: UserId = UserId(1);

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// Unsigned token with the given claims. Clients never check signatures.
pub fn token_expiring_at(token_type: &str, exp: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({
            "userId": TEST_USER_ID,
            "type": token_type,
            "iat": exp.timestamp() - 900,
            "exp": exp.timestamp(),
        })
        .to_string(),
    );
    format!("{header}.{payload}.signature")
}

/// Wall clock that follows tokio's (pausable) time, starting at `base`.
pub struct TokioClock {
    base: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + Duration::from_std(self.start.elapsed()).unwrap()
    }
}

// ── Fake verification API ────────────────────────────────────────────────────

#[derive(Clone)]
struct FakeApi {
    requests: Arc<AtomicU32>,
    grant_expires_at: DateTime<Utc>,
}

fn has_identity(headers: &HeaderMap) -> bool {
    headers.contains_key("x-user-id")
}

async fn request_code(State(api): State<FakeApi>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !has_identity(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    if api.requests.fetch_add(1, Ordering::SeqCst) >= 3 {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "kind": "TOO_MANY_CODE_REQUESTS",
                "error": "Rate limit exceeded. Please try again later.",
                "retryAfter": 900,
            })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "message": "Verification code sent to your email address",
            "expiresAt": "2025-01-01T00:10:00.000Z",
        })),
    )
}

async fn verify_code(State(api): State<FakeApi>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    // Give concurrent callers a chance to observe the in-flight flag.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    if body["code"] != VALID_CODE {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "kind": "INVALID_CODE",
                "error": "Invalid or expired verification code",
            })),
        );
    }
    let expires_at = api.grant_expires_at;
    (
        StatusCode::OK,
        Json(json!({
            "message": "Verification successful",
            "sensitiveDataAccess": {
                "granted": true,
                "expiresAt": expires_at.to_rfc3339(),
                "sessionDuration": 900_000,
                "token": token_expiring_at("sensitive_data_access", expires_at),
            },
        })),
    )
}

async fn check_token(State(api): State<FakeApi>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !headers.contains_key("x-sensitive-data-token") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "kind": "INVALID_TOKEN" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "userId": TEST_USER_ID,
            "valid": true,
            "expiresAt": api.grant_expires_at.to_rfc3339(),
        })),
    )
}

/// Serve the fake API on an ephemeral port and return its base URL.
pub async fn spawn_fake_api(grant_expires_at: DateTime<Utc>) -> String {
    let state = FakeApi {
        requests: Arc::new(AtomicU32::new(0)),
        grant_expires_at,
    };
    let router = Router::new()
        .route("/verifications/request-code", post(request_code))
        .route("/verifications/verify-code", post(verify_code))
        .route("/verifications/token", get(check_token))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}/")
}

pub fn client_config(base_url: &str) -> ClientConfig {
    ClientConfig::new(base_url).with_default_headers(MockIdentity::new(TEST_USER_ID).headers())
}
