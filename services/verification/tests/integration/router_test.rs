use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
use tower::ServiceExt;

use stepup_core::middleware::X_REQUEST_ID;
use stepup_testing::auth::MockIdentity;
use stepup_testing::clock::MockClock;
use stepup_verification::domain::types::VerificationPolicy;
use stepup_verification::infra::delivery::DeliveryMode;
use stepup_verification::router::build_router;
use stepup_verification::state::AppState;

use crate::helpers::{OTHER_USER_ID, TEST_JWT_SECRET, TEST_USER_ID};

/// Mock connection with nothing queued: every statement fails, and each one is
/// still recorded in the transaction log.
fn failing_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

/// State whose storage always errors. Only routes that never need a row succeed.
fn offline_state(clock: &MockClock) -> AppState {
    state_with_db(clock, failing_db())
}

fn state_with_db(clock: &MockClock, db: DatabaseConnection) -> AppState {
    AppState {
        db,
        jwt_secret: TEST_JWT_SECRET.to_owned(),
        policy: VerificationPolicy::default(),
        delivery_mode: DeliveryMode::Log,
        clock: clock.shared(),
    }
}

async fn send(state: AppState, request: Request<Body>) -> Response {
    build_router(state).oneshot(request).await.unwrap()
}

fn request(method: Method, uri: &str, identity: Option<&MockIdentity>, body: Body) -> Request<Body> {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    if let Some(identity) = identity {
        req.headers_mut().extend(identity.headers());
    }
    req
}

async fn json_body(resp: Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn should_answer_liveness_with_request_id() {
    let clock = MockClock::epoch();
    let resp = send(
        offline_state(&clock),
        request(Method::GET, "/healthz", None, Body::empty()),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(X_REQUEST_ID));
    assert_eq!(json_body(resp).await["status"], "ok");
}

#[tokio::test]
async fn should_report_not_ready_without_database() {
    let clock = MockClock::epoch();
    let resp = send(
        state_with_db(&clock, DatabaseConnection::Disconnected),
        request(Method::GET, "/readyz", None, Body::empty()),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(resp).await["status"], "unavailable");
}

#[tokio::test]
async fn should_confirm_valid_token_for_its_owner() {
    let clock = MockClock::epoch();
    let state = offline_state(&clock);
    let minted = state.token_service().mint(TEST_USER_ID).unwrap();
    let identity = MockIdentity::new(TEST_USER_ID).with_sensitive_token(minted.token);

    let resp = send(
        state,
        request(Method::GET, "/verifications/token", Some(&identity), Body::empty()),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["userId"], 1);
    assert_eq!(json["valid"], true);
    assert_eq!(json["expiresAt"], "2025-01-01T00:15:00.000Z");
}

#[tokio::test]
async fn should_reject_token_presented_by_another_user() {
    let clock = MockClock::epoch();
    let state = offline_state(&clock);
    let minted = state.token_service().mint(TEST_USER_ID).unwrap();
    let identity = MockIdentity::new(OTHER_USER_ID).with_sensitive_token(minted.token);

    let resp = send(
        state,
        request(Method::GET, "/verifications/token", Some(&identity), Body::empty()),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["kind"], "INVALID_TOKEN");
}

#[tokio::test]
async fn should_reject_expired_or_missing_token() {
    let clock = MockClock::epoch();
    let state = offline_state(&clock);
    let minted = state.token_service().mint(TEST_USER_ID).unwrap();
    clock.advance_secs(900);

    let expired = MockIdentity::new(TEST_USER_ID).with_sensitive_token(minted.token);
    let resp = send(
        state.clone(),
        request(Method::GET, "/verifications/token", Some(&expired), Body::empty()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let bare = MockIdentity::new(TEST_USER_ID);
    let resp = send(
        state,
        request(Method::GET, "/verifications/token", Some(&bare), Body::empty()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_require_gateway_identity_for_code_requests() {
    let clock = MockClock::epoch();
    let resp = send(
        offline_state(&clock),
        request(Method::POST, "/verifications/request-code", None, Body::empty()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

/// SQL of every statement the handler sent.
fn executed_sql(db: DatabaseConnection) -> Vec<String> {
    db.into_transaction_log()
        .iter()
        .flat_map(|txn| txn.statements().iter().map(|stmt| stmt.sql.clone()))
        .collect()
}

async fn submit_malformed(body: &'static str) -> (StatusCode, serde_json::Value, Vec<String>) {
    let clock = MockClock::epoch();
    let identity = MockIdentity::new(TEST_USER_ID);
    let db = failing_db();

    let resp = send(
        state_with_db(&clock, db.clone()),
        request(
            Method::POST,
            "/verifications/verify-code",
            Some(&identity),
            Body::from(body),
        ),
    )
    .await;

    let status = resp.status();
    (status, json_body(resp).await, executed_sql(db))
}

fn assert_format_rejected(status: StatusCode, json: &serde_json::Value, sql: &[String]) {
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "INVALID_CODE_FORMAT");
    assert_eq!(json["error"], "Invalid verification code format");
    // Only the audit insert, which fails and is swallowed. No code or rate-limit access.
    assert_eq!(sql.len(), 1, "unexpected statements: {sql:?}");
    assert!(sql[0].contains(r#"INSERT INTO "audit_logs""#), "{}", sql[0]);
}

#[tokio::test]
async fn should_reject_malformed_code_without_storage() {
    let (status, json, sql) = submit_malformed(r#"{"code":"12"}"#).await;
    assert_format_rejected(status, &json, &sql);
}

#[tokio::test]
async fn should_treat_non_string_code_as_malformed() {
    let (status, json, sql) = submit_malformed(r#"{"code":123456}"#).await;
    assert_format_rejected(status, &json, &sql);
}

#[tokio::test]
async fn should_treat_unparsable_body_as_malformed() {
    let (status, json, sql) = submit_malformed("not json").await;
    assert_format_rejected(status, &json, &sql);
}

#[tokio::test]
async fn should_surface_storage_failure_as_internal_error() {
    let clock = MockClock::epoch();
    let identity = MockIdentity::new(TEST_USER_ID);

    let resp = send(
        offline_state(&clock),
        request(
            Method::POST,
            "/verifications/verify-code",
            Some(&identity),
            Body::from(r#"{"code":"123456"}"#),
        ),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await["error"], "Internal server error");
}
