use chrono::Duration;
use uuid::Uuid;

use stepup_verification::domain::types::{
    ActionKind, AuditEvent, VerificationCode, VerificationPolicy, VerificationUser,
};
use stepup_verification::error::VerificationServiceError;
use stepup_verification::usecase::request_code::RequestCodeInput;

use crate::helpers::{
    Harness, MockUserPort, OTHER_USER_ID, TEST_USER_ID, t0, test_context, test_user,
};

#[tokio::test]
async fn should_issue_and_deliver_code_for_known_user() {
    let h = Harness::new();
    let codes_handle = h.codes.codes_handle();

    let output = h
        .request_code_usecase()
        .execute(RequestCodeInput {
            user_id: TEST_USER_ID,
            context: test_context(),
        })
        .await
        .unwrap();

    assert_eq!(output.expires_at, t0() + Duration::seconds(600));

    let codes = codes_handle.lock().unwrap();
    assert_eq!(codes.len(), 1, "expected exactly one code to be persisted");
    let created = &codes[0];
    assert_eq!(created.user_id, TEST_USER_ID);
    assert_eq!(created.code.len(), 6);
    assert!(created.code.chars().all(|c| c.is_ascii_digit()));
    assert!(created.used_at.is_none(), "new code should not be used");
    assert_eq!(created.expires_at, output.expires_at);

    let sent = h.delivery.sent.lock().unwrap();
    assert_eq!(sent.len(), 1, "dispatch must be invoked exactly once");
    assert_eq!(sent[0].code, created.code);
    assert_eq!(sent[0].address, "user@example.com");
    assert_eq!(sent[0].lifetime, Duration::seconds(600));

    assert_eq!(h.rate_limit_count(ActionKind::CodeRequest), 1);
    assert_eq!(h.audit_events(), vec![AuditEvent::CodeRequested]);
}

#[tokio::test]
async fn should_record_client_context_on_audit_entry() {
    let h = Harness::new();
    h.issue(TEST_USER_ID).await.unwrap();

    let entries = h.audit.entries_handle();
    let entries = entries.lock().unwrap();
    let entry = &entries[0];
    assert_eq!(entry.ip_address.as_deref(), Some("203.0.113.9"));
    assert_eq!(entry.user_agent.as_deref(), Some("stepup-tests/1.0"));
    assert_eq!(entry.created_at, t0());
    let data = entry.event_data.as_deref().unwrap();
    assert!(
        !data.contains(&h.last_delivered_code()),
        "audit data must never carry the code value"
    );
}

#[tokio::test]
async fn should_rate_limit_request_after_limit_within_window() {
    let h = Harness::new();

    for _ in 0..3 {
        h.issue(TEST_USER_ID).await.unwrap();
        h.clock.advance_secs(10);
    }

    let result = h.issue(TEST_USER_ID).await;
    assert!(
        matches!(
            result,
            Err(VerificationServiceError::TooManyCodeRequests { retry_after: 900 })
        ),
        "expected TooManyCodeRequests, got {result:?}"
    );
    assert_eq!(h.codes.codes_handle().lock().unwrap().len(), 3);
    assert_eq!(h.delivery.sent.lock().unwrap().len(), 3);
    assert_eq!(
        h.audit_events().last(),
        Some(&AuditEvent::CodeRequestRateLimited)
    );
}

#[tokio::test]
async fn should_allow_requests_again_once_window_has_passed() {
    let h = Harness::new();
    for _ in 0..3 {
        h.issue(TEST_USER_ID).await.unwrap();
    }
    assert!(h.issue(TEST_USER_ID).await.is_err());

    h.clock.advance_secs(901);
    h.issue(TEST_USER_ID).await.unwrap();

    // Rows from the first window were purged by the global cleanup pass.
    assert_eq!(h.rate_limit_count(ActionKind::CodeRequest), 1);
}

#[tokio::test]
async fn should_count_limits_per_user() {
    let mut h = Harness::new();
    h.users = MockUserPort::new(vec![
        test_user(),
        VerificationUser {
            id: OTHER_USER_ID,
            email: "other@example.com".to_owned(),
        },
    ]);

    for _ in 0..3 {
        h.issue(TEST_USER_ID).await.unwrap();
    }
    h.issue(OTHER_USER_ID).await.unwrap();
    assert_eq!(h.delivery.sent.lock().unwrap()[3].address, "other@example.com");
}

#[tokio::test]
async fn should_cap_requests_with_atomic_acquire() {
    let h = Harness::with_policy(VerificationPolicy {
        atomic_rate_limit: true,
        ..VerificationPolicy::default()
    });

    for _ in 0..3 {
        h.issue(TEST_USER_ID).await.unwrap();
    }
    let result = h.issue(TEST_USER_ID).await;

    assert!(matches!(
        result,
        Err(VerificationServiceError::TooManyCodeRequests { .. })
    ));
    // acquire records on success; no separate record call doubles the count.
    assert_eq!(h.rate_limit_count(ActionKind::CodeRequest), 3);
}

#[tokio::test]
async fn should_purge_codes_past_expiry_grace() {
    let h = Harness::new();
    let stale = VerificationCode {
        id: Uuid::new_v4(),
        user_id: TEST_USER_ID,
        code: "111111".to_owned(),
        expires_at: t0() - Duration::seconds(3601),
        used_at: None,
        created_at: t0() - Duration::seconds(4201),
    };
    let recent = VerificationCode {
        id: Uuid::new_v4(),
        code: "222222".to_owned(),
        expires_at: t0() - Duration::seconds(60),
        created_at: t0() - Duration::seconds(660),
        ..stale.clone()
    };
    h.codes
        .codes_handle()
        .lock()
        .unwrap()
        .extend([stale.clone(), recent.clone()]);

    h.issue(TEST_USER_ID).await.unwrap();

    let codes = h.codes.codes_handle();
    let codes = codes.lock().unwrap();
    assert!(codes.iter().all(|c| c.id != stale.id), "stale code purged");
    assert!(codes.iter().any(|c| c.id == recent.id), "recently expired code kept");
}

#[tokio::test]
async fn should_fail_internally_when_user_cannot_be_resolved() {
    let h = Harness {
        users: MockUserPort::empty(),
        ..Harness::new()
    };

    let result = h
        .request_code_usecase()
        .execute(RequestCodeInput {
            user_id: TEST_USER_ID,
            context: test_context(),
        })
        .await;

    assert!(
        matches!(result, Err(VerificationServiceError::Internal(_))),
        "expected Internal, got {result:?}"
    );
    assert!(h.delivery.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_keep_earlier_codes_valid_after_new_request() {
    let h = Harness::new();
    let first = h.issue(TEST_USER_ID).await.unwrap();
    let _second = h.issue(TEST_USER_ID).await.unwrap();

    h.verify(TEST_USER_ID, &first).await.unwrap();
}
