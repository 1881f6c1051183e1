use stepup_verification::domain::types::ActionKind;

use crate::helpers::{Harness, OTHER_USER_ID, TEST_USER_ID};

#[tokio::test]
async fn should_allow_until_limit_then_deny() {
    let h = Harness::new();
    let limiter = h.limiter();

    for _ in 0..5 {
        assert!(limiter.allow(TEST_USER_ID, ActionKind::CodeVerify).await.unwrap());
        limiter.record(TEST_USER_ID, ActionKind::CodeVerify).await.unwrap();
    }
    assert!(!limiter.allow(TEST_USER_ID, ActionKind::CodeVerify).await.unwrap());
}

#[tokio::test]
async fn should_count_kinds_and_users_independently() {
    let h = Harness::new();
    let limiter = h.limiter();

    for _ in 0..3 {
        limiter.record(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap();
    }

    assert!(!limiter.allow(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap());
    assert!(limiter.allow(TEST_USER_ID, ActionKind::CodeVerify).await.unwrap());
    assert!(limiter.allow(OTHER_USER_ID, ActionKind::CodeRequest).await.unwrap());
}

#[tokio::test]
async fn should_slide_window_per_record() {
    let h = Harness::new();
    let limiter = h.limiter();

    limiter.record(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap();
    h.clock.advance_secs(600);
    limiter.record(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap();
    limiter.record(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap();
    assert!(!limiter.allow(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap());

    // First record leaves the trailing window; the other two are still inside.
    h.clock.advance_secs(301);
    assert!(limiter.allow(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap());
    assert_eq!(h.rate_limit_count(ActionKind::CodeRequest), 2);
}

#[tokio::test]
async fn should_purge_every_kind_on_allow() {
    let h = Harness::new();
    let limiter = h.limiter();

    limiter.record(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap();
    limiter.record(OTHER_USER_ID, ActionKind::CodeVerify).await.unwrap();
    h.clock.advance_secs(901);

    limiter.allow(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap();

    assert!(h.rate_limits.records_handle().lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_acquire_atomically_up_to_limit() {
    let h = Harness::new();
    let limiter = h.limiter();

    for _ in 0..3 {
        assert!(limiter.try_acquire(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap());
    }
    assert!(!limiter.try_acquire(TEST_USER_ID, ActionKind::CodeRequest).await.unwrap());
    assert_eq!(h.rate_limit_count(ActionKind::CodeRequest), 3);
}

#[tokio::test]
async fn should_report_purged_rows_from_cleanup() {
    use stepup_verification::usecase::cleanup::{CleanupReport, CleanupUseCase};

    let h = Harness::new();
    h.issue(TEST_USER_ID).await.unwrap();
    h.clock.advance_secs(600 + 3600 + 1);

    let cleanup = CleanupUseCase {
        codes: h.codes.clone(),
        limiter: h.limiter(),
        code_purge_grace: h.policy.code_purge_grace,
        clock: h.clock.shared(),
    };

    assert_eq!(
        cleanup.execute().await.unwrap(),
        CleanupReport {
            codes: 1,
            rate_limits: 1,
        }
    );
    assert!(h.codes.codes_handle().lock().unwrap().is_empty());
}
