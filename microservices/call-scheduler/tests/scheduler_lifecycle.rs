//! Scheduling, retry and shutdown scenarios against the in-memory session store

mod common;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use consultline_core::{CallStatus, SessionId};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use call_scheduler::audit::AuditEvent;
use call_scheduler::clock::Clock;
use call_scheduler::sequencer::{ExecutionOutcome, ScheduleOutcome};
use call_scheduler::session::CallSessionService;
use call_scheduler::testing::{booking_fixture, FlakySessionService, ScriptedDialer};
use call_scheduler::SchedulerError;
use common::{harness, harness_with, MINUTE};

#[tokio::test(start_paused = true)]
async fn test_rescheduling_keeps_a_single_timer() {
    let h = harness(ScriptedDialer::succeeding());
    let id = h.seed("call_a", CallStatus::Pending, Duration::ZERO);

    h.scheduler.schedule(&id, Some(5 * MINUTE)).await.unwrap();
    h.scheduler.schedule(&id, Some(2 * MINUTE)).await.unwrap();
    assert_eq!(h.scheduler.registry().len(), 1);

    tokio::time::sleep(6 * MINUTE).await;

    assert_eq!(h.dialer.calls(), 1);
    assert_eq!(h.status(&id), CallStatus::ProviderConnecting);
    assert!(h.scheduler.registry().is_empty());
    assert_eq!(h.scheduler.stats().total_scheduled, 2);
}

#[tokio::test(start_paused = true)]
async fn test_requested_delay_is_clamped_to_max() {
    let h = harness(ScriptedDialer::succeeding());
    let id = h.seed("call_a", CallStatus::Pending, Duration::ZERO);

    let outcome = h.scheduler.schedule(&id, Some(60 * MINUTE)).await.unwrap();
    assert_eq!(outcome, ScheduleOutcome::Scheduled { delay: 10 * MINUTE });

    tokio::time::sleep(9 * MINUTE).await;
    assert_eq!(h.dialer.calls(), 0);

    tokio::time::sleep(2 * MINUTE).await;
    assert_eq!(h.dialer.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_progressed_session_is_not_scheduled() {
    let h = harness(ScriptedDialer::succeeding());
    let id = h.seed("call_done", CallStatus::Completed, Duration::ZERO);

    let outcome = h.scheduler.schedule(&id, None).await.unwrap();

    assert_eq!(outcome, ScheduleOutcome::Skipped { status: CallStatus::Completed });
    assert!(h.scheduler.registry().is_empty());
    assert!(h.events(&id).is_empty());

    assert_eq!(h.scheduler.execute(&id).await, ExecutionOutcome::NotPending);
    assert_eq!(h.dialer.calls(), 0);
    let stats = h.scheduler.stats();
    assert_eq!(stats.total_scheduled, 0);
    assert_eq!(stats.dial_attempts, 0);
    assert_eq!(stats.failed_today, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_session_is_reported() {
    let h = harness(ScriptedDialer::succeeding());
    let id = SessionId::from("call_ghost");

    let result = h.scheduler.schedule(&id, None).await;

    assert!(matches!(result, Err(SchedulerError::SessionNotFound(_))));
    assert_eq!(h.events(&id), vec![AuditEvent::ScheduleFailed]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_lookup_marks_session_failed() {
    let h = harness_with(ScriptedDialer::succeeding(), |store| {
        let flaky = FlakySessionService::new(store);
        flaky.fail_lookups_for("call_flaky");
        Arc::new(flaky) as Arc<dyn CallSessionService>
    });
    let id = h.seed("call_flaky", CallStatus::Pending, Duration::ZERO);

    let result = h.scheduler.schedule(&id, None).await;

    assert!(matches!(result, Err(SchedulerError::Dependency(_))));
    assert_eq!(h.status(&id), CallStatus::Failed);
    assert_eq!(h.events(&id), vec![AuditEvent::ScheduleFailed]);
    assert!(h.scheduler.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded_with_linear_backoff() {
    let h = harness(ScriptedDialer::always_failing());
    let id = h.seed("call_busy", CallStatus::Pending, Duration::ZERO);

    let started = Instant::now();
    let dial_counts = async {
        let mut seen = Vec::new();
        for at in [4, 6, 14, 16] {
            tokio::time::sleep_until(started + Duration::from_secs(at)).await;
            seen.push((at, h.dialer.calls()));
        }
        seen
    };
    let (outcome, seen) = tokio::join!(h.scheduler.execute(&id), dial_counts);

    assert_eq!(outcome, ExecutionOutcome::Exhausted { attempts: 3 });
    // first dial at once, then 5s after the first failure and 10s after the second
    assert_eq!(seen, vec![(4, 1), (6, 2), (14, 2), (16, 3)]);
    assert_eq!(h.dialer.calls(), 3);
    assert_eq!(h.status(&id), CallStatus::Failed);
    assert_eq!(h.session(&id).await.metadata.dial_attempts, 3);

    let stats = h.scheduler.stats();
    assert_eq!(stats.failed_today, 1);
    assert_eq!(stats.dial_attempts, 3);
    assert_eq!(h.events(&id), vec![AuditEvent::Failed]);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover_within_budget() {
    let h = harness(ScriptedDialer::failing_times(2));
    let id = h.seed("call_retry", CallStatus::Pending, Duration::ZERO);

    h.scheduler.schedule(&id, Some(Duration::ZERO)).await.unwrap();
    tokio::time::sleep(MINUTE).await;

    assert_eq!(h.dialer.calls(), 3);
    assert_eq!(h.status(&id), CallStatus::ProviderConnecting);
    assert!(h.scheduler.registry().is_empty());
    assert_eq!(h.scheduler.stats().failed_today, 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_stop_when_session_progresses() {
    let h = harness(ScriptedDialer::always_failing());
    let id = h.seed("call_race", CallStatus::Pending, Duration::ZERO);

    let scheduler_run = h.scheduler.execute(&id);
    let external_update = async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        h.store
            .update_session_status(&id, CallStatus::ClientConnecting)
            .await
            .unwrap();
    };
    let (outcome, ()) = tokio::join!(scheduler_run, external_update);

    assert_eq!(outcome, ExecutionOutcome::NotPending);
    assert_eq!(h.dialer.calls(), 1);
    assert_eq!(h.status(&id), CallStatus::ClientConnecting);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_clears_timer() {
    let h = harness(ScriptedDialer::succeeding());
    let id = h.seed("call_cancel", CallStatus::Pending, Duration::ZERO);

    h.scheduler.schedule(&id, None).await.unwrap();
    h.scheduler.cancel(&id, "client_request").await.unwrap();
    tokio::time::sleep(10 * MINUTE).await;

    let session = h.session(&id).await;
    assert_eq!(session.status, CallStatus::Cancelled);
    assert_eq!(session.metadata.cancel_reason.as_deref(), Some("client_request"));
    assert_eq!(session.metadata.cancelled_by.as_deref(), Some("client"));
    assert_eq!(h.dialer.calls(), 0);
    assert_eq!(h.events(&id), vec![AuditEvent::Scheduled, AuditEvent::Cancelled]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_of_finished_session_is_a_conflict() {
    let h = harness(ScriptedDialer::succeeding());
    let id = h.seed("call_done", CallStatus::Completed, MINUTE);

    let err = h.scheduler.cancel(&id, "client_request").await.unwrap_err();

    assert!(matches!(&err, SchedulerError::Conflict(msg) if msg.contains("call_done")));
    assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    assert_eq!(h.status(&id), CallStatus::Completed);
    assert!(h.events(&id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_booking_below_minimum_creates_nothing() {
    let h = harness(ScriptedDialer::succeeding());

    let result = h.scheduler.create_and_schedule(booking_fixture(dec!(3))).await;

    assert!(matches!(result, Err(SchedulerError::Validation(msg)) if msg.contains("below")));
    assert!(h.store.is_empty());
    assert!(h.scheduler.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_booking_is_dialed_after_default_delay() {
    let h = harness(ScriptedDialer::succeeding());

    let session = h.scheduler.create_and_schedule(booking_fixture(dec!(49))).await.unwrap();
    assert_eq!(session.status, CallStatus::Pending);
    assert_eq!(session.created_at(), h.clock.now());

    tokio::time::sleep(4 * MINUTE).await;
    assert_eq!(h.dialer.calls(), 0);
    assert_eq!(h.scheduler.registry().len(), 1);

    tokio::time::sleep(2 * MINUTE).await;
    assert_eq!(h.dialer.calls(), 1);
    assert_eq!(h.status(&session.id), CallStatus::ProviderConnecting);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_everything() {
    let h = harness(ScriptedDialer::succeeding());
    let first = h.seed("call_1", CallStatus::Pending, Duration::ZERO);
    let second = h.seed("call_2", CallStatus::Pending, Duration::ZERO);

    h.scheduler.start().await.unwrap();
    assert!(h.scheduler.is_monitor_running());
    h.scheduler.schedule(&first, None).await.unwrap();
    h.scheduler.schedule(&second, Some(MINUTE)).await.unwrap();

    h.scheduler.shutdown().await;
    h.scheduler.shutdown().await;

    assert!(!h.scheduler.is_monitor_running());
    assert!(h.scheduler.registry().is_empty());
    assert_eq!(h.scheduler.stats().queue_length, 0);

    tokio::time::sleep(30 * MINUTE).await;
    assert_eq!(h.dialer.calls(), 0);
    assert_eq!(h.status(&first), CallStatus::Pending);

    let after = h.scheduler.schedule(&first, None).await;
    assert!(matches!(after, Err(SchedulerError::ShuttingDown)));
}
