//! Health monitor, boot recovery, retention and reporting scenarios

mod common;

use consultline_core::{CallStatus, PaymentState};
use rust_decimal_macros::dec;
use std::time::Duration;

use call_scheduler::audit::AuditEvent;
use call_scheduler::clock::Clock;
use call_scheduler::monitor::EXPIRED_REASON;
use call_scheduler::recovery::{RecoveryReport, PAYMENT_INVALID_REASON};
use call_scheduler::session::CallSessionService;
use call_scheduler::testing::{session_fixture, ScriptedDialer};
use common::{harness, MINUTE};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::test(start_paused = true)]
async fn test_expiry_waits_for_threshold() {
    let h = harness(ScriptedDialer::succeeding());
    let id = h.seed("call_stale", CallStatus::Pending, Duration::ZERO);
    h.scheduler.schedule(&id, Some(10 * MINUTE)).await.unwrap();

    h.clock.advance(29 * MINUTE);
    let report = h.scheduler.run_health_check().await;
    assert_eq!(report.expired, 0);
    assert!(h.scheduler.registry().contains(&id));
    assert_eq!(h.status(&id), CallStatus::Pending);

    h.clock.advance(2 * MINUTE);
    let report = h.scheduler.run_health_check().await;
    assert_eq!(report.expired, 1);
    assert_eq!(report.restarted, 0);
    assert!(h.scheduler.registry().is_empty());

    let session = h.session(&id).await;
    assert_eq!(session.status, CallStatus::Cancelled);
    assert_eq!(session.metadata.cancel_reason.as_deref(), Some(EXPIRED_REASON));
    assert_eq!(session.metadata.cancelled_by.as_deref(), Some("system"));
    assert_eq!(h.events(&id), vec![AuditEvent::Scheduled, AuditEvent::Expired]);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_session_restarted_once() {
    let h = harness(ScriptedDialer::succeeding());
    let stuck = h.seed("call_stuck", CallStatus::Pending, 16 * MINUTE);
    let fresh = h.seed("call_fresh", CallStatus::Pending, 2 * MINUTE);

    let report = h.scheduler.run_health_check().await;
    assert_eq!(report.pending_sessions, 2);
    assert_eq!(report.restarted, 1);
    assert!(h.scheduler.registry().contains(&stuck));
    assert!(!h.scheduler.registry().contains(&fresh));

    // A timer is already registered, so a second pass leaves it alone
    let report = h.scheduler.run_health_check().await;
    assert_eq!(report.restarted, 0);
    assert_eq!(h.scheduler.registry().len(), 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.dialer.calls(), 1);
    assert_eq!(h.status(&stuck), CallStatus::ProviderConnecting);

    let report = h.scheduler.run_health_check().await;
    assert_eq!(report.restarted, 0);
    assert_eq!(h.dialer.calls(), 1);
    assert!(h.scheduler.stats().last_health_check.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_timer_for_deleted_session_is_dropped() {
    let h = harness(ScriptedDialer::succeeding());
    let id = h.seed("call_gone", CallStatus::Pending, Duration::ZERO);
    h.scheduler.schedule(&id, None).await.unwrap();

    h.clock.advance(40 * DAY);
    let cleanup = h.scheduler.cleanup_old(None).await;
    assert_eq!(cleanup.deleted, 0);

    h.store.update_session_status(&id, CallStatus::Failed).await.unwrap();
    let cleanup = h.scheduler.cleanup_old(None).await;
    assert_eq!(cleanup.deleted, 1);

    let report = h.scheduler.run_health_check().await;
    assert_eq!(report.expired, 0);
    assert!(h.scheduler.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_monitor_ticks_on_interval() {
    let h = harness(ScriptedDialer::succeeding());
    let stuck = h.seed("call_stuck", CallStatus::Pending, 20 * MINUTE);

    h.scheduler.start().await.unwrap();
    assert!(h.scheduler.stats().last_health_check.is_none());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(h.scheduler.stats().last_health_check.is_some());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.status(&stuck), CallStatus::ProviderConnecting);

    h.scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_recovery_handles_each_session_independently() {
    let h = harness(ScriptedDialer::succeeding());
    let resumable = h.seed("call_ok", CallStatus::Pending, 10 * MINUTE);
    let flaky = h.seed("call_flaky", CallStatus::Pending, 10 * MINUTE);
    let refunded = h.seed("call_refunded", CallStatus::ProviderConnecting, 10 * MINUTE);
    let recent = h.seed("call_recent", CallStatus::Pending, MINUTE);
    h.seed("call_done", CallStatus::Completed, 10 * MINUTE);

    h.payments.set_state("pi_call_ok", PaymentState::RequiresCapture);
    h.payments.set_state("pi_call_recent", PaymentState::RequiresCapture);
    h.payments.fail_with("pi_call_flaky", "payment service unreachable");
    h.payments.set_state("pi_call_refunded", PaymentState::Refunded);

    let report = h.scheduler.resume_pending_on_boot().await;

    assert_eq!(
        report,
        RecoveryReport {
            found: 3,
            resumed: 1,
            cancelled: 1,
            skipped: 0,
            failed: 1,
        }
    );
    assert_eq!(h.status(&resumable), CallStatus::ProviderConnecting);
    assert_eq!(h.status(&flaky), CallStatus::Failed);
    assert_eq!(h.status(&recent), CallStatus::Pending);

    let cancelled = h.session(&refunded).await;
    assert_eq!(cancelled.status, CallStatus::Cancelled);
    assert_eq!(cancelled.metadata.cancel_reason.as_deref(), Some(PAYMENT_INVALID_REASON));
    assert_eq!(h.dialer.calls(), 1);
    assert_eq!(h.events(&resumable), vec![AuditEvent::Resumed]);
    assert_eq!(h.events(&refunded), vec![AuditEvent::Cancelled]);
    assert_eq!(h.events(&flaky), vec![AuditEvent::Failed]);
    assert_eq!(h.scheduler.stats().failed_today, 1);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_refreshes_daily_counters() {
    let h = harness(ScriptedDialer::succeeding());
    h.seed("call_done", CallStatus::Completed, 60 * MINUTE);
    h.seed("call_dropped", CallStatus::Failed, 30 * MINUTE);
    h.seed("call_yesterday", CallStatus::Completed, DAY);
    assert_eq!(h.scheduler.stats().completed_today, 0);

    h.scheduler.run_health_check().await;

    let stats = h.scheduler.stats();
    assert_eq!(stats.completed_today, 1);
    assert_eq!(stats.failed_today, 1);
}

#[tokio::test]
async fn test_recovery_with_nothing_to_do() {
    let h = harness(ScriptedDialer::succeeding());
    h.seed("call_new", CallStatus::Pending, MINUTE);

    let report = h.scheduler.resume_pending_on_boot().await;

    assert_eq!(report, RecoveryReport::default());
    assert_eq!(h.dialer.calls(), 0);
}

#[tokio::test]
async fn test_cleanup_uses_requested_window() {
    let h = harness(ScriptedDialer::succeeding());
    h.seed("call_completed_old", CallStatus::Completed, 8 * DAY);
    h.seed("call_completed_new", CallStatus::Completed, 2 * DAY);
    h.seed("call_cancelled", CallStatus::Cancelled, 12 * DAY);
    h.seed("call_pending", CallStatus::Pending, 90 * DAY);

    let report = h.scheduler.cleanup_old(None).await;
    assert_eq!(report.deleted, 1);
    assert_eq!(report.errors, 0);

    let report = h.scheduler.cleanup_old(Some(10)).await;
    assert_eq!(report.deleted, 1);
    assert_eq!(h.store.len(), 2);
}

#[tokio::test]
async fn test_statistics_report() {
    let h = harness(ScriptedDialer::succeeding());
    let now = h.clock.now();

    let mut lawyer = session_fixture("call_lawyer", CallStatus::Completed, now - chrono::Duration::days(1));
    lawyer.duration_seconds = Some(1200);
    let mut expat = session_fixture("call_expat", CallStatus::Completed, now - chrono::Duration::days(2));
    expat.payment.amount = dec!(19);
    expat.duration_seconds = Some(600);
    let old = session_fixture("call_old", CallStatus::Completed, now - chrono::Duration::days(20));
    for session in [lawyer, expat, old] {
        h.store.insert(session);
    }
    h.seed("call_failed", CallStatus::Failed, DAY);

    let report = h.scheduler.get_statistics(Some(7)).await.unwrap();

    assert_eq!(report.period_days, 7);
    assert_eq!(report.calls.total, 3);
    assert_eq!(report.calls.completed, 2);
    assert_eq!(report.calls.failed, 1);
    assert_eq!(report.calls.average_duration_secs, 900.0);
    assert_eq!(report.revenue["EUR"].total, dec!(68));
    assert_eq!(report.revenue["EUR"].count, 2);
    assert_eq!(report.revenue["EUR"].average, dec!(34));
}
