//! Shared harness for scheduler integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use consultline_core::{CallStatus, SessionId};
use std::sync::Arc;
use std::time::Duration;

use call_scheduler::audit::{AuditEvent, MemoryAuditLog};
use call_scheduler::clock::{before, Clock, ManualClock};
use call_scheduler::payment::StaticPaymentValidator;
use call_scheduler::session::{CallSession, CallSessionService};
use call_scheduler::store::MemorySessionStore;
use call_scheduler::testing::{session_fixture, ScriptedDialer};
use call_scheduler::{CallScheduler, SchedulerConfig, SchedulerDeps};

pub const MINUTE: Duration = Duration::from_secs(60);

pub struct Harness {
    pub scheduler: CallScheduler,
    pub store: Arc<MemorySessionStore>,
    pub dialer: Arc<ScriptedDialer>,
    pub payments: Arc<StaticPaymentValidator>,
    pub audit: Arc<MemoryAuditLog>,
    pub clock: Arc<ManualClock>,
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
}

pub fn harness(dialer: ScriptedDialer) -> Harness {
    harness_with(dialer, |store| store as Arc<dyn CallSessionService>)
}

/// Build a harness whose scheduler sees the store through `wrap`
pub fn harness_with(
    dialer: ScriptedDialer,
    wrap: impl FnOnce(Arc<MemorySessionStore>) -> Arc<dyn CallSessionService>,
) -> Harness {
    let clock = Arc::new(ManualClock::new(epoch()));
    let dialer = Arc::new(dialer);
    let store = Arc::new(MemorySessionStore::new(dialer.clone(), clock.clone()));
    let payments = Arc::new(StaticPaymentValidator::new());
    let audit = Arc::new(MemoryAuditLog::new());

    let deps = SchedulerDeps {
        sessions: wrap(store.clone()),
        payments: payments.clone(),
        audit: audit.clone(),
        clock: clock.clone(),
    };

    Harness {
        scheduler: CallScheduler::new(deps, SchedulerConfig::default()),
        store,
        dialer,
        payments,
        audit,
        clock,
    }
}

impl Harness {
    /// Insert a session created `age` before the current clock
    pub fn seed(&self, id: &str, status: CallStatus, age: Duration) -> SessionId {
        let created_at = before(self.clock.now(), age);
        self.store.insert(session_fixture(id, status, created_at));
        SessionId::from(id)
    }

    pub async fn session(&self, id: &SessionId) -> CallSession {
        self.store.get_session(id).await.unwrap().unwrap()
    }

    pub fn status(&self, id: &SessionId) -> CallStatus {
        self.store.status_of(id).unwrap()
    }

    pub fn events(&self, id: &SessionId) -> Vec<AuditEvent> {
        self.audit.events_for(id)
    }
}
