//! Dependencies and shared state handed to every scheduler component

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use consultline_core::SessionId;

use crate::audit::{AuditEntry, AuditEvent, AuditLog};
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::payment::PaymentValidator;
use crate::session::CallSessionService;
use crate::stats::StatsAggregator;
use crate::timers::TimerRegistry;

/// External collaborators injected at construction
#[derive(Clone)]
pub struct SchedulerDeps {
    pub sessions: Arc<dyn CallSessionService>,
    pub payments: Arc<dyn PaymentValidator>,
    pub audit: Arc<dyn AuditLog>,
    pub clock: Arc<dyn Clock>,
}

pub struct SchedulerContext {
    pub sessions: Arc<dyn CallSessionService>,
    pub payments: Arc<dyn PaymentValidator>,
    pub audit: Arc<dyn AuditLog>,
    pub clock: Arc<dyn Clock>,
    pub config: SchedulerConfig,
    pub registry: TimerRegistry,
    pub stats: StatsAggregator,
    shutting_down: AtomicBool,
}

impl SchedulerContext {
    pub fn new(deps: SchedulerDeps, config: SchedulerConfig) -> Self {
        Self {
            sessions: deps.sessions,
            payments: deps.payments,
            audit: deps.audit,
            clock: deps.clock,
            config,
            registry: TimerRegistry::new(),
            stats: StatsAggregator::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Returns true only for the first caller
    pub fn begin_shutdown(&self) -> bool {
        !self.shutting_down.swap(true, Ordering::SeqCst)
    }

    pub fn sync_queue_length(&self) {
        self.stats.queue_length.set(self.registry.len() as u64);
    }

    /// Write an audit entry; failures are logged and swallowed
    pub async fn audit(&self, session_id: &SessionId, event: AuditEvent, details: Value) {
        let entry = AuditEntry::new(session_id, event, self.now(), details);
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(
                session_id = %session_id,
                event = ?event,
                error = %e,
                "Failed to write audit entry"
            );
        }
    }
}
