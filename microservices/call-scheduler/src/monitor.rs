//! Health monitor: periodic reconciliation of timers against stored sessions

use consultline_core::{CallStatus, SessionId};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audit::AuditEvent;
use crate::clock::is_older_than;
use crate::context::SchedulerContext;
use crate::sequencer::{CallSequencer, ScheduleOutcome, SYSTEM_ACTOR};
use crate::session::SessionQuery;

pub const EXPIRED_REASON: &str = "expired";

/// Outcome of a single health check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub pending_sessions: usize,
    pub expired: usize,
    pub restarted: usize,
    pub errors: usize,
}

struct MonitorTask {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct HealthMonitor {
    ctx: Arc<SchedulerContext>,
    sequencer: CallSequencer,
    task: Mutex<Option<MonitorTask>>,
}

impl HealthMonitor {
    pub fn new(ctx: Arc<SchedulerContext>, sequencer: CallSequencer) -> Self {
        Self {
            ctx,
            sequencer,
            task: Mutex::new(None),
        }
    }

    /// Spawn the fixed-interval loop; a second call while running is a no-op
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let monitor = Arc::clone(self);
        let period = self.ctx.config.health_check_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.tick().await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Health monitor loop exited");
        });

        info!(interval_secs = period.as_secs(), "Health monitor started");
        *task = Some(MonitorTask { stop_tx, handle });
    }

    /// Stop the loop; idempotent
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            let _ = task.stop_tx.send(true);
            task.handle.abort();
            info!("Health monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Run one reconciliation pass. Step failures are logged and counted, never raised.
    pub async fn tick(&self) -> HealthReport {
        let mut report = HealthReport::default();
        let now = self.ctx.now();

        if let Err(e) = self.ctx.stats.load_today(self.ctx.sessions.as_ref(), now).await {
            report.errors += 1;
            warn!(error = %e, "Failed to refresh daily counters");
        }

        let query = SessionQuery::with_statuses(&CallStatus::ACTIVE)
            .newest_first()
            .limit(self.ctx.config.max_pending_sessions);
        let active = match self.ctx.sessions.find_sessions(query).await {
            Ok(sessions) => sessions,
            Err(e) => {
                report.errors += 1;
                error!(error = %e, "Health check could not fetch active sessions");
                Vec::new()
            }
        };

        report.pending_sessions = active.len();
        self.ctx.stats.currently_pending.set(active.len() as u64);
        self.ctx.sync_queue_length();

        let expired = self.expire_stale_timers(&mut report).await;

        for session in active.iter().filter(|s| s.is_pending()) {
            if expired.contains(&session.id)
                || self.ctx.registry.contains(&session.id)
                || self.sequencer.is_in_flight(&session.id)
                || !is_older_than(session.created_at(), now, self.ctx.config.stuck_threshold)
            {
                continue;
            }

            warn!(session_id = %session.id, created_at = %session.created_at(), "Restarting stuck session");
            match self.sequencer.schedule(&session.id, Some(Duration::ZERO)).await {
                Ok(ScheduleOutcome::Scheduled { .. }) => report.restarted += 1,
                Ok(ScheduleOutcome::Skipped { .. }) => {}
                Err(e) => {
                    report.errors += 1;
                    error!(session_id = %session.id, error = %e, "Failed to restart stuck session");
                }
            }
        }

        self.ctx.sync_queue_length();
        self.ctx.stats.mark_health_check(now);

        if report.expired > 0 || report.restarted > 0 || report.errors > 0 {
            info!(
                pending = report.pending_sessions,
                expired = report.expired,
                restarted = report.restarted,
                errors = report.errors,
                "Health check completed"
            );
        } else {
            debug!(pending = report.pending_sessions, "Health check completed");
        }

        report
    }

    /// Drop timers whose session vanished or outlived the expiry threshold
    async fn expire_stale_timers(&self, report: &mut HealthReport) -> HashSet<SessionId> {
        let now = self.ctx.now();
        let mut expired = HashSet::new();

        for session_id in self.ctx.registry.session_ids() {
            let session = match self.ctx.sessions.get_session(&session_id).await {
                Ok(session) => session,
                Err(e) => {
                    report.errors += 1;
                    warn!(session_id = %session_id, error = %e, "Could not resolve scheduled session");
                    continue;
                }
            };

            let Some(session) = session else {
                self.ctx.registry.cancel(&session_id);
                expired.insert(session_id.clone());
                info!(session_id = %session_id, "Removed timer for missing session");
                continue;
            };

            if !is_older_than(session.created_at(), now, self.ctx.config.expiry_threshold) {
                continue;
            }

            self.ctx.registry.cancel(&session_id);
            expired.insert(session_id.clone());
            report.expired += 1;

            if session.is_pending() {
                match self
                    .ctx
                    .sessions
                    .cancel_session(&session_id, EXPIRED_REASON, SYSTEM_ACTOR)
                    .await
                {
                    Ok(()) => {
                        self.ctx
                            .audit(
                                &session_id,
                                AuditEvent::Expired,
                                json!({ "createdAt": session.created_at() }),
                            )
                            .await;
                        warn!(session_id = %session_id, "Expired pending session cancelled");
                    }
                    Err(e) => {
                        report.errors += 1;
                        error!(session_id = %session_id, error = %e, "Failed to cancel expired session");
                    }
                }
            }
        }

        expired
    }
}
