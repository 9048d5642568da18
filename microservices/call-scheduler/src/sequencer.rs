//! Call sequencer: delayed scheduling and bounded-retry execution of dials

use consultline_core::{CallStatus, SessionId};
use dashmap::DashSet;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::audit::AuditEvent;
use crate::context::SchedulerContext;
use crate::error::{Result, SchedulerError};
use crate::session::CallSession;

/// Actor recorded on cancellations issued by the scheduler itself
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { delay: Duration },
    /// Session already progressed past `pending`
    Skipped { status: CallStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The dial sequence was started; the session service owns what follows
    Dialed { attempts: u32 },
    NotPending,
    /// Another execution of the same session is in progress in this process
    AlreadyRunning,
    Exhausted { attempts: u32 },
}

/// Removes the session from the in-flight set when dropped
struct InFlightGuard {
    in_flight: Arc<DashSet<SessionId>>,
    session_id: SessionId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.session_id);
    }
}

#[derive(Clone)]
pub struct CallSequencer {
    ctx: Arc<SchedulerContext>,
    in_flight: Arc<DashSet<SessionId>>,
}

impl CallSequencer {
    pub fn new(ctx: Arc<SchedulerContext>) -> Self {
        Self {
            ctx,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Schedule the session's first dial after `delay` (default and clamp from config).
    ///
    /// Replaces any timer already registered for the session. A session that
    /// is no longer `pending` is left alone.
    pub async fn schedule(&self, session_id: &SessionId, delay: Option<Duration>) -> Result<ScheduleOutcome> {
        if session_id.as_str().trim().is_empty() {
            return Err(SchedulerError::Validation("session id is required".to_string()));
        }
        if self.ctx.is_shutting_down() {
            return Err(SchedulerError::ShuttingDown);
        }
        let delay = self.ctx.config.clamp_delay(delay);

        let session = match self.ctx.sessions.get_session(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.record_schedule_failure(session_id, "session not found", false).await;
                return Err(SchedulerError::SessionNotFound(session_id.to_string()));
            }
            Err(e) => {
                self.record_schedule_failure(session_id, &e.to_string(), true).await;
                return Err(e.into());
            }
        };

        if !session.is_pending() {
            debug!(session_id = %session_id, status = %session.status, "Session already progressed, not scheduling");
            return Ok(ScheduleOutcome::Skipped { status: session.status });
        }

        self.ctx
            .audit(
                session_id,
                AuditEvent::Scheduled,
                json!({ "delaySeconds": delay.as_secs(), "serviceType": session.service_type }),
            )
            .await;

        let sequencer = self.clone();
        let fire_id = session_id.clone();
        self.ctx.registry.schedule(session_id.clone(), delay, async move {
            sequencer.execute(&fire_id).await;
        });

        self.ctx.stats.total_scheduled.inc();
        self.ctx.sync_queue_length();

        info!(
            session_id = %session_id,
            delay_secs = delay.as_secs(),
            queue_length = self.ctx.registry.len(),
            "Call scheduled"
        );

        Ok(ScheduleOutcome::Scheduled { delay })
    }

    /// Drive the dial with bounded linear-backoff retries
    pub async fn execute(&self, session_id: &SessionId) -> ExecutionOutcome {
        self.ctx.sync_queue_length();

        let Some(_guard) = self.claim(session_id) else {
            debug!(session_id = %session_id, "Execution already in flight");
            return ExecutionOutcome::AlreadyRunning;
        };

        let max_attempts = self.ctx.config.retry_attempts.max(1);
        let mut attempt = 0u32;

        while attempt < max_attempts {
            attempt += 1;

            let result = match self.pending_session(session_id).await {
                Ok(Some(session)) => self.dial(&session, attempt).await,
                Ok(None) => return ExecutionOutcome::NotPending,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    info!(session_id = %session_id, attempt, "Dial sequence initiated");
                    return ExecutionOutcome::Dialed { attempts: attempt };
                }
                Err(e) => {
                    warn!(
                        session_id = %session_id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Dial attempt failed"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.ctx.config.backoff_after(attempt)).await;
                    }
                }
            }
        }

        self.mark_exhausted(session_id, attempt).await;
        ExecutionOutcome::Exhausted { attempts: attempt }
    }

    /// Dial a recovered session immediately, without delay or retries.
    ///
    /// Returns `Ok(false)` when another execution already holds the session.
    pub async fn resume(&self, session: &CallSession) -> consultline_core::Result<bool> {
        let Some(_guard) = self.claim(&session.id) else {
            return Ok(false);
        };

        self.dial(session, 1).await?;
        self.ctx
            .audit(&session.id, AuditEvent::Resumed, json!({ "previousStatus": session.status }))
            .await;
        Ok(true)
    }

    /// Clear the session's timer and cancel it upstream
    pub async fn cancel(&self, session_id: &SessionId, reason: &str, actor: &str) -> Result<()> {
        if session_id.as_str().trim().is_empty() {
            return Err(SchedulerError::Validation("session id is required".to_string()));
        }
        let had_timer = self.ctx.registry.cancel(session_id);
        self.ctx.sync_queue_length();

        self.ctx.sessions.cancel_session(session_id, reason, actor).await?;
        self.ctx
            .audit(session_id, AuditEvent::Cancelled, json!({ "reason": reason, "actor": actor }))
            .await;

        info!(session_id = %session_id, reason, actor, had_timer, "Call cancelled");
        Ok(())
    }

    pub fn is_in_flight(&self, session_id: &SessionId) -> bool {
        self.in_flight.contains(session_id)
    }

    fn claim(&self, session_id: &SessionId) -> Option<InFlightGuard> {
        if !self.in_flight.insert(session_id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: self.in_flight.clone(),
            session_id: session_id.clone(),
        })
    }

    /// The session if it is still `pending`, `None` if it moved on or vanished
    async fn pending_session(&self, session_id: &SessionId) -> consultline_core::Result<Option<CallSession>> {
        match self.ctx.sessions.get_session(session_id).await? {
            Some(session) if session.is_pending() => Ok(Some(session)),
            Some(session) => {
                debug!(session_id = %session_id, status = %session.status, "Session no longer pending, stopping");
                Ok(None)
            }
            None => {
                warn!(session_id = %session_id, "Session disappeared before dialing");
                Ok(None)
            }
        }
    }

    async fn dial(&self, session: &CallSession, attempt: u32) -> consultline_core::Result<()> {
        self.ctx.stats.dial_attempts.inc();
        self.ctx.sessions.initiate_dial_sequence(&session.id, attempt).await?;

        let waited = self.ctx.now().signed_duration_since(session.created_at());
        self.ctx.stats.record_wait(waited.num_milliseconds() as f64 / 1000.0);
        Ok(())
    }

    async fn mark_exhausted(&self, session_id: &SessionId, attempts: u32) {
        match self
            .ctx
            .sessions
            .update_status_if(session_id, CallStatus::Pending, CallStatus::Failed)
            .await
        {
            Ok(true) => {
                self.ctx.stats.failed_today.inc();
                error!(session_id = %session_id, attempts, "Call failed after all dial attempts");
            }
            Ok(false) => {
                info!(session_id = %session_id, attempts, "Session progressed during retries, status left as is");
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to mark session as failed");
            }
        }

        self.ctx
            .audit(session_id, AuditEvent::Failed, json!({ "attempts": attempts }))
            .await;
    }

    /// Best-effort bookkeeping after a scheduling failure; never fails
    async fn record_schedule_failure(&self, session_id: &SessionId, reason: &str, resolvable: bool) {
        error!(session_id = %session_id, reason, "Failed to schedule call");

        if resolvable {
            match self
                .ctx
                .sessions
                .update_status_if(session_id, CallStatus::Pending, CallStatus::Failed)
                .await
            {
                Ok(true) => self.ctx.stats.failed_today.inc(),
                Ok(false) => {}
                Err(e) => warn!(session_id = %session_id, error = %e, "Could not mark session as failed"),
            }
        }

        self.ctx
            .audit(session_id, AuditEvent::ScheduleFailed, json!({ "reason": reason }))
            .await;
    }
}
