//! Recovery sweep: resume sessions left pending across a restart

use consultline_core::{CallStatus, SessionId};
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audit::AuditEvent;
use crate::clock::before;
use crate::context::SchedulerContext;
use crate::sequencer::{CallSequencer, SYSTEM_ACTOR};
use crate::session::{CallSession, SessionQuery};

pub const PAYMENT_INVALID_REASON: &str = "payment_invalid";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub found: usize,
    pub resumed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryOutcome {
    Resumed,
    Cancelled,
    Skipped,
    Failed,
}

pub struct RecoverySweep {
    ctx: Arc<SchedulerContext>,
    sequencer: CallSequencer,
}

impl RecoverySweep {
    pub fn new(ctx: Arc<SchedulerContext>, sequencer: CallSequencer) -> Self {
        Self { ctx, sequencer }
    }

    /// Find interrupted sessions and resume or cancel each one independently.
    /// Never fails; every error is logged and counted.
    pub async fn run(&self) -> RecoveryReport {
        let cutoff = before(self.ctx.now(), self.ctx.config.recovery_grace);
        let query = SessionQuery::with_statuses(&CallStatus::ACTIVE)
            .created_before(cutoff)
            .limit(self.ctx.config.recovery_batch_size);

        let sessions = match self.ctx.sessions.find_sessions(query).await {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(error = %e, "Recovery sweep could not query interrupted sessions");
                return RecoveryReport {
                    failed: 1,
                    ..RecoveryReport::default()
                };
            }
        };

        let mut report = RecoveryReport {
            found: sessions.len(),
            ..RecoveryReport::default()
        };
        if sessions.is_empty() {
            info!("No interrupted sessions to recover");
            return report;
        }

        info!(count = sessions.len(), "Recovering interrupted sessions");

        let outcomes = join_all(sessions.iter().map(|session| self.recover_one(session))).await;
        for outcome in outcomes {
            match outcome {
                RecoveryOutcome::Resumed => report.resumed += 1,
                RecoveryOutcome::Cancelled => report.cancelled += 1,
                RecoveryOutcome::Skipped => report.skipped += 1,
                RecoveryOutcome::Failed => report.failed += 1,
            }
        }

        info!(
            found = report.found,
            resumed = report.resumed,
            cancelled = report.cancelled,
            failed = report.failed,
            "Recovery sweep finished"
        );
        report
    }

    async fn recover_one(&self, session: &CallSession) -> RecoveryOutcome {
        match self.try_recover(session).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Failed to recover session");
                self.mark_failed(&session.id, &e.to_string()).await;
                RecoveryOutcome::Failed
            }
        }
    }

    async fn try_recover(&self, session: &CallSession) -> consultline_core::Result<RecoveryOutcome> {
        if !self.ctx.payments.is_resumable(&session.payment.intent_id).await? {
            warn!(
                session_id = %session.id,
                payment_intent_id = %session.payment.intent_id,
                "Payment no longer valid, cancelling session"
            );
            self.ctx.registry.cancel(&session.id);
            self.ctx
                .sessions
                .cancel_session(&session.id, PAYMENT_INVALID_REASON, SYSTEM_ACTOR)
                .await?;
            self.ctx
                .audit(
                    &session.id,
                    AuditEvent::Cancelled,
                    json!({ "reason": PAYMENT_INVALID_REASON, "actor": SYSTEM_ACTOR }),
                )
                .await;
            return Ok(RecoveryOutcome::Cancelled);
        }

        if self.sequencer.resume(session).await? {
            info!(session_id = %session.id, status = %session.status, "Session resumed");
            Ok(RecoveryOutcome::Resumed)
        } else {
            Ok(RecoveryOutcome::Skipped)
        }
    }

    async fn mark_failed(&self, session_id: &SessionId, reason: &str) {
        match self
            .ctx
            .sessions
            .update_session_status(session_id, CallStatus::Failed)
            .await
        {
            Ok(()) => self.ctx.stats.failed_today.inc(),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Could not mark unrecoverable session as failed")
            }
        }

        self.ctx
            .audit(session_id, AuditEvent::Failed, json!({ "reason": reason, "phase": "recovery" }))
            .await;
    }
}
