//! In-memory call session service
//!
//! Backs development deployments and tests. Dialing is delegated to a
//! [`Dialer`]; a successful dial moves the session to `provider_connecting`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consultline_core::{CallStatus, ConsultlineError, Result, SessionId};
use dashmap::DashMap;
use std::sync::Arc;

use crate::clock::{before, Clock};
use crate::dialer::Dialer;
use crate::session::{
    CallSession, CallSessionService, CallStatistics, CleanupPolicy, CleanupReport, CreateSessionParams,
    PaymentInfo, SessionMetadata, SessionQuery,
};

const DAY: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

pub struct MemorySessionStore {
    sessions: Arc<DashMap<SessionId, CallSession>>,
    dialer: Arc<dyn Dialer>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(dialer: Arc<dyn Dialer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            dialer,
            clock,
        }
    }

    /// Insert or replace a session record as-is
    pub fn insert(&self, session: CallSession) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn status_of(&self, id: &SessionId) -> Option<CallStatus> {
        self.sessions.get(id).map(|s| s.status)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn set_status(&self, id: &SessionId, status: CallStatus) -> Result<()> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| ConsultlineError::NotFound(id.to_string()))?;
        session.status = status;
        session.metadata.updated_at = self.clock.now();
        Ok(())
    }
}

#[async_trait]
impl CallSessionService for MemorySessionStore {
    async fn create_session(&self, params: CreateSessionParams) -> Result<CallSession> {
        let now = self.clock.now();
        let session = CallSession {
            id: SessionId::generate(),
            status: CallStatus::Pending,
            service_type: params.service_type,
            client_id: params.client_id,
            provider_id: params.provider_id,
            client_phone: params.client_phone,
            provider_phone: params.provider_phone,
            payment: PaymentInfo {
                intent_id: params.payment_intent_id,
                amount: params.amount,
                currency: params.currency,
                status: consultline_core::PaymentState::RequiresCapture,
            },
            metadata: SessionMetadata {
                created_at: now,
                updated_at: now,
                dial_attempts: 0,
                cancel_reason: None,
                cancelled_by: None,
            },
            duration_seconds: None,
        };

        self.sessions.insert(session.id.clone(), session.clone());
        tracing::info!(session_id = %session.id, "Call session created");

        Ok(session)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<CallSession>> {
        Ok(self.sessions.get(id).map(|s| s.clone()))
    }

    async fn update_session_status(&self, id: &SessionId, status: CallStatus) -> Result<()> {
        self.set_status(id, status)
    }

    async fn update_status_if(
        &self,
        id: &SessionId,
        expected: CallStatus,
        status: CallStatus,
    ) -> Result<bool> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| ConsultlineError::NotFound(id.to_string()))?;
        if session.status != expected {
            return Ok(false);
        }
        session.status = status;
        session.metadata.updated_at = self.clock.now();
        Ok(true)
    }

    async fn cancel_session(&self, id: &SessionId, reason: &str, actor: &str) -> Result<()> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| ConsultlineError::NotFound(id.to_string()))?;
        if session.status.is_terminal() {
            return Err(ConsultlineError::Conflict(format!(
                "session {} is already {}",
                id, session.status
            )));
        }
        session.status = CallStatus::Cancelled;
        session.metadata.cancel_reason = Some(reason.to_string());
        session.metadata.cancelled_by = Some(actor.to_string());
        session.metadata.updated_at = self.clock.now();
        Ok(())
    }

    async fn initiate_dial_sequence(&self, id: &SessionId, attempt: u32) -> Result<()> {
        let session = {
            let mut entry = self
                .sessions
                .get_mut(id)
                .ok_or_else(|| ConsultlineError::NotFound(id.to_string()))?;
            if entry.status.is_terminal() {
                return Err(ConsultlineError::Conflict(format!(
                    "session {} is already {}",
                    id, entry.status
                )));
            }
            entry.metadata.dial_attempts += 1;
            entry.clone()
        };

        // The map guard is released before awaiting the dialer
        self.dialer.dial(&session, attempt).await?;

        if let Some(mut entry) = self.sessions.get_mut(id) {
            if entry.status == CallStatus::Pending {
                entry.status = CallStatus::ProviderConnecting;
                entry.metadata.updated_at = self.clock.now();
            }
        }
        Ok(())
    }

    async fn find_sessions(&self, query: SessionQuery) -> Result<Vec<CallSession>> {
        let mut found: Vec<CallSession> = self
            .sessions
            .iter()
            .filter(|s| query.matches(s.value()))
            .map(|s| s.value().clone())
            .collect();

        if query.newest_first {
            found.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        } else {
            found.sort_by(|a, b| a.created_at().cmp(&b.created_at()));
        }
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn cleanup_old_sessions(&self, policy: CleanupPolicy) -> Result<CleanupReport> {
        let now = self.clock.now();
        let cutoff = before(now, DAY.saturating_mul(policy.older_than_days));
        let completed_cutoff = before(now, DAY.saturating_mul(policy.keep_completed_days));

        // Completed sessions follow their own window; active sessions are never deleted
        let is_expired = |s: &CallSession| -> bool {
            match s.status {
                CallStatus::Completed => s.created_at() < completed_cutoff,
                status if status.is_terminal() => s.created_at() < cutoff,
                _ => false,
            }
        };

        let candidates: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|s| is_expired(s.value()))
            .map(|s| s.key().clone())
            .collect();

        let mut report = CleanupReport::default();
        for chunk in candidates.chunks(policy.batch_size.max(1)) {
            for id in chunk {
                if self.sessions.remove(id).is_some() {
                    report.deleted += 1;
                } else {
                    report.errors += 1;
                }
            }
            tokio::task::yield_now().await;
        }

        tracing::info!(deleted = report.deleted, errors = report.errors, "Old sessions cleaned up");
        Ok(report)
    }

    async fn get_call_statistics(&self, since: DateTime<Utc>) -> Result<CallStatistics> {
        let mut stats = CallStatistics::default();
        let mut total_duration = 0u64;
        let mut timed = 0u64;

        for entry in self.sessions.iter().filter(|s| s.created_at() >= since) {
            stats.total += 1;
            match entry.status {
                CallStatus::Completed => {
                    stats.completed += 1;
                    if let Some(secs) = entry.duration_seconds {
                        total_duration += secs;
                        timed += 1;
                    }
                }
                CallStatus::Failed => stats.failed += 1,
                CallStatus::Cancelled => stats.cancelled += 1,
                _ => {}
            }
        }

        if timed > 0 {
            stats.average_duration_secs = total_duration as f64 / timed as f64;
        }
        if stats.total > 0 {
            stats.success_rate = stats.completed as f64 / stats.total as f64 * 100.0;
        }
        Ok(stats)
    }
}
