//! Fixtures and scripted collaborators for tests and local runs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consultline_core::{CallStatus, ConsultlineError, PaymentState, Result, ServiceType, SessionId};
use dashmap::DashSet;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::booking::BookingRequest;
use crate::dialer::Dialer;
use crate::session::{
    CallSession, CallSessionService, CallStatistics, CleanupPolicy, CleanupReport, CreateSessionParams,
    PaymentInfo, SessionMetadata, SessionQuery,
};

/// A lawyer call session with an authorized payment
pub fn session_fixture(id: &str, status: CallStatus, created_at: DateTime<Utc>) -> CallSession {
    CallSession {
        id: SessionId::from(id),
        status,
        service_type: ServiceType::LawyerCall,
        client_id: "client-1".to_string(),
        provider_id: "provider-1".to_string(),
        client_phone: "+33612345678".to_string(),
        provider_phone: "+33698765432".to_string(),
        payment: PaymentInfo {
            intent_id: format!("pi_{}", id),
            amount: Decimal::from(49),
            currency: "EUR".to_string(),
            status: if status == CallStatus::Completed {
                PaymentState::Captured
            } else {
                PaymentState::RequiresCapture
            },
        },
        metadata: SessionMetadata {
            created_at,
            updated_at: created_at,
            dial_attempts: 0,
            cancel_reason: None,
            cancelled_by: None,
        },
        duration_seconds: None,
    }
}

pub fn booking_fixture(amount: Decimal) -> BookingRequest {
    BookingRequest {
        client_id: "client-1".to_string(),
        provider_id: "lawyer-7".to_string(),
        service_type: ServiceType::LawyerCall,
        amount,
        currency: "EUR".to_string(),
        payment_intent_id: "pi_booking".to_string(),
        client_phone: "+33612345678".to_string(),
        provider_phone: "+33698765432".to_string(),
        delay_minutes: None,
    }
}

/// Dialer that fails a fixed number of times before succeeding
#[derive(Debug, Default)]
pub struct ScriptedDialer {
    failures_left: AtomicU32,
    always_fail: bool,
    calls: AtomicU32,
}

impl ScriptedDialer {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_times(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self, session: &CallSession, attempt: u32) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.always_fail {
            return Err(ConsultlineError::Unavailable(format!(
                "telephony rejected {} (attempt {})",
                session.id, attempt
            )));
        }
        let consumed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(ConsultlineError::Network(format!("dial timeout (attempt {})", attempt)));
        }
        Ok(())
    }
}

/// Session service wrapper that fails lookups for selected sessions
pub struct FlakySessionService {
    inner: Arc<dyn CallSessionService>,
    failing_lookups: DashSet<SessionId>,
}

impl FlakySessionService {
    pub fn new(inner: Arc<dyn CallSessionService>) -> Self {
        Self {
            inner,
            failing_lookups: DashSet::new(),
        }
    }

    pub fn fail_lookups_for(&self, id: &str) {
        self.failing_lookups.insert(SessionId::from(id));
    }
}

#[async_trait]
impl CallSessionService for FlakySessionService {
    async fn create_session(&self, params: CreateSessionParams) -> Result<CallSession> {
        self.inner.create_session(params).await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<CallSession>> {
        if self.failing_lookups.contains(id) {
            return Err(ConsultlineError::Database(format!("lookup of {} timed out", id)));
        }
        self.inner.get_session(id).await
    }

    async fn update_session_status(&self, id: &SessionId, status: CallStatus) -> Result<()> {
        self.inner.update_session_status(id, status).await
    }

    async fn update_status_if(&self, id: &SessionId, expected: CallStatus, status: CallStatus) -> Result<bool> {
        self.inner.update_status_if(id, expected, status).await
    }

    async fn cancel_session(&self, id: &SessionId, reason: &str, actor: &str) -> Result<()> {
        self.inner.cancel_session(id, reason, actor).await
    }

    async fn initiate_dial_sequence(&self, id: &SessionId, attempt: u32) -> Result<()> {
        self.inner.initiate_dial_sequence(id, attempt).await
    }

    async fn find_sessions(&self, query: SessionQuery) -> Result<Vec<CallSession>> {
        self.inner.find_sessions(query).await
    }

    async fn cleanup_old_sessions(&self, policy: CleanupPolicy) -> Result<CleanupReport> {
        self.inner.cleanup_old_sessions(policy).await
    }

    async fn get_call_statistics(&self, since: DateTime<Utc>) -> Result<CallStatistics> {
        self.inner.get_call_statistics(since).await
    }
}
