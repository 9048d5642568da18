//! Call session records and the session service contract
//!
//! The session record is owned by the call session service; the scheduler
//! only reads it and drives `failed`/`cancelled` transitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consultline_core::{CallStatus, PaymentState, Result, ServiceType, SessionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One requested phone consultation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub id: SessionId,
    pub status: CallStatus,
    pub service_type: ServiceType,
    pub client_id: String,
    pub provider_id: String,
    pub client_phone: String,
    pub provider_phone: String,
    pub payment: PaymentInfo,
    pub metadata: SessionMetadata,
    /// Talk time once the call completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
}

impl CallSession {
    pub fn created_at(&self) -> DateTime<Utc> {
        self.metadata.created_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == CallStatus::Pending
    }
}

/// Payment authorization linked to a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub intent_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub dial_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<String>,
}

/// Parameters for creating a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionParams {
    pub service_type: ServiceType,
    pub client_id: String,
    pub provider_id: String,
    pub client_phone: String,
    pub provider_phone: String,
    pub payment_intent_id: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Filter for session scans
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    /// Empty matches every status
    pub statuses: Vec<CallStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub payment_status: Option<PaymentState>,
    pub limit: Option<usize>,
    pub newest_first: bool,
}

impl SessionQuery {
    pub fn with_statuses(statuses: &[CallStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            ..Self::default()
        }
    }

    pub fn created_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_after = Some(at);
        self
    }

    pub fn created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    pub fn payment_status(mut self, status: PaymentState) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn matches(&self, session: &CallSession) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&session.status))
            && self.created_after.map_or(true, |t| session.created_at() >= t)
            && self.created_before.map_or(true, |t| session.created_at() < t)
            && self.payment_status.map_or(true, |p| session.payment.status == p)
    }
}

/// Retention policy handed to the session service
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupPolicy {
    pub older_than_days: u32,
    pub keep_completed_days: u32,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deleted: u64,
    pub errors: u64,
}

/// Call volume statistics over a period
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatistics {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub average_duration_secs: f64,
    pub success_rate: f64,
}

/// Call session service consumed by the scheduler
#[async_trait]
pub trait CallSessionService: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams) -> Result<CallSession>;

    async fn get_session(&self, id: &SessionId) -> Result<Option<CallSession>>;

    async fn update_session_status(&self, id: &SessionId, status: CallStatus) -> Result<()>;

    /// Transition only if the current status is `expected`; returns whether it applied
    async fn update_status_if(
        &self,
        id: &SessionId,
        expected: CallStatus,
        status: CallStatus,
    ) -> Result<bool>;

    async fn cancel_session(&self, id: &SessionId, reason: &str, actor: &str) -> Result<()>;

    /// Start the dial sequence; may fail transiently
    async fn initiate_dial_sequence(&self, id: &SessionId, attempt: u32) -> Result<()>;

    async fn find_sessions(&self, query: SessionQuery) -> Result<Vec<CallSession>>;

    async fn cleanup_old_sessions(&self, policy: CleanupPolicy) -> Result<CleanupReport>;

    async fn get_call_statistics(&self, since: DateTime<Utc>) -> Result<CallStatistics>;
}
