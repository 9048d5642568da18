//! Core domain types shared by the call services

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ConsultlineError;

/// Call session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("call_{}", Uuid::new_v4().simple()))
    }

    /// Build a session id from caller input, rejecting blank values
    pub fn parse(raw: &str) -> Result<Self, ConsultlineError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConsultlineError::Validation("session id is required".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle status of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Pending,
    ProviderConnecting,
    ClientConnecting,
    Completed,
    Failed,
    Cancelled,
}

impl CallStatus {
    /// Statuses of a session that has not reached a terminal state
    pub const ACTIVE: [CallStatus; 3] = [
        CallStatus::Pending,
        CallStatus::ProviderConnecting,
        CallStatus::ClientConnecting,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ProviderConnecting => "provider_connecting",
            Self::ClientConnecting => "client_connecting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = ConsultlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "provider_connecting" => Ok(Self::ProviderConnecting),
            "client_connecting" => Ok(Self::ClientConnecting),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ConsultlineError::Validation(format!("unknown call status: {}", other))),
        }
    }
}

/// Payment authorization state as reported by the payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Authorized,
    Captured,
    Refunded,
    Canceled,
    Failed,
}

impl PaymentState {
    /// Pre-capture states under which a call may still be placed
    pub const RESUMABLE: [PaymentState; 5] = [
        PaymentState::RequiresCapture,
        PaymentState::RequiresConfirmation,
        PaymentState::RequiresAction,
        PaymentState::Processing,
        PaymentState::Authorized,
    ];

    pub fn is_resumable(&self) -> bool {
        Self::RESUMABLE.contains(self)
    }
}

impl FromStr for PaymentState {
    type Err = ConsultlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requires_payment_method" => Ok(Self::RequiresPaymentMethod),
            "requires_confirmation" => Ok(Self::RequiresConfirmation),
            "requires_action" => Ok(Self::RequiresAction),
            "processing" => Ok(Self::Processing),
            "requires_capture" => Ok(Self::RequiresCapture),
            "authorized" => Ok(Self::Authorized),
            "captured" | "succeeded" => Ok(Self::Captured),
            "refunded" => Ok(Self::Refunded),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "failed" => Ok(Self::Failed),
            other => Err(ConsultlineError::Validation(format!("unknown payment status: {}", other))),
        }
    }
}

/// Kind of consultation that was booked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    LawyerCall,
    ExpatCall,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LawyerCall => "lawyer_call",
            Self::ExpatCall => "expat_call",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_rejects_blank() {
        assert!(SessionId::parse("   ").is_err());
        assert_eq!(SessionId::parse(" s1 ").unwrap().as_str(), "s1");
        assert!(SessionId::generate().as_str().starts_with("call_"));
    }

    #[test]
    fn test_call_status_wire_names() {
        let json = serde_json::to_string(&CallStatus::ProviderConnecting).unwrap();
        assert_eq!(json, "\"provider_connecting\"");
        assert_eq!("client_connecting".parse::<CallStatus>().unwrap(), CallStatus::ClientConnecting);
        assert!(CallStatus::Cancelled.is_terminal());
        assert!(!CallStatus::Pending.is_terminal());
    }

    #[test]
    fn test_payment_resumable_allow_list() {
        assert!(PaymentState::RequiresCapture.is_resumable());
        assert!(PaymentState::Processing.is_resumable());
        assert!(!PaymentState::Captured.is_resumable());
        assert!(!PaymentState::Canceled.is_resumable());
        assert_eq!("succeeded".parse::<PaymentState>().unwrap(), PaymentState::Captured);
    }
}
