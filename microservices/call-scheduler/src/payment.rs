//! Payment validation used before resuming a call

use async_trait::async_trait;
use consultline_core::{ConsultlineError, PaymentState, Result};
use dashmap::DashMap;
use serde::Deserialize;

#[async_trait]
pub trait PaymentValidator: Send + Sync {
    /// True iff the authorization is still in a pre-capture state
    async fn is_resumable(&self, payment_intent_id: &str) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: String,
}

/// Asks the payment service for the authorization status
pub struct HttpPaymentValidator {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpPaymentValidator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentValidator for HttpPaymentValidator {
    async fn is_resumable(&self, payment_intent_id: &str) -> Result<bool> {
        let response = self
            .http_client
            .get(format!("{}/v1/payments/verify/{}", self.base_url, payment_intent_id))
            .send()
            .await
            .map_err(|e| ConsultlineError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| ConsultlineError::Unavailable(e.to_string()))?;

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| ConsultlineError::Network(e.to_string()))?;

        match body.status.parse::<PaymentState>() {
            Ok(state) => Ok(state.is_resumable()),
            Err(_) => {
                tracing::warn!(
                    payment_intent_id,
                    status = %body.status,
                    "Unrecognized payment status, treating as not resumable"
                );
                Ok(false)
            }
        }
    }
}

/// Payment states held in memory
#[derive(Debug, Default)]
pub struct StaticPaymentValidator {
    states: DashMap<String, PaymentState>,
    failing: DashMap<String, String>,
}

impl StaticPaymentValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, payment_intent_id: &str, state: PaymentState) {
        self.states.insert(payment_intent_id.to_string(), state);
    }

    /// Make lookups for this intent fail with a network error
    pub fn fail_with(&self, payment_intent_id: &str, message: &str) {
        self.failing.insert(payment_intent_id.to_string(), message.to_string());
    }
}

#[async_trait]
impl PaymentValidator for StaticPaymentValidator {
    async fn is_resumable(&self, payment_intent_id: &str) -> Result<bool> {
        if let Some(message) = self.failing.get(payment_intent_id) {
            return Err(ConsultlineError::Network(message.clone()));
        }
        Ok(self
            .states
            .get(payment_intent_id)
            .map(|s| s.is_resumable())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_static_validator_allow_list() {
        let validator = StaticPaymentValidator::new();
        validator.set_state("pi_hold", PaymentState::RequiresCapture);
        validator.set_state("pi_paid", PaymentState::Captured);
        validator.fail_with("pi_flaky", "connection reset");

        assert!(assert_ok!(validator.is_resumable("pi_hold").await));
        assert!(!assert_ok!(validator.is_resumable("pi_paid").await));
        assert!(!assert_ok!(validator.is_resumable("pi_unknown").await));
        assert_err!(validator.is_resumable("pi_flaky").await);
    }
}
