//! Telephony bridge used by the in-memory session service to place calls

use async_trait::async_trait;
use consultline_core::{ConsultlineError, Result};
use serde_json::json;

use crate::session::CallSession;

#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, session: &CallSession, attempt: u32) -> Result<()>;
}

/// Posts dial requests to the telephony bridge
pub struct HttpDialer {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpDialer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Dialer for HttpDialer {
    async fn dial(&self, session: &CallSession, attempt: u32) -> Result<()> {
        let payload = json!({
            "sessionId": session.id,
            "attempt": attempt,
            "providerPhone": session.provider_phone,
            "clientPhone": session.client_phone,
        });

        self.http_client
            .post(format!("{}/v1/calls/dial", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ConsultlineError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| ConsultlineError::Unavailable(e.to_string()))?;

        Ok(())
    }
}

/// Dialer for environments without a telephony bridge
#[derive(Debug, Default)]
pub struct LoggingDialer;

#[async_trait]
impl Dialer for LoggingDialer {
    async fn dial(&self, session: &CallSession, attempt: u32) -> Result<()> {
        tracing::info!(
            session_id = %session.id,
            attempt,
            "Dial requested (no telephony bridge configured)"
        );
        Ok(())
    }
}
