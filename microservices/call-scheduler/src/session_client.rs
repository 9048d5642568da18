//! HTTP client for the call session service
//!
//! Every operation is a single round trip; the session service owns the
//! record and enforces its own transitions. Non-success statuses are mapped
//! back to [`ConsultlineError`] so callers can tell conflicts and missing
//! sessions apart from outages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consultline_core::{CallStatus, ConsultlineError, Result, SessionId};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::session::{
    CallSession, CallSessionService, CallStatistics, CleanupPolicy, CleanupReport, CreateSessionParams,
    SessionQuery,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TransitionResponse {
    applied: bool,
}

pub struct HttpSessionService {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpSessionService {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConsultlineError::Config(format!("session service client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn session_url(&self, id: &SessionId, suffix: &str) -> String {
        format!("{}/v1/sessions/{}{}", self.base_url, id, suffix)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ConsultlineError::Timeout(e.to_string())
            } else {
                ConsultlineError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| ConsultlineError::Internal(format!("invalid session service response: {}", e)))
    }
}

fn error_for_status(status: StatusCode, body: &str) -> ConsultlineError {
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    };
    ConsultlineError::from_status(status.as_u16(), message)
}

#[async_trait]
impl CallSessionService for HttpSessionService {
    async fn create_session(&self, params: CreateSessionParams) -> Result<CallSession> {
        self.send_json(
            self.http_client
                .post(format!("{}/v1/sessions", self.base_url))
                .json(&params),
        )
        .await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<CallSession>> {
        match self.send_json(self.http_client.get(self.session_url(id, ""))).await {
            Ok(session) => Ok(Some(session)),
            Err(ConsultlineError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_session_status(&self, id: &SessionId, status: CallStatus) -> Result<()> {
        self.send(
            self.http_client
                .patch(self.session_url(id, "/status"))
                .json(&json!({ "status": status })),
        )
        .await?;
        Ok(())
    }

    async fn update_status_if(&self, id: &SessionId, expected: CallStatus, status: CallStatus) -> Result<bool> {
        let response: TransitionResponse = self
            .send_json(
                self.http_client
                    .post(self.session_url(id, "/transition"))
                    .json(&json!({ "expected": expected, "status": status })),
            )
            .await?;
        Ok(response.applied)
    }

    async fn cancel_session(&self, id: &SessionId, reason: &str, actor: &str) -> Result<()> {
        self.send(
            self.http_client
                .post(self.session_url(id, "/cancel"))
                .json(&json!({ "reason": reason, "cancelledBy": actor })),
        )
        .await?;
        Ok(())
    }

    async fn initiate_dial_sequence(&self, id: &SessionId, attempt: u32) -> Result<()> {
        self.send(
            self.http_client
                .post(self.session_url(id, "/dial"))
                .json(&json!({ "attempt": attempt })),
        )
        .await?;
        Ok(())
    }

    async fn find_sessions(&self, query: SessionQuery) -> Result<Vec<CallSession>> {
        self.send_json(
            self.http_client
                .post(format!("{}/v1/sessions/search", self.base_url))
                .json(&query),
        )
        .await
    }

    async fn cleanup_old_sessions(&self, policy: CleanupPolicy) -> Result<CleanupReport> {
        self.send_json(
            self.http_client
                .post(format!("{}/v1/sessions/cleanup", self.base_url))
                .json(&policy),
        )
        .await
    }

    async fn get_call_statistics(&self, since: DateTime<Utc>) -> Result<CallStatistics> {
        self.send_json(
            self.http_client
                .get(format!("{}/v1/sessions/statistics", self.base_url))
                .query(&[("since", since.to_rfc3339())]),
        )
        .await
    }
}
