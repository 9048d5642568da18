//! HTTP handlers for the Call Scheduler API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use consultline_core::SessionId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::booking::BookingRequest;
use crate::error::{Result, SchedulerError};
use crate::recovery::RecoveryReport;
use crate::reporting::SchedulerReport;
use crate::sequencer::ScheduleOutcome;
use crate::session::{CallSession, CleanupReport};
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: i64,
    pub monitor_running: bool,
}

/// Ready check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub shutting_down: bool,
    pub pending_timers: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub delay_minutes: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub session_id: String,
    pub scheduled: bool,
    pub delay_secs: Option<u64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    pub older_than_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub period_days: Option<u32>,
}

// ============================================
// Health
// ============================================

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now() - state.started_at;

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "call-scheduler".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: uptime.num_seconds(),
        monitor_running: state.scheduler.is_monitor_running(),
    })
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let shutting_down = state.scheduler.is_shutting_down();
    let ready = !shutting_down && state.scheduler.is_monitor_running();
    let code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        code,
        Json(ReadyResponse {
            ready,
            shutting_down,
            pending_timers: state.scheduler.registry().len(),
        }),
    )
}

// ============================================
// Calls
// ============================================

pub async fn create_call(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<CallSession>)> {
    let session = state.scheduler.create_and_schedule(request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn schedule_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ScheduleRequest>>,
) -> Result<Json<ScheduleResponse>> {
    let session_id = SessionId::parse(&id)?;
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let delay = request.delay_minutes.map(|m| Duration::from_secs(m.saturating_mul(60)));

    let response = match state.scheduler.schedule(&session_id, delay).await? {
        ScheduleOutcome::Scheduled { delay } => ScheduleResponse {
            session_id: session_id.to_string(),
            scheduled: true,
            delay_secs: Some(delay.as_secs()),
            status: None,
        },
        ScheduleOutcome::Skipped { status } => ScheduleResponse {
            session_id: session_id.to_string(),
            scheduled: false,
            delay_secs: None,
            status: Some(status.to_string()),
        },
    };
    Ok(Json(response))
}

pub async fn cancel_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Result<StatusCode> {
    let session_id = SessionId::parse(&id)?;
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(SchedulerError::Validation("Cancellation reason is required".to_string()));
    }

    state.scheduler.cancel(&session_id, reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================
// Maintenance
// ============================================

pub async fn resume_pending(State(state): State<AppState>) -> Json<RecoveryReport> {
    Json(state.scheduler.resume_pending_on_boot().await)
}

pub async fn cleanup(
    State(state): State<AppState>,
    body: Option<Json<CleanupRequest>>,
) -> Json<CleanupReport> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Json(state.scheduler.cleanup_old(request.older_than_days).await)
}

// ============================================
// Statistics
// ============================================

pub async fn statistics(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<SchedulerReport>> {
    Ok(Json(state.scheduler.get_statistics(query.period_days).await?))
}

