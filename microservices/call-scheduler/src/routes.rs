//! Router configuration for the Call Scheduler API

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::AppState;

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        // Calls
        .route("/v1/calls", post(handlers::create_call))
        .route("/v1/calls/{id}/schedule", post(handlers::schedule_call))
        .route("/v1/calls/{id}/cancel", post(handlers::cancel_call))
        // Maintenance
        .route("/v1/maintenance/resume", post(handlers::resume_pending))
        .route("/v1/maintenance/cleanup", post(handlers::cleanup))
        // Statistics
        .route("/v1/stats", get(handlers::statistics))
        .with_state(state)
}
