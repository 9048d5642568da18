//! Call Scheduler
//!
//! Schedules paid phone consultations between a client and a provider:
//! - Delayed dial sequences with bounded, linearly backed-off retries
//! - Periodic health monitoring that expires stale sessions and restarts stuck ones
//! - Boot-time recovery of sessions orphaned by a restart
//! - Retention cleanup and call statistics

pub mod audit;
pub mod booking;
pub mod clock;
pub mod config;
pub mod context;
pub mod dialer;
pub mod error;
pub mod handlers;
pub mod monitor;
pub mod payment;
pub mod recovery;
pub mod reporting;
pub mod retention;
pub mod routes;
pub mod scheduler;
pub mod sequencer;
pub mod session;
pub mod session_client;
pub mod stats;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod timers;

use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use config::{IntegrationConfig, SchedulerConfig};
pub use context::SchedulerDeps;
pub use error::{Result, SchedulerError};
pub use scheduler::CallScheduler;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<CallScheduler>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(scheduler: Arc<CallScheduler>) -> Self {
        Self {
            scheduler,
            started_at: Utc::now(),
        }
    }
}
