//! Retention sweep: bulk deletion of aged sessions

use std::sync::Arc;
use tracing::{error, info};

use crate::context::SchedulerContext;
use crate::session::{CleanupPolicy, CleanupReport};

pub struct RetentionSweep {
    ctx: Arc<SchedulerContext>,
}

impl RetentionSweep {
    pub fn new(ctx: Arc<SchedulerContext>) -> Self {
        Self { ctx }
    }

    pub fn policy(&self, older_than_days: Option<u32>) -> CleanupPolicy {
        CleanupPolicy {
            older_than_days: older_than_days.unwrap_or(self.ctx.config.retention_days),
            keep_completed_days: self.ctx.config.retention_keep_completed_days,
            batch_size: self.ctx.config.retention_batch_size,
        }
    }

    /// Delete aged sessions. Never fails: a service error is reported as one error.
    pub async fn run(&self, older_than_days: Option<u32>) -> CleanupReport {
        let policy = self.policy(older_than_days);

        match self.ctx.sessions.cleanup_old_sessions(policy).await {
            Ok(report) => {
                info!(
                    older_than_days = policy.older_than_days,
                    deleted = report.deleted,
                    errors = report.errors,
                    "Retention sweep finished"
                );
                report
            }
            Err(e) => {
                error!(error = %e, "Retention sweep failed");
                CleanupReport { deleted: 0, errors: 1 }
            }
        }
    }
}
