//! Call scheduler: lifecycle and the operations exposed to the rest of the platform

use consultline_core::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::booking::{validate_booking, BookingRequest};
use crate::config::SchedulerConfig;
use crate::context::{SchedulerContext, SchedulerDeps};
use crate::error::{Result, SchedulerError};
use crate::monitor::{HealthMonitor, HealthReport};
use crate::recovery::{RecoveryReport, RecoverySweep};
use crate::reporting::{Reporter, SchedulerReport};
use crate::retention::RetentionSweep;
use crate::sequencer::{CallSequencer, ExecutionOutcome, ScheduleOutcome};
use crate::session::{CallSession, CleanupReport};
use crate::stats::SchedulerStats;
use crate::timers::TimerRegistry;

/// Actor recorded on cancellations requested through the scheduler API
pub const CLIENT_ACTOR: &str = "client";

pub struct CallScheduler {
    ctx: Arc<SchedulerContext>,
    sequencer: CallSequencer,
    monitor: Arc<HealthMonitor>,
    recovery: RecoverySweep,
    retention: RetentionSweep,
    reporter: Reporter,
}

impl CallScheduler {
    pub fn new(deps: SchedulerDeps, config: SchedulerConfig) -> Self {
        let ctx = Arc::new(SchedulerContext::new(deps, config));
        let sequencer = CallSequencer::new(ctx.clone());

        Self {
            monitor: Arc::new(HealthMonitor::new(ctx.clone(), sequencer.clone())),
            recovery: RecoverySweep::new(ctx.clone(), sequencer.clone()),
            retention: RetentionSweep::new(ctx.clone()),
            reporter: Reporter::new(ctx.clone()),
            sequencer,
            ctx,
        }
    }

    /// Launch the health monitor and load today's counters
    pub async fn start(&self) -> Result<()> {
        if self.ctx.is_shutting_down() {
            return Err(SchedulerError::ShuttingDown);
        }

        if let Err(e) = self
            .ctx
            .stats
            .load_today(self.ctx.sessions.as_ref(), self.ctx.now())
            .await
        {
            warn!(error = %e, "Could not load daily counters, starting from zero");
        }

        self.monitor.start();
        info!(
            retry_attempts = self.ctx.config.retry_attempts,
            default_delay_secs = self.ctx.config.default_delay.as_secs(),
            "Call scheduler started"
        );
        Ok(())
    }

    /// Stop the monitor and cancel every outstanding timer; idempotent
    pub async fn shutdown(&self) {
        let first = self.ctx.begin_shutdown();
        self.monitor.stop();
        let cancelled = self.ctx.registry.cancel_all();
        self.ctx.sync_queue_length();

        if first {
            info!(cancelled_timers = cancelled, "Call scheduler shut down");
        }
    }

    pub async fn schedule(&self, session_id: &SessionId, delay: Option<Duration>) -> Result<ScheduleOutcome> {
        self.sequencer.schedule(session_id, delay).await
    }

    /// Run a session's dial sequence now, bypassing the timer
    pub async fn execute(&self, session_id: &SessionId) -> ExecutionOutcome {
        self.sequencer.execute(session_id).await
    }

    /// Validate a paid booking, create its session and schedule the call in the background
    pub async fn create_and_schedule(&self, request: BookingRequest) -> Result<CallSession> {
        if self.ctx.is_shutting_down() {
            return Err(SchedulerError::ShuttingDown);
        }
        validate_booking(&request, &self.ctx.config)?;

        let delay = request.delay();
        let session = self.ctx.sessions.create_session(request.into_params()).await?;

        let sequencer = self.sequencer.clone();
        let session_id = session.id.clone();
        tokio::spawn(async move {
            if let Err(e) = sequencer.schedule(&session_id, delay).await {
                error!(session_id = %session_id, error = %e, "Background scheduling failed");
            }
        });

        info!(
            session_id = %session.id,
            service_type = session.service_type.as_str(),
            amount = %session.payment.amount,
            "Booking accepted"
        );
        Ok(session)
    }

    pub async fn cancel(&self, session_id: &SessionId, reason: &str) -> Result<()> {
        self.sequencer.cancel(session_id, reason, CLIENT_ACTOR).await
    }

    pub async fn resume_pending_on_boot(&self) -> RecoveryReport {
        self.recovery.run().await
    }

    pub async fn cleanup_old(&self, older_than_days: Option<u32>) -> CleanupReport {
        self.retention.run(older_than_days).await
    }

    pub async fn get_statistics(&self, period_days: Option<u32>) -> Result<SchedulerReport> {
        self.reporter.statistics(period_days).await
    }

    /// Run one health check immediately
    pub async fn run_health_check(&self) -> HealthReport {
        self.monitor.tick().await
    }

    pub fn stats(&self) -> SchedulerStats {
        self.ctx.stats.snapshot()
    }

    pub fn registry(&self) -> &TimerRegistry {
        &self.ctx.registry
    }

    pub fn is_monitor_running(&self) -> bool {
        self.monitor.is_running()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.ctx.is_shutting_down()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.ctx.config
    }
}
