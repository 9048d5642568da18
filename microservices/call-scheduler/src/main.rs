//! Call Scheduler Microservice
//!
//! Turns paid bookings into scheduled phone calls:
//! - Delayed dialing with bounded retries
//! - Health monitoring of pending sessions
//! - Recovery of sessions orphaned by a restart
//! - Retention cleanup and statistics

use async_trait::async_trait;
use consultline_core::{ConsultlineError, ConsultlineService, MicroserviceRuntime, Result, ServiceConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use call_scheduler::audit::MemoryAuditLog;
use call_scheduler::clock::SystemClock;
use call_scheduler::dialer::{Dialer, HttpDialer, LoggingDialer};
use call_scheduler::payment::{HttpPaymentValidator, PaymentValidator, StaticPaymentValidator};
use call_scheduler::routes::create_router;
use call_scheduler::session::CallSessionService;
use call_scheduler::session_client::HttpSessionService;
use call_scheduler::store::MemorySessionStore;
use call_scheduler::{AppState, CallScheduler, IntegrationConfig, SchedulerConfig, SchedulerDeps};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _telemetry = consultline_telemetry::init("call-scheduler")?;

    info!("Starting Call Scheduler microservice");

    let service = Arc::new(SchedulerService::new()?);
    MicroserviceRuntime::run(service).await?;
    Ok(())
}

pub struct SchedulerService {
    scheduler: Arc<CallScheduler>,
    http_bind: String,
}

impl SchedulerService {
    pub fn new() -> Result<Self> {
        let service_config = ServiceConfig::from_env()?;
        let config = SchedulerConfig::from_env()?;
        let integrations = IntegrationConfig::from_env();

        let clock = Arc::new(SystemClock);
        let sessions: Arc<dyn CallSessionService> = match &integrations.session_service_url {
            Some(url) => {
                info!(url = %url, "Using remote call session service");
                Arc::new(HttpSessionService::new(url.clone())?)
            }
            None => {
                warn!("SESSION_SERVICE_URL not set, sessions are kept in memory");
                let dialer: Arc<dyn Dialer> = match &integrations.telephony_url {
                    Some(url) => Arc::new(HttpDialer::new(url.clone())),
                    None => {
                        warn!("TELEPHONY_URL not set, dial requests will only be logged");
                        Arc::new(LoggingDialer)
                    }
                };
                Arc::new(MemorySessionStore::new(dialer, clock.clone()))
            }
        };
        let payments: Arc<dyn PaymentValidator> = match &integrations.payment_service_url {
            Some(url) => Arc::new(HttpPaymentValidator::new(url.clone())),
            None => {
                warn!("PAYMENT_SERVICE_URL not set, payments are resolved from the local table");
                Arc::new(StaticPaymentValidator::new())
            }
        };

        let deps = SchedulerDeps {
            sessions,
            payments,
            audit: Arc::new(MemoryAuditLog::new()),
            clock,
        };

        Ok(Self {
            scheduler: Arc::new(CallScheduler::new(deps, config)),
            http_bind: service_config.http_bind,
        })
    }
}

#[async_trait]
impl ConsultlineService for SchedulerService {
    fn service_id(&self) -> &'static str {
        "call-scheduler"
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down Call Scheduler");
        self.scheduler.shutdown().await;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| ConsultlineError::Internal(e.to_string()))?;

        let scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            let report = scheduler.resume_pending_on_boot().await;
            info!(
                found = report.found,
                resumed = report.resumed,
                cancelled = report.cancelled,
                failed = report.failed,
                "Boot recovery finished"
            );
        });

        info!(http = %self.http_bind, "Starting Call Scheduler HTTP server");

        let app = create_router(AppState::new(self.scheduler.clone()));
        let listener = TcpListener::bind(&self.http_bind).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
