//! Configuration for the call scheduler

use consultline_core::config::env_or;
use consultline_core::{ConsultlineError, Result};
use rust_decimal::Decimal;
use std::time::Duration;

/// Scheduling, sweep and retention knobs
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay before the first dial attempt when the caller gives none
    pub default_delay: Duration,
    /// Upper bound on any requested delay
    pub max_delay: Duration,
    /// Dial attempts per execution before the session is failed
    pub retry_attempts: u32,
    /// Linear backoff base between attempts
    pub retry_delay: Duration,
    pub health_check_interval: Duration,
    /// Sessions fetched per health check
    pub max_pending_sessions: usize,
    /// Age past which a scheduled session is cancelled as expired
    pub expiry_threshold: Duration,
    /// Age past which a pending session without a timer is restarted
    pub stuck_threshold: Duration,
    /// Minimum age of a session picked up by the recovery sweep
    pub recovery_grace: Duration,
    pub recovery_batch_size: usize,
    pub retention_days: u32,
    pub retention_keep_completed_days: u32,
    pub retention_batch_size: usize,
    /// Default reporting window
    pub report_period_days: u32,
    pub min_call_price: Decimal,
    pub max_call_price: Decimal,
    /// Deviation from the expected price that triggers a warning
    pub price_tolerance: Decimal,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_delay: Duration::from_secs(5 * 60),
            max_delay: Duration::from_secs(10 * 60),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(60),
            max_pending_sessions: 100,
            expiry_threshold: Duration::from_secs(30 * 60),
            stuck_threshold: Duration::from_secs(15 * 60),
            recovery_grace: Duration::from_secs(5 * 60),
            recovery_batch_size: 50,
            retention_days: 30,
            retention_keep_completed_days: 7,
            retention_batch_size: 50,
            report_period_days: 7,
            min_call_price: Decimal::from(5),
            max_call_price: Decimal::from(500),
            price_tolerance: Decimal::from(5),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let minutes = |key: &str, default: Duration| -> Result<Duration> {
            Ok(Duration::from_secs(env_or(key, default.as_secs() / 60)? * 60))
        };
        let seconds = |key: &str, default: Duration| -> Result<Duration> {
            Ok(Duration::from_secs(env_or(key, default.as_secs())?))
        };

        let config = Self {
            default_delay: minutes("CALL_DEFAULT_DELAY_MINUTES", defaults.default_delay)?,
            max_delay: minutes("CALL_MAX_DELAY_MINUTES", defaults.max_delay)?,
            retry_attempts: env_or("CALL_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_delay: seconds("CALL_RETRY_DELAY_SECS", defaults.retry_delay)?,
            health_check_interval: seconds("HEALTH_CHECK_INTERVAL_SECS", defaults.health_check_interval)?,
            max_pending_sessions: env_or("MAX_PENDING_SESSIONS", defaults.max_pending_sessions)?,
            expiry_threshold: minutes("SESSION_EXPIRY_MINUTES", defaults.expiry_threshold)?,
            stuck_threshold: minutes("STUCK_SESSION_MINUTES", defaults.stuck_threshold)?,
            recovery_grace: minutes("RECOVERY_GRACE_MINUTES", defaults.recovery_grace)?,
            recovery_batch_size: env_or("RECOVERY_BATCH_SIZE", defaults.recovery_batch_size)?,
            retention_days: env_or("RETENTION_DAYS", defaults.retention_days)?,
            retention_keep_completed_days: env_or(
                "RETENTION_KEEP_COMPLETED_DAYS",
                defaults.retention_keep_completed_days,
            )?,
            retention_batch_size: env_or("RETENTION_BATCH_SIZE", defaults.retention_batch_size)?,
            report_period_days: env_or("REPORT_PERIOD_DAYS", defaults.report_period_days)?,
            min_call_price: env_or("MIN_CALL_PRICE", defaults.min_call_price)?,
            max_call_price: env_or("MAX_CALL_PRICE", defaults.max_call_price)?,
            price_tolerance: env_or("CALL_PRICE_TOLERANCE", defaults.price_tolerance)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_attempts == 0 {
            return Err(ConsultlineError::Config("CALL_RETRY_ATTEMPTS must be at least 1".into()));
        }
        if self.health_check_interval.is_zero() {
            return Err(ConsultlineError::Config("HEALTH_CHECK_INTERVAL_SECS must be positive".into()));
        }
        if self.min_call_price > self.max_call_price {
            return Err(ConsultlineError::Config(format!(
                "MIN_CALL_PRICE {} exceeds MAX_CALL_PRICE {}",
                self.min_call_price, self.max_call_price
            )));
        }
        Ok(())
    }

    /// Resolve a requested delay: default when absent, clamped to `[0, max_delay]`
    pub fn clamp_delay(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.default_delay).min(self.max_delay)
    }

    /// Linear backoff after the given failed attempt (1-based)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

/// Endpoints of the collaborating services
#[derive(Debug, Clone, Default)]
pub struct IntegrationConfig {
    pub session_service_url: Option<String>,
    pub payment_service_url: Option<String>,
    pub telephony_url: Option<String>,
}

impl IntegrationConfig {
    pub fn from_env() -> Self {
        Self {
            session_service_url: std::env::var("SESSION_SERVICE_URL").ok().filter(|v| !v.is_empty()),
            payment_service_url: std::env::var("PAYMENT_SERVICE_URL").ok().filter(|v| !v.is_empty()),
            telephony_url: std::env::var("TELEPHONY_URL").ok().filter(|v| !v.is_empty()),
        }
    }
}
