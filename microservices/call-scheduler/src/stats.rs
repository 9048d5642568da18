//! Running scheduler statistics

use chrono::{DateTime, Utc};
use consultline_core::CallStatus;
use consultline_telemetry::{Counter, Gauge, Histogram};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::session::{CallSessionService, SessionQuery};

/// Point-in-time view of the scheduler counters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub total_scheduled: u64,
    pub currently_pending: u64,
    pub completed_today: u64,
    pub failed_today: u64,
    /// Seconds between session creation and the first successful dial
    pub average_wait_time: f64,
    pub queue_length: u64,
    pub dial_attempts: u64,
    pub last_health_check: Option<DateTime<Utc>>,
}

pub struct StatsAggregator {
    pub total_scheduled: Counter,
    pub currently_pending: Gauge,
    pub completed_today: Counter,
    pub failed_today: Counter,
    pub queue_length: Gauge,
    pub dial_attempts: Counter,
    wait_times: Histogram,
    last_health_check: RwLock<Option<DateTime<Utc>>>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            total_scheduled: Counter::new(),
            currently_pending: Gauge::new(),
            completed_today: Counter::new(),
            failed_today: Counter::new(),
            queue_length: Gauge::new(),
            dial_attempts: Counter::new(),
            wait_times: Histogram::with_capacity(1000),
            last_health_check: RwLock::new(None),
        }
    }

    pub fn record_wait(&self, seconds: f64) {
        self.wait_times.record(seconds.max(0.0));
    }

    pub fn mark_health_check(&self, at: DateTime<Utc>) {
        *self.last_health_check.write() = Some(at);
    }

    pub fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            total_scheduled: self.total_scheduled.get(),
            currently_pending: self.currently_pending.get(),
            completed_today: self.completed_today.get(),
            failed_today: self.failed_today.get(),
            average_wait_time: self.wait_times.mean(),
            queue_length: self.queue_length.get(),
            dial_attempts: self.dial_attempts.get(),
            last_health_check: *self.last_health_check.read(),
        }
    }

    /// Reload `completed_today`/`failed_today` by scanning today's sessions.
    ///
    /// Completions happen in the session service, so this scan is the only
    /// source of `completed_today`; it runs at start-up and on every health check.
    pub async fn load_today(
        &self,
        sessions: &dyn CallSessionService,
        now: DateTime<Utc>,
    ) -> consultline_core::Result<()> {
        let start_of_day = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);

        let today = sessions
            .find_sessions(
                SessionQuery::with_statuses(&[CallStatus::Completed, CallStatus::Failed])
                    .created_after(start_of_day),
            )
            .await?;

        let completed = today.iter().filter(|s| s.status == CallStatus::Completed).count() as u64;
        let failed = today.iter().filter(|s| s.status == CallStatus::Failed).count() as u64;

        self.completed_today.reset_to(completed);
        self.failed_today.reset_to(failed);
        tracing::debug!(completed, failed, day = %now.date_naive(), "Daily call counters loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::dialer::LoggingDialer;
    use crate::store::MemorySessionStore;
    use crate::testing::session_fixture;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_load_today_counts_only_todays_outcomes() {
        let now = Utc.with_ymd_and_hms(2026, 4, 10, 15, 0, 0).unwrap();
        let store = MemorySessionStore::new(Arc::new(LoggingDialer), Arc::new(ManualClock::new(now)));
        store.insert(session_fixture("done", CallStatus::Completed, now - chrono::Duration::hours(2)));
        store.insert(session_fixture("lost", CallStatus::Failed, now - chrono::Duration::hours(1)));
        store.insert(session_fixture("yesterday", CallStatus::Completed, now - chrono::Duration::days(1)));
        store.insert(session_fixture("waiting", CallStatus::Pending, now));

        let stats = StatsAggregator::new();
        stats.failed_today.inc();
        stats.failed_today.inc();
        stats.load_today(&store, now).await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.completed_today, 1);
        assert_eq!(snapshot.failed_today, 1);
    }
}
