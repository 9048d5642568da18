//! Operational report combining live counters, call volume and revenue

use chrono::{DateTime, Utc};
use consultline_core::{CallStatus, PaymentState};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::before;
use crate::context::SchedulerContext;
use crate::error::Result;
use crate::session::{CallSession, CallStatistics, SessionQuery};
use crate::stats::SchedulerStats;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub total: Decimal,
    pub average: Decimal,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerReport {
    pub period_days: u32,
    pub since: DateTime<Utc>,
    pub scheduler: SchedulerStats,
    pub calls: CallStatistics,
    /// Captured revenue per currency
    pub revenue: BTreeMap<String, RevenueSummary>,
}

/// Sum and average captured payment amounts per currency
pub fn summarize_revenue(sessions: &[CallSession]) -> BTreeMap<String, RevenueSummary> {
    let mut revenue: BTreeMap<String, RevenueSummary> = BTreeMap::new();
    for session in sessions {
        let bucket = revenue.entry(session.payment.currency.to_uppercase()).or_default();
        bucket.total += session.payment.amount;
        bucket.count += 1;
    }
    for bucket in revenue.values_mut() {
        if bucket.count > 0 {
            bucket.average = (bucket.total / Decimal::from(bucket.count)).round_dp(2);
        }
    }
    revenue
}

pub struct Reporter {
    ctx: Arc<SchedulerContext>,
}

impl Reporter {
    pub fn new(ctx: Arc<SchedulerContext>) -> Self {
        Self { ctx }
    }

    /// Build the report for the last `period_days`; query failures propagate
    pub async fn statistics(&self, period_days: Option<u32>) -> Result<SchedulerReport> {
        let period_days = period_days.unwrap_or(self.ctx.config.report_period_days).max(1);
        let since = before(self.ctx.now(), DAY.saturating_mul(period_days));

        let calls = self.ctx.sessions.get_call_statistics(since).await?;
        let paid = self
            .ctx
            .sessions
            .find_sessions(
                SessionQuery::with_statuses(&[CallStatus::Completed])
                    .created_after(since)
                    .payment_status(PaymentState::Captured),
            )
            .await?;

        Ok(SchedulerReport {
            period_days,
            since,
            scheduler: self.ctx.stats.snapshot(),
            calls,
            revenue: summarize_revenue(&paid),
        })
    }
}
