use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info, warn};

const DAILY_WARN_PCT: u64 = 80;
const MONTHLY_WARN_PCT: u64 = 80;
const MONTHLY_CRITICAL_PCT: u64 = 90;

/// Append-only usage fact: one row per (date, endpoint, status code).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageMetric {
    pub date: NaiveDate,
    pub month: String,
    pub endpoint: String,
    pub status_code: u16,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSummary {
    pub count: u64,
    pub quota: u64,
    pub remaining: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reason: String,
}

/// Recorded facts plus the in-flight reservations that have passed the gate
/// but not yet reported a result. Both live behind one mutex so a decision
/// and its reservation are a single atomic step.
#[derive(Debug, Default)]
struct UsageLedger {
    metrics: Vec<UsageMetric>,
    pending: u64,
}

/// Tracks upstream request counts per day and month and vetoes calls once
/// caps are reached. Admission goes through [`QuotaMonitor::reserve`], which
/// decides and books an in-flight slot under one lock acquisition; the slot
/// is released and recorded by [`QuotaMonitor::commit`]. Concurrent workers
/// therefore cannot pass the monthly hard cap on a stale count.
#[derive(Debug)]
pub struct QuotaMonitor {
    ledger: Mutex<UsageLedger>,
    daily_quota: u64,
    monthly_quota: u64,
}

impl QuotaMonitor {
    pub fn new(daily_quota: u64, monthly_quota: u64) -> Self {
        Self {
            ledger: Mutex::new(UsageLedger::default()),
            daily_quota,
            monthly_quota,
        }
    }

    pub fn load(path: &Path, daily_quota: u64, monthly_quota: u64) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(daily_quota, monthly_quota));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read usage file {}", path.display()))?;
        let metrics: Vec<UsageMetric> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse usage file {}", path.display()))?;
        Ok(Self {
            ledger: Mutex::new(UsageLedger {
                metrics,
                pending: 0,
            }),
            daily_quota,
            monthly_quota,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create usage directory {}", parent.display())
            })?;
        }

        let ledger = self.ledger.lock().expect("usage mutex poisoned");
        let serialized = serde_json::to_string_pretty(&ledger.metrics)?;
        std::fs::write(path, serialized)
            .with_context(|| format!("failed to write usage file {}", path.display()))?;
        Ok(())
    }

    /// Atomic check-and-reserve: evaluates the decision table with in-flight
    /// reservations counted as usage, and books a slot when allowed. Every
    /// allowed reservation must be paired with a [`QuotaMonitor::commit`].
    pub fn reserve(&self) -> QuotaDecision {
        let mut ledger = self.ledger.lock().expect("usage mutex poisoned");
        let decision = self.decide(&ledger.metrics, ledger.pending);
        if decision.allowed {
            ledger.pending += 1;
        }
        decision
    }

    /// Releases one reservation and records the request outcome, in the same
    /// lock acquisition so no gate decision can run between the two.
    pub fn commit(&self, endpoint: &str, status_code: u16) {
        let date = Utc::now().date_naive();
        let month = date.format("%Y-%m").to_string();

        let (daily, monthly) = {
            let mut ledger = self.ledger.lock().expect("usage mutex poisoned");
            ledger.pending = ledger.pending.saturating_sub(1);
            record_locked(&mut ledger, endpoint, status_code, date, &month);
            (
                count_for_day(&ledger.metrics, date),
                count_for_month(&ledger.metrics, &month),
            )
        };

        self.emit_alerts(date, &month, daily, monthly);
    }

    pub fn record_request(&self, endpoint: &str, status_code: u16) {
        self.record_request_on(endpoint, status_code, Utc::now().date_naive());
    }

    /// Records one request on an explicit date without touching the
    /// reservation count. Threshold checks run on every recorded request and
    /// alert via log levels only; alerting never blocks a request.
    pub fn record_request_on(&self, endpoint: &str, status_code: u16, date: NaiveDate) {
        let month = date.format("%Y-%m").to_string();
        let (daily, monthly) = {
            let mut ledger = self.ledger.lock().expect("usage mutex poisoned");
            record_locked(&mut ledger, endpoint, status_code, date, &month);
            (
                count_for_day(&ledger.metrics, date),
                count_for_month(&ledger.metrics, &month),
            )
        };

        self.emit_alerts(date, &month, daily, monthly);
    }

    pub fn daily_usage(&self, day: Option<NaiveDate>) -> UsageSummary {
        let day = day.unwrap_or_else(|| Utc::now().date_naive());
        let ledger = self.ledger.lock().expect("usage mutex poisoned");
        let count = count_for_day(&ledger.metrics, day);
        UsageSummary {
            count,
            quota: self.daily_quota,
            remaining: self.daily_quota.saturating_sub(count),
        }
    }

    pub fn monthly_usage(&self, month: Option<&str>) -> UsageSummary {
        let month = month
            .map(ToString::to_string)
            .unwrap_or_else(|| Utc::now().format("%Y-%m").to_string());
        let ledger = self.ledger.lock().expect("usage mutex poisoned");
        let count = count_for_month(&ledger.metrics, &month);
        UsageSummary {
            count,
            quota: self.monthly_quota,
            remaining: self.monthly_quota.saturating_sub(count),
        }
    }

    /// Read-only view of the decision table, in-flight reservations
    /// included. Admission itself must go through [`QuotaMonitor::reserve`].
    pub fn can_make_request(&self) -> QuotaDecision {
        let ledger = self.ledger.lock().expect("usage mutex poisoned");
        self.decide(&ledger.metrics, ledger.pending)
    }

    /// Decision table over recorded plus in-flight usage. Monthly limits are
    /// hard: at quota, or at the 90% critical threshold, the call is denied.
    /// The daily limit is advisory only and merely warns.
    fn decide(&self, metrics: &[UsageMetric], pending: u64) -> QuotaDecision {
        let today = Utc::now().date_naive();
        let month = today.format("%Y-%m").to_string();
        let daily = count_for_day(metrics, today) + pending;
        let monthly = count_for_month(metrics, &month) + pending;

        if monthly >= self.monthly_quota {
            return QuotaDecision {
                allowed: false,
                reason: "monthly quota exceeded".to_string(),
            };
        }

        let monthly_pct = percentage(monthly, self.monthly_quota);
        if monthly_pct >= MONTHLY_CRITICAL_PCT {
            return QuotaDecision {
                allowed: false,
                reason: format!(
                    "monthly usage at {monthly_pct}% of quota (critical threshold)"
                ),
            };
        }

        if daily >= self.daily_quota {
            warn!(
                day = %today,
                used = daily,
                quota = self.daily_quota,
                "daily quota exceeded; allowing (advisory limit)"
            );
            return QuotaDecision {
                allowed: true,
                reason: "daily quota exceeded (advisory)".to_string(),
            };
        }

        QuotaDecision {
            allowed: true,
            reason: "OK".to_string(),
        }
    }

    fn emit_alerts(&self, date: NaiveDate, month: &str, daily: u64, monthly: u64) {
        let daily_pct = percentage(daily, self.daily_quota);
        let monthly_pct = percentage(monthly, self.monthly_quota);

        if monthly_pct >= MONTHLY_CRITICAL_PCT {
            error!(
                month = %month,
                used = monthly,
                quota = self.monthly_quota,
                pct = monthly_pct,
                "monthly api usage critical"
            );
        } else if monthly_pct >= MONTHLY_WARN_PCT {
            warn!(
                month = %month,
                used = monthly,
                quota = self.monthly_quota,
                pct = monthly_pct,
                "monthly api usage high"
            );
        }

        if daily_pct >= DAILY_WARN_PCT {
            warn!(
                day = %date,
                used = daily,
                quota = self.daily_quota,
                pct = daily_pct,
                "daily api usage high"
            );
        }
    }

    /// Retention sweep over the append-only fact table.
    pub fn prune_older_than(&self, days: i64) -> usize {
        let cutoff = Utc::now().date_naive() - Duration::days(days);
        let mut ledger = self.ledger.lock().expect("usage mutex poisoned");
        let before = ledger.metrics.len();
        ledger.metrics.retain(|m| m.date >= cutoff);
        let removed = before - ledger.metrics.len();
        if removed > 0 {
            info!(removed, cutoff = %cutoff, "pruned usage metrics");
        }
        removed
    }

    pub fn daily_quota(&self) -> u64 {
        self.daily_quota
    }

    pub fn monthly_quota(&self) -> u64 {
        self.monthly_quota
    }
}

fn record_locked(
    ledger: &mut UsageLedger,
    endpoint: &str,
    status_code: u16,
    date: NaiveDate,
    month: &str,
) {
    if let Some(existing) = ledger.metrics.iter_mut().find(|m| {
        m.date == date && m.endpoint == endpoint && m.status_code == status_code
    }) {
        existing.count += 1;
    } else {
        ledger.metrics.push(UsageMetric {
            date,
            month: month.to_string(),
            endpoint: endpoint.to_string(),
            status_code,
            count: 1,
        });
    }
}

fn count_for_day(metrics: &[UsageMetric], day: NaiveDate) -> u64 {
    metrics.iter().filter(|m| m.date == day).map(|m| m.count).sum()
}

fn count_for_month(metrics: &[UsageMetric], month: &str) -> u64 {
    metrics
        .iter()
        .filter(|m| m.month == month)
        .map(|m| m.count)
        .sum()
}

fn percentage(count: u64, quota: u64) -> u64 {
    if quota == 0 {
        return 100;
    }
    count * 100 / quota
}
