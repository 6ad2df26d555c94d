//! Scheduled Jobs
//!
//! Background jobs for periodic maintenance tasks, run on a schedule to
//! bound the growth of transient state and self-heal the denormalized
//! registration counter.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::interval;
use uuid::Uuid;

/// Clean up expired rate limit buckets.
/// Removes buckets older than 2 minutes to prevent unbounded growth.
pub async fn cleanup_rate_limit_buckets(pool: &PgPool) -> Result<u64, JobError> {
    let result = sqlx::query(
        r#"
        DELETE FROM rate_limit_buckets
        WHERE window_start < NOW() - INTERVAL '2 minutes'
        "#,
    )
    .execute(pool)
    .await?;

    let rows_deleted = result.rows_affected();

    if rows_deleted > 0 {
        tracing::info!(
            rows_deleted = rows_deleted,
            "Cleaned up expired rate limit buckets"
        );
    }

    Ok(rows_deleted)
}

/// Recompute `current_registrations` from the confirmed `registrations` rows
/// for every active event and correct any drift. Under normal operation the
/// counter and the row count never diverge, since every write that touches
/// one touches the other in the same transaction under the event's lock;
/// this job exists as a defense-in-depth self-heal, not a primary mechanism.
pub async fn reconcile_registration_counters(pool: &PgPool) -> Result<Vec<CounterDrift>, JobError> {
    let drifted: Vec<(Uuid, i32, i64)> = sqlx::query_as(
        r#"
        SELECT e.id, e.current_registrations, COUNT(r.id) FILTER (WHERE r.status = 'confirmed') as actual
        FROM events e
        LEFT JOIN registrations r ON r.event_id = e.id
        WHERE e.is_active = true
        GROUP BY e.id, e.current_registrations
        HAVING e.current_registrations != COUNT(r.id) FILTER (WHERE r.status = 'confirmed')
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut corrected = Vec::with_capacity(drifted.len());

    for (event_id, recorded, actual) in drifted {
        sqlx::query("UPDATE events SET current_registrations = $2, updated_at = NOW() WHERE id = $1")
            .bind(event_id)
            .bind(actual as i32)
            .execute(pool)
            .await?;

        tracing::warn!(
            event_id = %event_id,
            recorded = recorded,
            actual = actual,
            "Corrected drifted registration counter"
        );

        corrected.push(CounterDrift {
            event_id,
            recorded,
            actual: actual as i32,
        });
    }

    Ok(corrected)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDrift {
    pub event_id: Uuid,
    pub recorded: i32,
    pub actual: i32,
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for rate limit cleanup (default: 1 minute)
    pub rate_limit_cleanup_interval: Duration,
    /// Interval for counter reconciliation (default: 5 minutes)
    pub counter_reconciliation_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            rate_limit_cleanup_interval: Duration::from_secs(60),
            counter_reconciliation_interval: Duration::from_secs(300),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    pool: PgPool,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(pool: PgPool, config: JobSchedulerConfig) -> Self {
        Self { pool, config }
    }

    /// Start the job scheduler in the background.
    /// Returns a handle that can be used to abort the scheduler.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!("Job scheduler started");

        let mut rate_limit_interval = interval(self.config.rate_limit_cleanup_interval);
        let mut reconciliation_interval = interval(self.config.counter_reconciliation_interval);

        loop {
            tokio::select! {
                _ = rate_limit_interval.tick() => {
                    if let Err(e) = cleanup_rate_limit_buckets(&self.pool).await {
                        tracing::error!(error = %e, "Rate limit cleanup failed");
                    }
                }
                _ = reconciliation_interval.tick() => {
                    if let Err(e) = reconcile_registration_counters(&self.pool).await {
                        tracing::error!(error = %e, "Counter reconciliation failed");
                    }
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match cleanup_rate_limit_buckets(&self.pool).await {
            Ok(count) => report.rate_limit_buckets_cleaned = count,
            Err(e) => report.errors.push(format!("Rate limit cleanup: {}", e)),
        }

        match reconcile_registration_counters(&self.pool).await {
            Ok(drifts) => report.counters_corrected = drifts,
            Err(e) => report.errors.push(format!("Counter reconciliation: {}", e)),
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub rate_limit_buckets_cleaned: u64,
    pub counters_corrected: Vec<CounterDrift>,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.rate_limit_cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.counter_reconciliation_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_maintenance_report_default() {
        let report = MaintenanceReport::default();
        assert_eq!(report.rate_limit_buckets_cleaned, 0);
        assert_eq!(report.errors.len(), 0);
        assert!(report.counters_corrected.is_empty());
    }

    #[test]
    fn test_counter_drift_equality() {
        let event_id = Uuid::new_v4();
        let a = CounterDrift { event_id, recorded: 3, actual: 2 };
        let b = CounterDrift { event_id, recorded: 3, actual: 2 };
        assert_eq!(a, b);
    }
}
