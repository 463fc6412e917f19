//! Scheduled Jobs
//!
//! Background maintenance run on a fixed interval.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::interval;

use crate::storage::{SharedStorage, StorageError};

// =========================================================================
// Expired Idempotency Key Deletion Job
// =========================================================================

/// Delete idempotency records whose replay window has passed
pub async fn delete_expired_idempotency_keys(storage: &SharedStorage) -> Result<u64, JobError> {
    let rows_deleted = storage.purge_expired_idempotency_records(Utc::now()).await?;

    if rows_deleted > 0 {
        tracing::info!(rows_deleted = rows_deleted, "Deleted expired idempotency keys");
    }

    Ok(rows_deleted)
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    storage: SharedStorage,
    interval: Duration,
}

impl JobScheduler {
    pub fn new(storage: SharedStorage, interval: Duration) -> Self {
        Self { storage, interval }
    }

    /// Start the job scheduler in the background.
    /// Returns a handle that can be used to abort the scheduler.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            backend = self.storage.backend(),
            interval_secs = self.interval.as_secs(),
            "Job scheduler started"
        );

        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;
            let report = self.run_all_once().await;
            for error in &report.errors {
                tracing::error!(error = %error, "Maintenance job failed");
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match delete_expired_idempotency_keys(&self.storage).await {
            Ok(count) => report.idempotency_keys_deleted = count,
            Err(e) => report.errors.push(format!("Idempotency deletion: {}", e)),
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Spawn the maintenance loop for `storage`
pub fn spawn_maintenance(storage: SharedStorage, every: Duration) -> tokio::task::JoinHandle<()> {
    JobScheduler::new(storage, every).start()
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub idempotency_keys_deleted: u64,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// =========================================================================
// Tests
// =========================================================================
