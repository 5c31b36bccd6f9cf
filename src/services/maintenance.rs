use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::MaintenanceConfig;
use crate::services::reset_service::PasswordResetService;

/// Periodic housekeeping. Currently prunes long-expired reset tokens.
pub struct Maintenance {
    resets: Arc<PasswordResetService>,
    config: MaintenanceConfig,
    running: Arc<RwLock<bool>>,
}

impl Maintenance {
    pub fn new(resets: Arc<PasswordResetService>, config: MaintenanceConfig) -> Self {
        Self {
            resets,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    fn retention_seconds(&self) -> i64 {
        i64::from(self.config.reset_token_retention_hours) * 60 * 60
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Maintenance scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;

        let mut sched = JobScheduler::new().await?;

        let resets = Arc::clone(&self.resets);
        let running = Arc::clone(&self.running);
        let retention = self.retention_seconds();

        let job = Job::new_async(self.config.cron_expression.as_str(), move |_uuid, _lock| {
            let resets = Arc::clone(&resets);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                prune_tokens(&resets, retention).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!(
            "Maintenance scheduler running with cron: {}",
            self.config.cron_expression
        );

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping maintenance scheduler...");
        *self.running.write().await = false;
    }

    /// Runs every job once, outside the schedule.
    pub async fn run_once(&self) -> Result<u64> {
        info!("Running maintenance once...");
        let removed = self.resets.prune(self.retention_seconds()).await?;
        Ok(removed)
    }
}

async fn prune_tokens(resets: &PasswordResetService, retention_seconds: i64) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = "prune_reset_tokens", "Pruning expired reset tokens");

    match resets.prune(retention_seconds).await {
        Ok(removed) => info!(
            event = "job_finished",
            job_name = "prune_reset_tokens",
            removed,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Expired reset tokens pruned"
        ),
        Err(e) => error!(
            event = "job_failed",
            job_name = "prune_reset_tokens",
            error = %e,
            "Reset token pruning failed"
        ),
    }
}
