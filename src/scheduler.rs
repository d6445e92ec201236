use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::LoginThrottleConfig;
use crate::services::LoginLimiter;

/// Periodically prunes stale login-attempt entries.
pub struct Scheduler {
    limiter: LoginLimiter,
    config: LoginThrottleConfig,
    running: Arc<RwLock<bool>>,
}

async fn run_cleanup(limiter: &LoginLimiter) {
    let start = std::time::Instant::now();

    match limiter.cleanup().await {
        Ok(removed) => info!(
            event = "job_finished",
            job_name = "limiter_cleanup",
            removed,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Login attempt cleanup finished"
        ),
        Err(e) => {
            error!(event = "job_failed", job_name = "limiter_cleanup", error = %e, "Login attempt cleanup failed");
        }
    }
}

impl Scheduler {
    #[must_use]
    pub fn new(limiter: LoginLimiter, config: LoginThrottleConfig) -> Self {
        Self {
            limiter,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        *self.running.write().await = true;
        info!("Starting background scheduler");

        if let Some(cron_expr) = &self.config.cleanup_cron {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let limiter = self.limiter.clone();
        let running = Arc::clone(&self.running);

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let limiter = limiter.clone();
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                run_cleanup(&limiter).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler running with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.cleanup_interval_minutes.max(1);

        info!("Scheduler running: limiter cleanup every {}m", interval_mins);

        let mut cleanup_interval = interval(Duration::from_secs(u64::from(interval_mins) * 60));

        loop {
            cleanup_interval.tick().await;
            if !*self.running.read().await {
                break;
            }
            run_cleanup(&self.limiter).await;
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
