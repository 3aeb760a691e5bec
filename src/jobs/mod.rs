use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::metrics;

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
    started_at: Instant,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self {
            context,
            started_at: Instant::now(),
        }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        // Email delivery
        tokio::spawn(Self::outbox_delivery_job(Arc::clone(&self)));
        tokio::spawn(Self::outbox_purge_job(Arc::clone(&self)));

        // Monitoring
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Deliver queued email on a fixed interval, or as soon as something is enqueued
    async fn outbox_delivery_job(scheduler: Arc<Self>) {
        let period = Duration::from_secs(scheduler.context.config.outbox.poll_interval_secs.max(1));
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = scheduler.context.outbox.notified() => {}
            }

            let start = Instant::now();
            match tasks::deliver_outbox(&scheduler.context).await {
                Ok(report) => {
                    if report.delivered + report.retried + report.abandoned > 0 {
                        info!(
                            delivered = report.delivered,
                            retried = report.retried,
                            abandoned = report.abandoned,
                            "Outbox delivery pass finished"
                        );
                    }
                    metrics::record_background_job("outbox_delivery", "success", start.elapsed().as_secs_f64());
                }
                Err(e) => {
                    error!("Outbox delivery failed: {}", e);
                    metrics::record_background_job("outbox_delivery", "failure", start.elapsed().as_secs_f64());
                }
            }
        }
    }

    /// Drop delivered and abandoned messages past retention (runs every hour)
    async fn outbox_purge_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            debug!("Running outbox purge");

            let start = Instant::now();
            match tasks::purge_outbox(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Purged {} finished outbox messages", count);
                    }
                    metrics::record_background_job("outbox_purge", "success", start.elapsed().as_secs_f64());
                }
                Err(e) => {
                    error!("Failed to purge outbox: {}", e);
                    metrics::record_background_job("outbox_purge", "failure", start.elapsed().as_secs_f64());
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;
            metrics::UPTIME_SECONDS.set(scheduler.started_at.elapsed().as_secs_f64());
            // Forget callers whose buckets have refilled
            scheduler.context.rate_limiter.retain_recent();

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    // Silent success - health is good
                }
                Err(e) => error!("Health check failed: {}", e),
            }
        }
    }
}
