//! Print queue worker
//!
//! Drives the thermal printer service: queue ticks, health checks and
//! history sweeps are three intervals multiplexed on one loop, so the
//! device registry and queue are only ever mutated from here (plus the
//! admin force-tick, which shares the same single-flight guard).

use super::service::ThermalPrinterService;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Interval configuration for the worker loop
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue_tick: Duration,
    pub health_check: Duration,
    pub history_sweep: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_tick: Duration::from_millis(1000),
            health_check: Duration::from_secs(30),
            history_sweep: Duration::from_secs(60),
        }
    }
}

/// Print queue worker
pub struct PrintWorker {
    service: Arc<ThermalPrinterService>,
    config: WorkerConfig,
}

impl PrintWorker {
    pub fn new(service: Arc<ThermalPrinterService>, config: WorkerConfig) -> Self {
        Self { service, config }
    }

    /// Run the worker loop (blocks until shutdown)
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            queue_tick_ms = self.config.queue_tick.as_millis() as u64,
            health_check_s = self.config.health_check.as_secs(),
            "Print worker started"
        );

        let mut tick = tokio::time::interval(self.config.queue_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut health = tokio::time::interval(self.config.health_check);
        health.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep = tokio::time::interval(self.config.history_sweep);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Print worker received shutdown signal");
                    break;
                }
                _ = tick.tick() => {
                    self.service.process_queue_tick().await;
                }
                _ = health.tick() => {
                    self.service.run_health_check().await;
                }
                _ = sweep.tick() => {
                    let evicted = self.service.jobs().sweep_history();
                    if evicted > 0 {
                        tracing::debug!(evicted, "History sweep trimmed old jobs");
                    }
                }
            }
        }
    }
}
