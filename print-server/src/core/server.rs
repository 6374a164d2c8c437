//! HTTP server and background task startup

use std::time::Duration;

use crate::api;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, ServerState};
use crate::printing::{PrintWorker, WorkerConfig};

/// The print server: admin API plus background workers
pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    /// Run until ctrl-c, then shut down the workers gracefully
    pub async fn run(self) -> anyhow::Result<()> {
        let mut tasks = BackgroundTasks::new();

        // Direct mode: the worker loop drives queue ticks and health checks
        if let Some(thermal) = &self.state.thermal {
            let worker = PrintWorker::new(
                thermal.clone(),
                WorkerConfig {
                    queue_tick: Duration::from_millis(self.config.queue_tick_ms),
                    health_check: Duration::from_secs(self.config.health_check_secs),
                    history_sweep: Duration::from_secs(self.config.history_sweep_secs),
                },
            );
            let shutdown = tasks.shutdown_token();
            tasks.spawn("print_worker", TaskKind::Worker, async move {
                worker.run(shutdown).await;
            });
        }

        // Attempt log retention, hourly
        {
            let oplog = self.state.oplog.clone();
            let retention_ms = self.config.attempt_log_retention_days * 24 * 3600 * 1000;
            let shutdown = tasks.shutdown_token();
            tasks.spawn("attempt_log_cleanup", TaskKind::Periodic, async move {
                let mut interval = tokio::time::interval(Duration::from_secs(3600));
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = interval.tick() => {
                            match oplog.cleanup_older_than(retention_ms) {
                                Ok(0) => {}
                                Ok(deleted) => {
                                    tracing::info!(deleted, "Attempt log retention cleanup");
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "Attempt log cleanup failed");
                                }
                            }
                        }
                    }
                }
            });
        }

        let app = api::router(self.state.clone());
        let listener =
            tokio::net::TcpListener::bind(("0.0.0.0", self.config.http_port)).await?;
        tracing::info!(
            port = self.config.http_port,
            backend = self.state.hybrid.backend_name(),
            "Print server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tasks.shutdown().await;
        Ok(())
    }
}
