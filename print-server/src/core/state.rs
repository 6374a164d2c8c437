use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{Config, PrintStrategy};
use crate::printing::{
    AttemptLog, HybridPrintService, JobManagerConfig, NetworkTransport, PosIntegrationService,
    PosMode, PrintBackend, PrintJobManager, ReceiptRenderer, RelayClient, ThermalPrinterConfig,
    ThermalPrinterService,
};
use shared::models::PrinterDevice;

/// Server state - shared handles to every service
///
/// Cheap to clone: everything of substance sits behind an `Arc`.
///
/// | Field | Description |
/// |-------|-------------|
/// | config | Resolved configuration (immutable) |
/// | jobs | Job lifecycle manager |
/// | thermal | Direct-mode queue processor (absent for POS/relay) |
/// | hybrid | Strategy dispatcher all print requests go through |
/// | oplog | Durable transport attempt log |
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub jobs: Arc<PrintJobManager>,
    pub thermal: Option<Arc<ThermalPrinterService>>,
    pub hybrid: Arc<HybridPrintService>,
    pub oplog: AttemptLog,
}

impl ServerState {
    /// Wire up every service according to the resolved strategy
    ///
    /// Configuration problems surface here, synchronously, before any
    /// job can be queued.
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.work_dir)?;
        let oplog = AttemptLog::open(PathBuf::from(&config.work_dir).join("attempts.redb"))?;

        let jobs = Arc::new(PrintJobManager::new(JobManagerConfig {
            max_attempts: config.max_attempts,
            history_cap: config.history_cap,
            activity_cap: 100,
        }));

        let renderer =
            ReceiptRenderer::new(config.paper_width, config.currency_symbol.clone());

        let (thermal, backend) = match config.strategy {
            PrintStrategy::Direct => {
                let devices: Vec<PrinterDevice> = config
                    .devices
                    .iter()
                    .cloned()
                    .map(PrinterDevice::from)
                    .collect();
                let service = Arc::new(ThermalPrinterService::new(
                    devices,
                    jobs.clone(),
                    renderer,
                    Arc::new(NetworkTransport),
                    oplog.clone(),
                    ThermalPrinterConfig {
                        kitchen_device: config.kitchen_printer_id.clone(),
                        bill_device: config.bill_printer_id.clone(),
                        transport_timeout: Duration::from_millis(config.transport_timeout_ms),
                        probe_timeout: Duration::from_millis(config.probe_timeout_ms),
                        base_retry_delay_ms: config.base_retry_delay_ms,
                    },
                )?);
                (Some(service.clone()), PrintBackend::Direct(service))
            }
            PrintStrategy::Relay => {
                let relay = RelayClient::new(
                    &config.print_agent_url,
                    &config.print_agent_secret,
                    Duration::from_millis(config.relay_timeout_ms),
                )?;
                (None, PrintBackend::Relay(relay))
            }
            PrintStrategy::Pos => {
                let pos = PosIntegrationService::new(
                    PosMode::parse(&config.pos_mode)?,
                    &config.pos_server_url,
                    &config.pos_api_key,
                    Duration::from_millis(config.pos_timeout_ms),
                    renderer,
                )?;
                (None, PrintBackend::Pos(pos))
            }
        };

        tracing::info!(
            strategy = config.strategy.as_str(),
            devices = config.devices.len(),
            "Print services initialized"
        );

        Ok(Self {
            config: Arc::new(config.clone()),
            jobs,
            thermal,
            hybrid: Arc::new(HybridPrintService::new(backend)),
            oplog,
        })
    }
}
