//! Print-job orchestration
//!
//! Turning a completed order into paper:
//! - `renderer`: order -> kitchen ticket / bill (text + ESC/POS)
//! - `jobs`: job lifecycle, retries, history, statistics
//! - `service`: device registry, priority queue, health checks
//! - `worker`: the loop driving queue ticks and health probes
//! - `dispatch`: strategy dispatcher (POS / relay / direct)
//! - `pos`: adapter to a pre-existing operator POS
//! - `relay`: HTTP client for the operator-run local print agent
//! - `oplog`: durable per-attempt transport log

pub mod dispatch;
pub mod jobs;
pub mod oplog;
pub mod pos;
pub mod relay;
pub mod renderer;
pub mod service;
pub mod transport;
pub mod worker;

pub use dispatch::{HybridPrintService, PrintBackend, PrintOutcome};
pub use jobs::{JobError, JobManagerConfig, PrintJobManager};
pub use oplog::{AttemptLog, AttemptLogStats, TransportAttempt};
pub use pos::{PosIntegrationService, PosMode, PosPrintResult};
pub use relay::{RelayClient, RelayError};
pub use renderer::{Receipt, ReceiptRenderer, RenderError};
pub use service::{
    PrintServiceError, ThermalPrinterConfig, ThermalPrinterService, TransportReport,
};
pub use transport::{NetworkTransport, PrintTransport};
pub use worker::{PrintWorker, WorkerConfig};
