//! Hybrid print dispatcher
//!
//! One stable printing interface over three deployment topologies,
//! chosen once at startup: delegate to an existing POS, relay to an
//! operator-run local print agent, or drive the thermal printers
//! directly. Call sites never see the difference - and never see an
//! exception: printing is fire-and-forget relative to order placement,
//! so every path folds into a structured [`PrintOutcome`].

use super::pos::PosIntegrationService;
use super::relay::RelayClient;
use super::service::ThermalPrinterService;
use serde::Serialize;
use shared::models::{JobTypeSelector, Order, PrinterDevice, QueueSnapshot, QueueStats};
use std::sync::Arc;
use tracing::{error, info, warn};
use validator::Validate;

/// What operators are told to do when all else failed
const MANUAL_FALLBACK: &str = "manual printing required";

/// Structured result of a print request - the only thing callers get
#[derive(Debug, Clone, Serialize)]
pub struct PrintOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl PrintOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            fallback: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            fallback: None,
        }
    }

    fn failed_with_fallback(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            fallback: Some(MANUAL_FALLBACK.to_string()),
        }
    }
}

/// The backend a deployment resolved to
pub enum PrintBackend {
    /// Full delegation to an existing POS; the local queue is bypassed
    Pos(PosIntegrationService),
    /// HTTP relay to the operator-run local print agent
    Relay(RelayClient),
    /// Direct transport to the thermal printers
    Direct(Arc<ThermalPrinterService>),
}

/// Hybrid print service
pub struct HybridPrintService {
    backend: PrintBackend,
}

impl HybridPrintService {
    pub fn new(backend: PrintBackend) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            PrintBackend::Pos(_) => "pos",
            PrintBackend::Relay(_) => "relay",
            PrintBackend::Direct(_) => "direct",
        }
    }

    /// Print the receipts an order needs. Never returns an error.
    pub async fn print_order(&self, order: &Order, selector: JobTypeSelector) -> PrintOutcome {
        if let Err(e) = order.validate() {
            warn!(order_number = %order.order_number, error = %e, "Rejecting malformed order");
            return PrintOutcome::failed(format!("invalid order: {}", e));
        }

        match &self.backend {
            PrintBackend::Pos(pos) => {
                let result = pos.print_order(order, selector).await;
                PrintOutcome {
                    success: result.success,
                    message: result.message,
                    error: result.error,
                    fallback: None,
                }
            }
            PrintBackend::Relay(relay) => match relay.print_order(order, selector).await {
                Ok(()) => PrintOutcome::ok("relayed to print agent"),
                Err(e) => {
                    // Dump the full order so operators can reprint by hand
                    error!(
                        error = %e,
                        order = %serde_json::to_string(order).unwrap_or_default(),
                        "Relay failed; order logged for manual printing"
                    );
                    PrintOutcome::failed_with_fallback(e.to_string())
                }
            },
            PrintBackend::Direct(thermal) => match thermal.add_print_job(order, selector) {
                Ok(jobs) => {
                    info!(
                        order_number = %order.order_number,
                        jobs = jobs.len(),
                        "Print jobs queued"
                    );
                    PrintOutcome::ok(format!("{} job(s) queued", jobs.len()))
                }
                Err(e) => PrintOutcome::failed(e.to_string()),
            },
        }
    }

    /// Run a test print through whatever backend is active
    pub async fn test_print(&self, device_id: &str) -> PrintOutcome {
        match &self.backend {
            PrintBackend::Pos(pos) => {
                let result = pos.test_connection().await;
                PrintOutcome {
                    success: result.success,
                    message: result.message,
                    error: result.error,
                    fallback: None,
                }
            }
            PrintBackend::Relay(relay) => match relay.test_print(device_id).await {
                Ok(()) => PrintOutcome::ok("test print relayed"),
                Err(e) => PrintOutcome::failed_with_fallback(e.to_string()),
            },
            PrintBackend::Direct(thermal) => match thermal.test_print(device_id).await {
                Ok(report) if report.success => {
                    PrintOutcome::ok(format!("printed in {}ms", report.duration_ms))
                }
                Ok(report) => {
                    PrintOutcome::failed(report.error.unwrap_or_else(|| "unknown".to_string()))
                }
                Err(e) => PrintOutcome::failed(e.to_string()),
            },
        }
    }

    /// Device registry snapshot (meaningful for the direct backend only)
    pub fn printer_status(&self) -> Vec<PrinterDevice> {
        match &self.backend {
            PrintBackend::Direct(thermal) => thermal.printer_status(),
            _ => Vec::new(),
        }
    }

    /// Queue snapshot (meaningful for the direct backend only)
    pub fn queue_status(&self) -> QueueSnapshot {
        match &self.backend {
            PrintBackend::Direct(thermal) => thermal.queue_status(),
            _ => QueueSnapshot {
                stats: QueueStats::default(),
                active: Vec::new(),
            },
        }
    }
}
