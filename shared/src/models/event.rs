//! Print lifecycle events
//!
//! Broadcast by the print server for monitoring/dashboard subscribers.
//! Best-effort: a lagging subscriber drops events, it never blocks the
//! queue processor.

use super::print_job::{JobStatus, JobType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PrintEvent {
    /// A job was created and enqueued
    JobCreated {
        job_id: String,
        order_number: String,
        printer_id: String,
        job_type: JobType,
    },
    /// A job moved to a new lifecycle state
    JobStatusChanged {
        job_id: String,
        status: JobStatus,
        error: Option<String>,
    },
    /// A job exhausted its attempts and is permanently failed
    JobFailed {
        job_id: String,
        order_number: String,
        printer_id: String,
        attempts: u32,
        error: Option<String>,
    },
    /// A device transitioned online -> offline (emitted once per outage)
    PrinterOffline { printer_id: String, name: String },
    /// A device came back after an outage
    PrinterRecovered { printer_id: String, name: String },
}
