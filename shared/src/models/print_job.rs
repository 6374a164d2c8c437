//! Print Job Model
//!
//! One job = "print this rendered payload on this device". Jobs live in
//! memory inside the print server; these types are also what the admin
//! surface serializes out.

use serde::{Deserialize, Serialize};

/// Receipt kind a job produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Kitchen,
    Bill,
}

impl JobType {
    /// Default queue priority (lower = more urgent). Kitchen tickets
    /// gate food preparation, so they always outrank bills.
    pub fn default_priority(&self) -> i32 {
        match self {
            JobType::Kitchen => 1,
            JobType::Bill => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Kitchen => "kitchen",
            JobType::Bill => "bill",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which receipt kinds a print request should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobTypeSelector {
    Kitchen,
    Bill,
    Both,
}

impl JobTypeSelector {
    /// The job types this selector expands to
    pub fn job_types(&self) -> &'static [JobType] {
        match self {
            JobTypeSelector::Kitchen => &[JobType::Kitchen],
            JobTypeSelector::Bill => &[JobType::Bill],
            JobTypeSelector::Both => &[JobType::Kitchen, JobType::Bill],
        }
    }
}

/// Job lifecycle state
///
/// Legal transitions: Pending/Scheduled -> Processing -> Completed | Failed,
/// and Failed -> Pending while attempts remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Scheduled,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived payload metadata, computed once at enqueue time
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JobMetadata {
    pub payload_bytes: usize,
    pub estimated_duration_ms: u64,
}

impl JobMetadata {
    /// Thermal heads push roughly 10KB/s of raster+text, so estimate
    /// 100ms per KB with a 1s floor for head warm-up and cut.
    pub fn for_payload(payload: &[u8]) -> Self {
        let payload_bytes = payload.len();
        let kb = payload_bytes.div_ceil(1024) as u64;
        Self {
            payload_bytes,
            estimated_duration_ms: (kb * 100).max(1000),
        }
    }
}

/// A print job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: String,
    pub order_id: String,
    pub order_number: String,
    pub printer_id: String,
    pub job_type: JobType,
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub priority: i32,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub scheduled_for: Option<i64>,
    pub error: Option<String>,
    pub metadata: JobMetadata,
}

impl PrintJob {
    /// Terminal means the job will never transition again
    pub fn is_terminal(&self) -> bool {
        match self.status {
            JobStatus::Completed => true,
            JobStatus::Failed => self.attempts >= self.max_attempts,
            _ => false,
        }
    }

    /// A failed job with attempts left can go back to pending
    pub fn is_retryable(&self) -> bool {
        self.status == JobStatus::Failed && self.attempts < self.max_attempts
    }

    /// Processing duration, if the job both started and completed
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(s), Some(c)) => Some(c - s),
            _ => None,
        }
    }

    /// Whether a scheduled job is due at `now` (pending jobs are always due)
    pub fn is_due(&self, now: i64) -> bool {
        match self.status {
            JobStatus::Pending => true,
            JobStatus::Scheduled => self.scheduled_for.is_none_or(|t| t <= now),
            _ => false,
        }
    }
}

/// Queue-wide counters, derived on demand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub scheduled: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    pub fn total(&self) -> usize {
        self.pending + self.scheduled + self.processing + self.completed + self.failed
    }
}

/// Per-printer outcome counters, derived on demand
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrinterJobStats {
    pub printer_id: String,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Compact job view for queue snapshots and history listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub order_number: String,
    pub printer_id: String,
    pub job_type: JobType,
    pub priority: i32,
    pub status: JobStatus,
    pub attempts: u32,
    pub created_at: i64,
    pub error: Option<String>,
}

impl From<&PrintJob> for JobSummary {
    fn from(job: &PrintJob) -> Self {
        Self {
            id: job.id.clone(),
            order_number: job.order_number.clone(),
            printer_id: job.printer_id.clone(),
            job_type: job.job_type,
            priority: job.priority,
            status: job.status,
            attempts: job.attempts,
            created_at: job.created_at,
            error: job.error.clone(),
        }
    }
}

/// Point-in-time view of the active queue, derived on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub stats: QueueStats,
    pub active: Vec<JobSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_floor() {
        // A tiny ticket still gets the 1s floor
        let meta = JobMetadata::for_payload(&[0u8; 100]);
        assert_eq!(meta.estimated_duration_ms, 1000);

        // 20KB -> 2s
        let meta = JobMetadata::for_payload(&vec![0u8; 20 * 1024]);
        assert_eq!(meta.estimated_duration_ms, 2000);
    }

    #[test]
    fn test_kitchen_outranks_bill() {
        assert!(JobType::Kitchen.default_priority() < JobType::Bill.default_priority());
    }
}
