//! Print job manager
//!
//! Owns the in-memory job store: lifecycle transitions, retry/backoff
//! bookkeeping, a bounded history of terminal jobs, and derived
//! statistics. Jobs are mutated only by the queue processor; everything
//! else reads snapshots.

use parking_lot::Mutex;
use shared::models::{
    JobMetadata, JobStatus, JobSummary, JobType, PrintEvent, PrintJob, PrinterJobStats, QueueStats,
};
use shared::util::now_millis;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Illegal transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Job {0} is terminal and cannot change")]
    Terminal(String),

    #[error("Cannot cancel job {0} while it is processing")]
    CancelWhileProcessing(String),
}

pub type JobResult<T> = Result<T, JobError>;

/// Tuning knobs for the job store
#[derive(Debug, Clone)]
pub struct JobManagerConfig {
    /// Transport attempts before a job is permanently failed
    pub max_attempts: u32,
    /// Terminal jobs kept in history before oldest-first eviction
    pub history_cap: usize,
    /// Hard cap on entries returned by recent-activity queries
    pub activity_cap: usize,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            history_cap: 500,
            activity_cap: 100,
        }
    }
}

#[derive(Default)]
struct JobStore {
    active: HashMap<String, PrintJob>,
    /// Terminal jobs, oldest first
    history: VecDeque<PrintJob>,
}

/// Print job manager
pub struct PrintJobManager {
    store: Mutex<JobStore>,
    events: broadcast::Sender<PrintEvent>,
    config: JobManagerConfig,
}

impl PrintJobManager {
    pub fn new(config: JobManagerConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            store: Mutex::new(JobStore::default()),
            events,
            config,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Subscribe to job/device lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<PrintEvent> {
        self.events.subscribe()
    }

    /// Broadcast an event; nobody listening is fine
    pub(crate) fn emit(&self, event: PrintEvent) {
        let _ = self.events.send(event);
    }

    /// Create a job in pending state and announce it
    pub fn create_job(
        &self,
        order_id: &str,
        order_number: &str,
        printer_id: &str,
        job_type: JobType,
        payload: Vec<u8>,
        priority: i32,
    ) -> PrintJob {
        let metadata = JobMetadata::for_payload(&payload);
        let job = PrintJob {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            order_number: order_number.to_string(),
            printer_id: printer_id.to_string(),
            job_type,
            payload,
            priority,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: self.config.max_attempts,
            created_at: now_millis(),
            started_at: None,
            completed_at: None,
            failed_at: None,
            scheduled_for: None,
            error: None,
            metadata,
        };

        self.store.lock().active.insert(job.id.clone(), job.clone());

        info!(
            job_id = %job.id,
            order_number = %order_number,
            printer_id = %printer_id,
            job_type = %job_type,
            priority,
            "Print job created"
        );
        self.emit(PrintEvent::JobCreated {
            job_id: job.id.clone(),
            order_number: order_number.to_string(),
            printer_id: printer_id.to_string(),
            job_type,
        });

        job
    }

    /// Move a job through its lifecycle
    ///
    /// Stamps per-state timestamps; failed increments attempts and stores
    /// the error; reaching a terminal state migrates the job to history.
    /// Returns the updated job.
    pub fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> JobResult<PrintJob> {
        let mut store = self.store.lock();
        let job = store
            .active
            .get_mut(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        if job.is_terminal() {
            return Err(JobError::Terminal(job_id.to_string()));
        }

        let legal = matches!(
            (job.status, status),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Scheduled, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        );
        if !legal {
            return Err(JobError::InvalidTransition {
                from: job.status,
                to: status,
            });
        }

        let now = now_millis();
        job.status = status;
        match status {
            JobStatus::Processing => {
                job.started_at = Some(now);
            }
            JobStatus::Completed => {
                job.completed_at = Some(now);
                debug!(
                    job_id = %job.id,
                    duration_ms = job.duration_ms().unwrap_or(0),
                    "Job completed"
                );
            }
            JobStatus::Failed => {
                // Attempts can never pass the cap: the terminal check above
                // rejects updates once attempts == max_attempts.
                job.attempts += 1;
                job.failed_at = Some(now);
                job.error = error.clone();
                warn!(
                    job_id = %job.id,
                    attempts = job.attempts,
                    max_attempts = job.max_attempts,
                    error = ?error,
                    "Job attempt failed"
                );
            }
            _ => {}
        }

        let updated = job.clone();
        if updated.is_terminal()
            && let Some(job) = store.active.remove(job_id)
        {
            store.history.push_back(job);
            Self::evict_history(&mut store, self.config.history_cap);
        }
        drop(store);

        self.emit(PrintEvent::JobStatusChanged {
            job_id: job_id.to_string(),
            status,
            error,
        });

        Ok(updated)
    }

    /// Reset a failed job to pending for another attempt
    ///
    /// Returns false once attempts are exhausted (or the job is gone).
    pub fn retry_job(&self, job_id: &str) -> bool {
        let mut store = self.store.lock();
        let Some(job) = store.active.get_mut(job_id) else {
            return false;
        };
        if !job.is_retryable() {
            return false;
        }
        job.status = JobStatus::Pending;
        job.scheduled_for = None;
        debug!(job_id = %job_id, attempts = job.attempts, "Job reset for retry");
        true
    }

    /// Cancel a queued job
    ///
    /// Disallowed while processing: an in-flight transport always runs to
    /// completion or timeout. The cancelled job lands in history as failed
    /// with the cancellation reason.
    pub fn cancel_job(&self, job_id: &str, reason: &str) -> JobResult<()> {
        let mut store = self.store.lock();
        let status = store
            .active
            .get(job_id)
            .map(|j| j.status)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        if status == JobStatus::Processing {
            return Err(JobError::CancelWhileProcessing(job_id.to_string()));
        }

        let Some(mut job) = store.active.remove(job_id) else {
            return Err(JobError::NotFound(job_id.to_string()));
        };
        job.status = JobStatus::Failed;
        job.failed_at = Some(now_millis());
        job.error = Some(format!("cancelled: {}", reason));
        store.history.push_back(job);
        Self::evict_history(&mut store, self.config.history_cap);
        drop(store);

        info!(job_id = %job_id, reason = %reason, "Job cancelled");
        self.emit(PrintEvent::JobStatusChanged {
            job_id: job_id.to_string(),
            status: JobStatus::Failed,
            error: Some(format!("cancelled: {}", reason)),
        });
        Ok(())
    }

    /// Park a pending job until `when` (unix millis)
    pub fn schedule_job(&self, job_id: &str, when: i64) -> JobResult<()> {
        let mut store = self.store.lock();
        let job = store
            .active
            .get_mut(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        if job.status != JobStatus::Pending {
            return Err(JobError::InvalidTransition {
                from: job.status,
                to: JobStatus::Scheduled,
            });
        }
        job.status = JobStatus::Scheduled;
        job.scheduled_for = Some(when);
        Ok(())
    }

    /// Pending jobs plus scheduled jobs that are due, sorted by
    /// (priority ascending, created_at ascending)
    pub fn get_ready_jobs(&self) -> Vec<PrintJob> {
        let now = now_millis();
        let store = self.store.lock();
        let mut ready: Vec<PrintJob> = store
            .active
            .values()
            .filter(|j| j.is_due(now))
            .cloned()
            .collect();
        ready.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        ready
    }

    /// Fetch one job by id (active or historical)
    pub fn get_job(&self, job_id: &str) -> Option<PrintJob> {
        let store = self.store.lock();
        store
            .active
            .get(job_id)
            .cloned()
            .or_else(|| store.history.iter().find(|j| j.id == job_id).cloned())
    }

    /// Status counters over active + historical jobs. Idempotent read.
    pub fn get_queue_stats(&self) -> QueueStats {
        let store = self.store.lock();
        let mut stats = QueueStats::default();
        for job in store.active.values().chain(store.history.iter()) {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Scheduled => stats.scheduled += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Outcome counters grouped by printer
    pub fn get_stats_by_printer(&self) -> HashMap<String, PrinterJobStats> {
        let store = self.store.lock();
        let mut by_printer: HashMap<String, PrinterJobStats> = HashMap::new();
        for job in store.active.values().chain(store.history.iter()) {
            let entry = by_printer
                .entry(job.printer_id.clone())
                .or_insert_with(|| PrinterJobStats {
                    printer_id: job.printer_id.clone(),
                    ..Default::default()
                });
            match job.status {
                JobStatus::Pending | JobStatus::Scheduled => entry.pending += 1,
                JobStatus::Processing => entry.processing += 1,
                JobStatus::Completed => entry.completed += 1,
                JobStatus::Failed => entry.failed += 1,
            }
        }
        by_printer
    }

    /// Terminal jobs whose final timestamp falls inside the window,
    /// newest first, capped
    pub fn get_recent_activity(&self, window_ms: i64) -> Vec<JobSummary> {
        let cutoff = now_millis() - window_ms;
        let store = self.store.lock();
        let mut recent: Vec<&PrintJob> = store
            .history
            .iter()
            .filter(|j| {
                j.completed_at
                    .or(j.failed_at)
                    .is_some_and(|t| t >= cutoff)
            })
            .collect();
        recent.sort_by_key(|j| std::cmp::Reverse(j.completed_at.or(j.failed_at)));
        recent
            .into_iter()
            .take(self.config.activity_cap)
            .map(JobSummary::from)
            .collect()
    }

    /// Job summaries filtered by status and/or printer, newest first
    pub fn jobs_snapshot(
        &self,
        status: Option<JobStatus>,
        printer_id: Option<&str>,
        limit: usize,
    ) -> Vec<JobSummary> {
        let store = self.store.lock();
        let mut jobs: Vec<&PrintJob> = store
            .active
            .values()
            .chain(store.history.iter())
            .filter(|j| status.is_none_or(|s| j.status == s))
            .filter(|j| printer_id.is_none_or(|p| j.printer_id == p))
            .collect();
        jobs.sort_by_key(|j| std::cmp::Reverse(j.created_at));
        jobs.into_iter().take(limit).map(JobSummary::from).collect()
    }

    /// Trim history beyond the retention cap, oldest first
    ///
    /// Called on a fixed interval by the background worker; also applied
    /// inline whenever a job migrates, so the cap holds between sweeps.
    pub fn sweep_history(&self) -> usize {
        let mut store = self.store.lock();
        Self::evict_history(&mut store, self.config.history_cap)
    }

    fn evict_history(store: &mut JobStore, cap: usize) -> usize {
        let mut evicted = 0;
        while store.history.len() > cap {
            store.history.pop_front();
            evicted += 1;
        }
        evicted
    }
}

impl Default for PrintJobManager {
    fn default() -> Self {
        Self::new(JobManagerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PrintJobManager {
        PrintJobManager::default()
    }

    fn create(m: &PrintJobManager, printer: &str, job_type: JobType, priority: i32) -> PrintJob {
        m.create_job("order-1", "ORD000123", printer, job_type, b"payload".to_vec(), priority)
    }

    #[test]
    fn test_create_defaults() {
        let m = manager();
        let job = create(&m, "kitchen", JobType::Kitchen, 1);

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, 3);
        assert_eq!(job.metadata.payload_bytes, 7);
        assert_eq!(job.metadata.estimated_duration_ms, 1000);
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let m = manager();
        let job = create(&m, "bill", JobType::Bill, 5);

        m.update_status(&job.id, JobStatus::Processing, None).unwrap();
        let done = m.update_status(&job.id, JobStatus::Completed, None).unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.duration_ms().is_some());
        // Migrated to history
        assert_eq!(m.get_queue_stats().completed, 1);
        assert_eq!(m.get_queue_stats().pending, 0);
    }

    #[test]
    fn test_attempts_never_exceed_max() {
        let m = manager();
        let job = create(&m, "kitchen", JobType::Kitchen, 1);

        for attempt in 1..=3u32 {
            m.update_status(&job.id, JobStatus::Processing, None).unwrap();
            let failed = m
                .update_status(&job.id, JobStatus::Failed, Some("connect refused".into()))
                .unwrap();
            assert_eq!(failed.attempts, attempt);
            assert!(failed.attempts <= failed.max_attempts);
            if attempt < 3 {
                assert!(m.retry_job(&job.id));
            }
        }

        // Exhausted: no retry, no further transitions
        assert!(!m.retry_job(&job.id));
        assert!(matches!(
            m.update_status(&job.id, JobStatus::Processing, None),
            Err(JobError::NotFound(_)) | Err(JobError::Terminal(_))
        ));
        assert_eq!(m.get_queue_stats().failed, 1);
    }

    #[test]
    fn test_terminal_never_re_transitions() {
        let m = manager();
        let job = create(&m, "bill", JobType::Bill, 5);

        m.update_status(&job.id, JobStatus::Processing, None).unwrap();
        m.update_status(&job.id, JobStatus::Completed, None).unwrap();

        // Completed job is in history, not active
        assert!(m.update_status(&job.id, JobStatus::Processing, None).is_err());
        assert_eq!(m.get_job(&job.id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_ready_ordering_priority_then_age() {
        let m = manager();
        let j1 = create(&m, "kitchen", JobType::Kitchen, 1);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let j2 = create(&m, "bill", JobType::Bill, 2);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let j3 = create(&m, "kitchen", JobType::Kitchen, 1);

        let ready: Vec<String> = m.get_ready_jobs().into_iter().map(|j| j.id).collect();
        assert_eq!(ready, vec![j1.id, j3.id, j2.id]);
    }

    #[test]
    fn test_scheduled_not_due_excluded() {
        let m = manager();
        let job = create(&m, "kitchen", JobType::Kitchen, 1);

        m.schedule_job(&job.id, now_millis() + 60_000).unwrap();
        assert!(m.get_ready_jobs().is_empty());

        // Past-due scheduled jobs are ready again
        let job2 = create(&m, "kitchen", JobType::Kitchen, 1);
        m.schedule_job(&job2.id, now_millis() - 1).unwrap();
        let ready = m.get_ready_jobs();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, job2.id);
    }

    #[test]
    fn test_cancel_rules() {
        let m = manager();
        let job = create(&m, "kitchen", JobType::Kitchen, 1);

        m.update_status(&job.id, JobStatus::Processing, None).unwrap();
        assert!(matches!(
            m.cancel_job(&job.id, "operator"),
            Err(JobError::CancelWhileProcessing(_))
        ));

        m.update_status(&job.id, JobStatus::Failed, Some("timeout".into()))
            .unwrap();
        m.cancel_job(&job.id, "operator").unwrap();

        let cancelled = m.get_job(&job.id).unwrap();
        assert_eq!(cancelled.status, JobStatus::Failed);
        assert_eq!(cancelled.error.as_deref(), Some("cancelled: operator"));
    }

    #[test]
    fn test_queue_stats_idempotent() {
        let m = manager();
        create(&m, "kitchen", JobType::Kitchen, 1);
        create(&m, "bill", JobType::Bill, 5);

        let first = m.get_queue_stats();
        let second = m.get_queue_stats();
        assert_eq!(first, second);
        assert_eq!(first.pending, 2);
    }

    #[test]
    fn test_stats_by_printer() {
        let m = manager();
        let k = create(&m, "kitchen", JobType::Kitchen, 1);
        let b = create(&m, "bill", JobType::Bill, 5);

        // kitchen permanently fails, bill completes
        for _ in 0..3 {
            m.update_status(&k.id, JobStatus::Processing, None).unwrap();
            m.update_status(&k.id, JobStatus::Failed, Some("offline".into()))
                .unwrap();
            m.retry_job(&k.id);
        }
        m.update_status(&b.id, JobStatus::Processing, None).unwrap();
        m.update_status(&b.id, JobStatus::Completed, None).unwrap();

        let stats = m.get_stats_by_printer();
        assert_eq!(stats["kitchen"].failed, 1);
        assert_eq!(stats["bill"].completed, 1);
    }

    #[test]
    fn test_history_eviction() {
        let m = PrintJobManager::new(JobManagerConfig {
            history_cap: 2,
            ..Default::default()
        });

        let mut ids = Vec::new();
        for _ in 0..4 {
            let job = create(&m, "bill", JobType::Bill, 5);
            m.update_status(&job.id, JobStatus::Processing, None).unwrap();
            m.update_status(&job.id, JobStatus::Completed, None).unwrap();
            ids.push(job.id);
        }

        // Oldest two evicted
        assert!(m.get_job(&ids[0]).is_none());
        assert!(m.get_job(&ids[1]).is_none());
        assert!(m.get_job(&ids[2]).is_some());
        assert!(m.get_job(&ids[3]).is_some());
        assert_eq!(m.get_queue_stats().completed, 2);
    }

    #[test]
    fn test_events_emitted() {
        let m = manager();
        let mut rx = m.subscribe();

        let job = create(&m, "kitchen", JobType::Kitchen, 1);
        m.update_status(&job.id, JobStatus::Processing, None).unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            PrintEvent::JobCreated { .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            PrintEvent::JobStatusChanged {
                status: JobStatus::Processing,
                ..
            }
        ));
    }
}
