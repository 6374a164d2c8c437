//! redb-based transport attempt log
//!
//! Every individual transport attempt (success or failure) is appended
//! here, independent of the in-memory job manager. The log survives
//! process restarts even though the live queue does not, giving
//! operators a durable record for manual reprints.

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use shared::models::JobType;
use shared::util::now_millis;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Attempts table: key = (timestamp_millis, attempt_id), value = JSON
const ATTEMPTS_TABLE: TableDefinition<(i64, &str), &[u8]> =
    TableDefinition::new("transport_attempts");

#[derive(Debug, Error)]
pub enum AttemptLogError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AttemptLogResult<T> = Result<T, AttemptLogError>;

/// One transport attempt, as appended to the log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportAttempt {
    pub id: String,
    pub job_id: String,
    pub printer_id: String,
    pub order_number: String,
    pub job_type: JobType,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp: i64,
}

impl TransportAttempt {
    pub fn new(
        job_id: &str,
        printer_id: &str,
        order_number: &str,
        job_type: JobType,
        success: bool,
        error: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            printer_id: printer_id.to_string(),
            order_number: order_number.to_string(),
            job_type,
            success,
            error,
            duration_ms,
            timestamp: now_millis(),
        }
    }
}

/// Aggregate counters over the whole log
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttemptLogStats {
    pub total: u64,
    pub failures: u64,
}

/// Transport attempt log
#[derive(Clone)]
pub struct AttemptLog {
    db: Arc<Database>,
}

impl AttemptLog {
    /// Open or create the log database
    pub fn open(path: impl AsRef<Path>) -> AttemptLogResult<Self> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ATTEMPTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory log (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> AttemptLogResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ATTEMPTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Append one attempt
    pub fn record(&self, attempt: &TransportAttempt) -> AttemptLogResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ATTEMPTS_TABLE)?;
            let value = serde_json::to_vec(attempt)?;
            table.insert((attempt.timestamp, attempt.id.as_str()), value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Most recent attempts, newest first
    pub fn recent(&self, limit: usize) -> AttemptLogResult<Vec<TransportAttempt>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ATTEMPTS_TABLE)?;

        let mut attempts = Vec::with_capacity(limit);
        for result in table.iter()?.rev() {
            if attempts.len() >= limit {
                break;
            }
            let (_, guard) = result?;
            let attempt: TransportAttempt = serde_json::from_slice(guard.value())?;
            attempts.push(attempt);
        }
        Ok(attempts)
    }

    /// All attempts for one job, oldest first
    pub fn for_job(&self, job_id: &str) -> AttemptLogResult<Vec<TransportAttempt>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ATTEMPTS_TABLE)?;

        let mut attempts = Vec::new();
        for result in table.iter()? {
            let (_, guard) = result?;
            let attempt: TransportAttempt = serde_json::from_slice(guard.value())?;
            if attempt.job_id == job_id {
                attempts.push(attempt);
            }
        }
        Ok(attempts)
    }

    /// Delete attempts older than `max_age_ms`; returns how many
    pub fn cleanup_older_than(&self, max_age_ms: i64) -> AttemptLogResult<usize> {
        let cutoff = now_millis() - max_age_ms;

        let txn = self.db.begin_write()?;
        let mut deleted = 0;
        {
            let mut table = txn.open_table(ATTEMPTS_TABLE)?;

            let mut to_delete = Vec::new();
            for result in table.iter()? {
                let (key, _) = result?;
                let (ts, id) = key.value();
                if ts < cutoff {
                    to_delete.push((ts, id.to_string()));
                }
            }

            for (ts, id) in &to_delete {
                table.remove((*ts, id.as_str()))?;
                deleted += 1;
            }
        }
        txn.commit()?;
        Ok(deleted)
    }

    /// Aggregate counters
    pub fn stats(&self) -> AttemptLogResult<AttemptLogStats> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ATTEMPTS_TABLE)?;

        let total = table.len()?;
        let mut failures = 0;
        for result in table.iter()? {
            let (_, guard) = result?;
            let attempt: TransportAttempt = serde_json::from_slice(guard.value())?;
            if !attempt.success {
                failures += 1;
            }
        }

        Ok(AttemptLogStats { total, failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(job_id: &str, success: bool) -> TransportAttempt {
        TransportAttempt::new(
            job_id,
            "kitchen",
            "ORD000123",
            JobType::Kitchen,
            success,
            if success { None } else { Some("refused".into()) },
            120,
        )
    }

    #[test]
    fn test_record_and_recent() {
        let log = AttemptLog::open_in_memory().unwrap();
        log.record(&attempt("job-1", true)).unwrap();
        log.record(&attempt("job-2", false)).unwrap();

        let recent = log.recent(10).unwrap();
        assert_eq!(recent.len(), 2);

        let stats = log.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn test_for_job() {
        let log = AttemptLog::open_in_memory().unwrap();
        let mut first = attempt("job-1", false);
        first.timestamp = now_millis() - 10;
        log.record(&first).unwrap();
        log.record(&attempt("job-1", true)).unwrap();
        log.record(&attempt("job-2", true)).unwrap();

        let attempts = log.for_job("job-1").unwrap();
        assert_eq!(attempts.len(), 2);
        assert!(!attempts[0].success);
        assert!(attempts[1].success);
    }

    #[test]
    fn test_cleanup_old_attempts() {
        let log = AttemptLog::open_in_memory().unwrap();
        let mut old = attempt("job-1", true);
        old.timestamp = now_millis() - 100_000;
        log.record(&old).unwrap();
        log.record(&attempt("job-2", true)).unwrap();

        let deleted = log.cleanup_older_than(50_000).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(log.stats().unwrap().total, 1);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attempts.redb");

        {
            let log = AttemptLog::open(&path).unwrap();
            log.record(&attempt("job-1", false)).unwrap();
        }

        let log = AttemptLog::open(&path).unwrap();
        assert_eq!(log.stats().unwrap().total, 1);
    }
}
