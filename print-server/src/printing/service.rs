//! Thermal printer service
//!
//! Owns the device registry and the active queue, and implements the two
//! periodic duties the background worker drives: the queue tick (one job
//! transport per tick, retry with exponential backoff) and the health
//! check (reachability probe per enabled device).

use super::jobs::{JobError, PrintJobManager};
use super::oplog::{AttemptLog, TransportAttempt};
use super::renderer::{ReceiptRenderer, RenderError};
use super::transport::{PrintTransport, classify_failure};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::{
    DeviceStatus, JobStatus, JobSummary, JobType, JobTypeSelector, Order, OrderItem, PrintEvent,
    PrintJob, PrinterDevice, QueueSnapshot,
};
use shared::util::now_millis;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum PrintServiceError {
    #[error("Unknown printer device: {0}")]
    UnknownDevice(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Job(#[from] JobError),
}

pub type PrintServiceResult<T> = Result<T, PrintServiceError>;

/// Outcome of a direct transport run (test prints)
#[derive(Debug, Clone, Serialize)]
pub struct TransportReport {
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Tuning knobs for the service
#[derive(Debug, Clone)]
pub struct ThermalPrinterConfig {
    /// Device receiving kitchen tickets
    pub kitchen_device: String,
    /// Device receiving bills
    pub bill_device: String,
    /// Hard cutoff per transport attempt
    pub transport_timeout: Duration,
    /// Hard cutoff per health probe
    pub probe_timeout: Duration,
    /// First retry delay; doubles per subsequent attempt
    pub base_retry_delay_ms: i64,
}

impl Default for ThermalPrinterConfig {
    fn default() -> Self {
        Self {
            kitchen_device: "kitchen".to_string(),
            bill_device: "bill".to_string(),
            transport_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(3),
            base_retry_delay_ms: 1000,
        }
    }
}

/// Delay before the next attempt: `base × 2^(attempts-1)`
///
/// `attempts` is the number of failures so far, so the delay before
/// attempt 2 is `base` and before attempt 3 is `base × 2`.
pub fn backoff_delay_ms(base_ms: i64, attempts: u32) -> i64 {
    base_ms.saturating_mul(1i64 << (attempts.saturating_sub(1)).min(30))
}

/// Two-lane active queue
///
/// Retried jobs go to the front lane and bypass normal ordering once
/// their backoff delay elapses; everything else waits in (priority,
/// created_at) order.
#[derive(Default)]
struct QueueLanes {
    retry: VecDeque<String>,
    waiting: VecDeque<String>,
}

/// Thermal printer service
pub struct ThermalPrinterService {
    devices: DashMap<String, PrinterDevice>,
    queue: Mutex<QueueLanes>,
    /// Single-flight guard: overlapping ticks are skipped, not queued
    tick_in_flight: AtomicBool,
    jobs: Arc<PrintJobManager>,
    renderer: ReceiptRenderer,
    transport: Arc<dyn PrintTransport>,
    oplog: AttemptLog,
    config: ThermalPrinterConfig,
}

impl ThermalPrinterService {
    /// Build the service around a fixed device registry
    ///
    /// Fails fast when the kitchen/bill routing points at a device that
    /// is not in the registry - that is operator misconfiguration.
    pub fn new(
        devices: Vec<PrinterDevice>,
        jobs: Arc<PrintJobManager>,
        renderer: ReceiptRenderer,
        transport: Arc<dyn PrintTransport>,
        oplog: AttemptLog,
        config: ThermalPrinterConfig,
    ) -> PrintServiceResult<Self> {
        let registry = DashMap::new();
        for device in devices {
            registry.insert(device.id.clone(), device);
        }

        for routed in [&config.kitchen_device, &config.bill_device] {
            if !registry.contains_key(routed) {
                return Err(PrintServiceError::UnknownDevice(routed.clone()));
            }
        }

        Ok(Self {
            devices: registry,
            queue: Mutex::new(QueueLanes::default()),
            tick_in_flight: AtomicBool::new(false),
            jobs,
            renderer,
            transport,
            oplog,
            config,
        })
    }

    pub fn jobs(&self) -> &Arc<PrintJobManager> {
        &self.jobs
    }

    fn device_id_for(&self, job_type: JobType) -> &str {
        match job_type {
            JobType::Kitchen => &self.config.kitchen_device,
            JobType::Bill => &self.config.bill_device,
        }
    }

    // ========== Job creation ==========

    /// Render and enqueue the receipts an order needs
    ///
    /// A formatting failure aborts only the affected receipt type; the
    /// other type still goes out. Device reachability never blocks
    /// enqueueing - an offline printer drains its queue once it recovers.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub fn add_print_job(
        &self,
        order: &Order,
        selector: JobTypeSelector,
    ) -> PrintServiceResult<Vec<JobSummary>> {
        let now = now_millis();
        let mut created = Vec::new();
        let mut first_error: Option<PrintServiceError> = None;

        for &job_type in selector.job_types() {
            let receipt = match self.renderer.render(order, job_type, now) {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        order_number = %order.order_number,
                        job_type = %job_type,
                        error = %e,
                        "Receipt rendering failed, skipping this type"
                    );
                    first_error.get_or_insert(PrintServiceError::Render(e));
                    continue;
                }
            };

            let printer_id = self.device_id_for(job_type).to_string();
            let job = self.jobs.create_job(
                &order.order_number,
                &order.order_number,
                &printer_id,
                job_type,
                receipt.bytes,
                job_type.default_priority(),
            );

            self.queue.lock().waiting.push_back(job.id.clone());
            created.push(JobSummary::from(&job));
        }

        if created.is_empty()
            && let Some(e) = first_error
        {
            return Err(e);
        }
        Ok(created)
    }

    // ========== Queue tick ==========

    /// Process at most one job from the queue
    ///
    /// Reentrancy-guarded: a tick that arrives while a transport is in
    /// flight is skipped, bounding concurrent connections per device.
    pub async fn process_queue_tick(&self) {
        if self.tick_in_flight.swap(true, Ordering::SeqCst) {
            debug!("Queue tick already in flight, skipping");
            return;
        }
        self.tick_once().await;
        self.tick_in_flight.store(false, Ordering::SeqCst);
    }

    async fn tick_once(&self) {
        let Some(job) = self.next_job() else {
            return;
        };

        if let Err(e) = self
            .jobs
            .update_status(&job.id, JobStatus::Processing, None)
        {
            warn!(job_id = %job.id, error = %e, "Could not mark job processing");
            return;
        }

        let Some(device) = self.devices.get(&job.printer_id).map(|d| d.clone()) else {
            // Registry and routing are validated at startup, so this means
            // the job was created against a device that no longer resolves.
            error!(job_id = %job.id, printer_id = %job.printer_id, "Job references unknown device");
            let _ = self.jobs.update_status(
                &job.id,
                JobStatus::Failed,
                Some(format!("unknown device: {}", job.printer_id)),
            );
            return;
        };

        let start = Instant::now();
        let result = self
            .transport
            .send(&device, &job.payload, self.config.transport_timeout)
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) if outcome.is_success() => {
                self.on_transport_success(&job, duration_ms);
            }
            Ok(outcome) => {
                let detail = format!(
                    "incomplete transport (connected: {}, wrote: {}, closed cleanly: {})",
                    outcome.connected, outcome.wrote, outcome.closed_cleanly
                );
                self.on_transport_failure(&job, detail, DeviceStatus::Error, duration_ms);
            }
            Err(e) => {
                let status = classify_failure(&e);
                self.on_transport_failure(&job, e.to_string(), status, duration_ms);
            }
        }
    }

    /// Select the next job: due retries first (front lane), then the
    /// waiting lane re-sorted by (priority, created_at)
    fn next_job(&self) -> Option<PrintJob> {
        let now = now_millis();
        let mut lanes = self.queue.lock();

        // Retry lane: first due entry wins, regardless of priority
        let mut keep = VecDeque::new();
        let mut picked: Option<PrintJob> = None;
        while let Some(id) = lanes.retry.pop_front() {
            match self.jobs.get_job(&id) {
                Some(job)
                    if matches!(job.status, JobStatus::Pending | JobStatus::Scheduled) =>
                {
                    if picked.is_none() && job.is_due(now) {
                        picked = Some(job);
                    } else {
                        keep.push_back(id);
                    }
                }
                // Vanished, terminal or already processing: drop the slot
                _ => {}
            }
        }
        lanes.retry = keep;
        if picked.is_some() {
            return picked;
        }

        // Waiting lane: strict (priority, created_at) ordering
        let mut jobs: Vec<PrintJob> = lanes
            .waiting
            .iter()
            .filter_map(|id| self.jobs.get_job(id))
            .filter(|j| matches!(j.status, JobStatus::Pending | JobStatus::Scheduled))
            .collect();
        jobs.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
        });

        let picked_idx = jobs
            .iter()
            .position(|j| j.is_due(now) && self.device_enabled(&j.printer_id));
        let picked = picked_idx.map(|i| jobs.remove(i));
        lanes.waiting = jobs.into_iter().map(|j| j.id).collect();
        picked
    }

    fn device_enabled(&self, device_id: &str) -> bool {
        self.devices.get(device_id).map(|d| d.enabled).unwrap_or(true)
    }

    fn on_transport_success(&self, job: &PrintJob, duration_ms: u64) {
        match self.jobs.update_status(&job.id, JobStatus::Completed, None) {
            Ok(_) => info!(
                job_id = %job.id,
                printer_id = %job.printer_id,
                duration_ms,
                "Job printed"
            ),
            Err(e) => error!(job_id = %job.id, error = %e, "Could not mark job completed"),
        }

        if let Some(mut device) = self.devices.get_mut(&job.printer_id) {
            device.success_count += 1;
            device.status = DeviceStatus::Online;
        }

        self.log_attempt(job, true, None, duration_ms);
    }

    fn on_transport_failure(
        &self,
        job: &PrintJob,
        error: String,
        device_status: DeviceStatus,
        duration_ms: u64,
    ) {
        let updated = match self
            .jobs
            .update_status(&job.id, JobStatus::Failed, Some(error.clone()))
        {
            Ok(j) => j,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Could not mark job failed");
                return;
            }
        };

        if let Some(mut device) = self.devices.get_mut(&job.printer_id) {
            device.error_count += 1;
            device.status = device_status;
        }

        self.log_attempt(job, false, Some(&error), duration_ms);

        if updated.is_retryable() {
            let delay = backoff_delay_ms(self.config.base_retry_delay_ms, updated.attempts);
            let due = now_millis() + delay;
            if self.jobs.retry_job(&job.id) {
                if let Err(e) = self.jobs.schedule_job(&job.id, due) {
                    warn!(job_id = %job.id, error = %e, "Could not schedule retry");
                }
                // Front of the retry lane: soonest-recoverable bias
                self.queue.lock().retry.push_front(job.id.clone());
                info!(
                    job_id = %job.id,
                    attempts = updated.attempts,
                    retry_in_ms = delay,
                    "Job scheduled for retry"
                );
            }
        } else {
            error!(
                job_id = %job.id,
                order_number = %job.order_number,
                attempts = updated.attempts,
                error = %error,
                "Job permanently failed"
            );
            self.jobs.emit(PrintEvent::JobFailed {
                job_id: job.id.clone(),
                order_number: job.order_number.clone(),
                printer_id: job.printer_id.clone(),
                attempts: updated.attempts,
                error: Some(error),
            });
        }
    }

    fn log_attempt(&self, job: &PrintJob, success: bool, error: Option<&str>, duration_ms: u64) {
        let attempt = TransportAttempt::new(
            &job.id,
            &job.printer_id,
            &job.order_number,
            job.job_type,
            success,
            error.map(str::to_string),
            duration_ms,
        );
        if let Err(e) = self.oplog.record(&attempt) {
            // The attempt log is an operational side channel; losing one
            // entry must not affect the job lifecycle.
            warn!(job_id = %job.id, error = %e, "Could not append transport attempt");
        }
    }

    // ========== Health check ==========

    /// Probe every enabled device and update its status
    ///
    /// `printerOffline` fires only on the online -> offline transition,
    /// not on every interval while the device stays down.
    pub async fn run_health_check(&self) {
        let ids: Vec<String> = self
            .devices
            .iter()
            .filter(|d| d.enabled)
            .map(|d| d.id.clone())
            .collect();

        for id in ids {
            let Some(device) = self.devices.get(&id).map(|d| d.clone()) else {
                continue;
            };
            let reachable = self
                .transport
                .probe(&device, self.config.probe_timeout)
                .await;

            let Some(mut entry) = self.devices.get_mut(&id) else {
                continue;
            };
            let previous = entry.status;
            entry.last_check = Some(now_millis());
            entry.status = if reachable {
                DeviceStatus::Online
            } else {
                DeviceStatus::Offline
            };
            let name = entry.name.clone();
            drop(entry);

            if !reachable && previous == DeviceStatus::Online {
                warn!(printer_id = %id, "Printer went offline");
                self.jobs.emit(PrintEvent::PrinterOffline {
                    printer_id: id.clone(),
                    name,
                });
            } else if reachable
                && matches!(
                    previous,
                    DeviceStatus::Offline | DeviceStatus::Timeout | DeviceStatus::Error
                )
            {
                info!(printer_id = %id, "Printer recovered");
                self.jobs.emit(PrintEvent::PrinterRecovered {
                    printer_id: id.clone(),
                    name,
                });
            }
        }
    }

    // ========== Direct operations ==========

    /// Print a synthetic test ticket, bypassing the queue
    ///
    /// Same render + transport path as real jobs, so a passing test
    /// print validates the whole chain for a device.
    pub async fn test_print(&self, device_id: &str) -> PrintServiceResult<TransportReport> {
        let device = self
            .devices
            .get(device_id)
            .map(|d| d.clone())
            .ok_or_else(|| PrintServiceError::UnknownDevice(device_id.to_string()))?;

        let order = synthetic_order();
        let receipt = self.renderer.render_kitchen(&order, now_millis())?;

        let start = Instant::now();
        let result = self
            .transport
            .send(&device, &receipt.bytes, self.config.transport_timeout)
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let report = match result {
            Ok(outcome) if outcome.is_success() => TransportReport {
                success: true,
                duration_ms,
                error: None,
            },
            Ok(_) => TransportReport {
                success: false,
                duration_ms,
                error: Some("incomplete transport".to_string()),
            },
            Err(e) => TransportReport {
                success: false,
                duration_ms,
                error: Some(e.to_string()),
            },
        };

        if let Some(mut entry) = self.devices.get_mut(device_id) {
            if report.success {
                entry.success_count += 1;
                entry.status = DeviceStatus::Online;
            } else {
                entry.error_count += 1;
            }
        }

        let attempt = TransportAttempt::new(
            &format!("test-{}", uuid::Uuid::new_v4()),
            device_id,
            &order.order_number,
            JobType::Kitchen,
            report.success,
            report.error.clone(),
            duration_ms,
        );
        if let Err(e) = self.oplog.record(&attempt) {
            warn!(error = %e, "Could not append test-print attempt");
        }

        Ok(report)
    }

    // ========== Snapshots & admin ==========

    /// Current device registry, sorted by id
    pub fn printer_status(&self) -> Vec<PrinterDevice> {
        let mut devices: Vec<PrinterDevice> =
            self.devices.iter().map(|d| d.clone()).collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    /// Queue view: retry lane first, then waiting jobs in lane order
    pub fn queue_status(&self) -> QueueSnapshot {
        let lanes = self.queue.lock();
        let active: Vec<JobSummary> = lanes
            .retry
            .iter()
            .chain(lanes.waiting.iter())
            .filter_map(|id| self.jobs.get_job(id))
            .filter(|j| !j.is_terminal())
            .map(|j| JobSummary::from(&j))
            .collect();
        drop(lanes);

        QueueSnapshot {
            stats: self.jobs.get_queue_stats(),
            active,
        }
    }

    /// Cancel every queued (not in-flight) job; returns how many
    pub fn clear_queue(&self) -> usize {
        let ids: Vec<String> = {
            let mut lanes = self.queue.lock();
            let mut drained: Vec<String> = lanes.retry.drain(..).collect();
            drained.extend(lanes.waiting.drain(..));
            drained
        };

        let mut cancelled = 0;
        for id in ids {
            if self.jobs.cancel_job(&id, "queue cleared").is_ok() {
                cancelled += 1;
            }
        }
        info!(cancelled, "Queue cleared");
        cancelled
    }

    /// Zero success/error counters on every device
    pub fn reset_printer_stats(&self) {
        for mut device in self.devices.iter_mut() {
            device.success_count = 0;
            device.error_count = 0;
        }
        info!("Printer counters reset");
    }

    /// Re-enqueue a job's payload as a fresh job (manual reprint)
    ///
    /// Works for historical jobs too: the rendered payload is retained,
    /// so an operator can reprint after a permanent failure without the
    /// original order record.
    pub fn reprint_job(&self, job_id: &str) -> PrintServiceResult<JobSummary> {
        let source = self
            .jobs
            .get_job(job_id)
            .ok_or_else(|| PrintServiceError::Job(JobError::NotFound(job_id.to_string())))?;

        let job = self.jobs.create_job(
            &source.order_id,
            &source.order_number,
            &source.printer_id,
            source.job_type,
            source.payload.clone(),
            source.priority,
        );
        self.queue.lock().waiting.push_back(job.id.clone());

        info!(
            source_job = %job_id,
            new_job = %job.id,
            order_number = %job.order_number,
            "Job re-enqueued for manual reprint"
        );
        Ok(JobSummary::from(&job))
    }

    /// Enable or disable a device; disabled devices keep their queue
    pub fn set_device_enabled(
        &self,
        device_id: &str,
        enabled: bool,
    ) -> PrintServiceResult<PrinterDevice> {
        let mut device = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| PrintServiceError::UnknownDevice(device_id.to_string()))?;
        device.enabled = enabled;
        info!(printer_id = %device_id, enabled, "Device toggled");
        Ok(device.clone())
    }
}

/// Minimal order used by test prints and POS connection checks
pub(crate) fn synthetic_order() -> Order {
    Order {
        order_number: "TEST-PRINT".to_string(),
        customer_name: "Printer Test".to_string(),
        customer_phone: "-".to_string(),
        items: vec![OrderItem {
            name: "Test item".to_string(),
            quantity: 1,
            price: Decimal::ZERO,
            selected_size: None,
            notes: None,
        }],
        delivery_address: "-".to_string(),
        special_instructions: None,
        delivery_fee: None,
        discount: None,
        total_amount: None,
        payment_method: None,
        payment_status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::jobs::JobManagerConfig;
    use async_trait::async_trait;
    use ember_printer::{PrintError, PrintResult, TransportOutcome};
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    /// Scripted transport: named devices fail, the rest succeed
    struct MockTransport {
        failing: parking_lot::Mutex<HashSet<String>>,
        reachable: AtomicBool,
        sends: AtomicUsize,
        send_delay: Duration,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                failing: parking_lot::Mutex::new(HashSet::new()),
                reachable: AtomicBool::new(true),
                sends: AtomicUsize::new(0),
                send_delay: Duration::ZERO,
            }
        }

        fn failing_device(self, id: &str) -> Self {
            self.failing.lock().insert(id.to_string());
            self
        }

        fn with_send_delay(mut self, delay: Duration) -> Self {
            self.send_delay = delay;
            self
        }

        fn set_reachable(&self, reachable: bool) {
            self.reachable.store(reachable, Ordering::SeqCst);
        }

        fn sends(&self) -> usize {
            self.sends.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PrintTransport for MockTransport {
        async fn send(
            &self,
            device: &PrinterDevice,
            _payload: &[u8],
            _timeout: Duration,
        ) -> PrintResult<TransportOutcome> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if !self.send_delay.is_zero() {
                tokio::time::sleep(self.send_delay).await;
            }
            if self.failing.lock().contains(&device.id) {
                Err(PrintError::Connection(format!("{}: refused", device.addr())))
            } else {
                Ok(TransportOutcome {
                    connected: true,
                    wrote: true,
                    closed_cleanly: true,
                })
            }
        }

        async fn probe(&self, _device: &PrinterDevice, _timeout: Duration) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }
    }

    fn device(id: &str) -> PrinterDevice {
        PrinterDevice {
            id: id.to_string(),
            name: id.to_string(),
            ip: "192.168.1.50".to_string(),
            port: 9100,
            enabled: true,
            status: DeviceStatus::Unknown,
            last_check: None,
            success_count: 0,
            error_count: 0,
        }
    }

    fn build_service(transport: Arc<MockTransport>) -> ThermalPrinterService {
        let jobs = Arc::new(PrintJobManager::new(JobManagerConfig::default()));
        ThermalPrinterService::new(
            vec![device("kitchen"), device("bill")],
            jobs,
            ReceiptRenderer::default(),
            transport,
            AttemptLog::open_in_memory().unwrap(),
            ThermalPrinterConfig {
                base_retry_delay_ms: 10,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn test_order() -> Order {
        Order {
            order_number: "ORD000123".to_string(),
            customer_name: "Ana".to_string(),
            customer_phone: "600111222".to_string(),
            items: vec![
                OrderItem {
                    name: "Margherita".to_string(),
                    quantity: 2,
                    price: Decimal::new(1000, 2),
                    selected_size: None,
                    notes: None,
                },
                OrderItem {
                    name: "Cola".to_string(),
                    quantity: 1,
                    price: Decimal::new(550, 2),
                    selected_size: None,
                    notes: None,
                },
                OrderItem {
                    name: "Tiramisu".to_string(),
                    quantity: 1,
                    price: Decimal::new(450, 2),
                    selected_size: None,
                    notes: None,
                },
            ],
            delivery_address: "Calle Mayor 1".to_string(),
            special_instructions: None,
            delivery_fee: Some(Decimal::new(200, 2)),
            discount: Some(Decimal::new(100, 2)),
            total_amount: None,
            payment_method: Some("card".to_string()),
            payment_status: Some("paid".to_string()),
        }
    }

    /// Drive ticks until the queue drains or the tick allowance runs out
    async fn drain_queue(service: &ThermalPrinterService, max_ticks: usize) {
        for _ in 0..max_ticks {
            service.process_queue_tick().await;
            let stats = service.jobs().get_queue_stats();
            if stats.pending + stats.scheduled + stats.processing == 0 {
                return;
            }
            // Let backoff schedules come due
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
    }

    #[test]
    fn test_backoff_formula() {
        // maxAttempts=3, baseDelay=1000: delays before attempts 2 and 3
        assert_eq!(backoff_delay_ms(1000, 1), 1000);
        assert_eq!(backoff_delay_ms(1000, 2), 2000);
        assert_eq!(backoff_delay_ms(500, 3), 2000);
    }

    #[test]
    fn test_unknown_routed_device_fails_fast() {
        let jobs = Arc::new(PrintJobManager::default());
        let result = ThermalPrinterService::new(
            vec![device("kitchen")],
            jobs,
            ReceiptRenderer::default(),
            Arc::new(MockTransport::new()),
            AttemptLog::open_in_memory().unwrap(),
            ThermalPrinterConfig::default(),
        );
        assert!(matches!(result, Err(PrintServiceError::UnknownDevice(id)) if id == "bill"));
    }

    #[tokio::test]
    async fn test_end_to_end_kitchen_fails_bill_succeeds() {
        let transport = Arc::new(MockTransport::new().failing_device("kitchen"));
        let service = build_service(transport.clone());

        let created = service
            .add_print_job(&test_order(), JobTypeSelector::Both)
            .unwrap();
        assert_eq!(created.len(), 2);

        drain_queue(&service, 20).await;

        // Kitchen permanently failed after 3 attempts, bill completed in 1
        let stats = service.jobs().get_stats_by_printer();
        assert_eq!(stats["kitchen"].failed, 1);
        assert_eq!(stats["kitchen"].completed, 0);
        assert_eq!(stats["bill"].completed, 1);
        assert_eq!(stats["bill"].failed, 0);

        let kitchen_job = service
            .jobs()
            .jobs_snapshot(Some(JobStatus::Failed), Some("kitchen"), 10);
        assert_eq!(kitchen_job.len(), 1);
        assert_eq!(kitchen_job[0].attempts, 3);

        // 3 kitchen attempts + 1 bill attempt on the wire
        assert_eq!(transport.sends(), 4);
    }

    #[tokio::test]
    async fn test_retry_scheduled_with_backoff() {
        let transport = Arc::new(MockTransport::new().failing_device("kitchen"));
        let service = build_service(transport);

        service
            .add_print_job(&test_order(), JobTypeSelector::Kitchen)
            .unwrap();
        service.process_queue_tick().await;

        let ready = service.jobs().get_ready_jobs();
        assert!(ready.is_empty(), "retry must not be due immediately");

        let summaries = service
            .jobs()
            .jobs_snapshot(Some(JobStatus::Scheduled), None, 10);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].attempts, 1);

        let scheduled = service.jobs().get_job(&summaries[0].id).unwrap();
        let delay = scheduled.scheduled_for.unwrap() - scheduled.failed_at.unwrap();
        // base 10ms, first retry: ~10ms
        assert!((10..=30).contains(&delay), "delay was {}", delay);
    }

    #[tokio::test]
    async fn test_single_flight_guard_skips_overlapping_ticks() {
        let transport = Arc::new(
            MockTransport::new().with_send_delay(Duration::from_millis(50)),
        );
        let service = Arc::new(build_service(transport.clone()));

        service
            .add_print_job(&test_order(), JobTypeSelector::Both)
            .unwrap();

        let a = {
            let s = service.clone();
            tokio::spawn(async move { s.process_queue_tick().await })
        };
        let b = {
            let s = service.clone();
            tokio::spawn(async move { s.process_queue_tick().await })
        };
        let _ = tokio::join!(a, b);

        // One tick transported, the overlapping one was skipped
        assert_eq!(transport.sends(), 1);
        assert_eq!(service.jobs().get_queue_stats().completed, 1);
    }

    #[tokio::test]
    async fn test_kitchen_processed_before_bill() {
        let transport = Arc::new(MockTransport::new());
        let service = build_service(transport);

        // Enqueue bill first; kitchen must still print first
        service
            .add_print_job(&test_order(), JobTypeSelector::Bill)
            .unwrap();
        service
            .add_print_job(&test_order(), JobTypeSelector::Kitchen)
            .unwrap();

        service.process_queue_tick().await;

        let stats = service.jobs().get_stats_by_printer();
        assert_eq!(stats["kitchen"].completed, 1);
        assert_eq!(stats["bill"].pending, 1);
    }

    #[tokio::test]
    async fn test_health_check_emits_offline_once() {
        let transport = Arc::new(MockTransport::new());
        let service = build_service(transport.clone());
        let mut events = service.jobs().subscribe();

        service.run_health_check().await;

        transport.set_reachable(false);
        service.run_health_check().await;
        service.run_health_check().await;

        transport.set_reachable(true);
        service.run_health_check().await;

        let mut offline = 0;
        let mut recovered = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                PrintEvent::PrinterOffline { printer_id, .. } if printer_id == "kitchen" => {
                    offline += 1
                }
                PrintEvent::PrinterRecovered { printer_id, .. } if printer_id == "kitchen" => {
                    recovered += 1
                }
                _ => {}
            }
        }
        assert_eq!(offline, 1, "printerOffline must fire once per outage");
        assert_eq!(recovered, 1);

        let kitchen = service
            .printer_status()
            .into_iter()
            .find(|d| d.id == "kitchen")
            .unwrap();
        assert_eq!(kitchen.status, DeviceStatus::Online);
        assert!(kitchen.last_check.is_some());
    }

    #[tokio::test]
    async fn test_offline_device_still_accepts_jobs() {
        let transport = Arc::new(MockTransport::new().failing_device("kitchen"));
        let service = build_service(transport.clone());

        transport.set_reachable(false);
        service.run_health_check().await;

        // Enqueue against the offline device: must not error
        let created = service
            .add_print_job(&test_order(), JobTypeSelector::Kitchen)
            .unwrap();
        assert_eq!(created.len(), 1);

        // Device recovers; queue drains
        transport.failing.lock().clear();
        transport.set_reachable(true);
        drain_queue(&service, 10).await;

        assert_eq!(service.jobs().get_queue_stats().completed, 1);
    }

    #[tokio::test]
    async fn test_formatting_failure_aborts_only_that_type() {
        let transport = Arc::new(MockTransport::new());
        let service = build_service(transport);

        // No billing fields: bill rendering fails, kitchen proceeds
        let mut order = test_order();
        order.delivery_fee = None;
        order.discount = None;
        order.total_amount = None;
        order.payment_method = None;
        order.payment_status = None;

        let created = service
            .add_print_job(&order, JobTypeSelector::Both)
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].job_type, JobType::Kitchen);

        // A bill-only request for the same order surfaces the error
        assert!(matches!(
            service.add_print_job(&order, JobTypeSelector::Bill),
            Err(PrintServiceError::Render(RenderError::MissingBilling))
        ));
    }

    #[tokio::test]
    async fn test_test_print_bypasses_queue() {
        let transport = Arc::new(MockTransport::new());
        let service = build_service(transport.clone());

        let report = service.test_print("kitchen").await.unwrap();
        assert!(report.success);
        assert_eq!(transport.sends(), 1);
        // Nothing was enqueued
        assert_eq!(service.queue_status().active.len(), 0);

        assert!(matches!(
            service.test_print("nope").await,
            Err(PrintServiceError::UnknownDevice(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_queue_and_reset_stats() {
        let transport = Arc::new(MockTransport::new());
        let service = build_service(transport);

        service
            .add_print_job(&test_order(), JobTypeSelector::Both)
            .unwrap();
        assert_eq!(service.queue_status().active.len(), 2);

        let cancelled = service.clear_queue();
        assert_eq!(cancelled, 2);
        assert_eq!(service.queue_status().active.len(), 0);

        service.reset_printer_stats();
        for device in service.printer_status() {
            assert_eq!(device.success_count, 0);
            assert_eq!(device.error_count, 0);
        }
    }

    #[tokio::test]
    async fn test_disabled_device_keeps_jobs_queued() {
        let transport = Arc::new(MockTransport::new());
        let service = build_service(transport.clone());

        service.set_device_enabled("kitchen", false).unwrap();
        service
            .add_print_job(&test_order(), JobTypeSelector::Kitchen)
            .unwrap();

        service.process_queue_tick().await;
        assert_eq!(transport.sends(), 0);
        assert_eq!(service.queue_status().active.len(), 1);

        service.set_device_enabled("kitchen", true).unwrap();
        service.process_queue_tick().await;
        assert_eq!(service.jobs().get_queue_stats().completed, 1);
    }
}
