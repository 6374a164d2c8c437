//! Printing API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::error::{Result, ServerError};
use crate::core::ServerState;
use crate::printing::{AttemptLogStats, PrintOutcome, TransportAttempt};
use shared::models::{
    JobStatus, JobSummary, JobTypeSelector, Order, PrintJob, PrinterDevice, PrinterJobStats,
    QueueSnapshot, QueueStats,
};

const DEFAULT_LIST_LIMIT: usize = 100;
const RECENT_ACTIVITY_WINDOW_MS: i64 = 15 * 60 * 1000;

/// Direct-mode-only operations need the thermal service
fn thermal(state: &ServerState) -> Result<&std::sync::Arc<crate::printing::ThermalPrinterService>> {
    state.thermal.as_ref().ok_or_else(|| {
        ServerError::Validation(format!(
            "operation requires direct printing (backend is '{}')",
            state.hybrid.backend_name()
        ))
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
}

/// GET /api/health
pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: state.hybrid.backend_name(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintOrderRequest {
    pub order: Order,
    #[serde(default = "default_selector")]
    pub job_type: JobTypeSelector,
}

fn default_selector() -> JobTypeSelector {
    JobTypeSelector::Both
}

/// POST /api/print-order - the inbound entry point
///
/// Always answers 200 with a structured outcome: printing failures must
/// never abort order placement upstream.
pub async fn print_order(
    State(state): State<ServerState>,
    Json(payload): Json<PrintOrderRequest>,
) -> Json<PrintOutcome> {
    Json(state.hybrid.print_order(&payload.order, payload.job_type).await)
}

/// GET /api/printers - device registry with live status
pub async fn list_printers(State(state): State<ServerState>) -> Json<Vec<PrinterDevice>> {
    Json(state.hybrid.printer_status())
}

#[derive(Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

/// PUT /api/printers/{id}/enabled - enable/disable a device
pub async fn set_printer_enabled(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<SetEnabledRequest>,
) -> Result<Json<PrinterDevice>> {
    let device = thermal(&state)?.set_device_enabled(&id, payload.enabled)?;
    Ok(Json(device))
}

/// POST /api/printers/reset-stats - zero all device counters
pub async fn reset_printer_stats(State(state): State<ServerState>) -> Result<Json<bool>> {
    thermal(&state)?.reset_printer_stats();
    Ok(Json(true))
}

/// POST /api/printers/{id}/test-print
pub async fn test_print(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Json<PrintOutcome> {
    Json(state.hybrid.test_print(&id).await)
}

/// GET /api/queue
pub async fn queue_status(State(state): State<ServerState>) -> Json<QueueSnapshot> {
    Json(state.hybrid.queue_status())
}

/// DELETE /api/queue - cancel everything queued
pub async fn clear_queue(State(state): State<ServerState>) -> Result<Json<usize>> {
    Ok(Json(thermal(&state)?.clear_queue()))
}

/// POST /api/queue/tick - run one tick now (skipped if one is in flight)
pub async fn force_tick(State(state): State<ServerState>) -> Result<Json<bool>> {
    thermal(&state)?.process_queue_tick().await;
    Ok(Json(true))
}

#[derive(Deserialize)]
pub struct JobsQuery {
    pub status: Option<JobStatus>,
    pub printer: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/jobs - filtered job history (active + terminal)
pub async fn list_jobs(
    State(state): State<ServerState>,
    Query(query): Query<JobsQuery>,
) -> Json<Vec<JobSummary>> {
    Json(state.jobs.jobs_snapshot(
        query.status,
        query.printer.as_deref(),
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    ))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<PrintJob>> {
    let job = state
        .jobs
        .get_job(&id)
        .ok_or_else(|| ServerError::NotFound(format!("job {}", id)))?;
    Ok(Json(job))
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// POST /api/jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Json<bool>> {
    let reason = payload
        .and_then(|Json(p)| p.reason)
        .unwrap_or_else(|| "operator request".to_string());
    state.jobs.cancel_job(&id, &reason)?;
    Ok(Json(true))
}

/// POST /api/jobs/{id}/reprint - re-enqueue a job's payload
pub async fn reprint_job(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<JobSummary>> {
    let summary = thermal(&state)?.reprint_job(&id)?;
    Ok(Json(summary))
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub queue: QueueStats,
    pub by_printer: HashMap<String, PrinterJobStats>,
    pub recent_activity: Vec<JobSummary>,
    pub attempts: AttemptLogStats,
}

/// GET /api/stats - aggregate view for the dashboard
pub async fn stats(State(state): State<ServerState>) -> Result<Json<StatsResponse>> {
    let attempts = state
        .oplog
        .stats()
        .map_err(|e| ServerError::Internal(e.into()))?;

    Ok(Json(StatsResponse {
        queue: state.jobs.get_queue_stats(),
        by_printer: state.jobs.get_stats_by_printer(),
        recent_activity: state.jobs.get_recent_activity(RECENT_ACTIVITY_WINDOW_MS),
        attempts,
    }))
}

#[derive(Deserialize)]
pub struct AttemptsQuery {
    pub limit: Option<usize>,
}

/// GET /api/attempts - the durable transport attempt log, newest first
pub async fn list_attempts(
    State(state): State<ServerState>,
    Query(query): Query<AttemptsQuery>,
) -> Result<Json<Vec<TransportAttempt>>> {
    let attempts = state
        .oplog
        .recent(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .map_err(|e| ServerError::Internal(e.into()))?;
    Ok(Json(attempts))
}
