//! Admin HTTP API
//!
//! Thin operational surface over the printing services: live status and
//! queue views, force-tick, manual reprint, device toggling. The
//! customer-facing route layer lives elsewhere; order placement reaches
//! printing through `POST /api/print-order` fire-and-forget.

pub mod printing;

use crate::core::ServerState;
use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/health", get(printing::handler::health))
        .route("/api/print-order", post(printing::handler::print_order))
        .route("/api/printers", get(printing::handler::list_printers))
        .route(
            "/api/printers/reset-stats",
            post(printing::handler::reset_printer_stats),
        )
        .route(
            "/api/printers/{id}/enabled",
            put(printing::handler::set_printer_enabled),
        )
        .route(
            "/api/printers/{id}/test-print",
            post(printing::handler::test_print),
        )
        .route(
            "/api/queue",
            get(printing::handler::queue_status).delete(printing::handler::clear_queue),
        )
        .route("/api/queue/tick", post(printing::handler::force_tick))
        .route("/api/jobs", get(printing::handler::list_jobs))
        .route("/api/jobs/{id}", get(printing::handler::get_job))
        .route("/api/jobs/{id}/cancel", post(printing::handler::cancel_job))
        .route("/api/jobs/{id}/reprint", post(printing::handler::reprint_job))
        .route("/api/stats", get(printing::handler::stats))
        .route("/api/attempts", get(printing::handler::list_attempts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
