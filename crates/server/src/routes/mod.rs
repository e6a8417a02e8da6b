//! API route handlers for the mediadl server.

pub mod health;
pub mod info;
pub mod jobs;
pub mod metrics;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router with all API routes under the /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/info - Media metadata lookup
/// - POST /api/download - Submit a download job
/// - GET  /api/download/{id} - Fetch a finished job's file
/// - POST /api/cancel/{id} - Cancel a job
/// - GET  /api/progress/{id} - SSE stream of one job's progress
/// - GET  /api/jobs - Active jobs
/// - GET  /api/jobs/{id} - One job's snapshot
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", info::router())
        .nest("/api", jobs::router())
        .merge(metrics::router())
        .with_state(state)
}
