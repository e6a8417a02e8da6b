// crates/server/src/lib.rs
//! mediadl server library.
//!
//! Axum-based HTTP service that runs download jobs through an external
//! yt-dlp compatible tool and streams their progress to the browser.

pub mod config;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod probe;
pub mod routes;
pub mod state;

pub use config::{Config, JobConfig, ToolConfig};
pub use error::*;
pub use metrics::{init_metrics, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, info, jobs, progress, downloads, metrics)
/// - CORS (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
