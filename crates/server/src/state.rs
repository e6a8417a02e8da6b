// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{JobConfig, ToolConfig};
use crate::jobs::JobRunner;
use crate::probe::MetadataProbe;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Download jobs.
    pub jobs: Arc<JobRunner>,
    /// Metadata lookups for `/api/info`.
    pub probe: MetadataProbe,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(jobs: JobConfig, tool: ToolConfig, probe_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            probe: MetadataProbe::new(tool.clone(), probe_timeout),
            jobs: Arc::new(JobRunner::new(jobs, tool)),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
