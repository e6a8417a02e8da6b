// crates/server/src/jobs/runner.rs
//! Central job runner: the operations the HTTP layer calls into.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mediadl_core::DownloadRequest;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use super::error::JobError;
use super::orchestrator::JobOrchestrator;
use super::store::JobStore;
use super::stream::progress_stream;
use super::supervisor::ProcessSupervisor;
use super::types::{CancelOutcome, JobId, JobSnapshot, JobState, ProgressEvent};
use crate::config::{JobConfig, ToolConfig};
use crate::metrics::{record_job_finished, record_job_submitted};

/// Central job runner that manages all download jobs.
///
/// Thread-safe via `Arc` wrapping. Call `submit` to start a job in the
/// background and `progress` to follow it.
pub struct JobRunner {
    store: Arc<JobStore>,
    orchestrator: Arc<JobOrchestrator>,
    poll_interval: Duration,
}

impl JobRunner {
    pub fn new(config: JobConfig, tool: ToolConfig) -> Self {
        let store = Arc::new(JobStore::new());
        let poll_interval = config.poll_interval;
        let orchestrator = Arc::new(JobOrchestrator::new(
            Arc::clone(&store),
            ProcessSupervisor::new(tool),
            config,
        ));
        Self {
            store,
            orchestrator,
            poll_interval,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Validate `request`, register a job and start it in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, request: DownloadRequest) -> Result<JobId, JobError> {
        request.validate()?;

        let id = self.store.create(request.kind);
        record_job_submitted(request.kind);
        tracing::debug!(job_id = %id, kind = %request.kind, "job submitted");

        let orchestrator = Arc::clone(&self.orchestrator);
        let task_id = id.clone();
        let task = tokio::spawn(async move { orchestrator.run(task_id, request).await });

        // A panic inside the job must still leave it terminal.
        let store = Arc::clone(&self.store);
        let watch_id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = task.await {
                tracing::error!(job_id = %watch_id, error = %e, "job task aborted");
                if store.fail(&watch_id, format!("internal error: {e}")) {
                    record_job_finished(JobState::Failed, Duration::ZERO);
                }
            }
        });

        Ok(id)
    }

    pub fn cancel(&self, id: &JobId) -> Result<CancelOutcome, JobError> {
        let outcome = self
            .store
            .cancel(id)
            .ok_or_else(|| JobError::NotFound(id.clone()))?;
        tracing::info!(job_id = %id, outcome = ?outcome, "cancel requested");
        Ok(outcome)
    }

    /// Live events for job `id`, ending at its terminal event or when
    /// `cancel` fires.
    pub fn progress(
        &self,
        id: &JobId,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = ProgressEvent> + Send + 'static, JobError> {
        if !self.store.contains(id) {
            return Err(JobError::NotFound(id.clone()));
        }
        Ok(progress_stream(
            Arc::clone(&self.store),
            id.clone(),
            self.poll_interval,
            cancel,
        ))
    }

    /// Path of the finished artifact. `NotFound` unless the job succeeded.
    pub fn artifact(&self, id: &JobId) -> Result<PathBuf, JobError> {
        self.store
            .artifact(id)
            .ok_or_else(|| JobError::NotFound(id.clone()))
    }

    pub fn get_job(&self, id: &JobId) -> Option<JobSnapshot> {
        self.store.get(id)
    }

    /// All jobs that have not reached a terminal state.
    pub fn active_jobs(&self) -> Vec<JobSnapshot> {
        self.store
            .list()
            .into_iter()
            .filter(|s| !s.state.is_terminal())
            .collect()
    }
}
