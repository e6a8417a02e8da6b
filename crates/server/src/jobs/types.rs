// crates/server/src/jobs/types.rs
//! Types for the download job system.

use std::fmt;

use chrono::{DateTime, Utc};
use mediadl_core::{MediaKind, Stage};
use serde::{Deserialize, Serialize};

/// Route prefix under which finished artifacts are served.
pub const ARTIFACT_ROUTE_PREFIX: &str = "/api/download";

/// Message carried by the terminal event of a canceled job.
pub const CANCELED_MESSAGE: &str = "download canceled";

/// Opaque, unguessable job identifier (UUIDv4, simple hex form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a job. Everything except `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
        }
    }
}

/// Point-in-time view of a job. Fields may come from slightly different
/// moments relative to concurrent writers.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub kind: MediaKind,
    pub state: JobState,
    pub percent: u8,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// File name of the resolved artifact, once succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Result of a cancel request on an existing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Canceled,
    /// The job had already reached this terminal state; nothing changed.
    AlreadyFinished(JobState),
}

impl CancelOutcome {
    /// State the job is in after the request.
    pub fn state(self) -> JobState {
        match self {
            CancelOutcome::Canceled => JobState::Canceled,
            CancelOutcome::AlreadyFinished(state) => state,
        }
    }
}

/// One event of a job's progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Progress(u8),
    Stage(Stage),
    /// Terminal: carries the retrieval location of the artifact.
    Ready(String),
    /// Terminal: the job failed with this message.
    Error(String),
    /// Terminal: the job was canceled.
    Canceled,
}

impl ProgressEvent {
    /// Event name on the wire; `None` for plain data events.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            ProgressEvent::Progress(_) => None,
            ProgressEvent::Stage(_) => Some("stage"),
            ProgressEvent::Ready(_) => Some("ready"),
            ProgressEvent::Error(_) | ProgressEvent::Canceled => Some("error"),
        }
    }

    pub fn data(&self) -> String {
        match self {
            ProgressEvent::Progress(pct) => pct.to_string(),
            ProgressEvent::Stage(stage) => stage.label().to_string(),
            ProgressEvent::Ready(location) => location.clone(),
            ProgressEvent::Error(msg) => msg.clone(),
            ProgressEvent::Canceled => CANCELED_MESSAGE.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Ready(_) | ProgressEvent::Error(_) | ProgressEvent::Canceled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_generate_is_unique_hex() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Canceled.is_terminal());
    }

    #[test]
    fn test_progress_event_wire_shape() {
        assert_eq!(ProgressEvent::Progress(42).name(), None);
        assert_eq!(ProgressEvent::Progress(42).data(), "42");
        assert_eq!(
            ProgressEvent::Stage(Stage::Merging).name(),
            Some("stage")
        );
        assert_eq!(ProgressEvent::Stage(Stage::Merging).data(), "merging");
        assert_eq!(ProgressEvent::Canceled.name(), Some("error"));
        assert_eq!(ProgressEvent::Canceled.data(), CANCELED_MESSAGE);
        assert!(ProgressEvent::Ready("/api/download/x".into()).is_terminal());
        assert!(!ProgressEvent::Stage(Stage::Completed).is_terminal());
    }

    #[test]
    fn test_snapshot_serialize() {
        let snap = JobSnapshot {
            id: JobId::from("abc"),
            kind: MediaKind::Audio,
            state: JobState::Running,
            percent: 50,
            stage: Stage::DownloadingAudio,
            error: None,
            artifact: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["kind"], "audio");
        assert_eq!(json["state"], "running");
        assert_eq!(json["stage"], "downloading audio");
        assert!(json.get("error").is_none());
    }
}
