// crates/server/src/jobs/error.rs
use std::path::PathBuf;
use std::time::Duration;

use mediadl_core::{CookieError, MediaInfoError, RequestError};
use thiserror::Error;

use super::types::JobId;

/// Errors of the job layer. Per-job failures end up as the job's error
/// message; only `InvalidInput` and `NotFound` reach callers directly.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] RequestError),

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("cookie conversion failed: {0}")]
    CredentialConversion(#[from] CookieError),

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", process_message(.code, .diagnostic))]
    Process {
        code: Option<i32>,
        diagnostic: String,
    },

    #[error("no output file produced")]
    ArtifactMissing,

    #[error("download canceled")]
    Canceled,

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata probe failed: {0}")]
    Probe(String),

    #[error("metadata probe timed out after {}ms", .0.as_millis())]
    ProbeTimeout(Duration),

    #[error(transparent)]
    Metadata(#[from] MediaInfoError),
}

fn process_message(code: &Option<i32>, diagnostic: &str) -> String {
    match (diagnostic.is_empty(), code) {
        (false, _) => diagnostic.to_string(),
        (true, Some(code)) => format!("download tool exited with status {code}"),
        (true, None) => "download tool terminated by signal".to_string(),
    }
}

impl JobError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
