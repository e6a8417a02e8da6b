// crates/server/src/jobs/orchestrator.rs
//! Per-job lifecycle: build the invocation, run the tool, parse its output,
//! resolve the artifact and record the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use mediadl_core::cookies::{write_cookie_file, COOKIE_FILE_NAME};
use mediadl_core::invocation::download_args;
use mediadl_core::{DownloadRequest, MediaKind};
use walkdir::WalkDir;

use super::error::JobError;
use super::parser::{parse_stream, ParseOutcome};
use super::store::JobStore;
use super::supervisor::ProcessSupervisor;
use super::types::{JobId, JobState};
use crate::config::JobConfig;
use crate::metrics::record_job_finished;

/// How long to wait for the output readers after the process has exited.
const PARSER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum length of the diagnostic stored on a failed job.
const DIAGNOSTIC_MAX_CHARS: usize = 1000;

const TEMP_SUFFIXES: &[&str] = &[".part", ".ytdl"];

/// Removes the per-job cookie file on every exit path.
struct CookieFileGuard(Option<PathBuf>);

impl Drop for CookieFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove cookie file")
                }
            }
        }
    }
}

pub struct JobOrchestrator {
    store: Arc<JobStore>,
    supervisor: ProcessSupervisor,
    config: JobConfig,
}

impl JobOrchestrator {
    pub fn new(store: Arc<JobStore>, supervisor: ProcessSupervisor, config: JobConfig) -> Self {
        Self {
            store,
            supervisor,
            config,
        }
    }

    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.config.downloads_dir.join(id.as_str())
    }

    /// Drive job `id` to a terminal state. All results land in the store.
    pub async fn run(&self, id: JobId, request: DownloadRequest) {
        let started = Instant::now();
        tracing::info!(job_id = %id, kind = %request.kind, url = %request.url, "job started");

        match self.execute(&id, &request).await {
            Ok(artifact) => {
                tracing::info!(job_id = %id, artifact = %artifact.display(), "job succeeded");
                if !self.store.finish(&id, artifact) {
                    tracing::info!(job_id = %id, "completion suppressed, job already terminal");
                }
            }
            Err(JobError::Canceled) => {
                tracing::info!(job_id = %id, "job canceled");
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "job failed");
                self.store.fail(&id, e.to_string());
            }
        }

        let outcome = self.store.state(&id).unwrap_or(JobState::Failed);
        record_job_finished(outcome, started.elapsed());
    }

    async fn execute(&self, id: &JobId, request: &DownloadRequest) -> Result<PathBuf, JobError> {
        let job_dir = self.job_dir(id);
        tokio::fs::create_dir_all(&job_dir)
            .await
            .map_err(|e| JobError::io(&job_dir, e))?;
        let job_dir = tokio::fs::canonicalize(&job_dir)
            .await
            .map_err(|e| JobError::io(&job_dir, e))?;

        self.store.set_stage(id, request.kind.initial_stage());

        let cookie_file = match request.cookies.as_deref() {
            Some(raw) => write_cookie_file(raw, &job_dir)?,
            None => None,
        };
        let cookie_guard = CookieFileGuard(cookie_file.clone());

        if self.store.is_canceled(id) {
            return Err(JobError::Canceled);
        }

        let args = download_args(request, &job_dir, cookie_file.as_deref());
        tracing::debug!(job_id = %id, program = %self.supervisor.program(), ?args, "launching download tool");
        let mut process = self.supervisor.launch(&args, &job_dir)?;

        let handle = process.handle();
        if !self.store.attach_process(id, handle.clone()) {
            handle.kill();
        }

        let stdout = process.take_stdout().map(|out| {
            tokio::spawn(parse_stream(self.store.clone(), id.clone(), out, "stdout"))
        });
        let stderr = process.take_stderr().map(|err| {
            tokio::spawn(parse_stream(self.store.clone(), id.clone(), err, "stderr"))
        });

        let status = process.wait().await;

        let stdout = drain(id, stdout).await;
        let stderr = drain(id, stderr).await;
        drop(cookie_guard);

        if self.store.is_canceled(id) {
            return Err(JobError::Canceled);
        }

        let status = status.map_err(|e| JobError::io(&job_dir, e))?;
        if !status.success() {
            return Err(JobError::Process {
                code: status.code(),
                diagnostic: diagnostic(&stderr, &stdout),
            });
        }

        let kind = request.kind;
        let dir = job_dir.clone();
        let artifact = tokio::task::spawn_blocking(move || find_artifact(&dir, kind))
            .await
            .map_err(|e| JobError::io(&job_dir, std::io::Error::other(e)))?
            .ok_or(JobError::ArtifactMissing)?;

        wait_until_stable(&artifact, self.config.settle_interval).await;
        Ok(artifact)
    }
}

async fn drain(
    id: &JobId,
    task: Option<tokio::task::JoinHandle<ParseOutcome>>,
) -> ParseOutcome {
    let Some(task) = task else {
        return ParseOutcome::default();
    };
    match tokio::time::timeout(PARSER_DRAIN_TIMEOUT, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            tracing::error!(job_id = %id, error = %e, "output reader task failed");
            ParseOutcome::default()
        }
        Err(_) => {
            tracing::warn!(job_id = %id, "output reader still open after exit, detaching");
            ParseOutcome::default()
        }
    }
}

/// Failure text: the error stream's tail, else standard output's, keeping
/// the end when it is too long.
fn diagnostic(stderr: &ParseOutcome, stdout: &ParseOutcome) -> String {
    let text = match stderr.diagnostic() {
        s if s.is_empty() => stdout.diagnostic(),
        s => s,
    };
    let count = text.chars().count();
    if count <= DIAGNOSTIC_MAX_CHARS {
        return text;
    }
    text.chars().skip(count - DIAGNOSTIC_MAX_CHARS).collect()
}

fn is_candidate(path: &Path, kind: MediaKind) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    if name == COOKIE_FILE_NAME || TEMP_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return false;
    }
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| kind.artifact_extensions().contains(&ext.as_str()))
}

/// Most recently modified file in `dir` with an extension matching `kind`.
pub fn find_artifact(dir: &Path, kind: MediaKind) -> Option<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_candidate(entry.path(), kind))
        .map(|entry| {
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.into_path())
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

/// Give a file that may still be flushing a chance to settle: sample its
/// size, wait, sample again, and wait once more if it grew.
pub async fn wait_until_stable(path: &Path, interval: Duration) {
    let size = |p: &Path| std::fs::metadata(p).map(|m| m.len()).ok();

    let before = size(path);
    tokio::time::sleep(interval).await;
    let after = size(path);
    if before != after {
        tracing::debug!(path = %path.display(), ?before, ?after, "artifact still growing");
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fs;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_find_artifact_skips_temporaries_and_cookies() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "clip.mp4.part");
        touch(dir.path(), "clip.f137.mp4.ytdl");
        touch(dir.path(), COOKIE_FILE_NAME);
        touch(dir.path(), "clip.en.vtt");
        assert_eq!(find_artifact(dir.path(), MediaKind::Video), None);

        let clip = touch(dir.path(), "nested/clip_1280x720.MP4");
        assert_eq!(find_artifact(dir.path(), MediaKind::Video), Some(clip));
    }

    #[test]
    fn test_find_artifact_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let srt = touch(dir.path(), "clip_en.srt");
        let thumb = touch(dir.path(), "clip_thumb.webp");
        touch(dir.path(), "clip.mp4");

        assert_eq!(find_artifact(dir.path(), MediaKind::Subs), Some(srt));
        assert_eq!(find_artifact(dir.path(), MediaKind::Thumb), Some(thumb));
        assert_eq!(find_artifact(dir.path(), MediaKind::Audio), None);
    }

    #[test]
    fn test_find_artifact_prefers_newest() {
        let dir = tempfile::tempdir().unwrap();
        let old = touch(dir.path(), "old.mp3");
        let new = touch(dir.path(), "new.mp3");
        let earlier = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(earlier)
            .unwrap();

        assert_eq!(find_artifact(dir.path(), MediaKind::Audio), Some(new));
    }

    #[test]
    fn test_diagnostic_prefers_stderr_and_keeps_tail() {
        let mut out = ParseOutcome::default();
        out.tail = VecDeque::from(vec!["progress".to_string()]);
        let mut err = ParseOutcome::default();
        assert_eq!(diagnostic(&err, &out), "progress");

        err.tail = VecDeque::from(vec!["x".repeat(1500), "ERROR: final".to_string()]);
        let text = diagnostic(&err, &out);
        assert_eq!(text.chars().count(), DIAGNOSTIC_MAX_CHARS);
        assert!(text.ends_with("ERROR: final"));
    }

    #[tokio::test]
    async fn test_wait_until_stable_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let start = Instant::now();
        wait_until_stable(&dir.path().join("gone.mp4"), Duration::from_millis(10)).await;
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_cookie_guard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), COOKIE_FILE_NAME);
        drop(CookieFileGuard(Some(path.clone())));
        assert!(!path.exists());
        drop(CookieFileGuard(Some(path)));
    }
}
