// crates/server/src/jobs/store.rs
//! In-memory job table. The single source of truth for job status.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use mediadl_core::{LineObservation, MediaKind, Stage};
use tokio::sync::watch;

use super::supervisor::ProcessHandle;
use super::types::{CancelOutcome, JobId, JobSnapshot, JobState};

/// Mutable record of one job.
#[derive(Debug)]
struct Job {
    id: JobId,
    kind: MediaKind,
    percent: u8,
    stage: Stage,
    error: Option<String>,
    canceled: bool,
    ready: bool,
    artifact: Option<PathBuf>,
    process: Option<ProcessHandle>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(id: JobId, kind: MediaKind) -> Self {
        Self {
            id,
            kind,
            percent: 0,
            stage: kind.initial_stage(),
            error: None,
            canceled: false,
            ready: false,
            artifact: None,
            process: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    fn state(&self) -> JobState {
        if self.error.is_some() {
            JobState::Failed
        } else if self.canceled {
            JobState::Canceled
        } else if self.ready {
            JobState::Succeeded
        } else {
            JobState::Running
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            state: self.state(),
            percent: self.percent,
            stage: self.stage,
            error: self.error.clone(),
            artifact: self
                .artifact
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }

    fn close(&mut self) {
        self.process = None;
        self.finished_at = Some(Utc::now());
    }
}

/// Concurrency-safe map of jobs.
///
/// Readers share the lock; every mutation takes it exclusively and bumps a
/// generation counter that progress streams can await instead of sleeping.
/// Once a job is terminal all further mutations are ignored.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    generation: watch::Sender<u64>,
}

impl JobStore {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            jobs: RwLock::new(HashMap::new()),
            generation,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        self.jobs.read().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned reading jobs map: {e}");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        self.jobs.write().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned writing jobs map: {e}");
            e.into_inner()
        })
    }

    fn notify(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    /// Register a new running job with a fresh id.
    pub fn create(&self, kind: MediaKind) -> JobId {
        let mut jobs = self.write();
        let id = loop {
            let id = JobId::generate();
            if !jobs.contains_key(&id) {
                break id;
            }
        };
        jobs.insert(id.clone(), Job::new(id.clone(), kind));
        drop(jobs);
        self.notify();
        id
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.read().contains_key(id)
    }

    pub fn get(&self, id: &JobId) -> Option<JobSnapshot> {
        self.read().get(id).map(Job::snapshot)
    }

    pub fn state(&self, id: &JobId) -> Option<JobState> {
        self.read().get(id).map(Job::state)
    }

    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut all: Vec<JobSnapshot> = self.read().values().map(Job::snapshot).collect();
        all.sort_by_key(|s| s.created_at);
        all
    }

    /// Wakes whenever any job changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Apply `f` to a running job under the write lock. Returns `None` for
    /// unknown or terminal jobs.
    fn mutate<R>(&self, id: &JobId, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let mut jobs = self.write();
        let job = jobs.get_mut(id)?;
        if job.state().is_terminal() {
            return None;
        }
        let out = f(job);
        drop(jobs);
        self.notify();
        Some(out)
    }

    pub fn set_percent(&self, id: &JobId, percent: u8) {
        if percent > 100 {
            return;
        }
        self.mutate(id, |job| job.percent = percent);
    }

    /// Returns true only when the stage actually changed.
    pub fn set_stage(&self, id: &JobId, stage: Stage) -> bool {
        {
            let jobs = self.read();
            match jobs.get(id) {
                Some(job) if job.stage != stage && !job.state().is_terminal() => {}
                _ => return false,
            }
        }
        self.mutate(id, |job| {
            let changed = job.stage != stage;
            job.stage = stage;
            changed
        })
        .unwrap_or(false)
    }

    /// Feed one parsed output line into the job.
    pub fn observe(&self, id: &JobId, obs: LineObservation) {
        if let Some(stage) = obs.stage {
            self.set_stage(id, stage);
        }
        if let Some(percent) = obs.percent {
            self.set_percent(id, percent);
        }
    }

    /// Store the process handle. Returns false when the job is no longer
    /// running, in which case the caller owns killing the process.
    pub fn attach_process(&self, id: &JobId, handle: ProcessHandle) -> bool {
        self.mutate(id, |job| job.process = Some(handle)).is_some()
    }

    /// Record a failure. No-op if the job is already terminal.
    pub fn fail(&self, id: &JobId, message: impl Into<String>) -> bool {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "download failed".to_string()
        } else {
            message
        };
        self.mutate(id, |job| {
            job.error = Some(message);
            job.close();
        })
        .is_some()
    }

    /// Record success. Suppressed if the job was canceled or already terminal.
    pub fn finish(&self, id: &JobId, artifact: PathBuf) -> bool {
        self.mutate(id, |job| {
            job.percent = 100;
            job.stage = Stage::Completed;
            job.artifact = Some(artifact);
            job.ready = true;
            job.close();
        })
        .is_some()
    }

    /// Set the sticky cancel flag and kill the attached process, if any.
    pub fn cancel(&self, id: &JobId) -> Option<CancelOutcome> {
        let mut jobs = self.write();
        let job = jobs.get_mut(id)?;
        let state = job.state();
        if state.is_terminal() {
            return Some(CancelOutcome::AlreadyFinished(state));
        }
        job.canceled = true;
        if let Some(process) = job.process.take() {
            tracing::debug!(job_id = %id, pid = ?process.pid(), "killing download tool");
            process.kill();
        }
        job.close();
        drop(jobs);
        self.notify();
        Some(CancelOutcome::Canceled)
    }

    pub fn is_canceled(&self, id: &JobId) -> bool {
        self.read().get(id).is_some_and(|job| job.canceled)
    }

    /// Artifact path of a succeeded job.
    pub fn artifact(&self, id: &JobId) -> Option<PathBuf> {
        let jobs = self.read();
        let job = jobs.get(id)?;
        match job.state() {
            JobState::Succeeded => job.artifact.clone(),
            _ => None,
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn running(store: &JobStore) -> JobId {
        store.create(MediaKind::Video)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[test]
    fn test_create_initial_snapshot() {
        let store = JobStore::new();
        let id = store.create(MediaKind::Audio);
        let snap = store.get(&id).unwrap();
        assert_eq!(snap.state, JobState::Running);
        assert_eq!(snap.percent, 0);
        assert_eq!(snap.stage, Stage::DownloadingAudio);
        assert!(snap.error.is_none());
        assert!(snap.finished_at.is_none());
    }

    #[test]
    fn test_unknown_id() {
        let store = JobStore::new();
        let id = JobId::from("missing");
        assert!(store.get(&id).is_none());
        assert!(store.cancel(&id).is_none());
        assert!(store.artifact(&id).is_none());
        assert!(!store.fail(&id, "x"));
    }

    #[test]
    fn test_finish_sets_completion_fields() {
        let store = JobStore::new();
        let id = running(&store);
        store.set_percent(&id, 37);
        assert!(store.finish(&id, PathBuf::from("/tmp/job/clip.mp4")));

        let snap = store.get(&id).unwrap();
        assert_eq!(snap.state, JobState::Succeeded);
        assert_eq!(snap.percent, 100);
        assert_eq!(snap.stage, Stage::Completed);
        assert_eq!(snap.artifact.as_deref(), Some("clip.mp4"));
        assert!(snap.finished_at.is_some());
        assert_eq!(
            store.artifact(&id),
            Some(PathBuf::from("/tmp/job/clip.mp4"))
        );
    }

    #[test]
    fn test_fail_is_terminal() {
        let store = JobStore::new();
        let id = running(&store);
        assert!(store.fail(&id, "ERROR: boom"));
        assert!(!store.finish(&id, PathBuf::from("x.mp4")));
        store.set_percent(&id, 80);

        let snap = store.get(&id).unwrap();
        assert_eq!(snap.state, JobState::Failed);
        assert_eq!(snap.error.as_deref(), Some("ERROR: boom"));
        assert_eq!(snap.percent, 0);
        assert!(store.artifact(&id).is_none());
    }

    #[test]
    fn test_fail_with_blank_message_still_records_error() {
        let store = JobStore::new();
        let id = running(&store);
        store.fail(&id, "  ");
        assert_eq!(store.get(&id).unwrap().error.as_deref(), Some("download failed"));
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    #[test]
    fn test_cancel_suppresses_completion() {
        let store = JobStore::new();
        let id = running(&store);
        assert_eq!(store.cancel(&id), Some(CancelOutcome::Canceled));
        assert!(store.is_canceled(&id));

        assert!(!store.finish(&id, PathBuf::from("clip.mp4")));
        assert!(!store.fail(&id, "killed"));

        let snap = store.get(&id).unwrap();
        assert_eq!(snap.state, JobState::Canceled);
        assert!(snap.error.is_none());
        assert!(snap.artifact.is_none());
    }

    #[test]
    fn test_cancel_terminal_job_reports_state() {
        let store = JobStore::new();
        let id = running(&store);
        store.finish(&id, PathBuf::from("clip.mp4"));
        assert_eq!(
            store.cancel(&id),
            Some(CancelOutcome::AlreadyFinished(JobState::Succeeded))
        );
        assert_eq!(store.state(&id), Some(JobState::Succeeded));

        assert_eq!(store.cancel(&id).unwrap().state(), JobState::Succeeded);
    }

    #[test]
    fn test_cancel_twice() {
        let store = JobStore::new();
        let id = running(&store);
        store.cancel(&id);
        assert_eq!(
            store.cancel(&id),
            Some(CancelOutcome::AlreadyFinished(JobState::Canceled))
        );
    }

    #[test]
    fn test_cancel_and_finish_race_keeps_one_terminal_state() {
        for _ in 0..50 {
            let store = Arc::new(JobStore::new());
            let id = running(&store);

            let s1 = Arc::clone(&store);
            let id1 = id.clone();
            let canceler = std::thread::spawn(move || s1.cancel(&id1));
            let s2 = Arc::clone(&store);
            let id2 = id.clone();
            let finisher = std::thread::spawn(move || s2.finish(&id2, PathBuf::from("a.mp4")));
            canceler.join().unwrap();
            finisher.join().unwrap();

            let snap = store.get(&id).unwrap();
            match snap.state {
                JobState::Canceled => assert!(snap.artifact.is_none()),
                JobState::Succeeded => assert!(!store.is_canceled(&id)),
                other => panic!("unexpected state {other:?}"),
            }
        }
    }

    // ========================================================================
    // Progress fields
    // ========================================================================

    #[test]
    fn test_set_stage_is_idempotent() {
        let store = JobStore::new();
        let id = running(&store);
        assert!(!store.set_stage(&id, Stage::DownloadingVideo));
        assert!(store.set_stage(&id, Stage::Merging));
        assert!(!store.set_stage(&id, Stage::Merging));
    }

    #[test]
    fn test_observe_last_write_wins() {
        let store = JobStore::new();
        let id = running(&store);
        store.observe(
            &id,
            LineObservation {
                stage: Some(Stage::DownloadingAudio),
                percent: Some(60),
            },
        );
        store.observe(&id, LineObservation { stage: None, percent: Some(20) });
        store.set_percent(&id, 150);

        let snap = store.get(&id).unwrap();
        assert_eq!(snap.stage, Stage::DownloadingAudio);
        assert_eq!(snap.percent, 20);
    }

    #[test]
    fn test_mutations_bump_generation() {
        let store = JobStore::new();
        let rx = store.subscribe();
        let before = *rx.borrow();
        let id = running(&store);
        store.set_percent(&id, 5);
        assert!(*rx.borrow() >= before + 2);
    }

    #[test]
    fn test_list_is_ordered_by_creation() {
        let store = JobStore::new();
        let a = running(&store);
        let b = running(&store);
        store.cancel(&a);
        let all = store.list();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|s| s.id == a && s.state == JobState::Canceled));
        assert!(all.iter().any(|s| s.id == b && s.state == JobState::Running));
    }
}
