// crates/server/src/jobs/stream.rs
//! Per-client progress event stream built over periodic store reads.

use std::sync::Arc;
use std::time::Duration;

use mediadl_core::Stage;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use super::store::JobStore;
use super::types::{JobId, JobState, ProgressEvent, ARTIFACT_ROUTE_PREFIX};

/// Stream the progress of job `id` until it is terminal or `cancel` fires.
///
/// Percentages are sent when they change, stages only when they differ from
/// the last one sent. The first read happens immediately, so a finished job
/// yields its terminal event without waiting. Between reads the loop sleeps
/// for `interval` or until the store reports a change, whichever is first.
/// Canceling only stops this stream, never the job.
pub fn progress_stream(
    store: Arc<JobStore>,
    id: JobId,
    interval: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = ProgressEvent> + Send + 'static {
    async_stream::stream! {
        let mut changes = store.subscribe();
        let mut last_percent: Option<u8> = None;
        let mut last_stage: Option<Stage> = None;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some(snap) = store.get(&id) else {
                break;
            };

            match snap.state {
                JobState::Canceled => {
                    yield ProgressEvent::Canceled;
                    break;
                }
                JobState::Failed => {
                    yield ProgressEvent::Error(snap.error.unwrap_or_default());
                    break;
                }
                JobState::Running | JobState::Succeeded => {}
            }

            if last_percent != Some(snap.percent) {
                last_percent = Some(snap.percent);
                yield ProgressEvent::Progress(snap.percent);
            }
            if last_stage != Some(snap.stage) {
                last_stage = Some(snap.stage);
                yield ProgressEvent::Stage(snap.stage);
            }
            if snap.state == JobState::Succeeded {
                yield ProgressEvent::Ready(format!("{ARTIFACT_ROUTE_PREFIX}/{id}"));
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
                changed = changes.changed() => {
                    if changed.is_err() {
                        tokio::time::sleep(interval).await;
                    }
                }
            }
        }
    }
}
