// crates/server/src/routes/jobs.rs
//! API routes for download jobs.
//!
//! - POST /download - Submit a job, returns `{"job": id}`
//! - POST /cancel/{id} - Cancel a running job
//! - GET /progress/{id} - SSE stream of one job's progress
//! - GET /download/{id} - Fetch the finished file as an attachment
//! - GET /jobs - List all active jobs
//! - GET /jobs/{id} - Snapshot of one job

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use mediadl_core::DownloadRequest;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::jobs::{JobError, JobId, JobSnapshot, ProgressEvent};
use crate::state::AppState;

/// Form fields accepted by `POST /api/download`.
#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub cookies: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub sub_lang: Option<String>,
}

impl DownloadForm {
    fn into_request(self) -> DownloadRequest {
        DownloadRequest::from_form(
            self.url,
            self.cookies,
            self.kind.as_deref(),
            self.quality,
            self.sub_lang,
        )
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct SubmitResponse {
    pub job: JobId,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct CancelResponse {
    pub status: String,
}

/// POST /api/download - Start a download job.
async fn submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<DownloadForm>,
) -> ApiResult<Json<SubmitResponse>> {
    let job = state.jobs.submit(form.into_request())?;
    Ok(Json(SubmitResponse { job }))
}

/// POST /api/cancel/{id} - Cancel a job. Already finished jobs report their
/// final state unchanged.
async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let outcome = state.jobs.cancel(&JobId::from(id))?;
    Ok(Json(CancelResponse {
        status: outcome.state().as_str().to_string(),
    }))
}

fn sse_event(event: &ProgressEvent) -> Event {
    let sse = match event.name() {
        Some(name) => Event::default().event(name),
        None => Event::default(),
    };
    sse.data(event.data())
}

/// GET /api/progress/{id} - SSE stream of one job until it is terminal.
///
/// Closing the connection stops this stream only; the job keeps running.
async fn progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>> {
    let cancel = CancellationToken::new();
    let events = state.jobs.progress(&JobId::from(id), cancel.clone())?;
    let guard = cancel.drop_guard();

    let stream = async_stream::stream! {
        let _guard = guard;
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            yield Ok(sse_event(&event));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `Content-Disposition` value with an ASCII fallback and the exact UTF-8 name.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(name)
    )
}

/// GET /api/download/{id} - Stream the artifact of a succeeded job.
async fn download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = JobId::from(id);
    let path = state.jobs.artifact(&id)?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(job_id = %id, path = %path.display(), "artifact vanished");
            return Err(JobError::NotFound(id).into());
        }
        Err(e) => return Err(JobError::io(&path, e).into()),
    };
    let len = file.metadata().await.ok().map(|m| m.len());

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.to_string());
    let disposition = HeaderValue::from_str(&content_disposition(&name))
        .map_err(|e| ApiError::Internal(format!("bad content-disposition: {e}")))?;

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    if let Some(len) = len {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    Ok(response)
}

/// GET /api/jobs - List all active jobs.
async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobSnapshot>> {
    Json(state.jobs.active_jobs())
}

/// GET /api/jobs/{id} - Snapshot of one job.
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let id = JobId::from(id);
    state
        .jobs
        .get_job(&id)
        .map(Json)
        .ok_or_else(|| JobError::NotFound(id).into())
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/download", post(submit))
        .route("/download/{id}", get(download))
        .route("/cancel/{id}", post(cancel))
        .route("/progress/{id}", get(progress))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
}
