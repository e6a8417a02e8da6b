// crates/server/src/routes/info.rs
//! Media metadata lookup.
//!
//! - POST /info - form `url`, `cookies` → title, thumbnail and the available
//!   video heights, audio bitrates and subtitle languages

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Form, Json, Router};
use mediadl_core::MediaInfo;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InfoForm {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub cookies: Option<String>,
}

/// POST /api/info - probe a URL without downloading it.
async fn media_info(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InfoForm>,
) -> ApiResult<Json<MediaInfo>> {
    let cookies = form.cookies.as_deref().filter(|c| !c.trim().is_empty());
    let info = state.probe.probe(&form.url, cookies).await?;
    Ok(Json(info))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/info", post(media_info))
}
