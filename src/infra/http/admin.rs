use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use tokio::task;
use tracing::info;

use crate::{
    application::{content::SnapshotSummary, error::HttpError},
    domain::posts::ContentKind,
    presentation::views::{HealthView, PostDetailView, PresenceStatsView},
};

use super::{
    HttpState,
    middleware::{log_responses, set_request_context},
};

pub fn build_admin_router(state: HttpState) -> Router {
    Router::new()
        .route("/_admin/posts/{id}/preview", get(article_preview))
        .route("/_admin/notes/{id}/preview", get(note_preview))
        .route("/_admin/content/reload", post(reload_content))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn article_preview(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<PostDetailView>, HttpError> {
    preview(&state, ContentKind::Article, &id)
}

async fn note_preview(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<PostDetailView>, HttpError> {
    preview(&state, ContentKind::Note, &id)
}

fn preview(state: &HttpState, kind: ContentKind, id: &str) -> Result<Json<PostDetailView>, HttpError> {
    let post = state.content.get_preview_by_id(kind, id)?;
    let related = state.content.related(&post);
    Ok(Json(PostDetailView::new(&post, &related)))
}

/// Rebuild the snapshot from the content source. On failure the previous
/// snapshot keeps serving and the error is returned as 422.
async fn reload_content(
    State(state): State<HttpState>,
) -> Result<Json<SnapshotSummary>, HttpError> {
    let store = Arc::clone(state.content.store());
    let result = task::spawn_blocking(move || store.reload())
        .await
        .map_err(|err| {
            HttpError::from_error(
                "infra::http::admin::reload_content",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Reload task failed",
                &err,
            )
        })?;

    let snapshot = result?;
    info!(version = snapshot.version(), "Content reloaded via admin endpoint");
    Ok(Json(snapshot.summary()))
}

async fn health(State(state): State<HttpState>) -> Json<HealthView> {
    Json(HealthView {
        status: "ok",
        content: state.content.summary(),
        presence: PresenceStatsView {
            topics: state.presence.topic_count(),
            members: state.presence.member_count(),
        },
    })
}
