use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    application::{error::HttpError, stream::presence_sse},
    config::SiteSettings,
    domain::{
        posts::ContentKind,
        presence::{MemberId, TopicId},
    },
    presentation::views::{
        ArchiveView, PostDetailView, PostListView, TagIndexView, TaggedPostsView, ViewersView,
    },
};

use super::{
    HttpState,
    middleware::{log_responses, set_request_context},
};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/posts", get(list_articles))
        .route("/notes", get(list_notes))
        .route("/posts/{id}", get(article_detail))
        .route("/notes/{id}", get(note_detail))
        .route("/posts/{id}/viewers", get(article_viewers))
        .route("/notes/{id}/viewers", get(note_viewers))
        .route("/posts/{id}/presence", get(article_presence))
        .route("/notes/{id}/presence", get(note_presence))
        .route("/tags", get(tag_index))
        .route("/tags/{tag}", get(tag_posts))
        .route("/archive", get(archive))
        .route("/site", get(site))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn list_articles(State(state): State<HttpState>) -> Json<PostListView> {
    list(&state, ContentKind::Article)
}

async fn list_notes(State(state): State<HttpState>) -> Json<PostListView> {
    list(&state, ContentKind::Note)
}

fn list(state: &HttpState, kind: ContentKind) -> Json<PostListView> {
    Json(PostListView::new(kind, &state.content.list_published(kind)))
}

async fn article_detail(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<PostDetailView>, HttpError> {
    detail(&state, ContentKind::Article, &id)
}

async fn note_detail(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<PostDetailView>, HttpError> {
    detail(&state, ContentKind::Note, &id)
}

fn detail(state: &HttpState, kind: ContentKind, id: &str) -> Result<Json<PostDetailView>, HttpError> {
    let post = state.content.get_by_id(kind, id)?;
    let related = state.content.related(&post);
    Ok(Json(PostDetailView::new(&post, &related)))
}

/// Topic for a published post; unknown and unpublished posts have none.
fn published_topic(state: &HttpState, kind: ContentKind, id: &str) -> Result<TopicId, HttpError> {
    let post = state.content.get_by_id(kind, id)?;
    Ok(TopicId::for_post(kind, &post.id))
}

async fn article_viewers(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<ViewersView>, HttpError> {
    viewers(&state, ContentKind::Article, &id)
}

async fn note_viewers(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<ViewersView>, HttpError> {
    viewers(&state, ContentKind::Note, &id)
}

fn viewers(state: &HttpState, kind: ContentKind, id: &str) -> Result<Json<ViewersView>, HttpError> {
    let topic = published_topic(state, kind, id)?;
    let members = state.presence.list(&topic);
    Ok(Json(ViewersView::new(topic, members)))
}

async fn article_presence(State(state): State<HttpState>, Path(id): Path<String>) -> Response {
    presence(&state, ContentKind::Article, &id)
}

async fn note_presence(State(state): State<HttpState>, Path(id): Path<String>) -> Response {
    presence(&state, ContentKind::Note, &id)
}

fn presence(state: &HttpState, kind: ContentKind, id: &str) -> Response {
    let topic = match published_topic(state, kind, id) {
        Ok(topic) => topic,
        Err(err) => return err.into_response(),
    };

    // Subscribe before tracking so the stream also carries this viewer's own join.
    let subscription = state.presence.subscribe(&topic);
    let member = MemberId::generate();
    let joined_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let lease = state.presence.track(
        &topic,
        &member,
        json!({ "id": member.as_str(), "joined_at": joined_at }),
    );

    presence_sse(subscription, lease, state.heartbeat).into_response()
}

async fn tag_index(State(state): State<HttpState>) -> Json<TagIndexView> {
    Json(TagIndexView {
        tags: state.content.tag_counts(ContentKind::Article),
    })
}

async fn tag_posts(State(state): State<HttpState>, Path(tag): Path<String>) -> Json<TaggedPostsView> {
    let posts = state.content.get_by_tag(ContentKind::Article, &tag);
    Json(TaggedPostsView {
        tag,
        list: PostListView::new(ContentKind::Article, &posts),
    })
}

async fn archive(State(state): State<HttpState>) -> Json<ArchiveView> {
    Json(ArchiveView {
        months: state.content.month_counts(ContentKind::Article),
    })
}

async fn site(State(state): State<HttpState>) -> Json<SiteSettings> {
    Json(state.site.as_ref().clone())
}
