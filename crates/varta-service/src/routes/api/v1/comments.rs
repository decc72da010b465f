use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::PageParams;
use super::content::collection;
use crate::AppState;
use crate::caller::Caller;
use crate::comments::{CommentService, NewComment, NewReply};
use crate::errors::ApiError;
use crate::models::{CommentView, Language, Reaction, ReactionSummary};
use crate::pagination::Page;
use crate::validation::ValidationError;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListCommentsQuery {
    language: Option<String>,
    /// Lists the replies of this comment instead of top-level comments.
    parent: Option<String>,
    sort: Option<String>,
    page: Option<String>,
    cursor: Option<String>,
    direction: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteCommentResponse {
    removed: usize,
}

fn service<S: AppState>(state: &S) -> CommentService<'_, S::ContentRepo, S::CommentRepo> {
    CommentService::new(
        state.content_repo(),
        state.comment_repo(),
        state.config().max_page_size,
    )
}

#[instrument(skip_all, fields(collection = %kind, slug = %slug, language = ?query.language))]
pub(crate) async fn list_comments<S: AppState>(
    State(state): State<S>,
    Path((kind, slug)): Path<(String, String)>,
    Query(query): Query<ListCommentsQuery>,
) -> Result<ResponseJson<Page<CommentView>>, ApiError> {
    let kind = collection(&kind)?;
    let language = query
        .language
        .as_deref()
        .ok_or(ValidationError::MissingField("language"))?
        .parse::<Language>()?;
    let parent = query
        .parent
        .as_deref()
        .map(|parent| {
            parent
                .parse::<i32>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid parent '{parent}'")))
        })
        .transpose()?;

    let config = state.config();
    let request = PageParams {
        sort: query.sort.as_deref(),
        page: query.page.as_deref(),
        cursor: query.cursor.as_deref(),
        direction: query.direction.as_deref(),
        limit: query.limit.as_deref(),
    }
    .into_request(config.default_page_size, config.max_page_size)?;

    let page = service(&state)
        .list(kind, &slug, language, parent, &request)
        .await?;
    debug!(returned_count = page.items().len(), "Listed comments");
    Ok(ResponseJson(page))
}

#[instrument(skip_all, fields(collection = %kind, slug = %slug))]
pub(crate) async fn add_comment<S: AppState>(
    State(state): State<S>,
    Path((kind, slug)): Path<(String, String)>,
    caller: Caller,
    Json(payload): Json<NewComment>,
) -> Result<(StatusCode, ResponseJson<CommentView>), ApiError> {
    let kind = collection(&kind)?;
    let comment = service(&state).add(kind, &slug, &caller, payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(comment)))
}

#[instrument(skip_all, fields(collection = %kind, slug = %slug))]
pub(crate) async fn add_reply<S: AppState>(
    State(state): State<S>,
    Path((kind, slug)): Path<(String, String)>,
    caller: Caller,
    Json(payload): Json<NewReply>,
) -> Result<(StatusCode, ResponseJson<CommentView>), ApiError> {
    let kind = collection(&kind)?;
    let reply = service(&state).reply(kind, &slug, &caller, payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(reply)))
}

#[instrument(skip_all, fields(id = id))]
pub(crate) async fn delete_comment<S: AppState>(
    State(state): State<S>,
    Path(id): Path<i32>,
    caller: Caller,
) -> Result<ResponseJson<DeleteCommentResponse>, ApiError> {
    let removed = service(&state).delete(id, &caller).await?;
    Ok(ResponseJson(DeleteCommentResponse { removed }))
}

pub(crate) async fn like_comment<S: AppState>(
    State(state): State<S>,
    Path(id): Path<i32>,
    caller: Caller,
) -> Result<ResponseJson<ReactionSummary>, ApiError> {
    let summary = service(&state).react(id, &caller, Reaction::Like).await?;
    Ok(ResponseJson(summary))
}

pub(crate) async fn dislike_comment<S: AppState>(
    State(state): State<S>,
    Path(id): Path<i32>,
    caller: Caller,
) -> Result<ResponseJson<ReactionSummary>, ApiError> {
    let summary = service(&state).react(id, &caller, Reaction::Dislike).await?;
    Ok(ResponseJson(summary))
}
