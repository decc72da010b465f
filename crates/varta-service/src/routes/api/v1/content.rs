use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::PageParams;
use crate::AppState;
use crate::caller::Caller;
use crate::content::{ContentPayload, ContentService};
use crate::errors::ApiError;
use crate::filter::{ContentFilter, TimeWindow};
use crate::models::{ContentItem, ContentKind};
use crate::pagination::Page;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListContentQuery {
    category: Option<String>,
    writer: Option<String>,
    search_text: Option<String>,
    time: Option<String>,
    sort: Option<String>,
    page: Option<String>,
    cursor: Option<String>,
    direction: Option<String>,
    limit: Option<String>,
}

impl ListContentQuery {
    fn page_params(&self) -> PageParams<'_> {
        PageParams {
            sort: self.sort.as_deref(),
            page: self.page.as_deref(),
            cursor: self.cursor.as_deref(),
            direction: self.direction.as_deref(),
            limit: self.limit.as_deref(),
        }
    }

    fn filter(self, kind: ContentKind) -> Result<ContentFilter, ApiError> {
        let window = self
            .time
            .as_deref()
            .map(str::parse::<TimeWindow>)
            .transpose()?;
        Ok(ContentFilter::new(kind)
            .category(self.category)
            .author(self.writer)
            .search(self.search_text)
            .time_window(window, Utc::now().naive_utc()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LatestQuery {
    limit: Option<String>,
}

/// Maps a route collection name to its kind. Unknown collections do not exist.
pub(super) fn collection(name: &str) -> Result<ContentKind, ApiError> {
    ContentKind::ALL
        .into_iter()
        .find(|kind| kind.collection() == name)
        .ok_or(ApiError::NotFound)
}

fn service<S: AppState>(state: &S) -> ContentService<'_, S::ContentRepo> {
    let config = state.config();
    ContentService::new(state.content_repo(), &config.slug, config.max_page_size)
}

#[instrument(skip_all, fields(collection = %kind))]
pub(crate) async fn create_content<S: AppState>(
    State(state): State<S>,
    Path(kind): Path<String>,
    caller: Caller,
    Json(payload): Json<ContentPayload>,
) -> Result<(StatusCode, ResponseJson<ContentItem>), ApiError> {
    let kind = collection(&kind)?;
    debug!("Processing create request");

    let item = service(&state).create(kind, &caller, payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(item)))
}

#[instrument(
    skip_all,
    fields(
        collection = %kind,
        page = ?query.page,
        has_cursor = query.cursor.is_some(),
        limit = ?query.limit
    )
)]
pub(crate) async fn list_content<S: AppState>(
    State(state): State<S>,
    Path(kind): Path<String>,
    Query(query): Query<ListContentQuery>,
) -> Result<ResponseJson<Page<ContentItem>>, ApiError> {
    let kind = collection(&kind)?;
    let config = state.config();
    let request = query
        .page_params()
        .into_request(config.default_page_size, config.max_page_size)?;
    let filter = query.filter(kind)?;

    let page = service(&state).list(&filter, &request).await?;
    info!(returned_count = page.items().len(), "Listed content");
    Ok(ResponseJson(page))
}

/// Newest items of a collection, first cursor page only.
#[instrument(skip_all, fields(collection = %kind, limit = ?query.limit))]
pub(crate) async fn latest_content<S: AppState>(
    State(state): State<S>,
    Path(kind): Path<String>,
    Query(query): Query<LatestQuery>,
) -> Result<ResponseJson<Page<ContentItem>>, ApiError> {
    let kind = collection(&kind)?;
    let config = state.config();
    let request = PageParams {
        limit: query.limit.as_deref(),
        ..Default::default()
    }
    .into_request(config.default_page_size, config.max_page_size)?;

    let page = service(&state)
        .list(&ContentFilter::new(kind), &request)
        .await?;
    Ok(ResponseJson(page))
}

/// Listing of one category; the category in the path wins over any in the
/// query string.
#[instrument(skip_all, fields(collection = %kind, category = %category))]
pub(crate) async fn list_category<S: AppState>(
    State(state): State<S>,
    Path((kind, category)): Path<(String, String)>,
    Query(mut query): Query<ListContentQuery>,
) -> Result<ResponseJson<Page<ContentItem>>, ApiError> {
    let kind = collection(&kind)?;
    let config = state.config();
    let request = query
        .page_params()
        .into_request(config.default_page_size, config.max_page_size)?;
    query.category = Some(category);
    let filter = query.filter(kind)?;

    let page = service(&state).list(&filter, &request).await?;
    debug!(returned_count = page.items().len(), "Listed category");
    Ok(ResponseJson(page))
}

#[instrument(skip_all, fields(collection = %kind, id = id))]
pub(crate) async fn get_content<S: AppState>(
    State(state): State<S>,
    Path((kind, id)): Path<(String, i32)>,
) -> Result<ResponseJson<ContentItem>, ApiError> {
    let kind = collection(&kind)?;
    let item = service(&state).get_by_id(kind, id).await?;
    Ok(ResponseJson(item))
}

#[instrument(skip_all, fields(collection = %kind, slug = %slug))]
pub(crate) async fn get_content_by_slug<S: AppState>(
    State(state): State<S>,
    Path((kind, slug)): Path<(String, String)>,
) -> Result<ResponseJson<ContentItem>, ApiError> {
    let kind = collection(&kind)?;
    let item = service(&state).get_by_slug(kind, &slug).await?;
    Ok(ResponseJson(item))
}

#[instrument(skip_all, fields(collection = %kind, id = id))]
pub(crate) async fn update_content<S: AppState>(
    State(state): State<S>,
    Path((kind, id)): Path<(String, i32)>,
    caller: Caller,
    Json(payload): Json<ContentPayload>,
) -> Result<ResponseJson<ContentItem>, ApiError> {
    let kind = collection(&kind)?;
    let item = service(&state).edit(kind, id, &caller, payload).await?;
    Ok(ResponseJson(item))
}

#[instrument(skip_all, fields(collection = %kind, id = id))]
pub(crate) async fn delete_content<S: AppState>(
    State(state): State<S>,
    Path((kind, id)): Path<(String, i32)>,
    caller: Caller,
) -> Result<StatusCode, ApiError> {
    let kind = collection(&kind)?;
    service(&state).delete(kind, id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}
