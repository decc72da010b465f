use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::AppState;
use crate::errors::ApiError;
use crate::pagination::{Direction, PageRequest, Position, SortOrder};

mod comments;
mod content;

/// Paging parameters shared by every listing route.
#[derive(Debug, Default)]
pub(crate) struct PageParams<'a> {
    pub sort: Option<&'a str>,
    pub page: Option<&'a str>,
    pub cursor: Option<&'a str>,
    pub direction: Option<&'a str>,
    pub limit: Option<&'a str>,
}

impl PageParams<'_> {
    /// Picks the paging mode: `cursor` selects cursor mode, `page` offset
    /// mode, neither the first cursor page. Both at once is rejected.
    pub fn into_request(self, default_limit: u32, max_limit: u32) -> Result<PageRequest, ApiError> {
        let limit = match self.limit {
            Some(limit) => limit
                .trim()
                .parse::<u32>()
                .map_err(|_| ApiError::InvalidLimit { max: max_limit })?,
            None => default_limit,
        };
        let page = self
            .page
            .map(|page| {
                page.trim()
                    .parse::<u32>()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid page '{page}'")))
            })
            .transpose()?;

        let order = match self.sort {
            Some(sort) => sort.parse::<SortOrder>()?,
            None => SortOrder::default(),
        };
        let direction = match self.direction {
            Some(direction) => direction.parse::<Direction>()?,
            None => Direction::default(),
        };

        let position = match (self.cursor, page) {
            (Some(_), Some(_)) => {
                return Err(ApiError::BadRequest(
                    "Use either cursor or page, not both".to_string(),
                ));
            }
            (Some(cursor), None) => Position::Cursor {
                cursor: Some(cursor.parse()?),
                direction,
            },
            (None, Some(page)) => Position::Offset { page },
            (None, None) => Position::Cursor {
                cursor: None,
                direction,
            },
        };

        Ok(PageRequest {
            order,
            position,
            limit,
        })
    }
}

pub fn create_api_v1_router<S: AppState>() -> Router<S> {
    Router::new()
        .route("/comments/{id}", delete(comments::delete_comment::<S>))
        .route("/comments/{id}/like", post(comments::like_comment::<S>))
        .route("/comments/{id}/dislike", post(comments::dislike_comment::<S>))
        .route(
            "/{kind}",
            post(content::create_content::<S>).get(content::list_content::<S>),
        )
        .route("/{kind}/latest", get(content::latest_content::<S>))
        .route(
            "/{kind}/category/{category}",
            get(content::list_category::<S>),
        )
        .route(
            "/{kind}/{id}",
            get(content::get_content::<S>)
                .put(content::update_content::<S>)
                .delete(content::delete_content::<S>),
        )
        .route("/{kind}/slug/{slug}", get(content::get_content_by_slug::<S>))
        .route(
            "/{kind}/slug/{slug}/comments",
            get(comments::list_comments::<S>).post(comments::add_comment::<S>),
        )
        .route(
            "/{kind}/slug/{slug}/comments/replies",
            post(comments::add_reply::<S>),
        )
}
