//! Cursor/offset hybrid pagination over a time-ordered collection.
//!
//! Every listing is totally ordered by `(created_at, id)`. Cursor mode seeks
//! strictly past the compound key of the last item it returned, so items that
//! share a timestamp are neither skipped nor repeated. Offset mode counts and
//! skips; it drifts when rows are inserted or deleted ahead of the requested
//! page and is kept for page-number navigation only.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::errors::ApiError;

/// Compound sort key of one item, and the wire watermark for cursor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    pub created_at: NaiveDateTime,
    pub id: i32,
}

impl Cursor {
    pub fn new(created_at: NaiveDateTime, id: i32) -> Self {
        Self { created_at, id }
    }
}

/// `2024-05-01T10:00:00.000123Z_42`
impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}",
            self.created_at
                .and_utc()
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            self.id
        )
    }
}

impl FromStr for Cursor {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (timestamp, id) = s
            .rsplit_once('_')
            .ok_or_else(|| ApiError::InvalidCursor("expected <timestamp>_<id>".to_string()))?;

        let created_at = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| ApiError::InvalidCursor(format!("bad timestamp '{timestamp}'")))?
            .naive_utc();
        let id = id
            .parse::<i32>()
            .map_err(|_| ApiError::InvalidCursor(format!("bad id '{id}'")))?;

        Ok(Cursor { created_at, id })
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Anything that can be placed in the `(created_at, id)` order.
pub trait Keyed {
    fn sort_key(&self) -> Cursor;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// `(created_at DESC, id DESC)`
    #[default]
    NewestFirst,
    /// `(created_at ASC, id ASC)`
    OldestFirst,
}

impl SortOrder {
    pub fn reversed(self) -> Self {
        match self {
            SortOrder::NewestFirst => SortOrder::OldestFirst,
            SortOrder::OldestFirst => SortOrder::NewestFirst,
        }
    }

    /// Whether `key` comes strictly after `cursor` in this order.
    pub fn is_past(self, key: &Cursor, cursor: &Cursor) -> bool {
        match self {
            SortOrder::NewestFirst => key < cursor,
            SortOrder::OldestFirst => key > cursor,
        }
    }
}

impl FromStr for SortOrder {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" | "desc" => Ok(SortOrder::NewestFirst),
            "oldest" | "asc" => Ok(SortOrder::OldestFirst),
            other => Err(ApiError::BadRequest(format!(
                "Unknown sort '{other}', expected 'newest' or 'oldest'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Next,
    Prev,
}

impl FromStr for Direction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => Ok(Direction::Next),
            "prev" => Ok(Direction::Prev),
            other => Err(ApiError::BadRequest(format!(
                "Unknown direction '{other}', expected 'next' or 'prev'"
            ))),
        }
    }
}

/// Where the requested page starts. Resolved once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Offset {
        page: u32,
    },
    /// `cursor: None` is the first page.
    Cursor {
        cursor: Option<Cursor>,
        direction: Direction,
    },
}

impl Position {
    pub fn first() -> Self {
        Position::Cursor {
            cursor: None,
            direction: Direction::Next,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub order: SortOrder,
    pub position: Position,
    pub limit: u32,
}

/// What the engine asks a store for: rows in `order`, strictly past
/// `start_after` when set, skipping `skip`, at most `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub order: SortOrder,
    pub start_after: Option<Cursor>,
    pub skip: u64,
    pub limit: u64,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Keyed + Send;
    type Filter: Send + Sync;

    async fn count(&self, filter: &Self::Filter) -> Result<u64, ApiError>;

    async fn fetch(
        &self,
        filter: &Self::Filter,
        window: &Window,
    ) -> Result<Vec<Self::Item>, ApiError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetPage<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_items: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
    pub prev_cursor: Option<Cursor>,
    /// More items exist in the direction of travel.
    pub has_more: bool,
    /// Items exist before the first one shown, in display order.
    pub has_prev: bool,
    pub total_items: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Page<T> {
    Offset(OffsetPage<T>),
    Cursor(CursorPage<T>),
}

impl<T> Page<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Page::Offset(page) => &page.items,
            Page::Cursor(page) => &page.items,
        }
    }

    /// Converts every item, keeping the position data.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(match self {
            Page::Offset(page) => Page::Offset(OffsetPage {
                items: page.items.into_iter().map(f).collect::<Result<_, _>>()?,
                current_page: page.current_page,
                total_pages: page.total_pages,
                total_items: page.total_items,
                has_next_page: page.has_next_page,
                has_prev_page: page.has_prev_page,
                limit: page.limit,
            }),
            Page::Cursor(page) => Page::Cursor(CursorPage {
                items: page.items.into_iter().map(f).collect::<Result<_, _>>()?,
                next_cursor: page.next_cursor,
                prev_cursor: page.prev_cursor,
                has_more: page.has_more,
                has_prev: page.has_prev,
                total_items: page.total_items,
                limit: page.limit,
            }),
        })
    }
}

pub fn validate_limit(limit: u32, max: u32) -> Result<u32, ApiError> {
    if limit == 0 || limit > max {
        return Err(ApiError::InvalidLimit { max });
    }
    Ok(limit)
}

/// Serves one page of `filter` from `source`.
pub async fn list_page<S: PageSource + ?Sized>(
    source: &S,
    filter: &S::Filter,
    request: &PageRequest,
    max_limit: u32,
) -> Result<Page<S::Item>, ApiError> {
    let limit = validate_limit(request.limit, max_limit)?;

    match request.position {
        Position::Offset { page } => offset_page(source, filter, request.order, page, limit)
            .await
            .map(Page::Offset),
        Position::Cursor { cursor, direction } => {
            cursor_page(source, filter, request.order, cursor, direction, limit)
                .await
                .map(Page::Cursor)
        }
    }
}

async fn offset_page<S: PageSource + ?Sized>(
    source: &S,
    filter: &S::Filter,
    order: SortOrder,
    page: u32,
    limit: u32,
) -> Result<OffsetPage<S::Item>, ApiError> {
    if page == 0 {
        return Err(ApiError::BadRequest("page must be 1 or greater".to_string()));
    }

    let skip = u64::from(page - 1) * u64::from(limit);
    let total_items = source.count(filter).await?;
    let items = source
        .fetch(
            filter,
            &Window {
                order,
                start_after: None,
                skip,
                limit: u64::from(limit),
            },
        )
        .await?;

    let total_pages = total_items.div_ceil(u64::from(limit));
    debug!(page, skip, total_items, returned = items.len(), "Served offset page");

    Ok(OffsetPage {
        items,
        current_page: page,
        total_pages,
        total_items,
        has_next_page: u64::from(page) < total_pages,
        has_prev_page: page > 1,
        limit,
    })
}

async fn cursor_page<S: PageSource + ?Sized>(
    source: &S,
    filter: &S::Filter,
    order: SortOrder,
    cursor: Option<Cursor>,
    direction: Direction,
    limit: u32,
) -> Result<CursorPage<S::Item>, ApiError> {
    let fetch_order = match direction {
        Direction::Next => order,
        Direction::Prev => {
            if cursor.is_none() {
                return Err(ApiError::BadRequest(
                    "direction=prev requires a cursor".to_string(),
                ));
            }
            order.reversed()
        }
    };

    // one extra row tells us whether another page exists
    let mut items = source
        .fetch(
            filter,
            &Window {
                order: fetch_order,
                start_after: cursor,
                skip: 0,
                limit: u64::from(limit) + 1,
            },
        )
        .await?;

    let has_more = items.len() > limit as usize;
    items.truncate(limit as usize);

    if direction == Direction::Prev {
        items.reverse();
    }

    let prev_cursor = items.first().map(Keyed::sort_key);
    let next_cursor = items.last().map(Keyed::sort_key);

    let has_prev = match direction {
        Direction::Prev => has_more,
        Direction::Next => match cursor {
            None => false,
            Some(cursor) => {
                // one row behind the page start, looking back
                let behind = source
                    .fetch(
                        filter,
                        &Window {
                            order: order.reversed(),
                            start_after: Some(prev_cursor.unwrap_or(cursor)),
                            skip: 0,
                            limit: 1,
                        },
                    )
                    .await?;
                !behind.is_empty()
            }
        },
    };
    let total_items = source.count(filter).await?;

    debug!(
        ?direction,
        returned = items.len(),
        has_more,
        has_prev,
        total_items,
        "Served cursor page"
    );

    Ok(CursorPage {
        items,
        next_cursor,
        prev_cursor,
        has_more,
        has_prev,
        total_items,
        limit,
    })
}
