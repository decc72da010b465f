use super::traits::ContentRepository;
use super::{SharedConnection, lock, to_sql_i64};
use crate::errors::ApiError;
use crate::filter::{ContentFilter, like_pattern};
use crate::models::{ContentChanges, ContentKind, ContentRecord, NewContentRecord};
use crate::pagination::{Cursor, Keyed, PageSource, SortOrder, Window};
use crate::schema::{comment_reactions, comments, content_items};
use crate::slug::{Claim, SlugIndex};
use async_trait::async_trait;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Bool, Text};
use diesel::sqlite::Sqlite;
use tracing::debug;

#[derive(Clone)]
pub struct SqliteContentRepository {
    db: SharedConnection,
}

impl SqliteContentRepository {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }
}

impl Keyed for ContentRecord {
    fn sort_key(&self) -> Cursor {
        Cursor::new(self.created_at, self.id)
    }
}

fn filtered(filter: &ContentFilter) -> content_items::BoxedQuery<'static, Sqlite> {
    let mut query = content_items::table
        .filter(content_items::kind.eq(filter.kind.as_str()))
        .into_boxed();

    if let Some(category) = &filter.category {
        query = query.filter(
            content_items::category_en
                .eq(category.clone())
                .or(content_items::category_te.eq(category.clone())),
        );
    }

    if let Some(author) = &filter.author {
        query = query.filter(content_items::author.eq(author.clone()));
    }

    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        let tag_matches = sql::<Bool>(TAG_LIKE_PREFIX)
            .bind::<Text, _>(pattern.clone())
            .sql(" ESCAPE '\\')");
        query = query.filter(
            content_items::title_en
                .like(pattern.clone())
                .escape('\\')
                .or(content_items::title_te.like(pattern.clone()).escape('\\'))
                .or(content_items::description_en
                    .like(pattern.clone())
                    .escape('\\'))
                .or(content_items::description_te
                    .like(pattern)
                    .escape('\\'))
                .or(tag_matches),
        );
    }

    if let Some(from) = filter.created_from {
        query = query.filter(content_items::created_at.ge(from));
    }

    if let Some(before) = filter.created_before {
        query = query.filter(content_items::created_at.lt(before));
    }

    query
}

/// Tag search runs per element of the JSON `tags` array so that the array's
/// own brackets, quotes and commas never match.
const TAG_LIKE_PREFIX: &str =
    "EXISTS (SELECT 1 FROM json_each(content_items.tags) WHERE json_each.value LIKE ";

fn is_unique_violation(err: &DieselError) -> bool {
    matches!(
        err,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

#[async_trait]
impl PageSource for SqliteContentRepository {
    type Item = ContentRecord;
    type Filter = ContentFilter;

    async fn count(&self, filter: &ContentFilter) -> Result<u64, ApiError> {
        let mut conn = lock(&self.db)?;
        let total: i64 = filtered(filter).count().get_result(&mut *conn)?;
        Ok(total.max(0) as u64)
    }

    async fn fetch(
        &self,
        filter: &ContentFilter,
        window: &Window,
    ) -> Result<Vec<ContentRecord>, ApiError> {
        let mut query = filtered(filter);

        if let Some(cursor) = window.start_after {
            query = match window.order {
                SortOrder::NewestFirst => query.filter(
                    content_items::created_at.lt(cursor.created_at).or(content_items::created_at
                        .eq(cursor.created_at)
                        .and(content_items::id.lt(cursor.id))),
                ),
                SortOrder::OldestFirst => query.filter(
                    content_items::created_at.gt(cursor.created_at).or(content_items::created_at
                        .eq(cursor.created_at)
                        .and(content_items::id.gt(cursor.id))),
                ),
            };
        }

        query = match window.order {
            SortOrder::NewestFirst => {
                query.order((content_items::created_at.desc(), content_items::id.desc()))
            }
            SortOrder::OldestFirst => {
                query.order((content_items::created_at.asc(), content_items::id.asc()))
            }
        };

        let mut conn = lock(&self.db)?;
        let rows = query
            .offset(to_sql_i64(window.skip))
            .limit(to_sql_i64(window.limit))
            .load::<ContentRecord>(&mut *conn)?;
        Ok(rows)
    }
}

#[async_trait]
impl SlugIndex for SqliteContentRepository {
    async fn slug_exists(
        &self,
        kind: ContentKind,
        slug: &str,
        exclude_id: Option<i32>,
    ) -> Result<bool, ApiError> {
        let mut query = content_items::table
            .filter(content_items::kind.eq(kind.as_str()))
            .filter(content_items::slug.eq(slug.to_string()))
            .select(content_items::id)
            .into_boxed();

        if let Some(id) = exclude_id {
            query = query.filter(content_items::id.ne(id));
        }

        let mut conn = lock(&self.db)?;
        let found = query.first::<i32>(&mut *conn).optional()?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn find_by_id(
        &self,
        kind: ContentKind,
        id: i32,
    ) -> Result<Option<ContentRecord>, ApiError> {
        let mut conn = lock(&self.db)?;
        let result = content_items::table
            .filter(content_items::id.eq(id))
            .filter(content_items::kind.eq(kind.as_str()))
            .first::<ContentRecord>(&mut *conn)
            .optional()?;
        Ok(result)
    }

    async fn find_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentRecord>, ApiError> {
        let mut conn = lock(&self.db)?;
        let result = content_items::table
            .filter(content_items::kind.eq(kind.as_str()))
            .filter(content_items::slug.eq(slug))
            .first::<ContentRecord>(&mut *conn)
            .optional()?;
        Ok(result)
    }

    async fn insert(&self, record: &NewContentRecord) -> Result<Claim<ContentRecord>, ApiError> {
        let mut conn = lock(&self.db)?;
        let result = diesel::insert_into(content_items::table)
            .values(record)
            .returning(content_items::all_columns)
            .get_result::<ContentRecord>(&mut *conn);

        match result {
            Ok(inserted) => Ok(Claim::Committed(inserted)),
            Err(err) if is_unique_violation(&err) => {
                debug!(kind = %record.kind, slug = %record.slug, "Insert rejected by slug index");
                Ok(Claim::Conflict)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update(
        &self,
        kind: ContentKind,
        id: i32,
        changes: &ContentChanges,
    ) -> Result<Option<Claim<ContentRecord>>, ApiError> {
        let mut conn = lock(&self.db)?;
        let result = diesel::update(
            content_items::table
                .filter(content_items::id.eq(id))
                .filter(content_items::kind.eq(kind.as_str())),
        )
        .set(changes)
        .returning(content_items::all_columns)
        .get_result::<ContentRecord>(&mut *conn)
        .optional();

        match result {
            Ok(updated) => Ok(updated.map(Claim::Committed)),
            Err(err) if is_unique_violation(&err) => {
                debug!(kind = %kind, id, slug = %changes.slug, "Update rejected by slug index");
                Ok(Some(Claim::Conflict))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, kind: ContentKind, id: i32) -> Result<bool, ApiError> {
        let mut conn = lock(&self.db)?;
        let deleted = conn.transaction::<usize, DieselError, _>(|conn| {
            let found = content_items::table
                .filter(content_items::id.eq(id))
                .filter(content_items::kind.eq(kind.as_str()))
                .select(content_items::id)
                .first::<i32>(conn)
                .optional()?;
            if found.is_none() {
                return Ok(0);
            }

            let item_comments = comments::table
                .filter(comments::content_id.eq(id))
                .select(comments::id);
            let reactions = comment_reactions::table
                .filter(comment_reactions::comment_id.eq_any(item_comments));
            let reactions = diesel::delete(reactions).execute(conn)?;
            let thread = diesel::delete(comments::table.filter(comments::content_id.eq(id)))
                .execute(conn)?;
            debug!(id, comments = thread, reactions, "Removing content item with its comments");

            diesel::delete(content_items::table.find(id)).execute(conn)
        })?;
        Ok(deleted > 0)
    }
}
