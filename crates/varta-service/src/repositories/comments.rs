use std::collections::HashMap;

use super::traits::CommentRepository;
use super::{SharedConnection, lock, to_sql_i64};
use crate::errors::ApiError;
use crate::filter::CommentFilter;
use crate::models::{CommentRecord, NewCommentRecord, Reaction, ReactionCounts};
use crate::pagination::{Cursor, Keyed, PageSource, SortOrder, Window};
use crate::schema::{comment_reactions, comments};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;

#[derive(Clone)]
pub struct SqliteCommentRepository {
    db: SharedConnection,
}

impl SqliteCommentRepository {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }
}

impl Keyed for CommentRecord {
    fn sort_key(&self) -> Cursor {
        Cursor::new(self.created_at, self.id)
    }
}

fn filtered(filter: &CommentFilter) -> comments::BoxedQuery<'static, Sqlite> {
    let query = comments::table
        .filter(comments::content_id.eq(filter.content_id))
        .filter(comments::language.eq(filter.language.as_str()))
        .into_boxed();

    match filter.parent_id {
        Some(parent) => query.filter(comments::parent_id.eq(parent)),
        None => query.filter(comments::parent_id.is_null()),
    }
}

#[async_trait]
impl PageSource for SqliteCommentRepository {
    type Item = CommentRecord;
    type Filter = CommentFilter;

    async fn count(&self, filter: &CommentFilter) -> Result<u64, ApiError> {
        let mut conn = lock(&self.db)?;
        let total: i64 = filtered(filter).count().get_result(&mut *conn)?;
        Ok(total.max(0) as u64)
    }

    async fn fetch(
        &self,
        filter: &CommentFilter,
        window: &Window,
    ) -> Result<Vec<CommentRecord>, ApiError> {
        let mut query = filtered(filter);

        if let Some(cursor) = window.start_after {
            query = match window.order {
                SortOrder::NewestFirst => query.filter(
                    comments::created_at.lt(cursor.created_at).or(comments::created_at
                        .eq(cursor.created_at)
                        .and(comments::id.lt(cursor.id))),
                ),
                SortOrder::OldestFirst => query.filter(
                    comments::created_at.gt(cursor.created_at).or(comments::created_at
                        .eq(cursor.created_at)
                        .and(comments::id.gt(cursor.id))),
                ),
            };
        }

        query = match window.order {
            SortOrder::NewestFirst => {
                query.order((comments::created_at.desc(), comments::id.desc()))
            }
            SortOrder::OldestFirst => {
                query.order((comments::created_at.asc(), comments::id.asc()))
            }
        };

        let mut conn = lock(&self.db)?;
        let rows = query
            .offset(to_sql_i64(window.skip))
            .limit(to_sql_i64(window.limit))
            .load::<CommentRecord>(&mut *conn)?;
        Ok(rows)
    }
}

#[async_trait]
impl CommentRepository for SqliteCommentRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<CommentRecord>, ApiError> {
        let mut conn = lock(&self.db)?;
        let result = comments::table
            .find(id)
            .first::<CommentRecord>(&mut *conn)
            .optional()?;
        Ok(result)
    }

    async fn insert(&self, comment: &NewCommentRecord) -> Result<CommentRecord, ApiError> {
        let mut conn = lock(&self.db)?;
        let result = diesel::insert_into(comments::table)
            .values(comment)
            .returning(comments::all_columns)
            .get_result::<CommentRecord>(&mut *conn)?;
        Ok(result)
    }

    async fn delete_thread(&self, id: i32) -> Result<usize, ApiError> {
        let mut conn = lock(&self.db)?;
        let removed = conn.transaction::<usize, diesel::result::Error, _>(|conn| {
            let thread: Vec<i32> = comments::table
                .filter(comments::id.eq(id).or(comments::parent_id.eq(id)))
                .select(comments::id)
                .load(conn)?;
            if !thread.contains(&id) {
                return Ok(0);
            }

            let reactions = comment_reactions::table
                .filter(comment_reactions::comment_id.eq_any(thread.clone()));
            diesel::delete(reactions).execute(conn)?;
            diesel::delete(comments::table.filter(comments::id.eq_any(thread))).execute(conn)
        })?;
        Ok(removed)
    }

    async fn toggle_reaction(
        &self,
        comment_id: i32,
        user_id: &str,
        reaction: Reaction,
    ) -> Result<Option<Reaction>, ApiError> {
        let mut conn = lock(&self.db)?;
        let held = conn.transaction::<Option<Reaction>, diesel::result::Error, _>(|conn| {
            let current = comment_reactions::table
                .find((comment_id, user_id))
                .select(comment_reactions::reaction)
                .first::<String>(conn)
                .optional()?;
            diesel::delete(comment_reactions::table.find((comment_id, user_id))).execute(conn)?;

            if current.as_deref() == Some(reaction.as_str()) {
                return Ok(None);
            }

            diesel::insert_into(comment_reactions::table)
                .values((
                    comment_reactions::comment_id.eq(comment_id),
                    comment_reactions::user_id.eq(user_id),
                    comment_reactions::reaction.eq(reaction.as_str()),
                ))
                .execute(conn)?;
            Ok(Some(reaction))
        })?;
        Ok(held)
    }

    async fn reaction_counts(
        &self,
        comment_ids: &[i32],
    ) -> Result<HashMap<i32, ReactionCounts>, ApiError> {
        if comment_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = lock(&self.db)?;
        let rows = comment_reactions::table
            .filter(comment_reactions::comment_id.eq_any(comment_ids.to_vec()))
            .select((comment_reactions::comment_id, comment_reactions::reaction))
            .load::<(i32, String)>(&mut *conn)?;

        let mut counts: HashMap<i32, ReactionCounts> = HashMap::new();
        for (comment_id, reaction) in rows {
            counts
                .entry(comment_id)
                .or_default()
                .add(reaction.parse::<Reaction>()?);
        }
        Ok(counts)
    }
}
