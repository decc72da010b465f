use std::collections::HashMap;

use crate::errors::ApiError;
use crate::filter::{CommentFilter, ContentFilter};
use crate::models::{
    CommentRecord, ContentChanges, ContentKind, ContentRecord, NewCommentRecord, NewContentRecord,
    Reaction, ReactionCounts,
};
use crate::pagination::PageSource;
use crate::slug::{Claim, SlugIndex};
use async_trait::async_trait;

/// Store for the three slugged collections. Slug uniqueness per kind is
/// enforced by the store itself; a write that hits it reports
/// `Claim::Conflict` instead of an error.
#[async_trait]
pub trait ContentRepository:
    PageSource<Item = ContentRecord, Filter = ContentFilter>
    + SlugIndex
    + Clone
    + Send
    + Sync
    + 'static
{
    async fn find_by_id(&self, kind: ContentKind, id: i32)
    -> Result<Option<ContentRecord>, ApiError>;

    async fn find_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentRecord>, ApiError>;

    async fn insert(&self, record: &NewContentRecord) -> Result<Claim<ContentRecord>, ApiError>;

    /// `Ok(None)` when the row no longer exists.
    async fn update(
        &self,
        kind: ContentKind,
        id: i32,
        changes: &ContentChanges,
    ) -> Result<Option<Claim<ContentRecord>>, ApiError>;

    /// Removes the item together with its comments and their reactions.
    async fn delete(&self, kind: ContentKind, id: i32) -> Result<bool, ApiError>;
}

#[async_trait]
pub trait CommentRepository:
    PageSource<Item = CommentRecord, Filter = CommentFilter> + Clone + Send + Sync + 'static
{
    async fn find_by_id(&self, id: i32) -> Result<Option<CommentRecord>, ApiError>;

    async fn insert(&self, comment: &NewCommentRecord) -> Result<CommentRecord, ApiError>;

    /// Deletes the comment and its replies, returning the number of rows removed.
    async fn delete_thread(&self, id: i32) -> Result<usize, ApiError>;

    /// Sets `reaction` for `user_id`, or clears it when the user already
    /// holds it. Returns what the user holds afterwards.
    async fn toggle_reaction(
        &self,
        comment_id: i32,
        user_id: &str,
        reaction: Reaction,
    ) -> Result<Option<Reaction>, ApiError>;

    async fn reaction_counts(
        &self,
        comment_ids: &[i32],
    ) -> Result<HashMap<i32, ReactionCounts>, ApiError>;
}
