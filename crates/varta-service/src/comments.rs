use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::caller::Caller;
use crate::errors::ApiError;
use crate::filter::CommentFilter;
use crate::models::{
    CommentView, ContentKind, ContentRecord, Language, NewCommentRecord, Reaction,
    ReactionSummary, current_timestamp,
};
use crate::pagination::{Page, PageRequest, list_page};
use crate::repositories::{CommentRepository, ContentRepository};
use crate::validation::require_text;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewComment {
    pub body: String,
    pub language: Language,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReply {
    pub parent_id: i32,
    pub body: String,
}

/// Comments belong to a content item by id; routes address the item by its
/// current slug.
pub struct CommentService<'a, R: ContentRepository, C: CommentRepository> {
    content: &'a R,
    comments: &'a C,
    max_page_size: u32,
}

impl<'a, R: ContentRepository, C: CommentRepository> CommentService<'a, R, C> {
    pub fn new(content: &'a R, comments: &'a C, max_page_size: u32) -> Self {
        Self {
            content,
            comments,
            max_page_size,
        }
    }

    async fn item(&self, kind: ContentKind, slug: &str) -> Result<ContentRecord, ApiError> {
        self.content
            .find_by_slug(kind, slug)
            .await?
            .ok_or(ApiError::NotFound)
    }

    #[instrument(skip_all, fields(kind = %kind, slug = %slug, author = %caller.id))]
    pub async fn add(
        &self,
        kind: ContentKind,
        slug: &str,
        caller: &Caller,
        comment: NewComment,
    ) -> Result<CommentView, ApiError> {
        let body = require_text("body", &comment.body)?;
        let item = self.item(kind, slug).await?;

        let record = NewCommentRecord {
            content_id: item.id,
            author: caller.id.clone(),
            body,
            language: comment.language.as_str().to_string(),
            parent_id: None,
            created_at: current_timestamp(),
        };

        let inserted = self.comments.insert(&record).await?;
        info!(id = inserted.id, content_id = item.id, "Added comment");
        Ok(inserted.into())
    }

    /// Replies always hang off the thread's top-level comment and use its
    /// language.
    #[instrument(skip_all, fields(kind = %kind, slug = %slug, parent_id = reply.parent_id))]
    pub async fn reply(
        &self,
        kind: ContentKind,
        slug: &str,
        caller: &Caller,
        reply: NewReply,
    ) -> Result<CommentView, ApiError> {
        let body = require_text("body", &reply.body)?;
        let item = self.item(kind, slug).await?;
        let parent = self
            .comments
            .find_by_id(reply.parent_id)
            .await?
            .ok_or(ApiError::NotFound)?;

        if parent.content_id != item.id {
            debug!(parent_item = parent.content_id, "Parent comment is on another item");
            return Err(ApiError::BadRequest(
                "Parent comment belongs to a different item".to_string(),
            ));
        }

        let record = NewCommentRecord {
            content_id: item.id,
            author: caller.id.clone(),
            body,
            language: parent.language.clone(),
            parent_id: Some(parent.parent_id.unwrap_or(parent.id)),
            created_at: current_timestamp(),
        };

        let inserted = self.comments.insert(&record).await?;
        info!(id = inserted.id, thread = ?inserted.parent_id, "Added reply");
        Ok(inserted.into())
    }

    /// Top-level comments of an item in one language, or the replies to
    /// `parent_id`.
    pub async fn list(
        &self,
        kind: ContentKind,
        slug: &str,
        language: Language,
        parent_id: Option<i32>,
        request: &PageRequest,
    ) -> Result<Page<CommentView>, ApiError> {
        let item = self.item(kind, slug).await?;
        let filter = CommentFilter {
            content_id: item.id,
            language,
            parent_id,
        };

        let page = list_page(self.comments, &filter, request, self.max_page_size).await?;
        let ids: Vec<i32> = page.items().iter().map(|comment| comment.id).collect();
        let counts = self.comments.reaction_counts(&ids).await?;

        page.try_map(|record| {
            let reactions = counts.get(&record.id).copied().unwrap_or_default();
            Ok::<_, ApiError>(CommentView::from(record).with_reactions(reactions))
        })
    }

    /// Removes the comment and, for a top-level comment, its replies.
    #[instrument(skip_all, fields(id = id, caller = %caller.id))]
    pub async fn delete(&self, id: i32, caller: &Caller) -> Result<usize, ApiError> {
        let comment = self
            .comments
            .find_by_id(id)
            .await?
            .ok_or(ApiError::NotFound)?;
        caller.ensure_can_modify(&comment.author)?;

        let removed = self.comments.delete_thread(id).await?;
        info!(removed, "Deleted comment thread");
        Ok(removed)
    }

    /// Likes or dislikes a comment. Repeating the caller's current reaction
    /// withdraws it; the opposite reaction replaces it.
    #[instrument(skip_all, fields(id = id, reaction = reaction.as_str(), caller = %caller.id))]
    pub async fn react(
        &self,
        id: i32,
        caller: &Caller,
        reaction: Reaction,
    ) -> Result<ReactionSummary, ApiError> {
        if self.comments.find_by_id(id).await?.is_none() {
            return Err(ApiError::NotFound);
        }

        let mine = self
            .comments
            .toggle_reaction(id, &caller.id, reaction)
            .await?;
        let counts = self
            .comments
            .reaction_counts(&[id])
            .await?
            .remove(&id)
            .unwrap_or_default();
        debug!(?mine, likes = counts.likes, dislikes = counts.dislikes, "Toggled reaction");

        Ok(ReactionSummary {
            comment_id: id,
            counts,
            mine,
        })
    }
}
