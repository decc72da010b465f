use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::ApiError;
use crate::validation::ValidationError;

/// The three independently slugged collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    News,
    Gallery,
    Video,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::News, ContentKind::Gallery, ContentKind::Video];

    /// Value stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::News => "news",
            ContentKind::Gallery => "gallery",
            ContentKind::Video => "video",
        }
    }

    /// Collection name used in routes.
    pub fn collection(&self) -> &'static str {
        match self {
            ContentKind::News => "news",
            ContentKind::Gallery => "gallery",
            ContentKind::Video => "videos",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "news" => Ok(ContentKind::News),
            "gallery" => Ok(ContentKind::Gallery),
            "video" | "videos" => Ok(ContentKind::Video),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Te,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Te => "te",
        }
    }
}

impl FromStr for Language {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Language::En),
            "te" => Ok(Language::Te),
            other => Err(ValidationError::UnknownLanguage(other.to_string())),
        }
    }
}

/// English/Telugu pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bilingual {
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub te: String,
}

impl Bilingual {
    pub fn new(en: impl Into<String>, te: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            te: te.into(),
        }
    }

    /// Keeps `self` for every side the update leaves blank.
    pub fn merged_with(&self, update: &Bilingual) -> Bilingual {
        let pick = |current: &str, incoming: &str| {
            let incoming = incoming.trim();
            if incoming.is_empty() {
                current.to_string()
            } else {
                incoming.to_string()
            }
        };
        Bilingual {
            en: pick(&self.en, &update.en),
            te: pick(&self.te, &update.te),
        }
    }

    pub fn trimmed(&self) -> Bilingual {
        Bilingual::new(self.en.trim(), self.te.trim())
    }

    pub fn is_blank(&self) -> bool {
        self.en.trim().is_empty() && self.te.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsDetails {
    #[serde(default)]
    pub movie_rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Bilingual>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryDetails {
    #[serde(default)]
    pub name: Bilingual,
    #[serde(default)]
    pub pictures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    #[serde(default)]
    pub youtube_id: String,
    #[serde(default)]
    pub video_url: String,
}

/// Kind-specific payload, persisted as JSON in the `details` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentDetails {
    News(NewsDetails),
    Gallery(GalleryDetails),
    Video(VideoDetails),
}

impl ContentDetails {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentDetails::News(_) => ContentKind::News,
            ContentDetails::Gallery(_) => ContentKind::Gallery,
            ContentDetails::Video(_) => ContentKind::Video,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::content_items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ContentRecord {
    pub id: i32,
    pub kind: String,
    pub slug: String,
    pub title_en: String,
    pub title_te: String,
    pub description_en: String,
    pub description_te: String,
    pub category_en: String,
    pub category_te: String,
    pub sub_category_en: Option<String>,
    pub sub_category_te: Option<String>,
    pub tags: String,
    pub author: String,
    pub main_url: Option<String>,
    pub details: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::content_items)]
pub struct NewContentRecord {
    pub kind: String,
    pub slug: String,
    pub title_en: String,
    pub title_te: String,
    pub description_en: String,
    pub description_te: String,
    pub category_en: String,
    pub category_te: String,
    pub sub_category_en: Option<String>,
    pub sub_category_te: Option<String>,
    pub tags: String,
    pub author: String,
    pub main_url: Option<String>,
    pub details: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Full replacement of the editable columns.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::content_items)]
#[diesel(treat_none_as_null = true)]
pub struct ContentChanges {
    pub slug: String,
    pub title_en: String,
    pub title_te: String,
    pub description_en: String,
    pub description_te: String,
    pub category_en: String,
    pub category_te: String,
    pub sub_category_en: Option<String>,
    pub sub_category_te: Option<String>,
    pub tags: String,
    pub main_url: Option<String>,
    pub details: String,
    pub updated_at: NaiveDateTime,
}

/// Public representation of a stored content item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: i32,
    pub kind: ContentKind,
    pub slug: String,
    pub title: Bilingual,
    pub description: Bilingual,
    pub category: Bilingual,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<Bilingual>,
    pub tags: Vec<String>,
    pub author: String,
    pub main_url: Option<String>,
    pub details: ContentDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ContentRecord> for ContentItem {
    type Error = ApiError;

    fn try_from(record: ContentRecord) -> Result<Self, Self::Error> {
        let kind = record.kind.parse::<ContentKind>().map_err(|err| {
            error!(id = record.id, error = %err, "Stored row has an unknown kind");
            ApiError::Internal
        })?;
        let tags: Vec<String> = serde_json::from_str(&record.tags).map_err(|err| {
            error!(id = record.id, error = %err, "Stored tags are not valid JSON");
            ApiError::Internal
        })?;
        let details: ContentDetails = serde_json::from_str(&record.details).map_err(|err| {
            error!(id = record.id, error = %err, "Stored details are not valid JSON");
            ApiError::Internal
        })?;

        let sub_category = match (record.sub_category_en, record.sub_category_te) {
            (None, None) => None,
            (en, te) => Some(Bilingual::new(en.unwrap_or_default(), te.unwrap_or_default())),
        };

        Ok(ContentItem {
            id: record.id,
            kind,
            slug: record.slug,
            title: Bilingual::new(record.title_en, record.title_te),
            description: Bilingual::new(record.description_en, record.description_te),
            category: Bilingual::new(record.category_en, record.category_te),
            sub_category,
            tags,
            author: record.author,
            main_url: record.main_url,
            details,
            created_at: record.created_at.and_utc(),
            updated_at: record.updated_at.and_utc(),
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::comments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CommentRecord {
    pub id: i32,
    pub content_id: i32,
    pub author: String,
    pub body: String,
    pub language: String,
    pub parent_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::comments)]
pub struct NewCommentRecord {
    pub content_id: i32,
    pub author: String,
    pub body: String,
    pub language: String,
    pub parent_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::Like => "like",
            Reaction::Dislike => "dislike",
        }
    }
}

impl FromStr for Reaction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Reaction::Like),
            "dislike" => Ok(Reaction::Dislike),
            other => {
                error!(reaction = other, "Unknown reaction stored in database");
                Err(ApiError::Internal)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReactionCounts {
    pub likes: u64,
    pub dislikes: u64,
}

impl ReactionCounts {
    pub fn add(&mut self, reaction: Reaction) {
        match reaction {
            Reaction::Like => self.likes += 1,
            Reaction::Dislike => self.dislikes += 1,
        }
    }
}

/// Counts after a like/dislike toggle, plus what the caller now holds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSummary {
    pub comment_id: i32,
    #[serde(flatten)]
    pub counts: ReactionCounts,
    pub mine: Option<Reaction>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i32,
    pub content_id: i32,
    pub author: String,
    pub body: String,
    pub language: String,
    pub parent_id: Option<i32>,
    #[serde(flatten)]
    pub reactions: ReactionCounts,
    pub created_at: DateTime<Utc>,
}

impl CommentView {
    pub fn with_reactions(mut self, reactions: ReactionCounts) -> Self {
        self.reactions = reactions;
        self
    }
}

impl From<CommentRecord> for CommentView {
    fn from(record: CommentRecord) -> Self {
        CommentView {
            id: record.id,
            content_id: record.content_id,
            author: record.author,
            body: record.body,
            language: record.language,
            parent_id: record.parent_id,
            reactions: ReactionCounts::default(),
            created_at: record.created_at.and_utc(),
        }
    }
}

/// Creation timestamp at the resolution the cursor format carries.
pub fn current_timestamp() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}
