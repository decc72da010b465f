//! Create, edit, list and look up the slugged content collections.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::caller::Caller;
use crate::errors::ApiError;
use crate::filter::ContentFilter;
use crate::models::{
    Bilingual, ContentChanges, ContentDetails, ContentItem, ContentKind, ContentRecord,
    GalleryDetails, NewContentRecord, NewsDetails, VideoDetails, current_timestamp,
};
use crate::pagination::{Page, PageRequest, list_page};
use crate::repositories::ContentRepository;
use crate::slug::{Claim, SlugPolicy, claim_unique_slug};
use crate::validation::{ValidationError, normalize_tags, require_text, validate_media_url};

const VIDEO_CATEGORY: &str = "videos";

/// Request body for create and edit. On edit, blank or absent fields keep the
/// stored value.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPayload {
    #[serde(default)]
    pub title: Bilingual,
    #[serde(default)]
    pub description: Bilingual,
    #[serde(default)]
    pub category: Bilingual,
    #[serde(default)]
    pub sub_category: Option<Bilingual>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub main_url: Option<String>,
    /// Kind-specific fields; the route decides which shape applies.
    #[serde(default)]
    pub details: Option<Value>,
}

/// A validated item that has everything except its slug.
#[derive(Debug, Clone)]
struct Draft {
    kind: ContentKind,
    title: Bilingual,
    description: Bilingual,
    category: Bilingual,
    sub_category: Option<Bilingual>,
    tags: Vec<String>,
    main_url: Option<String>,
    details: ContentDetails,
}

fn to_column_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|err| {
        error!(error = %err, "Failed to encode column JSON");
        ApiError::Internal
    })
}

fn youtube_thumbnail(id: &str) -> String {
    format!("https://img.youtube.com/vi/{id}/mqdefault.jpg")
}

fn youtube_embed(id: &str) -> String {
    format!("https://www.youtube.com/embed/{id}")
}

fn parse_details(
    kind: ContentKind,
    value: Option<Value>,
) -> Result<ContentDetails, ValidationError> {
    let value = value.unwrap_or_else(|| Value::Object(Default::default()));
    let invalid = |err: serde_json::Error| ValidationError::InvalidDetails {
        kind: kind.as_str(),
        reason: err.to_string(),
    };

    let details = match kind {
        ContentKind::News => {
            let mut news: NewsDetails = serde_json::from_value(value).map_err(invalid)?;
            if !news.movie_rating.is_finite() || news.movie_rating < 0.0 {
                return Err(ValidationError::InvalidDetails {
                    kind: kind.as_str(),
                    reason: "movieRating must be a non-negative number".to_string(),
                });
            }
            if let Some(audio) = news.audio.take() {
                let audio = audio.trimmed();
                news.audio = if audio.is_blank() {
                    None
                } else {
                    Some(Bilingual {
                        en: optional_url("audio.en", &audio.en)?,
                        te: optional_url("audio.te", &audio.te)?,
                    })
                };
            }
            ContentDetails::News(news)
        }
        ContentKind::Gallery => {
            let gallery: GalleryDetails = serde_json::from_value(value).map_err(invalid)?;
            let pictures = gallery
                .pictures
                .iter()
                .map(|picture| validate_media_url("pictures", picture))
                .collect::<Result<Vec<_>, _>>()?;
            ContentDetails::Gallery(GalleryDetails {
                name: gallery.name.trimmed(),
                pictures,
            })
        }
        ContentKind::Video => {
            let video: VideoDetails = serde_json::from_value(value).map_err(invalid)?;
            let youtube_id = require_text("details.youtubeId", &video.youtube_id)?;
            if !youtube_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ValidationError::InvalidDetails {
                    kind: kind.as_str(),
                    reason: format!("'{youtube_id}' is not a YouTube video id"),
                });
            }
            ContentDetails::Video(VideoDetails {
                video_url: youtube_embed(&youtube_id),
                youtube_id,
            })
        }
    };
    Ok(details)
}

fn optional_url(field: &'static str, value: &str) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Ok(String::new());
    }
    validate_media_url(field, value)
}

fn validated_main_url(
    kind: ContentKind,
    main_url: Option<&str>,
    details: &ContentDetails,
) -> Result<Option<String>, ValidationError> {
    if let ContentDetails::Video(video) = details {
        return Ok(Some(youtube_thumbnail(&video.youtube_id)));
    }
    match main_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => Ok(Some(validate_media_url("mainUrl", url)?)),
        None if kind == ContentKind::News => Err(ValidationError::MissingField("mainUrl")),
        None => Ok(None),
    }
}

fn non_blank_bilingual(value: Option<Bilingual>) -> Option<Bilingual> {
    value.map(|v| v.trimmed()).filter(|v| !v.is_blank())
}

impl Draft {
    fn from_payload(kind: ContentKind, payload: ContentPayload) -> Result<Self, ApiError> {
        let title = Bilingual {
            en: require_text("title.en", &payload.title.en)
                .map_err(|_| ApiError::InvalidTitle)?,
            te: require_text("title.te", &payload.title.te)?,
        };

        let mut category = payload.category.trimmed();
        if kind == ContentKind::Video {
            category = Bilingual::new(VIDEO_CATEGORY, VIDEO_CATEGORY).merged_with(&category);
        }

        let details = parse_details(kind, payload.details)?;
        let main_url = validated_main_url(kind, payload.main_url.as_deref(), &details)?;

        Ok(Draft {
            kind,
            title,
            description: payload.description.trimmed(),
            category,
            sub_category: non_blank_bilingual(payload.sub_category),
            tags: normalize_tags(&payload.tags),
            main_url,
            details,
        })
    }

    /// Applies an edit on top of the stored item.
    fn merged(current: &ContentItem, payload: ContentPayload) -> Result<Self, ApiError> {
        let kind = current.kind;
        let details = match payload.details {
            Some(value) => parse_details(kind, Some(value))?,
            None => current.details.clone(),
        };
        let main_url = match payload.main_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => validated_main_url(kind, Some(url), &details)?,
            _ => match &details {
                ContentDetails::Video(video) => Some(youtube_thumbnail(&video.youtube_id)),
                _ => current.main_url.clone(),
            },
        };

        let tags = normalize_tags(&payload.tags);
        let update = non_blank_bilingual(payload.sub_category);
        let sub_category = match (current.sub_category.as_ref(), update) {
            (Some(existing), Some(update)) => Some(existing.merged_with(&update)),
            (None, update) => update,
            (existing, None) => existing.cloned(),
        };

        Ok(Draft {
            kind,
            title: current.title.merged_with(&payload.title),
            description: current.description.merged_with(&payload.description),
            category: current.category.merged_with(&payload.category),
            sub_category,
            tags: if tags.is_empty() {
                current.tags.clone()
            } else {
                tags
            },
            main_url,
            details,
        })
    }

    fn new_record(&self, slug: String, author: &str) -> Result<NewContentRecord, ApiError> {
        let now = current_timestamp();
        let (sub_en, sub_te) = split_optional(&self.sub_category);
        Ok(NewContentRecord {
            kind: self.kind.as_str().to_string(),
            slug,
            title_en: self.title.en.clone(),
            title_te: self.title.te.clone(),
            description_en: self.description.en.clone(),
            description_te: self.description.te.clone(),
            category_en: self.category.en.clone(),
            category_te: self.category.te.clone(),
            sub_category_en: sub_en,
            sub_category_te: sub_te,
            tags: to_column_json(&self.tags)?,
            author: author.to_string(),
            main_url: self.main_url.clone(),
            details: to_column_json(&self.details)?,
            created_at: now,
            updated_at: now,
        })
    }

    fn changes(&self, slug: String) -> Result<ContentChanges, ApiError> {
        let (sub_en, sub_te) = split_optional(&self.sub_category);
        Ok(ContentChanges {
            slug,
            title_en: self.title.en.clone(),
            title_te: self.title.te.clone(),
            description_en: self.description.en.clone(),
            description_te: self.description.te.clone(),
            category_en: self.category.en.clone(),
            category_te: self.category.te.clone(),
            sub_category_en: sub_en,
            sub_category_te: sub_te,
            tags: to_column_json(&self.tags)?,
            main_url: self.main_url.clone(),
            details: to_column_json(&self.details)?,
            updated_at: current_timestamp(),
        })
    }
}

fn split_optional(value: &Option<Bilingual>) -> (Option<String>, Option<String>) {
    match value {
        Some(v) => (Some(v.en.clone()), Some(v.te.clone())),
        None => (None, None),
    }
}

/// Content operations for one repository and slug policy.
pub struct ContentService<'a, R: ContentRepository> {
    repo: &'a R,
    slug_policy: &'a SlugPolicy,
    max_page_size: u32,
}

impl<'a, R: ContentRepository> ContentService<'a, R> {
    pub fn new(repo: &'a R, slug_policy: &'a SlugPolicy, max_page_size: u32) -> Self {
        Self {
            repo,
            slug_policy,
            max_page_size,
        }
    }

    /// Validates `payload` and stores it under a slug that is unique within
    /// `kind`. Nothing is written unless the slug is committed.
    #[instrument(skip_all, fields(kind = %kind, author = %caller.id))]
    pub async fn create(
        &self,
        kind: ContentKind,
        caller: &Caller,
        payload: ContentPayload,
    ) -> Result<ContentItem, ApiError> {
        let draft = Draft::from_payload(kind, payload)?;
        let repo = self.repo;

        let record = claim_unique_slug(
            repo,
            kind,
            &draft.title.en,
            None,
            self.slug_policy,
            |slug| {
                let record = draft.new_record(slug, &caller.id);
                async move { repo.insert(&record?).await }
            },
        )
        .await?;

        info!(id = record.id, slug = %record.slug, "Created content item");
        ContentItem::try_from(record)
    }

    /// Applies `payload` to item `id`. The slug is reallocated only when the
    /// English title changes.
    #[instrument(skip_all, fields(kind = %kind, id = id, caller = %caller.id))]
    pub async fn edit(
        &self,
        kind: ContentKind,
        id: i32,
        caller: &Caller,
        payload: ContentPayload,
    ) -> Result<ContentItem, ApiError> {
        let existing = self
            .repo
            .find_by_id(kind, id)
            .await?
            .ok_or(ApiError::NotFound)?;
        caller.ensure_can_modify(&existing.author)?;

        let current = ContentItem::try_from(existing)?;
        let draft = Draft::merged(&current, payload)?;
        let repo = self.repo;

        let record = if draft.title.en == current.title.en {
            debug!(slug = %current.slug, "Title unchanged, keeping slug");
            match repo.update(kind, id, &draft.changes(current.slug.clone())?).await? {
                Some(Claim::Committed(record)) => record,
                Some(Claim::Conflict) => {
                    error!(slug = %current.slug, "Unchanged slug rejected by the slug index");
                    return Err(ApiError::Internal);
                }
                None => return Err(ApiError::NotFound),
            }
        } else {
            claim_unique_slug(
                repo,
                kind,
                &draft.title.en,
                Some(id),
                self.slug_policy,
                |slug| {
                    let changes = draft.changes(slug);
                    async move {
                        repo.update(kind, id, &changes?)
                            .await?
                            .ok_or(ApiError::NotFound)
                    }
                },
            )
            .await?
        };

        info!(slug = %record.slug, "Updated content item");
        ContentItem::try_from(record)
    }

    pub async fn get_by_id(&self, kind: ContentKind, id: i32) -> Result<ContentItem, ApiError> {
        let record = self
            .repo
            .find_by_id(kind, id)
            .await?
            .ok_or(ApiError::NotFound)?;
        ContentItem::try_from(record)
    }

    pub async fn get_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<ContentItem, ApiError> {
        let record = self
            .repo
            .find_by_slug(kind, slug)
            .await?
            .ok_or(ApiError::NotFound)?;
        ContentItem::try_from(record)
    }

    #[instrument(skip_all, fields(kind = %filter.kind, limit = request.limit))]
    pub async fn list(
        &self,
        filter: &ContentFilter,
        request: &PageRequest,
    ) -> Result<Page<ContentItem>, ApiError> {
        let page = list_page(self.repo, filter, request, self.max_page_size).await?;
        page.try_map(ContentItem::try_from)
    }

    /// Deletes the item along with its comments.
    #[instrument(skip_all, fields(kind = %kind, id = id, caller = %caller.id))]
    pub async fn delete(
        &self,
        kind: ContentKind,
        id: i32,
        caller: &Caller,
    ) -> Result<(), ApiError> {
        let existing: ContentRecord = self
            .repo
            .find_by_id(kind, id)
            .await?
            .ok_or(ApiError::NotFound)?;
        caller.ensure_can_modify(&existing.author)?;

        if !self.repo.delete(kind, id).await? {
            return Err(ApiError::NotFound);
        }
        info!(slug = %existing.slug, "Deleted content item");
        Ok(())
    }
}
