//! Unique slug allocation.
//!
//! A slug is derived from a title, then probed against the store for
//! collisions with `-1`, `-2`, ... suffixes. The probe is only a hint: the
//! unique `(kind, slug)` index decides, and a commit that loses the race is
//! retried with the next candidate of the same sequence.

use std::future::Future;
use std::str::FromStr;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::models::ContentKind;

const MAX_BASE_LEN: usize = 96;
const RANDOM_SUFFIX_LEN: usize = 8;

/// What to do when a title normalizes to nothing (e.g. Telugu-only titles).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugFallback {
    /// Use `<kind>-<8 hex chars>` as the base.
    Random,
    /// Fail with `InvalidTitle`.
    Reject,
}

impl FromStr for SlugFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(SlugFallback::Random),
            "reject" => Ok(SlugFallback::Reject),
            other => Err(format!("unknown slug fallback '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlugPolicy {
    pub fallback: SlugFallback,
    /// Commits rejected by the unique index before giving up.
    pub max_conflict_retries: u32,
    /// Store lookups before giving up.
    pub max_probes: u32,
}

impl Default for SlugPolicy {
    fn default() -> Self {
        Self {
            fallback: SlugFallback::Random,
            max_conflict_retries: 5,
            max_probes: 1000,
        }
    }
}

/// Lookup side of the store used by the probe loop.
#[async_trait]
pub trait SlugIndex: Send + Sync {
    async fn slug_exists(
        &self,
        kind: ContentKind,
        slug: &str,
        exclude_id: Option<i32>,
    ) -> Result<bool, ApiError>;
}

/// Outcome of trying to persist something under a slug.
#[derive(Debug)]
pub enum Claim<T> {
    Committed(T),
    /// The unique index already holds this slug.
    Conflict,
}

/// Lowercases, keeps ASCII letters/digits, turns whitespace and `_` runs into
/// single hyphens and trims hyphens from both ends.
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_hyphen = true;
        }
        // everything else is dropped without separating words
    }

    truncate_base(out)
}

fn truncate_base(base: String) -> String {
    if base.len() <= MAX_BASE_LEN {
        return base;
    }
    // base is pure ASCII, byte slicing is safe
    let cut = &base[..MAX_BASE_LEN];
    match cut.rfind('-') {
        Some(idx) if idx > MAX_BASE_LEN / 2 => cut[..idx].to_string(),
        _ => cut.trim_end_matches('-').to_string(),
    }
}

/// The base candidate for `title`, applying the fallback when normalization
/// leaves nothing.
pub fn base_slug(
    kind: ContentKind,
    title: &str,
    fallback: SlugFallback,
) -> Result<String, ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::InvalidTitle);
    }

    let base = normalize_title(title);
    if !base.is_empty() {
        return Ok(base);
    }

    match fallback {
        SlugFallback::Reject => Err(ApiError::InvalidTitle),
        SlugFallback::Random => {
            let id = Uuid::new_v4().simple().to_string();
            Ok(format!("{}-{}", kind.as_str(), &id[..RANDOM_SUFFIX_LEN]))
        }
    }
}

/// `base`, `base-1`, `base-2`, ...
#[derive(Debug, Clone)]
pub struct SlugCandidates {
    base: String,
    next_suffix: u32,
    started: bool,
}

impl SlugCandidates {
    pub fn new(base: String) -> Self {
        Self {
            base,
            next_suffix: 1,
            started: false,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl Iterator for SlugCandidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if !self.started {
            self.started = true;
            return Some(self.base.clone());
        }
        let candidate = format!("{}-{}", self.base, self.next_suffix);
        self.next_suffix = self.next_suffix.checked_add(1)?;
        Some(candidate)
    }
}

/// Walks one candidate sequence across probes and commit conflicts.
pub struct SlugAllocator<'a, S: SlugIndex + ?Sized> {
    index: &'a S,
    kind: ContentKind,
    exclude_id: Option<i32>,
    policy: &'a SlugPolicy,
    candidates: SlugCandidates,
    probes: u32,
    conflicts: u32,
}

impl<'a, S: SlugIndex + ?Sized> SlugAllocator<'a, S> {
    pub fn new(
        index: &'a S,
        kind: ContentKind,
        title: &str,
        exclude_id: Option<i32>,
        policy: &'a SlugPolicy,
    ) -> Result<Self, ApiError> {
        let base = base_slug(kind, title, policy.fallback)?;
        Ok(Self {
            index,
            kind,
            exclude_id,
            policy,
            candidates: SlugCandidates::new(base),
            probes: 0,
            conflicts: 0,
        })
    }

    pub fn base(&self) -> &str {
        self.candidates.base()
    }

    fn exhausted(&self) -> ApiError {
        ApiError::SlugAllocationExhausted {
            base: self.candidates.base().to_string(),
            attempts: self.probes,
        }
    }

    /// Next candidate the store does not currently hold.
    pub async fn next_free(&mut self) -> Result<String, ApiError> {
        loop {
            if self.probes >= self.policy.max_probes {
                return Err(self.exhausted());
            }
            let Some(candidate) = self.candidates.next() else {
                return Err(self.exhausted());
            };
            self.probes += 1;

            if !self
                .index
                .slug_exists(self.kind, &candidate, self.exclude_id)
                .await?
            {
                return Ok(candidate);
            }
            debug!(kind = %self.kind, slug = %candidate, "Slug taken, probing next suffix");
        }
    }

    /// Registers a commit that lost the race for `slug`.
    pub fn record_conflict(&mut self, slug: &str) -> Result<(), ApiError> {
        self.conflicts += 1;
        warn!(
            kind = %self.kind,
            slug = %slug,
            conflicts = self.conflicts,
            "Slug claimed concurrently, retrying with next suffix"
        );
        if self.conflicts > self.policy.max_conflict_retries {
            return Err(self.exhausted());
        }
        Ok(())
    }
}

/// Returns the first slug the store does not hold right now. Not safe on its
/// own under concurrent writers; see [`claim_unique_slug`].
pub async fn allocate_slug<S: SlugIndex + ?Sized>(
    index: &S,
    kind: ContentKind,
    title: &str,
    exclude_id: Option<i32>,
    policy: &SlugPolicy,
) -> Result<String, ApiError> {
    SlugAllocator::new(index, kind, title, exclude_id, policy)?
        .next_free()
        .await
}

/// Probes for a free slug and hands it to `commit`, retrying with the next
/// candidate whenever the unique index rejects the commit.
pub async fn claim_unique_slug<S, T, F, Fut>(
    index: &S,
    kind: ContentKind,
    title: &str,
    exclude_id: Option<i32>,
    policy: &SlugPolicy,
    mut commit: F,
) -> Result<T, ApiError>
where
    S: SlugIndex + ?Sized,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Claim<T>, ApiError>>,
{
    let mut allocator = SlugAllocator::new(index, kind, title, exclude_id, policy)?;
    loop {
        let slug = allocator.next_free().await?;
        match commit(slug.clone()).await? {
            Claim::Committed(value) => return Ok(value),
            Claim::Conflict => allocator.record_conflict(&slug)?,
        }
    }
}
