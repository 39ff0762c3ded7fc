//! Tag resolution: slug normalization and find-or-construct.
//!
//! Every tag name is reduced to its canonical slug before lookup and before
//! it is stored, so `"More Tags"`, `"MORE TAGS"` and `"moreTags"` all land on
//! the single row `more-tags`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::db::TagStore;
use crate::errors::AppError;
use crate::models::{CreateTagRequest, Tag};

/// Convert a display name into its canonical slug (param-case).
///
/// Words break at every non-alphanumeric character, at a lowercase letter
/// or digit followed by an uppercase letter, and before the last capital of
/// an uppercase run that is followed by a lowercase letter.
pub fn slugify(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            flush_word(&mut current, &mut words);
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                flush_word(&mut current, &mut words);
            }
        }

        current.extend(c.to_lowercase());
    }
    flush_word(&mut current, &mut words);

    words.join("-")
}

fn flush_word(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

/// Outcome of a lookup: a stored row, or a fresh row still to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTag {
    Existing(Tag),
    New(Tag),
}

impl ResolvedTag {
    pub fn tag(&self) -> &Tag {
        match self {
            ResolvedTag::Existing(tag) | ResolvedTag::New(tag) => tag,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ResolvedTag::New(_))
    }
}

/// Finds tags by normalized name, constructing new ones on a miss.
#[derive(Clone)]
pub struct TagResolver {
    store: Arc<dyn TagStore>,
}

impl TagResolver {
    pub fn new(store: Arc<dyn TagStore>) -> Self {
        Self { store }
    }

    /// Resolve one requested name. New tags are not persisted here.
    pub async fn resolve(&self, raw_name: &str) -> Result<ResolvedTag, AppError> {
        let tag_name = slugify(raw_name);
        if tag_name.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Tag name {:?} has no letters or digits",
                raw_name
            )));
        }

        match self.store.find_tag_by_name(&tag_name).await? {
            Some(tag) => Ok(ResolvedTag::Existing(tag)),
            None => Ok(ResolvedTag::New(Tag {
                id: uuid::Uuid::new_v4().to_string(),
                tag_name,
            })),
        }
    }

    /// Resolve a request list, collapsing names that share a slug.
    ///
    /// First occurrence wins and request order is kept.
    pub async fn resolve_all(
        &self,
        requests: &[CreateTagRequest],
    ) -> Result<Vec<ResolvedTag>, AppError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(requests.len());

        for request in requests {
            if !seen.insert(slugify(&request.tag_name)) {
                continue;
            }
            resolved.push(self.resolve(&request.tag_name).await?);
        }

        Ok(resolved)
    }

    /// Make sure a resolved tag has a stored row and return that row.
    ///
    /// Losing an insert race to a concurrent request is not an error: the
    /// winner's row is fetched and used instead.
    pub async fn persist(&self, resolved: ResolvedTag) -> Result<Tag, AppError> {
        let tag = match resolved {
            ResolvedTag::Existing(tag) => return Ok(tag),
            ResolvedTag::New(tag) => tag,
        };

        match self.store.insert_tag(&tag).await {
            Ok(()) => {
                tracing::debug!(tag_id = %tag.id, tag_name = %tag.tag_name, "tag created");
                Ok(tag)
            }
            Err(AppError::Conflict(_)) => {
                tracing::warn!(
                    tag_name = %tag.tag_name,
                    "tag inserted concurrently, using existing row"
                );
                self.store
                    .find_tag_by_name(&tag.tag_name)
                    .await?
                    .ok_or_else(|| {
                        AppError::Database(format!(
                            "Tag {} vanished after uniqueness conflict",
                            tag.tag_name
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve and persist a whole request list.
    pub async fn resolve_tags(&self, requests: &[CreateTagRequest]) -> Result<Vec<Tag>, AppError> {
        let resolved = self.resolve_all(requests).await?;
        tracing::debug!(
            tags = ?resolved.iter().map(|r| r.tag().tag_name.as_str()).collect::<Vec<_>>(),
            new = resolved.iter().filter(|r| r.is_new()).count(),
            "tags resolved"
        );

        let mut tags: Vec<Tag> = Vec::with_capacity(resolved.len());
        for entry in resolved {
            let tag = self.persist(entry).await?;
            // Two slugs raced onto the same row; keep the set free of duplicates.
            if !tags.iter().any(|t| t.id == tag.id) {
                tags.push(tag);
            }
        }
        Ok(tags)
    }
}
