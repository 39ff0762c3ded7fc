//! Storage ports used by the note service.
//!
//! The service depends on these traits only; `SqliteNoteStore` is the
//! production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::{Note, Page, Tag};

/// Tag persistence.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Look up a tag by its normalized name.
    async fn find_tag_by_name(&self, tag_name: &str) -> Result<Option<Tag>, AppError>;

    /// Insert a new tag row.
    ///
    /// Returns `AppError::Conflict` when another row already holds the same name.
    async fn insert_tag(&self, tag: &Tag) -> Result<(), AppError>;

    /// List every tag ordered by name.
    async fn list_tags(&self) -> Result<Vec<Tag>, AppError>;

    /// Total number of tag rows.
    async fn count_tags(&self) -> Result<i64, AppError>;
}

/// Note aggregate persistence. Each write is one transaction.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Insert a note with its tag links and todos. Tags must already exist.
    async fn insert_note(&self, note: &Note) -> Result<(), AppError>;

    /// Fetch an active note with its tags and active todos.
    async fn find_note(&self, id: &str) -> Result<Option<Note>, AppError>;

    /// Fetch a window of active notes ordered by creation time, then id.
    async fn list_notes(&self, page: Page) -> Result<Vec<Note>, AppError>;

    /// Overwrite scalars and replace the tag link set and todo list.
    ///
    /// Todos dropped from the list are soft-deleted, never removed.
    async fn update_note(&self, note: &Note) -> Result<(), AppError>;

    /// Mark the note and its active todos deleted at `at`.
    ///
    /// Returns `false` when no active note with that id exists.
    async fn soft_delete_note(&self, id: &str, at: DateTime<Utc>) -> Result<bool, AppError>;
}
