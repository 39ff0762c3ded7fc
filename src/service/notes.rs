//! Note service: create, read, list, update and soft-delete note aggregates.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use super::TagResolver;
use crate::db::NoteStore;
use crate::errors::AppError;
use crate::models::{
    CreateNoteRequest, CreateTodoRequest, DeletionState, Note, PageLimits, PaginationQuery, Tag,
    Todo, UpdateNoteRequest,
};

/// Aggregate writer for notes. Collaborators are passed in explicitly.
#[derive(Clone)]
pub struct NoteService {
    store: Arc<dyn NoteStore>,
    tags: TagResolver,
    limits: PageLimits,
}

impl NoteService {
    pub fn new(store: Arc<dyn NoteStore>, tags: TagResolver, limits: PageLimits) -> Self {
        Self {
            store,
            tags,
            limits,
        }
    }

    /// Create a note with its tags and todos.
    pub async fn create(&self, request: CreateNoteRequest) -> Result<Note, AppError> {
        let now = now();
        let tags = match &request.tags {
            Some(requests) => self.tags.resolve_tags(requests).await?,
            None => Vec::new(),
        };
        let todos = match &request.todos {
            Some(requests) => build_todos(requests, &[], now),
            None => Vec::new(),
        };

        let note = Note {
            id: uuid::Uuid::new_v4().to_string(),
            title: request.title,
            description: request.description,
            details: request.details,
            tags: sorted(tags),
            todos,
            created_date: now,
            updated_date: now,
            deleted: DeletionState::Active,
        };

        self.store.insert_note(&note).await?;
        tracing::info!(
            note_id = %note.id,
            tags = note.tags.len(),
            todos = note.todos.len(),
            "note created"
        );

        Ok(note)
    }

    /// List active notes, oldest first.
    pub async fn find_all(&self, query: &PaginationQuery) -> Result<Vec<Note>, AppError> {
        let page = self.limits.page(query);
        self.store.list_notes(page).await
    }

    /// Fetch one active note. Soft-deleted notes are reported as not found.
    pub async fn find_one(&self, id: &str) -> Result<Note, AppError> {
        self.store
            .find_note(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Merge an update over the stored note.
    ///
    /// Scalars left out of the request keep their value. A supplied `tags` or
    /// `todos` list replaces the whole collection.
    pub async fn update(&self, id: &str, request: UpdateNoteRequest) -> Result<Note, AppError> {
        let existing = self.find_one(id).await?;
        let now = now();

        let tags = match &request.tags {
            Some(requests) => sorted(self.tags.resolve_tags(requests).await?),
            None => existing.tags.clone(),
        };
        let todos = match &request.todos {
            Some(requests) => build_todos(requests, &existing.todos, now),
            None => existing.todos.clone(),
        };

        let note = Note {
            id: existing.id,
            title: request.title.unwrap_or(existing.title),
            description: request.description.or(existing.description),
            details: request.details.or(existing.details),
            tags,
            todos,
            created_date: existing.created_date,
            updated_date: now,
            deleted: DeletionState::Active,
        };

        self.store.update_note(&note).await?;
        tracing::info!(note_id = %note.id, "note updated");

        Ok(note)
    }

    /// Soft-delete a note and its todos. Tags are left alone.
    pub async fn remove(&self, id: &str) -> Result<Note, AppError> {
        let mut note = self.find_one(id).await?;
        let at = now();

        if !self.store.soft_delete_note(id, at).await? {
            // Removed by someone else between the read and the write.
            return Err(not_found(id));
        }

        let deleted = DeletionState::SoftDeleted { at };
        note.deleted = deleted;
        note.updated_date = at;
        for todo in &mut note.todos {
            todo.deleted = deleted;
            todo.updated_date = at;
        }

        tracing::info!(note_id = %note.id, "note removed");
        Ok(note)
    }
}

/// Current time at the precision storage keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Note ID {} not found", id))
}

fn sorted(mut tags: Vec<Tag>) -> Vec<Tag> {
    tags.sort_by(|a, b| a.tag_name.cmp(&b.tag_name));
    tags
}

/// Build a replacement todo list.
///
/// A request naming one of `current` by id keeps that todo's identity and
/// creation time; anything else becomes a fresh todo.
fn build_todos(
    requests: &[CreateTodoRequest],
    current: &[Todo],
    now: DateTime<Utc>,
) -> Vec<Todo> {
    let mut used_ids = HashSet::new();

    requests
        .iter()
        .map(|request| {
            let kept = request
                .id
                .as_deref()
                .and_then(|id| current.iter().find(|t| t.id == id))
                .filter(|t| used_ids.insert(t.id.clone()));

            Todo {
                id: kept
                    .map(|t| t.id.clone())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                text: request.text.clone(),
                is_completed: request.is_completed,
                due_date: request.due_date.clone(),
                created_date: kept.map(|t| t.created_date).unwrap_or(now),
                updated_date: now,
                deleted: DeletionState::Active,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::db::{init_database, SqliteNoteStore, TagStore};
    use crate::models::CreateTagRequest;

    struct Fixture {
        service: NoteService,
        store: Arc<SqliteNoteStore>,
        _temp_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("notes.sqlite"))
            .await
            .unwrap();
        let store = Arc::new(SqliteNoteStore::new(pool));
        let service = NoteService::new(
            store.clone(),
            TagResolver::new(store.clone()),
            PageLimits::default(),
        );
        Fixture {
            service,
            store,
            _temp_dir: temp_dir,
        }
    }

    fn note_with_tags(title: &str, tags: &[&str]) -> CreateNoteRequest {
        CreateNoteRequest {
            title: title.to_string(),
            tags: Some(tags.iter().map(|t| CreateTagRequest::named(*t)).collect()),
            ..Default::default()
        }
    }

    fn titled(title: &str) -> CreateNoteRequest {
        CreateNoteRequest {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn page(skip: i64, take: i64) -> PaginationQuery {
        PaginationQuery {
            skip: Some(skip),
            take: Some(take),
        }
    }

    #[tokio::test]
    async fn test_create_returns_hydrated_aggregate() {
        let fx = fixture().await;

        let note = fx
            .service
            .create(CreateNoteRequest {
                title: "My note title".to_string(),
                tags: Some(vec![
                    CreateTagRequest::named("Stuff"),
                    CreateTagRequest::named("More Tags"),
                ]),
                todos: Some(vec![CreateTodoRequest::new("Make a todo list", false)]),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(uuid::Uuid::parse_str(&note.id).is_ok());
        let names: Vec<&str> = note.tags.iter().map(|t| t.tag_name.as_str()).collect();
        assert_eq!(names, vec!["more-tags", "stuff"]);
        assert_eq!(note.todos.len(), 1);
        assert_eq!(note.todos[0].text, "Make a todo list");
        assert!(!note.todos[0].is_completed);
        assert_eq!(note.deleted, DeletionState::Active);

        let stored = fx.service.find_one(&note.id).await.unwrap();
        assert_eq!(stored, note);
    }

    #[tokio::test]
    async fn test_tags_are_shared_across_notes() {
        let fx = fixture().await;

        let first = fx
            .service
            .create(note_with_tags("first", &["Stuff", "More Tags"]))
            .await
            .unwrap();
        let second = fx
            .service
            .create(note_with_tags("second", &["stuff", "MORE TAGS"]))
            .await
            .unwrap();

        assert_eq!(fx.store.count_tags().await.unwrap(), 2);
        assert_eq!(first.tags, second.tags);
    }

    #[tokio::test]
    async fn test_concurrent_creates_share_new_tag() {
        let fx = fixture().await;
        let service = Arc::new(fx.service.clone());

        let handles: Vec<_> = ["Shared Tag", "shared tag", "SHARED TAG", "sharedTag"]
            .into_iter()
            .map(|name| {
                let service = service.clone();
                tokio::spawn(async move { service.create(note_with_tags("race", &[name])).await })
            })
            .collect();

        let mut tag_ids = HashSet::new();
        for handle in handles {
            let note = handle.await.unwrap().unwrap();
            tag_ids.insert(note.tags[0].id.clone());
        }

        assert_eq!(tag_ids.len(), 1);
        assert_eq!(fx.store.count_tags().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_one_missing_is_not_found() {
        let fx = fixture().await;

        let err = fx.service.find_one("does-not-exist").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_soft_deleted_note_is_not_found() {
        let fx = fixture().await;
        let note = fx.service.create(titled("to delete")).await.unwrap();

        fx.service.remove(&note.id).await.unwrap();

        let err = fx.service.find_one(&note.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = fx
            .service
            .update(
                &note.id,
                UpdateNoteRequest {
                    title: Some("revived".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_twice_reports_not_found() {
        let fx = fixture().await;
        let note = fx.service.create(titled("to delete")).await.unwrap();

        let removed = fx.service.remove(&note.id).await.unwrap();
        assert!(removed.deleted.is_deleted());

        let err = fx.service.remove(&note.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // The row is retained, only marked.
        let row: (Option<String>,) = sqlx::query_as("SELECT deleted_date FROM notes WHERE id = ?")
            .bind(&note.id)
            .fetch_one(&fx.store_pool())
            .await
            .unwrap();
        assert!(row.0.is_some());
    }

    #[tokio::test]
    async fn test_remove_cascades_to_todos_but_not_tags() {
        let fx = fixture().await;
        let doomed = fx
            .service
            .create(CreateNoteRequest {
                title: "doomed".to_string(),
                tags: Some(vec![CreateTagRequest::named("Keep Me")]),
                todos: Some(vec![
                    CreateTodoRequest::new("one", false),
                    CreateTodoRequest::new("two", true),
                ]),
                ..Default::default()
            })
            .await
            .unwrap();
        let survivor = fx
            .service
            .create(note_with_tags("survivor", &["keep me"]))
            .await
            .unwrap();

        let removed = fx.service.remove(&doomed.id).await.unwrap();
        let at = removed.deleted.deleted_at().unwrap();
        assert!(removed
            .todos
            .iter()
            .all(|t| t.deleted == DeletionState::SoftDeleted { at }));

        let (deleted_todos,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM todos WHERE note_id = ? AND deleted_date IS NOT NULL",
        )
        .bind(&doomed.id)
        .fetch_one(&fx.store_pool())
        .await
        .unwrap();
        assert_eq!(deleted_todos, 2);

        assert_eq!(fx.store.count_tags().await.unwrap(), 1);
        let survivor = fx.service.find_one(&survivor.id).await.unwrap();
        assert_eq!(survivor.tags[0].tag_name, "keep-me");
    }

    #[tokio::test]
    async fn test_update_replaces_todos_wholesale() {
        let fx = fixture().await;
        let note = fx
            .service
            .create(CreateNoteRequest {
                title: "todos".to_string(),
                todos: Some(vec![
                    CreateTodoRequest::new("first", false),
                    CreateTodoRequest::new("second", false),
                ]),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = fx
            .service
            .update(
                &note.id,
                UpdateNoteRequest {
                    todos: Some(vec![CreateTodoRequest::new("only", true)]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.todos.len(), 1);

        let stored = fx.service.find_one(&note.id).await.unwrap();
        assert_eq!(stored.todos.len(), 1);
        assert_eq!(stored.todos[0].text, "only");
        assert!(stored.todos[0].is_completed);

        // Replaced todos stay as soft-deleted rows.
        let (active, retired): (i64, i64) = sqlx::query_as(
            r#"SELECT COUNT(*) FILTER (WHERE deleted_date IS NULL),
                      COUNT(*) FILTER (WHERE deleted_date IS NOT NULL)
               FROM todos WHERE note_id = ?"#,
        )
        .bind(&note.id)
        .fetch_one(&fx.store_pool())
        .await
        .unwrap();
        assert_eq!((active, retired), (1, 2));
    }

    #[tokio::test]
    async fn test_update_keeps_identity_of_named_todos() {
        let fx = fixture().await;
        let note = fx
            .service
            .create(CreateNoteRequest {
                title: "todos".to_string(),
                todos: Some(vec![
                    CreateTodoRequest::new("first", false),
                    CreateTodoRequest::new("second", false),
                ]),
                ..Default::default()
            })
            .await
            .unwrap();
        let kept = note.todos[1].clone();

        let mut done = CreateTodoRequest::new("second, done", true);
        done.id = Some(kept.id.clone());
        let updated = fx
            .service
            .update(
                &note.id,
                UpdateNoteRequest {
                    todos: Some(vec![done, CreateTodoRequest::new("third", false)]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = fx.service.find_one(&note.id).await.unwrap();
        assert_eq!(stored.todos, updated.todos);
        assert_eq!(stored.todos[0].id, kept.id);
        assert_eq!(stored.todos[0].created_date, kept.created_date);
        assert_eq!(stored.todos[0].text, "second, done");
        assert_ne!(stored.todos[1].id, note.todos[0].id);
        assert_eq!(stored.todos[1].text, "third");
    }

    #[tokio::test]
    async fn test_update_merges_scalars_and_keeps_omitted_collections() {
        let fx = fixture().await;
        let note = fx
            .service
            .create(CreateNoteRequest {
                title: "original".to_string(),
                description: Some("summary".to_string()),
                tags: Some(vec![CreateTagRequest::named("Stuff")]),
                todos: Some(vec![CreateTodoRequest::new("todo", false)]),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = fx
            .service
            .update(
                &note.id,
                UpdateNoteRequest {
                    title: Some("renamed".to_string()),
                    details: Some("more detail".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.description.as_deref(), Some("summary"));
        assert_eq!(updated.details.as_deref(), Some("more detail"));
        assert_eq!(updated.tags, note.tags);
        assert_eq!(updated.todos, note.todos);
        assert_eq!(updated.created_date, note.created_date);
        assert!(updated.updated_date >= note.updated_date);

        let stored = fx.service.find_one(&note.id).await.unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_update_replaces_tag_set() {
        let fx = fixture().await;
        let note = fx
            .service
            .create(note_with_tags("tags", &["Stuff", "More Tags"]))
            .await
            .unwrap();

        let updated = fx
            .service
            .update(
                &note.id,
                UpdateNoteRequest {
                    tags: Some(vec![CreateTagRequest::named("Other")]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let names: Vec<&str> = updated.tags.iter().map(|t| t.tag_name.as_str()).collect();
        assert_eq!(names, vec!["other"]);

        let cleared = fx
            .service
            .update(
                &note.id,
                UpdateNoteRequest {
                    tags: Some(Vec::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(cleared.tags.is_empty());
        assert!(fx.service.find_one(&note.id).await.unwrap().tags.is_empty());

        // Unlinked tags stay around for reuse.
        assert_eq!(fx.store.count_tags().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_missing_note_is_not_found() {
        let fx = fixture().await;

        let err = fx
            .service
            .update("missing", UpdateNoteRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_all_pages_over_active_notes() {
        let fx = fixture().await;
        let mut ids = Vec::new();
        for title in ["one", "two", "three", "four"] {
            ids.push(fx.service.create(titled(title)).await.unwrap().id);
        }
        fx.service.remove(&ids[0]).await.unwrap();

        let first_page = fx.service.find_all(&page(0, 1)).await.unwrap();
        assert_eq!(first_page.len(), 1);
        assert_ne!(first_page[0].id, ids[0]);

        let everything = fx
            .service
            .find_all(&PaginationQuery::default())
            .await
            .unwrap();
        assert_eq!(everything.len(), 3);
        assert!(everything.iter().all(|n| n.id != ids[0]));
        assert!(everything
            .windows(2)
            .all(|w| (w[0].created_date, &w[0].id) <= (w[1].created_date, &w[1].id)));

        let rest = fx.service.find_all(&page(1, 10)).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].id, everything[1].id);
    }

    #[tokio::test]
    async fn test_find_all_applies_default_page_size() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("notes.sqlite"))
            .await
            .unwrap();
        let store = Arc::new(SqliteNoteStore::new(pool));
        let service = NoteService::new(
            store.clone(),
            TagResolver::new(store),
            PageLimits {
                default_take: 2,
                max_take: 3,
            },
        );
        for title in ["a", "b", "c", "d"] {
            service.create(titled(title)).await.unwrap();
        }

        let default_page = service.find_all(&PaginationQuery::default()).await.unwrap();
        assert_eq!(default_page.len(), 2);

        let clamped = service.find_all(&page(0, 50)).await.unwrap();
        assert_eq!(clamped.len(), 3);
    }

    impl Fixture {
        fn store_pool(&self) -> sqlx::SqlitePool {
            self.store.pool()
        }
    }
}
