//! SQLite implementation of the storage ports.
//!
//! Uses prepared statements and transactions for data integrity.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{NoteStore, TagStore};
use crate::errors::AppError;
use crate::models::{DeletionState, Note, Page, Tag, Todo};

const NOTE_COLUMNS: &str =
    "id, title, description, details, created_date, updated_date, deleted_date";

/// SQLite-backed store for notes, tags and todos.
#[derive(Clone)]
pub struct SqliteNoteStore {
    pool: SqlitePool,
}

impl SqliteNoteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Tags linked to a note, sorted by name.
    async fn load_tags(&self, note_id: &str) -> Result<Vec<Tag>, AppError> {
        let rows = sqlx::query(
            r#"SELECT t.id, t.tag_name
               FROM note_tags nt
               INNER JOIN tags t ON t.id = nt.tag_id
               WHERE nt.note_id = ?
               ORDER BY t.tag_name"#,
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    /// Active todos of a note in list order.
    async fn load_todos(&self, note_id: &str) -> Result<Vec<Todo>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, text, is_completed, due_date, created_date, updated_date, deleted_date
               FROM todos
               WHERE note_id = ? AND deleted_date IS NULL
               ORDER BY position"#,
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(todo_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Attach tags and todos to a note row.
    async fn hydrate(&self, row: &SqliteRow) -> Result<Note, AppError> {
        let id: String = row.try_get("id")?;
        let tags = self.load_tags(&id).await?;
        let todos = self.load_todos(&id).await?;
        Ok(note_from_row(row, tags, todos)?)
    }
}

#[async_trait]
impl TagStore for SqliteNoteStore {
    async fn find_tag_by_name(&self, tag_name: &str) -> Result<Option<Tag>, AppError> {
        let row = sqlx::query("SELECT id, tag_name FROM tags WHERE tag_name = ?")
            .bind(tag_name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(tag_from_row))
    }

    async fn insert_tag(&self, tag: &Tag) -> Result<(), AppError> {
        sqlx::query("INSERT INTO tags (id, tag_name) VALUES (?, ?)")
            .bind(&tag.id)
            .bind(&tag.tag_name)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict(format!("Tag {} already exists", tag.tag_name))
                }
                other => AppError::from(other),
            })?;

        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, AppError> {
        let rows = sqlx::query("SELECT id, tag_name FROM tags ORDER BY tag_name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn count_tags(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM tags")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn insert_note(&self, note: &Note) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO notes (id, title, description, details, created_date, updated_date, deleted_date)
               VALUES (?, ?, ?, ?, ?, ?, NULL)"#,
        )
        .bind(&note.id)
        .bind(&note.title)
        .bind(&note.description)
        .bind(&note.details)
        .bind(timestamp(&note.created_date))
        .bind(timestamp(&note.updated_date))
        .execute(&mut *tx)
        .await?;

        insert_tag_links(&mut tx, &note.id, &note.tags).await?;
        insert_todos(&mut tx, &note.id, &note.todos).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_note(&self, id: &str) -> Result<Option<Note>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = ? AND deleted_date IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_notes(&self, page: Page) -> Result<Vec<Note>, AppError> {
        let rows = sqlx::query(&format!(
            r#"SELECT {NOTE_COLUMNS} FROM notes
               WHERE deleted_date IS NULL
               ORDER BY created_date, id
               LIMIT ? OFFSET ?"#
        ))
        .bind(i64::from(page.take))
        .bind(i64::from(page.skip))
        .fetch_all(&self.pool)
        .await?;

        let mut notes = Vec::with_capacity(rows.len());
        for row in &rows {
            notes.push(self.hydrate(row).await?);
        }
        Ok(notes)
    }

    async fn update_note(&self, note: &Note) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE notes SET title = ?, description = ?, details = ?, updated_date = ?
               WHERE id = ? AND deleted_date IS NULL"#,
        )
        .bind(&note.title)
        .bind(&note.description)
        .bind(&note.details)
        .bind(timestamp(&note.updated_date))
        .bind(&note.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Note ID {} not found", note.id)));
        }

        sqlx::query("DELETE FROM note_tags WHERE note_id = ?")
            .bind(&note.id)
            .execute(&mut *tx)
            .await?;
        insert_tag_links(&mut tx, &note.id, &note.tags).await?;

        // Retire the current list; todos carried over are revived by the upsert below.
        let at = timestamp(&note.updated_date);
        sqlx::query(
            "UPDATE todos SET deleted_date = ?, updated_date = ? WHERE note_id = ? AND deleted_date IS NULL",
        )
        .bind(&at)
        .bind(&at)
        .bind(&note.id)
        .execute(&mut *tx)
        .await?;
        insert_todos(&mut tx, &note.id, &note.todos).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn soft_delete_note(&self, id: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let at = timestamp(&at);
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE notes SET deleted_date = ?, updated_date = ? WHERE id = ? AND deleted_date IS NULL",
        )
        .bind(&at)
        .bind(&at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE todos SET deleted_date = ?, updated_date = ? WHERE note_id = ? AND deleted_date IS NULL",
        )
        .bind(&at)
        .bind(&at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

async fn insert_tag_links(
    tx: &mut Transaction<'_, Sqlite>,
    note_id: &str,
    tags: &[Tag],
) -> Result<(), sqlx::Error> {
    for tag in tags {
        sqlx::query("INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?, ?)")
            .bind(note_id)
            .bind(&tag.id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn insert_todos(
    tx: &mut Transaction<'_, Sqlite>,
    note_id: &str,
    todos: &[Todo],
) -> Result<(), sqlx::Error> {
    for (position, todo) in todos.iter().enumerate() {
        sqlx::query(
            r#"INSERT INTO todos (id, note_id, position, text, is_completed, due_date, created_date, updated_date, deleted_date)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   position = excluded.position,
                   text = excluded.text,
                   is_completed = excluded.is_completed,
                   due_date = excluded.due_date,
                   updated_date = excluded.updated_date,
                   deleted_date = excluded.deleted_date
               WHERE todos.note_id = excluded.note_id"#,
        )
        .bind(&todo.id)
        .bind(note_id)
        .bind(position as i64)
        .bind(&todo.text)
        .bind(todo.is_completed as i32)
        .bind(&todo.due_date)
        .bind(timestamp(&todo.created_date))
        .bind(timestamp(&todo.updated_date))
        .bind(todo.deleted.deleted_at().map(|at| timestamp(&at)))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// Helper functions for row conversion

fn tag_from_row(row: &SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        tag_name: row.get("tag_name"),
    }
}

fn todo_from_row(row: &SqliteRow) -> Result<Todo, sqlx::Error> {
    let is_completed: i32 = row.try_get("is_completed")?;
    let deleted_date: Option<DateTime<Utc>> = row.try_get("deleted_date")?;
    Ok(Todo {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        is_completed: is_completed != 0,
        due_date: row.try_get("due_date")?,
        created_date: row.try_get("created_date")?,
        updated_date: row.try_get("updated_date")?,
        deleted: DeletionState::from(deleted_date),
    })
}

fn note_from_row(row: &SqliteRow, tags: Vec<Tag>, todos: Vec<Todo>) -> Result<Note, sqlx::Error> {
    let deleted_date: Option<DateTime<Utc>> = row.try_get("deleted_date")?;
    Ok(Note {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        details: row.try_get("details")?,
        tags,
        todos,
        created_date: row.try_get("created_date")?,
        updated_date: row.try_get("updated_date")?,
        deleted: DeletionState::from(deleted_date),
    })
}
