//! Note aggregate model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CreateTagRequest, CreateTodoRequest, Tag, Todo};

/// Soft-delete state of a note or todo.
///
/// Serialized as the nullable `deletedDate` timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<DateTime<Utc>>", into = "Option<DateTime<Utc>>")]
pub enum DeletionState {
    #[default]
    Active,
    SoftDeleted {
        at: DateTime<Utc>,
    },
}

impl DeletionState {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeletionState::SoftDeleted { .. })
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            DeletionState::Active => None,
            DeletionState::SoftDeleted { at } => Some(*at),
        }
    }
}

impl From<Option<DateTime<Utc>>> for DeletionState {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        match value {
            Some(at) => DeletionState::SoftDeleted { at },
            None => DeletionState::Active,
        }
    }
}

impl From<DeletionState> for Option<DateTime<Utc>> {
    fn from(state: DeletionState) -> Self {
        state.deleted_at()
    }
}

/// A note together with its referenced tags and owned todos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub details: Option<String>,
    pub tags: Vec<Tag>,
    pub todos: Vec<Todo>,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    #[serde(rename = "deletedDate")]
    pub deleted: DeletionState,
}

/// Request body for creating a new note.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<CreateTagRequest>>,
    #[serde(default)]
    pub todos: Option<Vec<CreateTodoRequest>>,
}

/// Request body for updating an existing note.
///
/// Omitted scalars keep their value. `tags` and `todos`, when present,
/// replace the whole collection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<CreateTagRequest>>,
    #[serde(default)]
    pub todos: Option<Vec<CreateTodoRequest>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_state_serializes_as_nullable_timestamp() {
        let active = serde_json::to_value(DeletionState::Active).unwrap();
        assert!(active.is_null());

        let at = DateTime::parse_from_rfc3339("2024-02-03T04:05:06Z")
            .unwrap()
            .with_timezone(&Utc);
        let deleted = serde_json::to_value(DeletionState::SoftDeleted { at }).unwrap();
        assert_eq!(deleted, serde_json::json!("2024-02-03T04:05:06Z"));
    }

    #[test]
    fn test_update_request_defaults_to_no_changes() {
        let request: UpdateNoteRequest = serde_json::from_str("{}").unwrap();
        assert!(request.title.is_none());
        assert!(request.tags.is_none());
        assert!(request.todos.is_none());
    }

    #[test]
    fn test_create_request_parses_nested_collections() {
        let request: CreateNoteRequest = serde_json::from_value(serde_json::json!({
            "title": "My note title",
            "tags": [{ "tagName": "Stuff" }],
            "todos": [{ "text": "Make a todo list", "isCompleted": false }]
        }))
        .unwrap();

        assert_eq!(request.tags.unwrap()[0].tag_name, "Stuff");
        let todos = request.todos.unwrap();
        assert_eq!(todos[0].text, "Make a todo list");
        assert!(!todos[0].is_completed);
        assert!(todos[0].due_date.is_none());
    }
}
