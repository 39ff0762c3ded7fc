//! Todo model owned by a single note.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DeletionState;

/// A to-do item. Todos live and die with their owning note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub is_completed: bool,
    pub due_date: Option<String>,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    #[serde(rename = "deletedDate")]
    pub deleted: DeletionState,
}

/// Todo entry inside a note create/update request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    /// On update, naming one of the note's current todos keeps its identity.
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    pub is_completed: bool,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl CreateTodoRequest {
    pub fn new(text: impl Into<String>, is_completed: bool) -> Self {
        Self {
            id: None,
            text: text.into(),
            is_completed,
            due_date: None,
        }
    }
}
