//! Tag model shared across notes.

use serde::{Deserialize, Serialize};

/// A categorization tag. `tag_name` is always the canonical slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub tag_name: String,
}

/// Tag reference inside a note create/update request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagRequest {
    /// Accepted for client convenience; resolution is always by name.
    #[serde(default)]
    pub id: Option<String>,
    pub tag_name: String,
}

impl CreateTagRequest {
    pub fn named(tag_name: impl Into<String>) -> Self {
        Self {
            id: None,
            tag_name: tag_name.into(),
        }
    }
}
