//! Note API endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};

use super::{success, ApiResult};
use crate::models::{CreateNoteRequest, Note, PaginationQuery, UpdateNoteRequest};
use crate::validation::{validate_create_note, validate_pagination, validate_update_note};
use crate::AppState;

/// POST /api/notes - Create a new note.
pub async fn create_note(
    State(state): State<AppState>,
    payload: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> ApiResult<Note> {
    let Json(request) = payload?;
    validate_create_note(&request)?;

    success(state.notes.create(request).await?)
}

/// GET /api/notes - List active notes.
pub async fn list_notes(
    State(state): State<AppState>,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> ApiResult<Vec<Note>> {
    let Query(query) = query?;
    validate_pagination(&query)?;

    success(state.notes.find_all(&query).await?)
}

/// GET /api/notes/{id} - Get a single note.
pub async fn get_note(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Note> {
    success(state.notes.find_one(&id).await?)
}

/// PATCH /api/notes/{id} - Update a note.
pub async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateNoteRequest>, JsonRejection>,
) -> ApiResult<Note> {
    let Json(request) = payload?;
    validate_update_note(&request)?;

    success(state.notes.update(&id, request).await?)
}

/// DELETE /api/notes/{id} - Soft-delete a note.
pub async fn delete_note(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Note> {
    success(state.notes.remove(&id).await?)
}
