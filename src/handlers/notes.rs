use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::{AppError, Result},
    handlers::AppState,
    models::note::{CreateNoteRequest, CreatedNote, InsertTarget, SaveNoteRequest},
};

/// Get the full content aggregate of one note
pub async fn get_note(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
) -> Result<impl IntoResponse> {
    let note = state.note_store.get_note(&note_id).await?;
    Ok((StatusCode::OK, Json(note)))
}

/// Replace the content aggregate of one note
pub async fn save_note(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
    Json(request): Json<SaveNoteRequest>,
) -> Result<impl IntoResponse> {
    state.note_store.save_note(&note_id, request).await?;
    Ok((StatusCode::OK, Json(json!({}))))
}

/// Delete a note and its whole subtree
pub async fn delete_note(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
) -> Result<impl IntoResponse> {
    state.tree_store.delete_subtree(&note_id).await?;
    Ok((StatusCode::OK, Json(json!({}))))
}

/// Create a new note under `parent_id`, either as its last child
/// (target "into") or directly after a given sibling (target "after")
pub async fn create_child(
    State(state): State<AppState>,
    Path(parent_id): Path<String>,
    Json(request): Json<CreateNoteRequest>,
) -> Result<impl IntoResponse> {
    let note_id = match request.target {
        InsertTarget::Into => {
            state
                .tree_store
                .insert_child(&parent_id, &request.note_title)
                .await?
        }
        InsertTarget::After => {
            let after_id = request.target_note_id.as_deref().ok_or_else(|| {
                AppError::BadRequest("target \"after\" requires target_note_id".to_string())
            })?;
            state
                .tree_store
                .insert_after(after_id, &request.note_title)
                .await?
        }
    };

    Ok((StatusCode::OK, Json(CreatedNote { note_id })))
}
