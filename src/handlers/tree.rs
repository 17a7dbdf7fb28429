use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::{AppError, Result},
    handlers::AppState,
    models::tree::build_forest,
};

/// Get the whole forest as nested JSON
pub async fn get_tree(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let rows = state.tree_store.tree_rows().await?;
    Ok((StatusCode::OK, Json(build_forest(rows))))
}

/// Move a note directly after another note
pub async fn move_after(
    State(state): State<AppState>,
    Path((note_id, after_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    state.tree_store.move_after(&note_id, &after_id).await?;
    Ok((StatusCode::OK, Json(json!({}))))
}

/// Move a note directly before another note
pub async fn move_before(
    State(state): State<AppState>,
    Path((note_id, before_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    state.tree_store.move_before(&note_id, &before_id).await?;
    Ok((StatusCode::OK, Json(json!({}))))
}

/// Move a note to the end of another note's children
pub async fn move_to(
    State(state): State<AppState>,
    Path((note_id, parent_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    state.tree_store.move_to_parent(&note_id, &parent_id).await?;
    Ok((StatusCode::OK, Json(json!({}))))
}

/// Set the expanded/collapsed UI flag of a note
pub async fn set_expanded(
    State(state): State<AppState>,
    Path((note_id, flag)): Path<(String, i64)>,
) -> Result<impl IntoResponse> {
    let expanded = match flag {
        0 => false,
        1 => true,
        other => {
            return Err(AppError::BadRequest(format!(
                "expanded flag must be 0 or 1, got {}",
                other
            )));
        }
    };

    state.tree_store.set_expanded(&note_id, expanded).await?;
    Ok((StatusCode::OK, Json(json!({}))))
}
