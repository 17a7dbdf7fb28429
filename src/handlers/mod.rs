use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;

use crate::db::{note_store::NoteStore, tree_store::TreeStore};

pub mod notes;
pub mod tree;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub tree_store: Arc<TreeStore>,
    pub note_store: Arc<NoteStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/notes/{id}",
            get(notes::get_note)
                .put(notes::save_note)
                .delete(notes::delete_note),
        )
        .route("/notes/{id}/children", post(notes::create_child))
        .route("/notes/{id}/moveAfter/{target_id}", put(tree::move_after))
        .route("/notes/{id}/moveBefore/{target_id}", put(tree::move_before))
        .route("/notes/{id}/moveTo/{target_id}", put(tree::move_to))
        .route("/notes/{id}/expanded/{flag}", put(tree::set_expanded))
        .route("/tree", get(tree::get_tree))
        .with_state(state)
}
