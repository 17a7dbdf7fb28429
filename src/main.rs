use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod error;
mod handlers;
mod models;

use config::CONFIG;
use db::{note_store::NoteStore, tree_store::TreeStore};
use handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("note_tree_server=debug,tower_http=info")),
        )
        .init();

    let pool = db::init_db_pool(&CONFIG.database_url).await?;

    let state = AppState {
        tree_store: Arc::new(TreeStore::new(pool.clone())),
        note_store: Arc::new(NoteStore::new(pool)),
    };

    let app = handlers::router(state)
        .nest_service("/frontend", ServeDir::new(&CONFIG.frontend_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = CONFIG.server_addr();
    tracing::info!("Starting notes server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
