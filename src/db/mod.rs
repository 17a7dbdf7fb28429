use anyhow::Result;
use rand::Rng;
use sqlx::{Pool, Sqlite, migrate::MigrateDatabase, sqlite::SqlitePoolOptions};
use std::time::Duration;

pub mod note_store;
pub mod tree_store;

pub type DbPool = Pool<Sqlite>;

/// Empty parent id marks a top-level note.
pub const ROOT_PARENT: &str = "";

/// Token the HTTP API uses for the forest root.
pub const ROOT_TOKEN: &str = "root";

const NOTE_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const NOTE_ID_LEN: usize = 22;

/// Generate a fresh 22 character note identifier.
pub fn new_note_id() -> String {
    let mut rng = rand::rng();
    (0..NOTE_ID_LEN)
        .map(|_| NOTE_ID_ALPHABET[rng.random_range(0..NOTE_ID_ALPHABET.len())] as char)
        .collect()
}

/// Current server time as whole Unix seconds.
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Initialize the database connection pool
pub async fn init_db_pool(database_url: &str) -> Result<DbPool> {
    // Create the database if it doesn't exist
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        Sqlite::create_database(database_url).await?;
    }

    // Create connection pool
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await?;

    setup_database(&pool).await?;

    Ok(pool)
}

/// Set up the database schema
pub(crate) async fn setup_database(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            note_id TEXT PRIMARY KEY NOT NULL,
            note_title TEXT NOT NULL,
            note_text TEXT NOT NULL,
            note_clone_id TEXT NOT NULL DEFAULT '',
            date_created INTEGER NOT NULL,
            date_modified INTEGER NOT NULL,
            icon_info TEXT NOT NULL DEFAULT 'pencil',
            is_finished INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes_tree (
            note_id TEXT PRIMARY KEY NOT NULL,
            note_pid TEXT NOT NULL DEFAULT '',
            note_pos INTEGER NOT NULL,
            is_expanded INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_notes_tree_parent
        ON notes_tree (note_pid, note_pos);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS formatting (
            note_id TEXT NOT NULL,
            note_offset INTEGER NOT NULL,
            fmt_name TEXT NOT NULL,
            fmt_value TEXT NOT NULL DEFAULT ''
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS links (
            note_id TEXT NOT NULL,
            note_offset INTEGER NOT NULL,
            lnk_text TEXT NOT NULL DEFAULT '',
            lnk_url TEXT NOT NULL DEFAULT ''
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            note_id TEXT NOT NULL,
            note_offset INTEGER NOT NULL,
            image_data BLOB NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
