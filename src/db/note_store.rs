use base64::prelude::*;

use crate::{
    db::{DbPool, now_epoch},
    error::{AppError, Result},
    models::note::{FormattingSpan, ImageDto, ImageRow, Link, Note, NoteResponse, SaveNoteRequest},
};

/// Store for per-note content aggregates: the note row plus its ordered
/// formatting, link and image collections. The collections are replaced
/// wholesale on every save.
pub struct NoteStore {
    pool: DbPool,
}

impl NoteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch the full content aggregate. Image payloads come back
    /// base64-encoded for transport.
    pub async fn get_note(&self, note_id: &str) -> Result<NoteResponse> {
        let detail = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE note_id = ?")
            .bind(note_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NoteNotFound)?;

        let formatting = sqlx::query_as::<_, FormattingSpan>(
            "SELECT * FROM formatting WHERE note_id = ? ORDER BY note_offset",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        let links =
            sqlx::query_as::<_, Link>("SELECT * FROM links WHERE note_id = ? ORDER BY note_offset")
                .bind(note_id)
                .fetch_all(&self.pool)
                .await?;

        let images = sqlx::query_as::<_, ImageRow>(
            "SELECT * FROM images WHERE note_id = ? ORDER BY note_offset",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ImageDto::from)
        .collect();

        Ok(NoteResponse {
            detail,
            formatting,
            links,
            images,
        })
    }

    /// Update title/text/modified-timestamp and replace all formatting,
    /// link and image rows, as one transaction. A partial save is never
    /// observable.
    pub async fn save_note(&self, note_id: &str, req: SaveNoteRequest) -> Result<()> {
        // Decode payloads up front so a bad image fails before any write.
        let mut images = Vec::with_capacity(req.images.len());
        for img in &req.images {
            let bytes = BASE64_STANDARD
                .decode(&img.image_data)
                .map_err(|e| AppError::BadRequest(format!("invalid base64 image data: {}", e)))?;
            images.push((img.note_offset, bytes));
        }

        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            "UPDATE notes SET note_text = ?, note_title = ?, date_modified = ? WHERE note_id = ?",
        )
        .bind(&req.detail.note_text)
        .bind(&req.detail.note_title)
        .bind(now_epoch())
        .bind(note_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(AppError::NoteNotFound);
        }

        sqlx::query("DELETE FROM formatting WHERE note_id = ?")
            .bind(note_id)
            .execute(&mut *tx)
            .await?;
        for fmt in &req.formatting {
            sqlx::query(
                "INSERT INTO formatting (note_id, note_offset, fmt_name, fmt_value) VALUES (?, ?, ?, ?)",
            )
            .bind(note_id)
            .bind(fmt.note_offset)
            .bind(&fmt.fmt_name)
            .bind(&fmt.fmt_value)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM links WHERE note_id = ?")
            .bind(note_id)
            .execute(&mut *tx)
            .await?;
        for link in &req.links {
            sqlx::query(
                "INSERT INTO links (note_id, note_offset, lnk_text, lnk_url) VALUES (?, ?, ?, ?)",
            )
            .bind(note_id)
            .bind(link.note_offset)
            .bind(&link.lnk_text)
            .bind(&link.lnk_url)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM images WHERE note_id = ?")
            .bind(note_id)
            .execute(&mut *tx)
            .await?;
        for (offset, bytes) in &images {
            sqlx::query("INSERT INTO images (note_id, note_offset, image_data) VALUES (?, ?, ?)")
                .bind(note_id)
                .bind(*offset)
                .bind(bytes.as_slice())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(%note_id, "saved note content");
        Ok(())
    }
}
