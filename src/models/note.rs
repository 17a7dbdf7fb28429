use base64::prelude::*;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database note row, also the `detail` object on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub note_id: String,
    pub note_title: String,
    pub note_text: String,
    pub note_clone_id: String,
    pub date_created: i64,
    pub date_modified: i64,
    pub icon_info: String,
    pub is_finished: i64,
}

/// Inline formatting span, keyed by (note, offset) and replaced wholesale
/// on every save.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormattingSpan {
    #[serde(default)]
    pub note_id: String,
    pub note_offset: i64,
    pub fmt_name: String,
    #[serde(default)]
    pub fmt_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    #[serde(default)]
    pub note_id: String,
    pub note_offset: i64,
    #[serde(default)]
    pub lnk_text: String,
    #[serde(default)]
    pub lnk_url: String,
}

/// Image row as stored: raw bytes.
#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    pub note_id: String,
    pub note_offset: i64,
    pub image_data: Vec<u8>,
}

/// Image as transported: base64 payload inside JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDto {
    #[serde(default)]
    pub note_id: String,
    pub note_offset: i64,
    pub image_data: String,
}

impl From<ImageRow> for ImageDto {
    fn from(row: ImageRow) -> Self {
        Self {
            note_id: row.note_id,
            note_offset: row.note_offset,
            image_data: BASE64_STANDARD.encode(&row.image_data),
        }
    }
}

/// Full content aggregate returned by GET /notes/{id}.
#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub detail: Note,
    pub formatting: Vec<FormattingSpan>,
    pub links: Vec<Link>,
    pub images: Vec<ImageDto>,
}

/// Editable fields of the note row on save.
#[derive(Debug, Deserialize)]
pub struct NoteDetailPatch {
    pub note_text: String,
    pub note_title: String,
}

/// PUT /notes/{id} body. The aggregate replaces all stored formatting,
/// link and image rows for the note.
#[derive(Debug, Deserialize)]
pub struct SaveNoteRequest {
    pub detail: NoteDetailPatch,
    #[serde(default)]
    pub formatting: Vec<FormattingSpan>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub images: Vec<ImageDto>,
}

/// Where to place a newly created note relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertTarget {
    Into,
    After,
}

/// POST /notes/{parent_id}/children body.
#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub note_title: String,
    pub target: InsertTarget,
    #[serde(default)]
    pub target_note_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedNote {
    pub note_id: String,
}
