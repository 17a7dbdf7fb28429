use sqlx::SqliteConnection;
use tokio::sync::Mutex;

use crate::{
    db::{DbPool, ROOT_PARENT, ROOT_TOKEN, new_note_id, now_epoch},
    error::{AppError, Result},
    models::tree::TreeRow,
};

/// Upper bound for the ancestor walk. A chain longer than this means the
/// edge set is corrupt.
const MAX_TREE_DEPTH: usize = 10_000;

/// Store for the ordered forest: the notes_tree edge table plus the paired
/// notes-row lifecycle. A note and its edge are created and destroyed
/// together.
///
/// Every structural mutation runs inside one transaction and behind the
/// write lock, so two concurrent writers can never read the same max
/// sibling position. Positions under a fixed parent stay contiguous
/// (0, 1, 2, ...): moves and deletes close the gap they leave behind.
pub struct TreeStore {
    pool: DbPool,
    write_lock: Mutex<()>,
}

#[derive(Debug, sqlx::FromRow)]
struct Edge {
    note_pid: String,
    note_pos: i64,
}

impl TreeStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Map the API-level root token to the empty parent sentinel.
    pub fn resolve_parent_token(parent_id: &str) -> &str {
        if parent_id == ROOT_TOKEN {
            ROOT_PARENT
        } else {
            parent_id
        }
    }

    /// Create a new empty note as the last child of `parent_id`.
    pub async fn insert_child(&self, parent_id: &str, title: &str) -> Result<String> {
        let parent_id = Self::resolve_parent_token(parent_id);
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        if parent_id != ROOT_PARENT && edge_of(&mut tx, parent_id).await?.is_none() {
            return Err(AppError::NoteNotFound);
        }

        let pos = next_child_pos(&mut tx, parent_id).await?;
        let note_id = new_note_id();
        insert_note_rows(&mut tx, &note_id, title, parent_id, pos).await?;

        tx.commit().await?;
        tracing::debug!(%note_id, parent = %parent_id, pos, "inserted child note");
        Ok(note_id)
    }

    /// Create a new empty note as the sibling directly after `after_id`.
    /// Siblings past the insertion point shift up by one; the gap shift and
    /// both row inserts are one atomic unit.
    pub async fn insert_after(&self, after_id: &str, title: &str) -> Result<String> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let after = edge_of(&mut tx, after_id)
            .await?
            .ok_or(AppError::NoteNotFound)?;

        sqlx::query("UPDATE notes_tree SET note_pos = note_pos + 1 WHERE note_pid = ? AND note_pos > ?")
            .bind(&after.note_pid)
            .bind(after.note_pos)
            .execute(&mut *tx)
            .await?;

        let note_id = new_note_id();
        insert_note_rows(&mut tx, &note_id, title, &after.note_pid, after.note_pos + 1).await?;

        tx.commit().await?;
        tracing::debug!(%note_id, %after_id, "inserted note after sibling");
        Ok(note_id)
    }

    /// Move `note_id` directly after `after_id`, possibly across parents.
    /// Missing reference notes make this a no-op.
    pub async fn move_after(&self, note_id: &str, after_id: &str) -> Result<()> {
        if note_id == after_id {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let Some(after) = edge_of(&mut tx, after_id).await? else {
            tracing::debug!(%note_id, %after_id, "moveAfter target missing, nothing to do");
            return Ok(());
        };

        check_no_cycle(&mut tx, note_id, &after.note_pid).await?;

        let Some(old) = detach(&mut tx, note_id).await? else {
            tracing::debug!(%note_id, "moveAfter source missing, nothing to do");
            return Ok(());
        };

        // The detach shifts the anchor down when it sat past the vacated
        // position in the same sibling run.
        let mut after_pos = after.note_pos;
        if old.note_pid == after.note_pid && old.note_pos < after_pos {
            after_pos -= 1;
        }

        sqlx::query("UPDATE notes_tree SET note_pos = note_pos + 1 WHERE note_pid = ? AND note_pos > ?")
            .bind(&after.note_pid)
            .bind(after_pos)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE notes_tree SET note_pid = ?, note_pos = ? WHERE note_id = ?")
            .bind(&after.note_pid)
            .bind(after_pos + 1)
            .bind(note_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(%note_id, %after_id, "moved note after sibling");
        Ok(())
    }

    /// Move `note_id` directly before `before_id`, possibly across parents.
    /// Missing reference notes make this a no-op.
    pub async fn move_before(&self, note_id: &str, before_id: &str) -> Result<()> {
        if note_id == before_id {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let Some(before) = edge_of(&mut tx, before_id).await? else {
            tracing::debug!(%note_id, %before_id, "moveBefore target missing, nothing to do");
            return Ok(());
        };

        check_no_cycle(&mut tx, note_id, &before.note_pid).await?;

        let Some(old) = detach(&mut tx, note_id).await? else {
            tracing::debug!(%note_id, "moveBefore source missing, nothing to do");
            return Ok(());
        };

        let mut before_pos = before.note_pos;
        if old.note_pid == before.note_pid && old.note_pos < before_pos {
            before_pos -= 1;
        }

        // The before note itself shifts up too; the moved note takes its
        // original position.
        sqlx::query("UPDATE notes_tree SET note_pos = note_pos + 1 WHERE note_pid = ? AND note_pos >= ?")
            .bind(&before.note_pid)
            .bind(before_pos)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE notes_tree SET note_pid = ?, note_pos = ? WHERE note_id = ?")
            .bind(&before.note_pid)
            .bind(before_pos)
            .bind(note_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(%note_id, %before_id, "moved note before sibling");
        Ok(())
    }

    /// Append `note_id` as the last child of `parent_id`.
    pub async fn move_to_parent(&self, note_id: &str, parent_id: &str) -> Result<()> {
        let parent_id = Self::resolve_parent_token(parent_id);
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        if parent_id != ROOT_PARENT && edge_of(&mut tx, parent_id).await?.is_none() {
            return Err(AppError::NoteNotFound);
        }

        check_no_cycle(&mut tx, note_id, parent_id).await?;

        if detach(&mut tx, note_id).await?.is_none() {
            tracing::debug!(%note_id, "moveTo source missing, nothing to do");
            return Ok(());
        }

        let pos = next_child_pos(&mut tx, parent_id).await?;
        sqlx::query("UPDATE notes_tree SET note_pid = ?, note_pos = ? WHERE note_id = ?")
            .bind(parent_id)
            .bind(pos)
            .bind(note_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(%note_id, parent = %parent_id, pos, "moved note to parent");
        Ok(())
    }

    /// Update the expanded/collapsed UI flag. No ordering effect.
    pub async fn set_expanded(&self, note_id: &str, expanded: bool) -> Result<()> {
        let affected = sqlx::query("UPDATE notes_tree SET is_expanded = ? WHERE note_id = ?")
            .bind(expanded as i64)
            .bind(note_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            tracing::debug!(%note_id, "expanded flag for unknown note, nothing to do");
        }
        Ok(())
    }

    /// Delete `note_id` and every descendant, including all formatting,
    /// link and image rows of each deleted note. The traversal uses an
    /// explicit work-list, so arbitrarily deep subtrees cannot exhaust the
    /// call stack.
    pub async fn delete_subtree(&self, note_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        if detach(&mut tx, note_id).await?.is_none() {
            tracing::debug!(%note_id, "delete target has no tree edge");
        }

        let mut pending = vec![note_id.to_string()];
        let mut doomed = Vec::new();
        while let Some(id) = pending.pop() {
            let children: Vec<(String,)> =
                sqlx::query_as("SELECT note_id FROM notes_tree WHERE note_pid = ?")
                    .bind(&id)
                    .fetch_all(&mut *tx)
                    .await?;
            pending.extend(children.into_iter().map(|c| c.0));
            doomed.push(id);
        }

        for id in &doomed {
            for table in ["formatting", "links", "images", "notes_tree", "notes"] {
                sqlx::query(&format!("DELETE FROM {} WHERE note_id = ?", table))
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        tracing::info!(%note_id, count = doomed.len(), "deleted subtree");
        Ok(())
    }

    /// Every edge joined with its note title, ordered by (parent, position).
    /// Feed for the tree projection.
    pub async fn tree_rows(&self) -> Result<Vec<TreeRow>> {
        let rows = sqlx::query_as::<_, TreeRow>(
            r#"
            SELECT notes_tree.note_id, notes_tree.note_pid, notes_tree.note_pos,
                   notes_tree.is_expanded, notes.note_title
            FROM notes_tree
            JOIN notes ON notes.note_id = notes_tree.note_id
            ORDER BY notes_tree.note_pid, notes_tree.note_pos
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

async fn edge_of(conn: &mut SqliteConnection, note_id: &str) -> Result<Option<Edge>> {
    let edge =
        sqlx::query_as::<_, Edge>("SELECT note_pid, note_pos FROM notes_tree WHERE note_id = ?")
            .bind(note_id)
            .fetch_optional(conn)
            .await?;
    Ok(edge)
}

async fn next_child_pos(conn: &mut SqliteConnection, parent_id: &str) -> Result<i64> {
    let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(note_pos) FROM notes_tree WHERE note_pid = ?")
        .bind(parent_id)
        .fetch_one(conn)
        .await?;
    Ok(row.0.map_or(0, |max| max + 1))
}

/// Take a note out of its sibling run and close the gap it leaves. Returns
/// the vacated edge, or None when the note has no edge at all.
async fn detach(conn: &mut SqliteConnection, note_id: &str) -> Result<Option<Edge>> {
    let Some(edge) = edge_of(conn, note_id).await? else {
        return Ok(None);
    };

    sqlx::query("UPDATE notes_tree SET note_pos = note_pos - 1 WHERE note_pid = ? AND note_pos > ?")
        .bind(&edge.note_pid)
        .bind(edge.note_pos)
        .execute(conn)
        .await?;

    Ok(Some(edge))
}

/// Walk parent ids from `new_parent_id` up to the root sentinel and reject
/// the reparent when `note_id` appears on the chain.
async fn check_no_cycle(
    conn: &mut SqliteConnection,
    note_id: &str,
    new_parent_id: &str,
) -> Result<()> {
    let mut current = new_parent_id.to_string();
    for _ in 0..MAX_TREE_DEPTH {
        if current == ROOT_PARENT {
            return Ok(());
        }
        if current == note_id {
            return Err(AppError::TreeConflict(format!(
                "note {} cannot be moved into its own subtree",
                note_id
            )));
        }
        match edge_of(&mut *conn, &current).await? {
            Some(edge) => current = edge.note_pid,
            // Chain left the forest; nothing more to collide with.
            None => return Ok(()),
        }
    }

    Err(AppError::TreeConflict(
        "parent chain exceeds maximum tree depth".to_string(),
    ))
}

async fn insert_note_rows(
    conn: &mut SqliteConnection,
    note_id: &str,
    title: &str,
    parent_id: &str,
    pos: i64,
) -> Result<()> {
    let now = now_epoch();

    sqlx::query(
        r#"
        INSERT INTO notes (note_id, note_title, note_text, note_clone_id,
                           date_created, date_modified, icon_info, is_finished)
        VALUES (?, ?, '', '', ?, ?, 'pencil', 0)
        "#,
    )
    .bind(note_id)
    .bind(title)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query("INSERT INTO notes_tree (note_id, note_pid, note_pos, is_expanded) VALUES (?, ?, ?, 0)")
        .bind(note_id)
        .bind(parent_id)
        .bind(pos)
        .execute(conn)
        .await?;

    Ok(())
}
