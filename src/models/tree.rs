use serde::Serialize;
use sqlx::FromRow;
use std::collections::HashMap;

use crate::db::ROOT_PARENT;

/// Flat tree row: one edge joined with its note title, as read from the
/// store ordered by (parent, position).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TreeRow {
    pub note_id: String,
    pub note_pid: String,
    pub note_pos: i64,
    pub is_expanded: i64,
    pub note_title: String,
}

/// Nested projection of the forest for client rendering.
#[derive(Debug, Serialize)]
pub struct TreeNode {
    pub note_id: String,
    pub note_pid: String,
    pub note_pos: i64,
    pub is_expanded: i64,
    pub note_title: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub folder: bool,
    pub children: Vec<TreeNode>,
}

/// Convert the flat ordered rows into a nested forest. Rows arrive sorted
/// by (parent, position), so each child list keeps ascending position
/// order. Rows whose parent never appears in the row set are unreachable
/// from any root and are skipped.
pub fn build_forest(rows: Vec<TreeRow>) -> Vec<TreeNode> {
    let total = rows.len();

    let mut roots = Vec::new();
    let mut children_of: HashMap<String, Vec<TreeRow>> = HashMap::new();
    for row in rows {
        if row.note_pid == ROOT_PARENT {
            roots.push(row);
        } else {
            children_of.entry(row.note_pid.clone()).or_default().push(row);
        }
    }

    let mut attached = 0;
    let forest: Vec<TreeNode> = roots
        .into_iter()
        .map(|row| attach(row, &mut children_of, &mut attached))
        .collect();

    if attached < total {
        tracing::warn!(
            orphaned = total - attached,
            "tree rows reference parents outside the forest"
        );
    }

    forest
}

fn attach(
    row: TreeRow,
    children_of: &mut HashMap<String, Vec<TreeRow>>,
    attached: &mut usize,
) -> TreeNode {
    *attached += 1;

    let children: Vec<TreeNode> = children_of
        .remove(&row.note_id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach(child, children_of, attached))
        .collect();

    TreeNode {
        note_id: row.note_id,
        note_pid: row.note_pid,
        note_pos: row.note_pos,
        is_expanded: row.is_expanded,
        note_title: row.note_title,
        folder: !children.is_empty(),
        children,
    }
}
