use manos_block_core::{BlockId, BlockStore, NodeRole, StoreError};

use crate::geometry::{BlockLayout, Rect};

/// A content block flattened into document order together with its depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineEntry {
    pub id: BlockId,
    pub depth: usize,
    pub parent: BlockId,
}

/// Flattens the content blocks of `store` in document order.
///
/// Root and container blocks produce no entry; their content children start
/// at depth 0.
pub fn outline(store: &BlockStore) -> Result<Vec<OutlineEntry>, StoreError> {
    let mut entries = Vec::new();
    add_entries(store, store.root(), 0, &mut entries)?;
    Ok(entries)
}

fn add_entries(
    store: &BlockStore,
    parent: BlockId,
    depth: usize,
    entries: &mut Vec<OutlineEntry>,
) -> Result<(), StoreError> {
    for child in store.children(parent)? {
        let kind = &store.block(*child)?.kind;
        if store.schema().role(kind) == Some(NodeRole::Content) {
            entries.push(OutlineEntry {
                id: *child,
                depth,
                parent,
            });
            add_entries(store, *child, depth + 1, entries)?;
        } else {
            add_entries(store, *child, depth, entries)?;
        }
    }
    Ok(())
}

/// Lays entries out as a vertical stack of fixed-height rows inside
/// `content`, indenting each row by `indent_width` per level.
pub fn stack_rows(
    entries: &[OutlineEntry],
    content: Rect,
    row_height: f32,
    indent_width: f32,
) -> Vec<BlockLayout> {
    entries
        .iter()
        .enumerate()
        .map(|(ix, entry)| {
            let indent = indent_width * entry.depth as f32;
            BlockLayout::new(
                entry.id,
                Rect::new(
                    content.x + indent,
                    content.y + row_height * ix as f32,
                    (content.width - indent).max(0.0),
                    row_height,
                ),
                entry.depth,
            )
        })
        .collect()
}

/// Visible text of each entry, indented two spaces per level.
pub fn dump_outline(store: &BlockStore) -> Result<String, StoreError> {
    let mut out = String::new();
    for entry in outline(store)? {
        out.push_str(&"  ".repeat(entry.depth));
        out.push_str(store.text(entry.id)?);
        out.push('\n');
    }
    Ok(out)
}
