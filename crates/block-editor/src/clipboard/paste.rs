use manos_block_core::{
    BlockId, BlockSpec, BlockStore, ContentParser, CursorPosition, Encoding, NodeRole, PropPatch,
    Schema, StoreError, TEXT_PROP,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::floor_char_boundary;
use crate::channel::ClipboardChannel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasteOutcome {
    /// Top-level blocks created from the clipboard, in order.
    pub inserted: Vec<BlockId>,
    /// At the end of the last inserted block's text, or after the block when
    /// it has none.
    pub cursor: CursorPosition,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    host: BlockId,
    at: usize,
}

/// Inserts clipboard content at a cursor.
#[derive(Debug, Clone)]
pub struct PasteManager {
    preference: Vec<Encoding>,
}

impl Default for PasteManager {
    fn default() -> Self {
        Self::new(Encoding::RICHEST_FIRST)
    }
}

impl PasteManager {
    pub fn new(preference: impl IntoIterator<Item = Encoding>) -> Self {
        Self {
            preference: preference.into_iter().collect(),
        }
    }

    pub fn preference(&self) -> &[Encoding] {
        &self.preference
    }

    /// Reads the richest readable encoding and inserts it after the cursor's
    /// host block, splitting the host first when the cursor is mid-text.
    ///
    /// Returns `Ok(None)` without touching the store when the clipboard is
    /// empty or unreadable. Any store rejection rolls the whole paste back.
    pub fn handle_paste(
        &self,
        cursor: &CursorPosition,
        store: &mut BlockStore,
        channel: &mut dyn ClipboardChannel,
    ) -> Result<Option<PasteOutcome>, StoreError> {
        let mimes: Vec<&str> = self.preference.iter().map(|e| e.mime()).collect();
        let (mime, data) = match channel.read(&mimes) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("clipboard has no readable content");
                return Ok(None);
            }
            Err(err) => {
                warn!(error = %err, "clipboard read failed");
                return Ok(None);
            }
        };

        let parent = cursor.parent_id;
        let parent_kind = store.block(parent)?.kind.clone();
        let fragment = ContentParser::new(store.schema()).decode(&mime, &data);
        let blocks = unwrap_structural(store.schema(), &parent_kind, fragment.blocks);
        if blocks.is_empty() {
            debug!(mime = %mime, "clipboard content is empty");
            return Ok(None);
        }

        let (index, split) = insertion_point(store, cursor)?;
        let inserted = store.batch("clipboard:paste", |store| {
            let mut at = index;
            let mut inserted = Vec::with_capacity(blocks.len());
            for spec in blocks {
                inserted.push(store.insert(parent, at, spec)?);
                at += 1;
            }
            if let Some(split) = split {
                let host = store.block(split.host)?;
                let text = host.text();
                let head = text[..split.at].to_string();
                let mut props = host.props.clone();
                props.insert(TEXT_PROP.to_string(), text[split.at..].into());
                let tail = BlockSpec {
                    kind: host.kind.clone(),
                    props,
                    children: Vec::new(),
                };
                store.set_props(split.host, PropPatch::text(head))?;
                store.insert(parent, at, tail)?;
            }
            Ok::<_, StoreError>(inserted)
        })?;

        let Some(last) = inserted.last().copied() else {
            return Ok(None);
        };
        let end = store.block(last)?.text_len();
        let cursor = CursorPosition::in_block(store, last, (end > 0).then_some(end))?;
        debug!(mime = %mime, inserted = inserted.len(), parent = %parent, index, "pasted");
        Ok(Some(PasteOutcome { inserted, cursor }))
    }
}

/// Index in the cursor's parent where pasted blocks go, and the split to
/// perform when the cursor sits inside the host's text.
fn insertion_point(
    store: &BlockStore,
    cursor: &CursorPosition,
) -> Result<(usize, Option<Split>), StoreError> {
    let children = store.children(cursor.parent_id)?;
    let Some(index) = cursor.index.filter(|index| *index < children.len()) else {
        return Ok((children.len(), None));
    };
    let host = children[index];
    let text = store.text(host)?;
    let at = cursor.offset.map(|offset| floor_char_boundary(text, offset));

    Ok(match at {
        Some(0) => (index, None),
        Some(at) if at < text.len() => (index + 1, Some(Split { host, at })),
        _ => (index + 1, None),
    })
}

/// Replaces fragment roots the parent cannot hold by their children when
/// they are only structural wrappers, such as a copied frame.
fn unwrap_structural(schema: &Schema, parent_kind: &str, blocks: Vec<BlockSpec>) -> Vec<BlockSpec> {
    let mut out = Vec::with_capacity(blocks.len());
    for spec in blocks {
        let structural = matches!(
            schema.role(&spec.kind),
            Some(NodeRole::Container | NodeRole::Root)
        );
        if structural && !schema.allows_child(parent_kind, &spec.kind) {
            out.extend(unwrap_structural(schema, parent_kind, spec.children));
        } else {
            out.push(spec);
        }
    }
    out
}
