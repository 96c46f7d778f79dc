use std::collections::HashSet;

use manos_block_core::{
    BlockId, BlockSpec, BlockStore, ContentParser, CursorPosition, Encoding, NodeRole,
    PortablePayload, PropPatch, Selection, StoreError, TextPoint,
};
use tracing::{debug, warn};

use super::floor_char_boundary;
use crate::channel::{ClipboardChannel, ClipboardData};

/// What a selection puts on the clipboard.
#[derive(Debug, Clone, PartialEq)]
enum Clip {
    /// Whole blocks, top-level only, in document order.
    Blocks(Vec<BlockId>),
    /// A byte range of one block's text.
    Text {
        block: BlockId,
        start: usize,
        end: usize,
    },
}

/// Copies and cuts selections to the clipboard.
///
/// Only blocks the selection covers entirely are taken. A text selection
/// inside a single block that covers no whole block copies the selected
/// substring instead.
#[derive(Debug, Clone)]
pub struct CopyCutManager {
    encodings: Vec<Encoding>,
}

impl Default for CopyCutManager {
    fn default() -> Self {
        Self::new(Encoding::RICHEST_FIRST)
    }
}

impl CopyCutManager {
    pub fn new(encodings: impl IntoIterator<Item = Encoding>) -> Self {
        Self {
            encodings: encodings.into_iter().collect(),
        }
    }

    pub fn encodings(&self) -> &[Encoding] {
        &self.encodings
    }

    /// Top-level blocks fully covered by `selection`, in document order.
    pub fn covered_blocks(
        &self,
        selection: &Selection,
        store: &BlockStore,
    ) -> Result<Vec<BlockId>, StoreError> {
        match resolve(selection, store)? {
            Some(Clip::Blocks(ids)) => Ok(ids),
            _ => Ok(Vec::new()),
        }
    }

    /// Writes the selection to `channel`. Never mutates the store.
    ///
    /// Returns the payload written, or `None` when there was nothing to copy
    /// or the clipboard refused the write.
    pub fn handle_copy(
        &self,
        selection: &Selection,
        store: &BlockStore,
        channel: &mut dyn ClipboardChannel,
    ) -> Result<Option<PortablePayload>, StoreError> {
        let Some(clip) = resolve(selection, store)? else {
            return Ok(None);
        };
        let payload = payload(&clip, store)?;
        if !self.write(&payload, store, channel) {
            return Ok(None);
        }
        debug!(blocks = payload.blocks.len(), "copied selection");
        Ok(Some(payload))
    }

    /// Copies, then removes what was copied in one transaction.
    ///
    /// Returns where the cursor goes: the start of the block after the last
    /// removed one, or the end of its parent. Nothing is removed when the
    /// clipboard write fails.
    pub fn handle_cut(
        &self,
        selection: &Selection,
        store: &mut BlockStore,
        channel: &mut dyn ClipboardChannel,
    ) -> Result<Option<CursorPosition>, StoreError> {
        let Some(clip) = resolve(selection, store)? else {
            return Ok(None);
        };
        let payload = payload(&clip, store)?;
        if !self.write(&payload, store, channel) {
            return Ok(None);
        }

        let cursor = match clip {
            Clip::Blocks(ids) => {
                let Some(last) = ids.last().copied() else {
                    return Ok(None);
                };
                let Some((parent, index)) = store.position_of(last)? else {
                    return Ok(None);
                };
                let next = store.children(parent)?.get(index + 1).copied();

                store.batch("clipboard:cut", |store| {
                    for id in &ids {
                        store.remove(*id)?;
                    }
                    Ok::<_, StoreError>(())
                })?;
                debug!(removed = ids.len(), "cut blocks");

                match next {
                    Some(next) => CursorPosition::in_block(store, next, Some(0))?,
                    None => CursorPosition::end_of(parent),
                }
            }
            Clip::Text { block, start, end } => {
                let text = store.text(block)?;
                let remaining = format!("{}{}", &text[..start], &text[end..]);
                store.batch("clipboard:cut", |store| {
                    store.set_props(block, PropPatch::text(remaining))
                })?;
                debug!(block = %block, start, end, "cut text");
                CursorPosition::in_block(store, block, Some(start))?
            }
        };
        Ok(Some(cursor))
    }

    fn write(
        &self,
        payload: &PortablePayload,
        store: &BlockStore,
        channel: &mut dyn ClipboardChannel,
    ) -> bool {
        let parser = ContentParser::new(store.schema());
        let mut data = ClipboardData::new();
        for encoding in &self.encodings {
            match parser.encode(payload, *encoding) {
                Ok(encoded) => data.insert(encoding.mime(), encoded),
                Err(err) => {
                    warn!(error = %err, mime = encoding.mime(), "failed to encode clipboard data")
                }
            }
        }
        if data.is_empty() {
            return false;
        }
        match channel.write(data) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "clipboard write failed");
                false
            }
        }
    }
}

fn resolve(selection: &Selection, store: &BlockStore) -> Result<Option<Clip>, StoreError> {
    let (start, end) = match selection {
        Selection::Caret { .. } => return Ok(None),
        Selection::Blocks { ids } => {
            let mut selected = HashSet::new();
            for id in ids {
                if is_content(store, *id)? {
                    selected.insert(*id);
                }
            }
            let tops = top_level(store, &selected)?;
            return Ok((!tops.is_empty()).then_some(Clip::Blocks(tops)));
        }
        Selection::Text { .. } => match selection.ordered_points(store)? {
            Some(points) => points,
            None => return Ok(None),
        },
    };

    if start.block != end.block {
        let covered = covered_by_range(store, start, end)?;
        let tops = top_level(store, &covered)?;
        return Ok((!tops.is_empty()).then_some(Clip::Blocks(tops)));
    }

    let block = store.block(start.block)?;
    let text = block.text();
    let from = floor_char_boundary(text, start.offset);
    let to = floor_char_boundary(text, end.offset);
    if from >= to {
        return Ok(None);
    }
    if from == 0 && to == text.len() && block.children.is_empty() && is_content(store, block.id)? {
        return Ok(Some(Clip::Blocks(vec![block.id])));
    }
    Ok(Some(Clip::Text {
        block: block.id,
        start: from,
        end: to,
    }))
}

fn is_content(store: &BlockStore, id: BlockId) -> Result<bool, StoreError> {
    let kind = &store.block(id)?.kind;
    Ok(store.schema().role(kind) == Some(NodeRole::Content))
}

/// Blocks whose text a range spanning several blocks covers entirely and
/// whose descendants are all covered too.
fn covered_by_range(
    store: &BlockStore,
    start: TextPoint,
    end: TextPoint,
) -> Result<HashSet<BlockId>, StoreError> {
    let order = store.descendants(store.root())?;
    let from = order.iter().position(|id| *id == start.block);
    let to = order.iter().position(|id| *id == end.block);
    let (Some(from), Some(to)) = (from, to) else {
        return Ok(HashSet::new());
    };

    let mut covered = HashSet::new();
    // Reverse pre-order visits children before their parent.
    for id in order[from..=to].iter().rev() {
        let block = store.block(*id)?;
        let text_covered = (*id != start.block || start.offset == 0)
            && (*id != end.block || end.offset >= block.text_len());
        if text_covered
            && is_content(store, *id)?
            && block.children.iter().all(|child| covered.contains(child))
        {
            covered.insert(*id);
        }
    }
    Ok(covered)
}

fn top_level(store: &BlockStore, ids: &HashSet<BlockId>) -> Result<Vec<BlockId>, StoreError> {
    let mut tops = Vec::new();
    for id in ids {
        let chain = store.ancestor_chain(*id)?;
        if !chain.iter().skip(1).any(|ancestor| ids.contains(ancestor)) {
            tops.push(*id);
        }
    }
    store.sort_document_order(&mut tops)?;
    Ok(tops)
}

fn payload(clip: &Clip, store: &BlockStore) -> Result<PortablePayload, StoreError> {
    match clip {
        Clip::Blocks(ids) => ContentParser::new(store.schema()).serialize(ids, store),
        Clip::Text { block, start, end } => {
            let text = &store.text(*block)?[*start..*end];
            let spec = BlockSpec::new(store.schema().fallback_kind()).text(text);
            Ok(PortablePayload::from_blocks(vec![spec]))
        }
    }
}
