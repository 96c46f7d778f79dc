use serde::{Deserialize, Serialize};

use crate::core::BlockId;
use crate::error::StoreError;
use crate::store::BlockStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPoint {
    pub block: BlockId,
    pub offset: usize,
}

impl TextPoint {
    pub fn new(block: BlockId, offset: usize) -> Self {
        Self { block, offset }
    }
}

/// The editing session's current selection. Never stored in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selection {
    Caret { point: TextPoint },
    Text { anchor: TextPoint, focus: TextPoint },
    Blocks { ids: Vec<BlockId> },
}

impl Selection {
    pub fn caret(block: BlockId, offset: usize) -> Self {
        Selection::Caret {
            point: TextPoint::new(block, offset),
        }
    }

    pub fn text(anchor: TextPoint, focus: TextPoint) -> Self {
        Selection::Text { anchor, focus }
    }

    pub fn blocks(ids: impl IntoIterator<Item = BlockId>) -> Self {
        Selection::Blocks {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        match self {
            Selection::Caret { .. } => true,
            Selection::Text { anchor, focus } => anchor == focus,
            Selection::Blocks { ids } => ids.is_empty(),
        }
    }

    /// Start and end of a text selection in document order.
    pub fn ordered_points(
        &self,
        store: &BlockStore,
    ) -> Result<Option<(TextPoint, TextPoint)>, StoreError> {
        let (anchor, focus) = match self {
            Selection::Caret { point } => (*point, *point),
            Selection::Text { anchor, focus } => (*anchor, *focus),
            Selection::Blocks { .. } => return Ok(None),
        };
        let order = store
            .cmp_document_order(anchor.block, focus.block)?
            .then(anchor.offset.cmp(&focus.offset));
        if order.is_gt() {
            Ok(Some((focus, anchor)))
        } else {
            Ok(Some((anchor, focus)))
        }
    }
}

/// Where the caret sits relative to the tree.
///
/// `index` names the host block among the children of `parent_id`; `None`
/// places the caret in `parent_id` after its last child. `offset` is a text
/// offset inside the host; `Some(0)` sits before the host even when it has
/// no text, and `None` sits after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub parent_id: BlockId,
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl CursorPosition {
    /// Caret inside `block` at `offset`.
    pub fn in_block(
        store: &BlockStore,
        block: BlockId,
        offset: Option<usize>,
    ) -> Result<Self, StoreError> {
        let Some((parent_id, index)) = store.position_of(block)? else {
            return Ok(Self::end_of(block));
        };
        Ok(Self {
            parent_id,
            index: Some(index),
            offset,
        })
    }

    /// Caret in `parent` after its last child.
    pub fn end_of(parent: BlockId) -> Self {
        Self {
            parent_id: parent,
            index: None,
            offset: None,
        }
    }

    pub fn host(&self, store: &BlockStore) -> Result<Option<BlockId>, StoreError> {
        let Some(index) = self.index else {
            return Ok(None);
        };
        Ok(store.children(self.parent_id)?.get(index).copied())
    }
}
