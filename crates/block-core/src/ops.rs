use serde::{Deserialize, Serialize};

use crate::core::{Block, BlockId, PropPatch};

/// A single committed change to the block tree.
///
/// Every variant carries enough data to be inverted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Insert {
        block: BlockId,
        parent: BlockId,
        index: usize,
    },
    Remove {
        block: BlockId,
        parent: BlockId,
        index: usize,
        /// The removed subtree in pre-order, ids included.
        subtree: Vec<Block>,
    },
    Move {
        block: BlockId,
        from_parent: BlockId,
        from_index: usize,
        to_parent: BlockId,
        to_index: usize,
    },
    SetProps {
        block: BlockId,
        patch: PropPatch,
        previous: PropPatch,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Move,
    Remove,
    Update,
}

impl Op {
    pub fn block_id(&self) -> BlockId {
        match self {
            Op::Insert { block, .. }
            | Op::Remove { block, .. }
            | Op::Move { block, .. }
            | Op::SetProps { block, .. } => *block,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Op::Insert { .. } => ChangeKind::Insert,
            Op::Remove { .. } => ChangeKind::Remove,
            Op::Move { .. } => ChangeKind::Move,
            Op::SetProps { .. } => ChangeKind::Update,
        }
    }

    /// The parent affected by the change: the destination for inserts and
    /// moves, the former container for removals. `None` for prop updates.
    pub fn parent_id(&self) -> Option<BlockId> {
        match self {
            Op::Insert { parent, .. } | Op::Remove { parent, .. } => Some(*parent),
            Op::Move { to_parent, .. } => Some(*to_parent),
            Op::SetProps { .. } => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Op::Insert { index, .. } | Op::Remove { index, .. } => Some(*index),
            Op::Move { to_index, .. } => Some(*to_index),
            Op::SetProps { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// The ops of one committed mutation or batch, delivered to observers together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl ChangeSet {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            meta: TransactionMeta::default(),
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn touches(&self, block: BlockId) -> bool {
        self.ops.iter().any(|op| op.block_id() == block)
    }
}
