use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, error, trace};

use crate::core::{Block, BlockId, BlockSpec, PropPatch, Props, patch_apply};
use crate::error::{HierarchyViolation, StoreError};
use crate::ops::{ChangeSet, Op};
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&ChangeSet)>;

/// Arena of blocks keyed by id.
///
/// All mutations validate against the schema before touching state, and every
/// committed mutation is reported to the registered observers.
pub struct BlockStore {
    schema: Schema,
    blocks: HashMap<BlockId, Block>,
    root: BlockId,
    next_id: u64,
    observers: Vec<(ObserverId, Observer)>,
    next_observer_id: u64,
    pending: Option<Vec<Op>>,
}

impl fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockStore")
            .field("root", &self.root)
            .field("blocks", &self.blocks.len())
            .field("next_id", &self.next_id)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new(Schema::standard())
    }
}

impl BlockStore {
    /// Creates a store holding a single root block of the schema's root kind.
    pub fn new(schema: Schema) -> Self {
        let root = BlockId(0);
        let mut blocks = HashMap::new();
        blocks.insert(
            root,
            Block {
                id: root,
                kind: schema.root_kind().to_string(),
                props: Props::default(),
                children: Vec::new(),
                parent: None,
            },
        );
        Self {
            schema,
            blocks,
            root,
            next_id: 1,
            observers: Vec::new(),
            next_observer_id: 0,
            pending: None,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.len() <= 1
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn block(&self, id: BlockId) -> Result<&Block, StoreError> {
        self.blocks.get(&id).ok_or(StoreError::NotFound(id))
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, StoreError> {
        self.blocks.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    pub fn text(&self, id: BlockId) -> Result<&str, StoreError> {
        Ok(self.block(id)?.text())
    }

    pub fn children(&self, parent: BlockId) -> Result<&[BlockId], StoreError> {
        Ok(&self.block(parent)?.children)
    }

    pub fn parent_of(&self, id: BlockId) -> Result<Option<BlockId>, StoreError> {
        Ok(self.block(id)?.parent)
    }

    /// Parent and index of `id`, or `None` for the root.
    pub fn position_of(&self, id: BlockId) -> Result<Option<(BlockId, usize)>, StoreError> {
        let Some(parent) = self.block(id)?.parent else {
            return Ok(None);
        };
        let index = self.index_in(parent, id)?;
        Ok(Some((parent, index)))
    }

    fn index_in(&self, parent: BlockId, id: BlockId) -> Result<usize, StoreError> {
        self.block(parent)?
            .children
            .iter()
            .position(|child| *child == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// `id` followed by each ancestor up to and including the root.
    pub fn ancestor_chain(&self, id: BlockId) -> Result<Vec<BlockId>, StoreError> {
        let mut chain = vec![id];
        let mut current = self.block(id)?;
        while let Some(parent) = current.parent {
            if chain.len() > self.blocks.len() {
                break;
            }
            chain.push(parent);
            current = self.block(parent)?;
        }
        Ok(chain)
    }

    /// Number of ancestors between `id` and the root. The root has depth 0.
    pub fn depth(&self, id: BlockId) -> Result<usize, StoreError> {
        Ok(self.ancestor_chain(id)?.len() - 1)
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: BlockId, id: BlockId) -> bool {
        match self.ancestor_chain(id) {
            Ok(chain) => chain.iter().skip(1).any(|a| *a == ancestor),
            Err(_) => false,
        }
    }

    /// `id` and all of its descendants in pre-order.
    pub fn subtree_ids(&self, id: BlockId) -> Result<Vec<BlockId>, StoreError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let block = self.block(next)?;
            out.push(next);
            stack.extend(block.children.iter().rev().copied());
        }
        Ok(out)
    }

    /// Descendants of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: BlockId) -> Result<Vec<BlockId>, StoreError> {
        let mut ids = self.subtree_ids(id)?;
        ids.remove(0);
        Ok(ids)
    }

    /// Detached copy of the subtree rooted at `id`.
    pub fn snapshot(&self, id: BlockId) -> Result<BlockSpec, StoreError> {
        let block = self.block(id)?;
        let children = block
            .children
            .iter()
            .map(|child| self.snapshot(*child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BlockSpec {
            kind: block.kind.clone(),
            props: block.props.clone(),
            children,
        })
    }

    /// Orders two blocks by their position in a depth-first walk of the tree.
    pub fn cmp_document_order(&self, a: BlockId, b: BlockId) -> Result<Ordering, StoreError> {
        if a == b {
            return Ok(Ordering::Equal);
        }
        let mut chain_a = self.ancestor_chain(a)?;
        let mut chain_b = self.ancestor_chain(b)?;
        chain_a.reverse();
        chain_b.reverse();

        let common = chain_a
            .iter()
            .zip(chain_b.iter())
            .take_while(|(x, y)| x == y)
            .count();
        match (chain_a.get(common), chain_b.get(common)) {
            (None, _) => Ok(Ordering::Less),
            (_, None) => Ok(Ordering::Greater),
            (Some(&x), Some(&y)) => {
                let parent = chain_a[common - 1];
                Ok(self.index_in(parent, x)?.cmp(&self.index_in(parent, y)?))
            }
        }
    }

    pub fn sort_document_order(&self, ids: &mut [BlockId]) -> Result<(), StoreError> {
        for id in ids.iter() {
            self.block(*id)?;
        }
        ids.sort_by(|a, b| self.cmp_document_order(*a, *b).unwrap_or(Ordering::Equal));
        Ok(())
    }

    pub fn observe(&mut self, observer: impl FnMut(&ChangeSet) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Inserts `spec` and its whole subtree as child `index` of `parent`.
    pub fn insert(
        &mut self,
        parent: BlockId,
        index: usize,
        spec: BlockSpec,
    ) -> Result<BlockId, StoreError> {
        let parent_block = self.block(parent)?;
        let len = parent_block.children.len();
        if index > len {
            return Err(HierarchyViolation::IndexOutOfBounds { index, len }.into());
        }
        self.validate_spec(&parent_block.kind, &spec)?;

        let id = self.materialize(&spec, parent);
        self.block_mut(parent)?.children.insert(index, id);
        debug!(block = %id, parent = %parent, index, kind = %spec.kind, "insert block");
        self.emit(Op::Insert {
            block: id,
            parent,
            index,
        });
        Ok(id)
    }

    fn validate_spec(&self, parent_kind: &str, spec: &BlockSpec) -> Result<(), HierarchyViolation> {
        if !self.schema.allows_child(parent_kind, &spec.kind) {
            return Err(HierarchyViolation::IllegalChild {
                parent: parent_kind.to_string(),
                child: spec.kind.clone(),
            });
        }
        for child in &spec.children {
            self.validate_spec(&spec.kind, child)?;
        }
        Ok(())
    }

    fn materialize(&mut self, spec: &BlockSpec, parent: BlockId) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        let children = spec
            .children
            .iter()
            .map(|child| self.materialize(child, id))
            .collect();
        self.blocks.insert(
            id,
            Block {
                id,
                kind: spec.kind.clone(),
                props: spec.props.clone(),
                children,
                parent: Some(parent),
            },
        );
        id
    }

    /// Detaches `id` and destroys it together with all of its descendants.
    pub fn remove(&mut self, id: BlockId) -> Result<(), StoreError> {
        let Some(parent) = self.block(id)?.parent else {
            return Err(HierarchyViolation::RootImmutable.into());
        };
        let index = self.index_in(parent, id)?;
        let ids = self.subtree_ids(id)?;

        self.block_mut(parent)?.children.remove(index);
        let subtree: Vec<Block> = ids
            .iter()
            .filter_map(|block_id| self.blocks.remove(block_id))
            .collect();
        debug!(block = %id, parent = %parent, index, removed = subtree.len(), "remove block");
        self.emit(Op::Remove {
            block: id,
            parent,
            index,
            subtree,
        });
        Ok(())
    }

    /// Moves `id` so that it ends up at `new_index` among the children of
    /// `new_parent`, counted after `id` has been detached from its old parent.
    pub fn move_block(
        &mut self,
        id: BlockId,
        new_parent: BlockId,
        new_index: usize,
    ) -> Result<(), StoreError> {
        let block = self.block(id)?;
        let kind = block.kind.clone();
        let Some(old_parent) = block.parent else {
            return Err(HierarchyViolation::RootImmutable.into());
        };
        let target = self.block(new_parent)?;
        if new_parent == id || self.is_ancestor(id, new_parent) {
            return Err(HierarchyViolation::Cycle { block: id }.into());
        }
        if !self.schema.allows_child(&target.kind, &kind) {
            return Err(HierarchyViolation::IllegalChild {
                parent: target.kind.clone(),
                child: kind,
            }
            .into());
        }
        let old_index = self.index_in(old_parent, id)?;
        let len = if old_parent == new_parent {
            target.children.len() - 1
        } else {
            target.children.len()
        };
        if new_index > len {
            return Err(HierarchyViolation::IndexOutOfBounds {
                index: new_index,
                len,
            }
            .into());
        }
        if old_parent == new_parent && old_index == new_index {
            trace!(block = %id, "move to current position ignored");
            return Ok(());
        }

        self.block_mut(old_parent)?.children.remove(old_index);
        self.block_mut(new_parent)?.children.insert(new_index, id);
        self.block_mut(id)?.parent = Some(new_parent);
        debug!(
            block = %id,
            from_parent = %old_parent,
            from_index = old_index,
            to_parent = %new_parent,
            to_index = new_index,
            "move block"
        );
        self.emit(Op::Move {
            block: id,
            from_parent: old_parent,
            from_index: old_index,
            to_parent: new_parent,
            to_index: new_index,
        });
        Ok(())
    }

    pub fn set_props(&mut self, id: BlockId, patch: PropPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            self.block(id)?;
            return Ok(());
        }
        let block = self.block_mut(id)?;
        let previous = patch_apply(&mut block.props, &patch);
        debug!(block = %id, "set block props");
        self.emit(Op::SetProps {
            block: id,
            patch,
            previous,
        });
        Ok(())
    }

    /// Runs `f` as one logical transaction.
    ///
    /// Observers receive a single [`ChangeSet`] once `f` succeeds. When `f`
    /// fails, every change it made is reverted and nothing is reported.
    pub fn batch<T, E>(
        &mut self,
        source: impl Into<String>,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let nested = self.pending.is_some();
        let mark = self.pending.as_ref().map_or(0, Vec::len);
        if !nested {
            self.pending = Some(Vec::new());
        }

        match f(self) {
            Ok(value) => {
                if !nested {
                    let ops = self.pending.take().unwrap_or_default();
                    if !ops.is_empty() {
                        self.notify(&ChangeSet::new(ops).source(source));
                    }
                }
                Ok(value)
            }
            Err(err) => {
                let applied = self
                    .pending
                    .as_mut()
                    .map(|ops| ops.split_off(mark))
                    .unwrap_or_default();
                debug!(ops = applied.len(), "batch failed, rolling back");
                for op in applied.iter().rev() {
                    if let Err(revert_err) = self.apply_inverse(op) {
                        error!(error = %revert_err, "failed to roll back op");
                    }
                }
                if let Some(ops) = self.pending.as_mut() {
                    ops.truncate(mark);
                }
                if !nested {
                    self.pending = None;
                }
                Err(err)
            }
        }
    }

    /// Applies the inverse of `changes` as a new transaction.
    pub fn revert(&mut self, changes: &ChangeSet) -> Result<(), StoreError> {
        self.batch("revert", |store| {
            for op in changes.ops.iter().rev() {
                store.apply_inverse(op)?;
            }
            Ok(())
        })
    }

    fn apply_inverse(&mut self, op: &Op) -> Result<(), StoreError> {
        match op {
            Op::Insert { block, .. } => self.remove(*block),
            Op::Remove {
                parent,
                index,
                subtree,
                ..
            } => self.restore(*parent, *index, subtree.clone()),
            Op::Move {
                block,
                from_parent,
                from_index,
                ..
            } => self.move_block(*block, *from_parent, *from_index),
            Op::SetProps {
                block, previous, ..
            } => self.set_props(*block, previous.clone()),
        }
    }

    /// Puts a previously removed subtree back, keeping its ids.
    fn restore(
        &mut self,
        parent: BlockId,
        index: usize,
        subtree: Vec<Block>,
    ) -> Result<(), StoreError> {
        let Some(root) = subtree.first().map(|block| block.id) else {
            return Ok(());
        };
        let len = self.block(parent)?.children.len();
        if index > len {
            return Err(HierarchyViolation::IndexOutOfBounds { index, len }.into());
        }
        for mut block in subtree {
            if block.id == root {
                block.parent = Some(parent);
            }
            self.blocks.insert(block.id, block);
        }
        self.block_mut(parent)?.children.insert(index, root);
        debug!(block = %root, parent = %parent, index, "restore block");
        self.emit(Op::Insert {
            block: root,
            parent,
            index,
        });
        Ok(())
    }

    fn emit(&mut self, op: Op) {
        if let Some(pending) = self.pending.as_mut() {
            pending.push(op);
            return;
        }
        self.notify(&ChangeSet::new(vec![op]));
    }

    fn notify(&mut self, changes: &ChangeSet) {
        for (_, observer) in self.observers.iter_mut() {
            observer(changes);
        }
    }

    /// Verifies the structural invariants of the tree.
    pub fn check_invariants(&self) -> Result<(), String> {
        let root = self.block(self.root).map_err(|err| err.to_string())?;
        if root.parent.is_some() {
            return Err(format!("root {} has a parent", self.root));
        }

        let mut seen: HashSet<BlockId> = HashSet::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return Err(format!("{id} is reachable more than once"));
            }
            let block = self.block(id).map_err(|err| err.to_string())?;
            for child_id in &block.children {
                let child = self
                    .blocks
                    .get(child_id)
                    .ok_or_else(|| format!("{id} lists missing child {child_id}"))?;
                if child.parent != Some(id) {
                    return Err(format!(
                        "{child_id} is listed under {id} but points to {:?}",
                        child.parent
                    ));
                }
                if !self.schema.allows_child(&block.kind, &child.kind) {
                    return Err(format!(
                        "`{}` {child_id} is not a legal child of `{}` {id}",
                        child.kind, block.kind
                    ));
                }
                stack.push(*child_id);
            }
        }

        if seen.len() != self.blocks.len() {
            return Err(format!(
                "{} blocks are not reachable from the root",
                self.blocks.len() - seen.len()
            ));
        }
        Ok(())
    }
}
