use std::collections::HashSet;

use manos_block_core::{BlockId, BlockStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::engine::DragConfig;
use crate::geometry::{BlockLayout, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Before,
    After,
    Inside,
}

/// The line a renderer draws to preview a drop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropIndicator {
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

/// A resolved drop position.
///
/// `index` is the position among the children of `parent_id` once the dragged
/// block has been detached, so it can be passed to `BlockStore::move_block`
/// as is.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropTarget {
    pub parent_id: BlockId,
    pub index: usize,
    pub reference: BlockId,
    pub placement: Placement,
    pub depth: usize,
    pub indicator: DropIndicator,
}

/// Everything a drop resolution reads. Resolution never mutates.
pub struct DropQuery<'a> {
    pub store: &'a BlockStore,
    pub rows: &'a [BlockLayout],
    pub bounds: Rect,
    pub dragged: BlockId,
    /// The dragged block and its descendants.
    pub excluded: &'a HashSet<BlockId>,
    pub config: DragConfig,
}

impl DropQuery<'_> {
    fn accepts(&self, parent: BlockId, dragged_kind: &str) -> Result<bool, StoreError> {
        if self.excluded.contains(&parent) {
            return Ok(false);
        }
        let parent_kind = &self.store.block(parent)?.kind;
        Ok(self.store.schema().allows_child(parent_kind, dragged_kind))
    }

    fn index_after_detach(&self, parent: BlockId, anchor: BlockId) -> Result<usize, StoreError> {
        self.store
            .children(parent)?
            .iter()
            .filter(|child| **child != self.dragged)
            .position(|child| *child == anchor)
            .ok_or(StoreError::NotFound(anchor))
    }

    fn indicator(&self, x: f32, y: f32) -> DropIndicator {
        let x = x + self.config.indent_offset;
        DropIndicator {
            x,
            y,
            width: (self.bounds.right() - x).max(0.0),
        }
    }
}

/// Level the pointer asks for, relative to the row it is measured against.
fn desired_depth(row: &BlockLayout, x: f32, indent_width: f32) -> i64 {
    let shift = if indent_width > 0.0 {
        ((x - row.rect.x) / indent_width).floor() as i64
    } else {
        0
    };
    row.depth as i64 + shift
}

/// Every legal drop position for pointer `(x, y)`, best first.
///
/// The first entry is the position under the pointer. The rest are the other
/// legal depths at the same gap: shallower levels first, then deeper ones.
pub fn drop_candidates(query: &DropQuery<'_>, x: f32, y: f32) -> Result<Vec<DropTarget>, StoreError> {
    if !query.bounds.contains(x, y) {
        return Ok(Vec::new());
    }
    let store = query.store;
    let dragged_kind = store.block(query.dragged)?.kind.clone();
    let rows: Vec<&BlockLayout> = query
        .rows
        .iter()
        .filter(|row| !query.excluded.contains(&row.id) && store.contains(row.id))
        .collect();
    let Some(first) = rows.first().copied() else {
        return Ok(Vec::new());
    };

    let gap_index = rows.iter().take_while(|row| row.rect.mid_y() <= y).count();
    if gap_index == 0 {
        let Some((parent, _)) = store.position_of(first.id)? else {
            return Ok(Vec::new());
        };
        if !query.accepts(parent, &dragged_kind)? {
            return Ok(Vec::new());
        }
        return Ok(vec![DropTarget {
            parent_id: parent,
            index: query.index_after_detach(parent, first.id)?,
            reference: first.id,
            placement: Placement::Before,
            depth: first.depth,
            indicator: query.indicator(first.rect.x, first.rect.y),
        }]);
    }

    let prev = rows[gap_index - 1];
    let next = rows.get(gap_index).copied();
    let prev_kind = &store.block(prev.id)?.kind;
    let max_depth = if store.schema().allows_child(prev_kind, &dragged_kind) {
        prev.depth + 1
    } else {
        prev.depth
    };
    let pointer_depth =
        desired_depth(prev, x, query.config.indent_width).clamp(0, max_depth as i64) as usize;
    let chain = store.ancestor_chain(prev.id)?;

    let mut candidates = Vec::new();
    for depth in (0..=pointer_depth).rev().chain(pointer_depth + 1..=max_depth) {
        let (parent, index, reference, placement) = if depth > prev.depth {
            let children = store.children(prev.id)?;
            let index = match next {
                Some(next) if children.contains(&next.id) => 0,
                _ => children.iter().filter(|c| **c != query.dragged).count(),
            };
            (prev.id, index, prev.id, Placement::Inside)
        } else {
            let Some(anchor) = chain.get(prev.depth - depth).copied() else {
                continue;
            };
            let Some((parent, _)) = store.position_of(anchor)? else {
                continue;
            };
            let index = query.index_after_detach(parent, anchor)? + 1;
            (parent, index, anchor, Placement::After)
        };

        if !query.accepts(parent, &dragged_kind)? {
            trace!(depth, parent = %parent, "depth rejected by parent");
            continue;
        }

        let indent = (depth as f32 - prev.depth as f32) * query.config.indent_width;
        candidates.push(DropTarget {
            parent_id: parent,
            index,
            reference,
            placement,
            depth,
            indicator: query.indicator(prev.rect.x + indent, prev.rect.bottom()),
        });
    }
    Ok(candidates)
}

pub fn resolve_drop_target(
    query: &DropQuery<'_>,
    x: f32,
    y: f32,
) -> Result<Option<DropTarget>, StoreError> {
    Ok(drop_candidates(query, x, y)?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use manos_block_core::BlockSpec;

    use super::*;
    use crate::outline::{outline, stack_rows};

    const ROW: f32 = 30.0;

    fn setup(specs: Vec<BlockSpec>) -> (BlockStore, BlockId, Vec<BlockLayout>) {
        let mut store = BlockStore::default();
        let frame = store.insert(store.root(), 0, BlockSpec::frame()).unwrap();
        for (ix, spec) in specs.into_iter().enumerate() {
            store.insert(frame, ix, spec).unwrap();
        }
        let rows = stack_rows(
            &outline(&store).unwrap(),
            Rect::new(40.0, 0.0, 400.0, 600.0),
            ROW,
            26.0,
        );
        (store, frame, rows)
    }

    fn query<'a>(
        store: &'a BlockStore,
        rows: &'a [BlockLayout],
        dragged: BlockId,
        excluded: &'a HashSet<BlockId>,
    ) -> DropQuery<'a> {
        DropQuery {
            store,
            rows,
            bounds: Rect::new(0.0, 0.0, 480.0, 600.0),
            dragged,
            excluded,
            config: DragConfig::default(),
        }
    }

    #[test]
    fn deeper_than_allowed_clamps_to_child_of_previous() {
        let (store, frame, rows) = setup(vec![
            BlockSpec::list("a"),
            BlockSpec::list("b"),
            BlockSpec::list("c"),
        ]);
        let children = store.children(frame).unwrap().to_vec();
        let excluded: HashSet<BlockId> = [children[2]].into_iter().collect();
        let q = query(&store, &rows, children[2], &excluded);

        let target = resolve_drop_target(&q, rows[0].rect.x + 200.0, ROW * 0.75)
            .unwrap()
            .unwrap();
        assert_eq!(target.parent_id, children[0]);
        assert_eq!(target.placement, Placement::Inside);
        assert_eq!(target.depth, 1);
        assert_eq!(target.index, 0);
    }

    #[test]
    fn blocks_without_children_cap_the_depth() {
        let (store, frame, rows) = setup(vec![BlockSpec::divider(), BlockSpec::list("b")]);
        let children = store.children(frame).unwrap().to_vec();
        let excluded: HashSet<BlockId> = [children[1]].into_iter().collect();
        let q = query(&store, &rows, children[1], &excluded);

        let candidates = drop_candidates(&q, rows[0].rect.x + 200.0, ROW * 0.75).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].parent_id, frame);
        assert_eq!(candidates[0].placement, Placement::After);
    }

    #[test]
    fn pointer_outside_bounds_has_no_target() {
        let (store, frame, rows) = setup(vec![BlockSpec::list("a"), BlockSpec::list("b")]);
        let children = store.children(frame).unwrap().to_vec();
        let excluded: HashSet<BlockId> = [children[0]].into_iter().collect();
        let q = query(&store, &rows, children[0], &excluded);

        assert_eq!(resolve_drop_target(&q, 10.0, 900.0).unwrap(), None);
        assert_eq!(resolve_drop_target(&q, -5.0, 10.0).unwrap(), None);
    }

    #[test]
    fn candidates_prefer_shallower_before_deeper() {
        let (store, frame, rows) = setup(vec![
            BlockSpec::list("a").child(BlockSpec::list("b")),
            BlockSpec::list("c"),
        ]);
        let c = store.children(frame).unwrap()[1];
        let excluded: HashSet<BlockId> = [c].into_iter().collect();
        let q = query(&store, &rows, c, &excluded);

        // Below "b", measured one level deep.
        let candidates = drop_candidates(&q, rows[1].rect.x + 2.0, ROW * 1.75).unwrap();
        let depths: Vec<usize> = candidates.iter().map(|t| t.depth).collect();
        assert_eq!(depths, vec![1, 0, 2]);
    }
}
