use std::collections::HashSet;

use manos_block_core::{BlockId, BlockStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::geometry::{BlockLayout, Rect};
use crate::resolve::{DropQuery, DropTarget, drop_candidates};

/// Matches the per-level padding of the default block renderer.
pub const DEFAULT_INDENT_WIDTH: f32 = 26.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    /// Horizontal distance that selects one nesting level.
    pub indent_width: f32,
    /// Shifts the drop indicator without changing depth resolution.
    pub indent_offset: f32,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            indent_width: DEFAULT_INDENT_WIDTH,
            indent_offset: 0.0,
        }
    }
}

impl DragConfig {
    /// Set the indentation width used to infer the intended depth.
    ///
    /// This should match the indentation used by the row renderer.
    pub fn indent_width(mut self, indent_width: f32) -> Self {
        self.indent_width = indent_width;
        self
    }

    pub fn indent_offset(mut self, indent_offset: f32) -> Self {
        self.indent_offset = indent_offset;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragState {
    Idle,
    Tracking,
    Dropped,
    Cancelled,
}

impl DragState {
    pub fn is_tracking(self) -> bool {
        self == DragState::Tracking
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    Moved { block: BlockId, target: DropTarget },
    Cancelled,
    /// No drag was in progress.
    Ignored,
}

/// Tracks one drag gesture at a time over the rendered block rows.
#[derive(Debug)]
pub struct DragReorderEngine {
    config: DragConfig,
    bounds: Rect,
    rows: Vec<BlockLayout>,
    state: DragState,
    dragged: Option<BlockId>,
    excluded: HashSet<BlockId>,
    candidates: Vec<DropTarget>,
    handle: Option<BlockId>,
}

impl Default for DragReorderEngine {
    fn default() -> Self {
        Self::new(DragConfig::default())
    }
}

impl DragReorderEngine {
    pub fn new(config: DragConfig) -> Self {
        Self {
            config,
            bounds: Rect::default(),
            rows: Vec::new(),
            state: DragState::Idle,
            dragged: None,
            excluded: HashSet::new(),
            candidates: Vec::new(),
            handle: None,
        }
    }

    pub fn config(&self) -> DragConfig {
        self.config
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn dragged(&self) -> Option<BlockId> {
        self.dragged
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn rows(&self) -> &[BlockLayout] {
        &self.rows
    }

    /// The block whose handle is shown. At most one at a time.
    pub fn handle(&self) -> Option<BlockId> {
        self.handle
    }

    /// The drop position under the pointer, if any.
    pub fn current_target(&self) -> Option<&DropTarget> {
        self.candidates.first()
    }

    /// Replaces the row geometry. Rows must be in document order.
    pub fn set_layout(&mut self, bounds: Rect, rows: Vec<BlockLayout>) {
        self.bounds = bounds;
        self.rows = rows;
    }

    /// Begins dragging `block`. Ignored while another drag is tracking, and
    /// for blocks that are missing or cannot move.
    pub fn start(&mut self, block: BlockId, store: &BlockStore) -> bool {
        if self.state.is_tracking() {
            trace!(block = %block, "drag already in progress, start ignored");
            return false;
        }
        match store.parent_of(block) {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return false,
        }
        let Ok(subtree) = store.subtree_ids(block) else {
            return false;
        };

        self.excluded = subtree.into_iter().collect();
        self.dragged = Some(block);
        self.candidates.clear();
        self.handle = Some(block);
        self.state = DragState::Tracking;
        debug!(block = %block, subtree = self.excluded.len(), "drag started");
        true
    }

    /// Feeds a pointer sample. Returns whether the visible target or handle
    /// changed.
    pub fn pointer_move(&mut self, x: f32, y: f32, store: &BlockStore) -> bool {
        let Some(dragged) = self.dragged.filter(|_| self.state.is_tracking()) else {
            let handle = self.nearest_row(x, y);
            let changed = handle != self.handle;
            self.handle = handle;
            return changed;
        };

        let query = DropQuery {
            store,
            rows: &self.rows,
            bounds: self.bounds,
            dragged,
            excluded: &self.excluded,
            config: self.config,
        };
        let candidates = match drop_candidates(&query, x, y) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, "drop resolution failed");
                Vec::new()
            }
        };
        let changed = candidates.first() != self.candidates.first();
        if changed {
            trace!(x, y, target = ?candidates.first(), "drop target changed");
        }
        self.candidates = candidates;
        changed
    }

    fn nearest_row(&self, x: f32, y: f32) -> Option<BlockId> {
        if !self.bounds.contains(x, y) {
            return None;
        }
        self.rows
            .iter()
            .min_by(|a, b| {
                let da = (a.rect.mid_y() - y).abs();
                let db = (b.rect.mid_y() - y).abs();
                da.total_cmp(&db)
            })
            .map(|row| row.id)
    }

    /// Commits the drag with a single move.
    ///
    /// When the store rejects the target, shallower targets at the same gap
    /// are tried before giving up.
    pub fn drop(&mut self, store: &mut BlockStore) -> DropOutcome {
        if !self.state.is_tracking() {
            return DropOutcome::Ignored;
        }
        let dragged = self.dragged.take();
        let candidates = std::mem::take(&mut self.candidates);
        self.excluded.clear();

        let (Some(dragged), Some(first)) = (dragged, candidates.first().copied()) else {
            debug!("drop without target");
            self.state = DragState::Cancelled;
            return DropOutcome::Cancelled;
        };

        let shallower = candidates.iter().copied().filter(|t| t.depth < first.depth);
        for target in std::iter::once(first).chain(shallower) {
            match store.move_block(dragged, target.parent_id, target.index) {
                Ok(()) => {
                    debug!(
                        block = %dragged,
                        parent = %target.parent_id,
                        index = target.index,
                        depth = target.depth,
                        "drop committed"
                    );
                    self.state = DragState::Dropped;
                    return DropOutcome::Moved {
                        block: dragged,
                        target,
                    };
                }
                Err(StoreError::InvalidHierarchy(violation)) => {
                    debug!(%violation, depth = target.depth, "drop target rejected");
                }
                Err(err) => {
                    warn!(error = %err, "drop failed");
                    break;
                }
            }
        }

        self.state = DragState::Cancelled;
        DropOutcome::Cancelled
    }

    /// Abandons the drag without touching the store.
    pub fn cancel(&mut self) -> bool {
        if !self.state.is_tracking() {
            return false;
        }
        debug!(block = ?self.dragged, "drag cancelled");
        self.dragged = None;
        self.excluded.clear();
        self.candidates.clear();
        self.state = DragState::Cancelled;
        true
    }

    /// Back to idle, keeping layout and configuration.
    pub fn reset(&mut self) {
        self.cancel();
        self.state = DragState::Idle;
        self.handle = None;
    }
}
