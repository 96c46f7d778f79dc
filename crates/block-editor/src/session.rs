use manos_block_core::{
    BlockId, BlockStore, CursorPosition, PortablePayload, Selection, StoreError,
};
use manos_block_dnd::{BlockLayout, DragReorderEngine, DropOutcome, DropTarget, Rect};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::channel::ClipboardChannel;
use crate::clipboard::{CopyCutManager, PasteManager, PasteOutcome};
use crate::config::EditorConfig;
use crate::error::SessionError;

/// A user gesture as delivered by the host's event source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Gesture {
    Hover { x: f32, y: f32 },
    DragStart { block: BlockId },
    PointerMove { x: f32, y: f32 },
    Drop,
    Cancel,
    Copy,
    Cut,
    Paste,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// Not attached to the target, or nothing to do.
    Ignored,
    HandleChanged(Option<BlockId>),
    TargetChanged(Option<DropTarget>),
    Unchanged,
    DragStarted(BlockId),
    Dropped(DropOutcome),
    Cancelled,
    Copied(PortablePayload),
    Cut(CursorPosition),
    Pasted(PasteOutcome),
}

/// Returned by [`EditorSession::attach`]; hand it back to `detach` to stop
/// receiving gestures.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a subscription leaves the session attached"]
pub struct Subscription {
    id: u64,
    target: String,
}

impl Subscription {
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// One editing session: the document, its drag engine and clipboard
/// handlers, attached to at most one gesture target.
pub struct EditorSession {
    config: EditorConfig,
    store: BlockStore,
    engine: DragReorderEngine,
    copy_cut: CopyCutManager,
    paste: PasteManager,
    channel: Box<dyn ClipboardChannel>,
    selection: Option<Selection>,
    cursor: Option<CursorPosition>,
    attached: Option<(u64, String)>,
    next_subscription: u64,
}

impl EditorSession {
    pub fn new(store: BlockStore, channel: Box<dyn ClipboardChannel>, config: EditorConfig) -> Self {
        let config = config.with_defaults();
        Self {
            engine: DragReorderEngine::new(config.drag),
            copy_cut: CopyCutManager::new(config.clipboard.write_encodings.iter().copied()),
            paste: PasteManager::new(config.clipboard.read_preference.iter().copied()),
            config,
            store,
            channel,
            selection: None,
            cursor: None,
            attached: None,
            next_subscription: 1,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Direct edits can shift blocks, so the stored cursor is dropped.
    pub fn store_mut(&mut self) -> &mut BlockStore {
        self.cursor = None;
        &mut self.store
    }

    pub fn engine(&self) -> &DragReorderEngine {
        &self.engine
    }

    pub fn set_layout(&mut self, bounds: Rect, rows: Vec<BlockLayout>) {
        self.engine.set_layout(bounds, rows);
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// A new selection replaces the stored cursor as the paste point.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        if selection.is_some() {
            self.cursor = None;
        }
        self.selection = selection;
    }

    pub fn cursor(&self) -> Option<&CursorPosition> {
        self.cursor.as_ref()
    }

    pub fn set_cursor(&mut self, cursor: Option<CursorPosition>) {
        self.cursor = cursor;
    }

    pub fn is_attached(&self, target: &str) -> bool {
        self.attached.as_ref().is_some_and(|(_, t)| t == target)
    }

    pub fn attach(&mut self, target: impl Into<String>) -> Result<Subscription, SessionError> {
        if self.attached.is_some() {
            return Err(SessionError::AlreadyAttached);
        }
        let target = target.into();
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.attached = Some((id, target.clone()));
        debug!(source = %target, subscription = id, "session attached");
        Ok(Subscription { id, target })
    }

    /// Stops gesture delivery and tears down drag state.
    pub fn detach(&mut self, subscription: Subscription) -> Result<(), SessionError> {
        if self.attached.as_ref().map(|(id, _)| *id) != Some(subscription.id) {
            return Err(SessionError::NotAttached);
        }
        self.attached = None;
        self.engine.reset();
        debug!(source = %subscription.target, "session detached");
        Ok(())
    }

    /// Moves the subscription to another target. Refused mid-drag.
    pub fn retarget(
        &mut self,
        subscription: &mut Subscription,
        target: impl Into<String>,
    ) -> Result<(), SessionError> {
        let Some((id, current)) = self.attached.as_mut() else {
            return Err(SessionError::NotAttached);
        };
        if *id != subscription.id {
            return Err(SessionError::NotAttached);
        }
        if self.engine.state().is_tracking() {
            return Err(SessionError::DragInFlight);
        }
        let target = target.into();
        *current = target.clone();
        subscription.target = target;
        Ok(())
    }

    pub fn dispatch(
        &mut self,
        target: &str,
        gesture: Gesture,
    ) -> Result<GestureOutcome, SessionError> {
        if !self.is_attached(target) {
            trace!(source = target, ?gesture, "gesture from unattached target");
            return Ok(GestureOutcome::Ignored);
        }

        match gesture {
            Gesture::Hover { x, y } | Gesture::PointerMove { x, y } => {
                if !self.engine.pointer_move(x, y, &self.store) {
                    return Ok(GestureOutcome::Unchanged);
                }
                if self.engine.state().is_tracking() {
                    Ok(GestureOutcome::TargetChanged(
                        self.engine.current_target().copied(),
                    ))
                } else {
                    Ok(GestureOutcome::HandleChanged(self.engine.handle()))
                }
            }
            Gesture::DragStart { block } => {
                if self.engine.start(block, &self.store) {
                    Ok(GestureOutcome::DragStarted(block))
                } else {
                    Ok(GestureOutcome::Ignored)
                }
            }
            Gesture::Drop => match self.engine.drop(&mut self.store) {
                DropOutcome::Ignored => Ok(GestureOutcome::Ignored),
                outcome => {
                    if matches!(outcome, DropOutcome::Moved { .. }) {
                        self.cursor = None;
                    }
                    Ok(GestureOutcome::Dropped(outcome))
                }
            },
            Gesture::Cancel => {
                if self.engine.cancel() {
                    Ok(GestureOutcome::Cancelled)
                } else {
                    Ok(GestureOutcome::Ignored)
                }
            }
            Gesture::Copy | Gesture::Cut | Gesture::Paste if self.engine.state().is_tracking() => {
                debug!(?gesture, "clipboard gesture ignored during drag");
                Ok(GestureOutcome::Ignored)
            }
            Gesture::Copy => {
                let Some(selection) = &self.selection else {
                    return Ok(GestureOutcome::Ignored);
                };
                let payload =
                    self.copy_cut
                        .handle_copy(selection, &self.store, self.channel.as_mut());
                let payload = self.forget_stale_selection(payload)?;
                Ok(payload.map_or(GestureOutcome::Ignored, GestureOutcome::Copied))
            }
            Gesture::Cut => {
                let Some(selection) = self.selection.clone() else {
                    return Ok(GestureOutcome::Ignored);
                };
                let cut =
                    self.copy_cut
                        .handle_cut(&selection, &mut self.store, self.channel.as_mut());
                let Some(cursor) = self.forget_stale_selection(cut)? else {
                    return Ok(GestureOutcome::Ignored);
                };
                self.selection = None;
                self.cursor = Some(cursor);
                Ok(GestureOutcome::Cut(cursor))
            }
            Gesture::Paste => {
                let Some(cursor) = self.forget_stale_selection(self.paste_cursor())? else {
                    return Ok(GestureOutcome::Ignored);
                };
                let pasted =
                    self.paste
                        .handle_paste(&cursor, &mut self.store, self.channel.as_mut());
                if pasted.as_ref().is_err_and(StoreError::is_not_found) {
                    debug!(?cursor, "stale cursor dropped");
                    self.cursor = None;
                }
                let Some(outcome) = pasted? else {
                    return Ok(GestureOutcome::Ignored);
                };
                self.selection = None;
                self.cursor = Some(outcome.cursor);
                Ok(GestureOutcome::Pasted(outcome))
            }
        }
    }

    /// A selection naming a removed block is cleared before the error is
    /// returned.
    fn forget_stale_selection<T>(
        &mut self,
        result: Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if result.as_ref().is_err_and(StoreError::is_not_found) {
            debug!(selection = ?self.selection, "stale selection dropped");
            self.selection = None;
        }
        result
    }

    /// The explicit cursor, else one derived from the selection: the caret or
    /// the start of a text range, or after the last selected block.
    fn paste_cursor(&self) -> Result<Option<CursorPosition>, StoreError> {
        if let Some(cursor) = self.cursor {
            return Ok(Some(cursor));
        }
        let Some(selection) = &self.selection else {
            return Ok(None);
        };
        match selection {
            Selection::Blocks { ids } => {
                let mut ids = ids.clone();
                self.store.sort_document_order(&mut ids)?;
                let Some(last) = ids.last().copied() else {
                    return Ok(None);
                };
                Ok(Some(CursorPosition::in_block(&self.store, last, None)?))
            }
            _ => {
                let Some((start, _)) = selection.ordered_points(&self.store)? else {
                    return Ok(None);
                };
                Ok(Some(CursorPosition::in_block(
                    &self.store,
                    start.block,
                    Some(start.offset),
                )?))
            }
        }
    }
}
