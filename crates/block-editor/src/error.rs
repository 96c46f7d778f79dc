use manos_block_core::StoreError;
use thiserror::Error;

/// Failures of the system clipboard. Never shown to the user; handlers turn
/// them into no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("clipboard is unavailable")]
    Unavailable,

    #[error("clipboard rejected the data: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is not attached to this target")]
    NotAttached,

    #[error("session is already attached")]
    AlreadyAttached,

    #[error("a drag is in progress")]
    DragInFlight,

    #[error(transparent)]
    Store(#[from] StoreError),
}
