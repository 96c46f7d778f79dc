use thiserror::Error;

use crate::core::BlockId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("block not found: {0}")]
    NotFound(BlockId),

    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(#[from] HierarchyViolation),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyViolation {
    #[error("{block} cannot become a descendant of itself")]
    Cycle { block: BlockId },

    #[error("`{child}` is not a legal child of `{parent}`")]
    IllegalChild { parent: String, child: String },

    #[error("index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("the root block cannot be moved or removed")]
    RootImmutable,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_invalid_hierarchy(&self) -> bool {
        matches!(self, StoreError::InvalidHierarchy(_))
    }
}
