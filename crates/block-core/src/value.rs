use serde::{Deserialize, Serialize};

use crate::core::BlockSpec;

const DEFAULT_SCHEMA: &str = "manos-blocks";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

/// Self-contained, store-independent snapshot of a set of block subtrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortablePayload {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
}

impl PortablePayload {
    pub fn from_blocks(blocks: Vec<BlockSpec>) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            blocks,
        }
    }

    pub fn into_blocks(self) -> Vec<BlockSpec> {
        self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// A detached tree of block specs ready to be inserted into a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
}

impl Fragment {
    pub fn new(blocks: Vec<BlockSpec>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.iter().map(BlockSpec::block_count).sum()
    }
}
