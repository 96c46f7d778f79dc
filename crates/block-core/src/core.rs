use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Props = BTreeMap<String, serde_json::Value>;
pub type BlockKind = String;

pub const TEXT_PROP: &str = "text";

/// Stable identifier of a block inside a [`crate::BlockStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live node of the document tree.
///
/// `children` owns the sibling order; `parent` is a lookup key used for upward
/// traversal only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub children: Vec<BlockId>,
    #[serde(default)]
    pub parent: Option<BlockId>,
}

impl Block {
    pub fn text(&self) -> &str {
        text_of(&self.props)
    }

    pub fn text_len(&self) -> usize {
        self.text().len()
    }
}

/// A detached block tree, not yet part of any store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub props: Props,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BlockSpec>,
}

impl BlockSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            props: Props::default(),
            children: Vec::new(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new("paragraph").text(text)
    }

    pub fn list(text: impl Into<String>) -> Self {
        Self::new("list")
            .text(text)
            .prop("type", "bulleted")
            .prop("checked", false)
    }

    pub fn frame() -> Self {
        Self::new("frame")
    }

    pub fn divider() -> Self {
        Self::new("divider")
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.prop(TEXT_PROP, text.into())
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn child(mut self, child: BlockSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = BlockSpec>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn text_content(&self) -> &str {
        text_of(&self.props)
    }

    /// Number of blocks in this tree, including `self`.
    pub fn block_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(BlockSpec::block_count)
            .sum::<usize>()
    }
}

fn text_of(props: &Props) -> &str {
    props.get(TEXT_PROP).and_then(Value::as_str).unwrap_or("")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropPatch {
    #[serde(default)]
    pub set: Props,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl PropPatch {
    pub fn set(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut patch = Self::default();
        patch.set.insert(key.into(), value.into());
        patch
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::set(TEXT_PROP, text.into())
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// Applies `patch` and returns the patch that restores the previous props.
pub(crate) fn patch_apply(props: &mut Props, patch: &PropPatch) -> PropPatch {
    let mut old_set: Props = Props::new();
    let mut old_remove: Vec<String> = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = props.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = props.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    PropPatch {
        set: old_set,
        remove: old_remove,
    }
}
