use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// The document root. Exactly one per store.
    Root,
    /// Structural wrapper that only holds content blocks (e.g. a frame).
    Container,
    /// A block the user edits and drags around.
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    Kinds(Vec<String>),
    Roles(Vec<NodeRole>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSpec {
    pub kind: String,
    pub role: NodeRole,
    pub children: ChildConstraint,
    /// Element name used by the html encoding.
    pub html_tag: String,
}

impl KindSpec {
    pub fn new(
        kind: impl Into<String>,
        role: NodeRole,
        children: ChildConstraint,
        html_tag: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            role,
            children,
            html_tag: html_tag.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("duplicate block kind: {0}")]
    DuplicateKind(String),
    #[error("schema has no spec for required kind: {0}")]
    MissingKind(String),
}

/// Registry of block kinds and their nesting rules.
#[derive(Debug, Clone)]
pub struct Schema {
    specs: HashMap<String, KindSpec>,
    root_kind: String,
    fallback_kind: String,
}

impl Schema {
    pub fn new(
        specs: impl IntoIterator<Item = KindSpec>,
        root_kind: impl Into<String>,
        fallback_kind: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        let mut schema = Self {
            specs: HashMap::new(),
            root_kind: root_kind.into(),
            fallback_kind: fallback_kind.into(),
        };
        for spec in specs {
            schema.register(spec)?;
        }
        for required in [&schema.root_kind, &schema.fallback_kind] {
            if !schema.specs.contains_key(required) {
                return Err(SchemaError::MissingKind(required.clone()));
            }
        }
        Ok(schema)
    }

    /// page > frame > content blocks, matching the default page layout.
    pub fn standard() -> Self {
        let content = || ChildConstraint::Roles(vec![NodeRole::Content]);
        let specs = vec![
            KindSpec::new(
                "page",
                NodeRole::Root,
                ChildConstraint::Kinds(vec!["frame".to_string()]),
                "div",
            ),
            KindSpec::new("frame", NodeRole::Container, content(), "section"),
            KindSpec::new("paragraph", NodeRole::Content, content(), "p"),
            KindSpec::new("list", NodeRole::Content, content(), "li"),
            KindSpec::new("code", NodeRole::Content, ChildConstraint::None, "pre"),
            KindSpec::new("divider", NodeRole::Content, ChildConstraint::None, "hr"),
        ];
        Self {
            specs: specs
                .into_iter()
                .map(|spec| (spec.kind.clone(), spec))
                .collect(),
            root_kind: "page".to_string(),
            fallback_kind: "paragraph".to_string(),
        }
    }

    pub fn register(&mut self, spec: KindSpec) -> Result<(), SchemaError> {
        if self.specs.contains_key(&spec.kind) {
            return Err(SchemaError::DuplicateKind(spec.kind));
        }
        self.specs.insert(spec.kind.clone(), spec);
        Ok(())
    }

    pub fn spec(&self, kind: &str) -> Option<&KindSpec> {
        self.specs.get(kind)
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.specs.contains_key(kind)
    }

    pub fn root_kind(&self) -> &str {
        &self.root_kind
    }

    pub fn fallback_kind(&self) -> &str {
        &self.fallback_kind
    }

    pub fn role(&self, kind: &str) -> Option<NodeRole> {
        self.specs.get(kind).map(|spec| spec.role)
    }

    pub fn allows_child(&self, parent_kind: &str, child_kind: &str) -> bool {
        let (Some(parent), Some(child)) = (self.specs.get(parent_kind), self.specs.get(child_kind))
        else {
            return false;
        };
        if child.role == NodeRole::Root {
            return false;
        }
        match &parent.children {
            ChildConstraint::None => false,
            ChildConstraint::Kinds(kinds) => kinds.iter().any(|k| *k == child.kind),
            ChildConstraint::Roles(roles) => roles.contains(&child.role),
        }
    }

    pub fn html_tag(&self, kind: &str) -> &str {
        self.specs
            .get(kind)
            .map(|spec| spec.html_tag.as_str())
            .unwrap_or("div")
    }

    /// Maps a foreign html element name to a block kind, if any kind claims it.
    pub fn kind_for_html_tag(&self, tag: &str) -> Option<&str> {
        let mut kinds: Vec<&KindSpec> = self
            .specs
            .values()
            .filter(|spec| spec.role == NodeRole::Content && spec.html_tag == tag)
            .collect();
        kinds.sort_by(|a, b| a.kind.cmp(&b.kind));
        kinds.first().map(|spec| spec.kind.as_str())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::standard()
    }
}
