mod html;
mod text;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{BlockId, BlockSpec};
use crate::error::StoreError;
use crate::schema::Schema;
use crate::store::BlockStore;
use crate::value::{Fragment, PortablePayload};

pub const MIME_BLOCKS: &str = "application/x-block-structured";
pub const MIME_HTML: &str = "text/html";
pub const MIME_TEXT: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Structured,
    Html,
    PlainText,
}

impl Encoding {
    /// Preference order used when reading a clipboard.
    pub const RICHEST_FIRST: [Encoding; 3] =
        [Encoding::Structured, Encoding::Html, Encoding::PlainText];

    pub fn mime(self) -> &'static str {
        match self {
            Encoding::Structured => MIME_BLOCKS,
            Encoding::Html => MIME_HTML,
            Encoding::PlainText => MIME_TEXT,
        }
    }

    /// Parses a mime type, ignoring parameters such as `; charset=utf-8`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        Self::RICHEST_FIRST
            .into_iter()
            .find(|encoding| encoding.mime().eq_ignore_ascii_case(essence))
    }
}

/// Stateless conversion between live blocks, portable payloads and the
/// clipboard encodings.
#[derive(Debug, Clone, Copy)]
pub struct ContentParser<'a> {
    schema: &'a Schema,
}

impl<'a> ContentParser<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Snapshots `ids` with their descendants.
    ///
    /// Ids nested under another requested id are folded into that ancestor,
    /// and the result follows document order regardless of input order.
    pub fn serialize(
        &self,
        ids: &[BlockId],
        store: &BlockStore,
    ) -> Result<PortablePayload, StoreError> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for id in ids {
            store.block(*id)?;
            if seen.insert(*id) {
                unique.push(*id);
            }
        }

        let mut tops: Vec<BlockId> = unique
            .iter()
            .copied()
            .filter(|id| !unique.iter().any(|other| store.is_ancestor(*other, *id)))
            .collect();
        store.sort_document_order(&mut tops)?;

        let blocks = tops
            .iter()
            .map(|id| store.snapshot(*id))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(requested = ids.len(), top_level = blocks.len(), "serialized blocks");
        Ok(PortablePayload::from_blocks(blocks))
    }

    /// Turns a payload into a fragment this schema accepts.
    ///
    /// Unknown kinds become the fallback kind with their props intact.
    /// Children their parent cannot hold are lifted to the parent's level,
    /// right after it.
    pub fn deserialize(&self, payload: PortablePayload) -> Fragment {
        let blocks = payload
            .blocks
            .into_iter()
            .flat_map(|spec| self.normalize(spec))
            .collect();
        Fragment::new(blocks)
    }

    fn normalize(&self, spec: BlockSpec) -> Vec<BlockSpec> {
        let BlockSpec {
            kind,
            props,
            children,
        } = spec;
        let kind = if self.schema.is_known_kind(&kind) {
            kind
        } else {
            debug!(kind = %kind, fallback = self.schema.fallback_kind(), "unknown block kind");
            self.schema.fallback_kind().to_string()
        };

        let mut kept = Vec::new();
        let mut lifted = Vec::new();
        for child in children {
            for normalized in self.normalize(child) {
                if self.schema.allows_child(&kind, &normalized.kind) {
                    kept.push(normalized);
                } else {
                    lifted.push(normalized);
                }
            }
        }

        let mut out = Vec::with_capacity(1 + lifted.len());
        out.push(BlockSpec {
            kind,
            props,
            children: kept,
        });
        out.extend(lifted);
        out
    }

    pub fn encode(
        &self,
        payload: &PortablePayload,
        encoding: Encoding,
    ) -> Result<String, serde_json::Error> {
        match encoding {
            Encoding::Structured => payload.to_json(),
            Encoding::Html => Ok(html::write_html(self.schema, &payload.blocks)),
            Encoding::PlainText => Ok(text::write_text(&payload.blocks)),
        }
    }

    /// Every encoding of `payload`, richest first.
    pub fn encode_all(
        &self,
        payload: &PortablePayload,
    ) -> Result<Vec<(Encoding, String)>, serde_json::Error> {
        Encoding::RICHEST_FIRST
            .into_iter()
            .map(|encoding| Ok((encoding, self.encode(payload, encoding)?)))
            .collect()
    }

    /// Parses clipboard data. Never fails: unreadable input of a rich
    /// encoding is read again as plain text.
    pub fn decode(&self, mime: &str, data: &str) -> Fragment {
        match Encoding::from_mime(mime) {
            Some(Encoding::Structured) => match PortablePayload::from_json_str(data) {
                Ok(payload) => self.deserialize(payload),
                Err(err) => {
                    warn!(error = %err, "structured clipboard data is invalid, reading as text");
                    self.decode_text(data)
                }
            },
            Some(Encoding::Html) => match html::read_html(self.schema, data) {
                Ok(blocks) => self.deserialize(PortablePayload::from_blocks(blocks)),
                Err(err) => {
                    warn!(error = %err, "malformed html on clipboard, reading as text");
                    self.decode_text(&html::strip_tags(data))
                }
            },
            Some(Encoding::PlainText) => self.decode_text(data),
            None => {
                warn!(mime, "unrecognized clipboard encoding, reading as text");
                self.decode_text(data)
            }
        }
    }

    fn decode_text(&self, data: &str) -> Fragment {
        Fragment::new(text::read_text(self.schema, data))
    }
}
