use manos_block_core::Encoding;
use manos_block_dnd::{DEFAULT_INDENT_WIDTH, DragConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Encodings written on copy and cut.
    pub write_encodings: Vec<Encoding>,
    /// Encodings accepted on paste, most preferred first.
    pub read_preference: Vec<Encoding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub drag: DragConfig,
    pub clipboard: ClipboardConfig,
}

impl EditorConfig {
    /// Replaces unset or unusable values with the defaults.
    pub fn with_defaults(mut self) -> Self {
        if self.drag.indent_width.is_nan() || self.drag.indent_width <= 0.0 {
            self.drag.indent_width = DEFAULT_INDENT_WIDTH;
        }
        if self.clipboard.write_encodings.is_empty() {
            self.clipboard.write_encodings = Encoding::RICHEST_FIRST.to_vec();
        }
        if self.clipboard.read_preference.is_empty() {
            self.clipboard.read_preference = Encoding::RICHEST_FIRST.to_vec();
        }
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::with_defaults)
    }
}
