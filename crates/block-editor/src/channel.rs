use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ClipboardError;

/// One clipboard write: the same content under several encodings, keyed by
/// mime type in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardData {
    entries: Vec<(String, String)>,
}

impl ClipboardData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, mime: impl Into<String>, data: impl Into<String>) -> Self {
        self.insert(mime, data);
        self
    }

    /// Adds or replaces the entry for `mime`.
    pub fn insert(&mut self, mime: impl Into<String>, data: impl Into<String>) {
        let mime = mime.into();
        let data = data.into();
        match self.entries.iter_mut().find(|(m, _)| *m == mime) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((mime, data)),
        }
    }

    pub fn get(&self, mime: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(m, _)| m == mime)
            .map(|(_, data)| data.as_str())
    }

    pub fn mimes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(mime, _)| mime.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First non-empty entry among `preferred`, in preference order.
    pub fn pick(&self, preferred: &[&str]) -> Option<(&str, &str)> {
        preferred.iter().find_map(|mime| {
            self.entries
                .iter()
                .find(|(m, data)| m == mime && !data.is_empty())
                .map(|(m, data)| (m.as_str(), data.as_str()))
        })
    }
}

/// The host clipboard. A handler acquires it, makes one call and releases it
/// before returning.
pub trait ClipboardChannel {
    fn write(&mut self, data: ClipboardData) -> Result<(), ClipboardError>;

    /// Returns `(mime, data)` for the first readable encoding in `preferred`.
    fn read(&mut self, preferred: &[&str]) -> Result<Option<(String, String)>, ClipboardError>;
}

#[derive(Debug)]
struct MemoryState {
    contents: Option<ClipboardData>,
    available: bool,
    writes: usize,
}

/// In-process clipboard. Clones share the same contents.
#[derive(Debug, Clone)]
pub struct MemoryClipboard {
    state: Rc<RefCell<MemoryState>>,
}

impl Default for MemoryClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MemoryState {
                contents: None,
                available: true,
                writes: 0,
            })),
        }
    }

    pub fn contents(&self) -> Option<ClipboardData> {
        self.state.borrow().contents.clone()
    }

    pub fn set_contents(&self, data: ClipboardData) {
        self.state.borrow_mut().contents = Some(data);
    }

    pub fn clear(&self) {
        self.state.borrow_mut().contents = None;
    }

    /// While unavailable every read and write fails.
    pub fn set_available(&self, available: bool) {
        self.state.borrow_mut().available = available;
    }

    pub fn write_count(&self) -> usize {
        self.state.borrow().writes
    }
}

impl ClipboardChannel for MemoryClipboard {
    fn write(&mut self, data: ClipboardData) -> Result<(), ClipboardError> {
        let mut state = self.state.borrow_mut();
        if !state.available {
            return Err(ClipboardError::Unavailable);
        }
        state.contents = Some(data);
        state.writes += 1;
        Ok(())
    }

    fn read(&mut self, preferred: &[&str]) -> Result<Option<(String, String)>, ClipboardError> {
        let state = self.state.borrow();
        if !state.available {
            return Err(ClipboardError::Unavailable);
        }
        Ok(state.contents.as_ref().and_then(|contents| {
            contents
                .pick(preferred)
                .map(|(mime, data)| (mime.to_string(), data.to_string()))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_skips_empty_and_follows_preference() {
        let data = ClipboardData::new()
            .with("text/plain", "plain")
            .with("text/html", "")
            .with("application/x-block-structured", "{}");
        assert_eq!(
            data.pick(&["text/html", "text/plain"]),
            Some(("text/plain", "plain"))
        );
        assert_eq!(data.pick(&["image/png"]), None);
    }

    #[test]
    fn clones_share_contents() {
        let clipboard = MemoryClipboard::new();
        let mut handle = clipboard.clone();
        handle
            .write(ClipboardData::new().with("text/plain", "x"))
            .unwrap();
        assert_eq!(clipboard.write_count(), 1);
        assert_eq!(
            clipboard.contents().and_then(|c| c.get("text/plain").map(str::to_string)),
            Some("x".to_string())
        );

        clipboard.set_available(false);
        assert_eq!(handle.read(&["text/plain"]), Err(ClipboardError::Unavailable));
    }
}
