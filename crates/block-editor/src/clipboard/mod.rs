mod copy_cut;
mod paste;

pub use copy_cut::*;
pub use paste::*;

/// Largest char boundary of `text` that is not after `offset`.
pub(crate) fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
