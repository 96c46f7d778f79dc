mod engine;
mod geometry;
mod outline;
mod resolve;

pub use crate::engine::*;
pub use crate::geometry::*;
pub use crate::outline::*;
pub use crate::resolve::*;
