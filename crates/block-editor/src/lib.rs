mod channel;
mod clipboard;
mod config;
mod error;
mod session;

pub use crate::channel::*;
pub use crate::clipboard::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::session::*;
