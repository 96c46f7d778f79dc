mod core;
mod error;
mod ops;
mod parser;
mod schema;
mod selection;
mod store;
mod value;

pub use crate::core::*;
pub use crate::error::*;
pub use crate::ops::*;
pub use crate::parser::*;
pub use crate::schema::*;
pub use crate::selection::*;
pub use crate::store::*;
pub use crate::value::*;
