mod classify;
mod command;
mod convert;
mod core;
mod dnd;
mod error;
mod format;
pub mod grid;
pub mod markdown;
mod node;
mod selection;
mod tree;
mod value;

pub use crate::classify::*;
pub use crate::command::*;
pub use crate::convert::*;
pub use crate::core::*;
pub use crate::dnd::*;
pub use crate::error::*;
pub use crate::format::*;
pub use crate::node::*;
pub use crate::selection::*;
pub use crate::tree::*;
pub use crate::value::*;
