#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod arena;
mod error;
mod grower;
mod list;
mod segment;
mod size_class;

pub use arena::Allocator;
pub use error::Error;
