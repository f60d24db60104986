//! Incremental artifact parsing.
//!
//! Model output arrives as arbitrary text fragments. [`ArtifactParser`] turns
//! them into ordered [`bolty_core::Action`]s as soon as each
//! `<boltAction ...>...</boltAction>` block is complete.

mod attributes;
pub mod parser;

pub use parser::{ArtifactParser, Unfinished};
