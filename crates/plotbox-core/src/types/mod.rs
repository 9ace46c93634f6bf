//! Core types for plotbox.

mod identifiers;
mod execution;

pub use identifiers::*;
pub use execution::*;
