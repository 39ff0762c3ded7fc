//! Data models for the Note Taker application.
//!
//! Field names serialize in camelCase to match the public JSON contract.

mod note;
mod pagination;
mod tag;
mod todo;

pub use note::*;
pub use pagination::*;
pub use tag::*;
pub use todo::*;
