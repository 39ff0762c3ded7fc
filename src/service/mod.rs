//! Note repository service: aggregate writer and tag resolver.

mod notes;
mod tags;

pub use notes::*;
pub use tags::*;
