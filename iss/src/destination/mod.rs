//! Relational stores readings are replicated into.

mod base;
pub mod memory;
pub mod postgres;

pub use base::Destination;
