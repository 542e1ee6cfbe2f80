//! Document stores holding the raw position samples.

mod base;
pub mod memory;
pub mod mongo;

pub use base::Source;
