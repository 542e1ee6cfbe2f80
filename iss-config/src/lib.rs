//! Configuration for the ISS position tracker.
//!
//! Holds the runtime [`Environment`], the layered [`load_config`] loader and the shared
//! configuration structs in [`shared`].

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use secret::*;
