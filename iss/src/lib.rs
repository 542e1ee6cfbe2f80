//! Core of the ISS position tracker.
//!
//! Fetches the station's position from an HTTP API with bounded retries, appends each
//! sample to a document store and replicates the accumulated readings into a relational
//! table without ever writing the same reading twice.

pub mod api;
pub mod destination;
pub mod error;
mod macros;
pub mod pipeline;
pub mod poll;
pub mod retry;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
