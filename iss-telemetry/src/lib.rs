//! Tracing setup shared by the tracker binaries and tests.

pub mod tracing;
