//! Helpers for testing the pipelines without live stores or network access.
//!
//! - [`api`] provides a [`crate::api::PositionApi`] replaying scripted outcomes.
//! - [`database`] creates a throwaway Postgres database per test, for the tests that do
//!   run against a live server.
//! - [`http`] serves canned HTTP replies on a loopback port.
//! - [`reading`] builds positions and readings with compact arguments.
//! - [`test_destination_wrapper`] records calls made to any
//!   [`crate::destination::Destination`] and injects per-reading write failures.

pub mod api;
pub mod database;
pub mod http;
pub mod reading;
pub mod test_destination_wrapper;
