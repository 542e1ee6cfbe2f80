//! Upstream position API.

mod base;
pub mod client;

pub use base::PositionApi;
