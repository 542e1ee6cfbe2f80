//! Shared configuration types for the tracker services.

mod api;
mod app;
mod base;
mod mongo;
mod poll;
mod postgres;
mod retry;

pub use api::*;
pub use app::*;
pub use base::*;
pub use mongo::*;
pub use poll::*;
pub use postgres::*;
pub use retry::*;
