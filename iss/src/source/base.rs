use std::future::Future;

use crate::error::IssResult;
use crate::types::{Position, Reading, SourceId};

/// Store that accumulates position samples and hands them back as [`Reading`]s.
///
/// The poll loop appends to it and the replication pipeline reads the full snapshot on
/// every run. Identifiers assigned by [`Source::insert_position`] must be stable across
/// reads since they are the deduplication key downstream.
pub trait Source {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Releases the connection held by the source.
    ///
    /// The default implementation is a no-op.
    fn shutdown(&self) -> impl Future<Output = IssResult<()>> + Send {
        async { Ok(()) }
    }

    /// Creates the backing collection when it does not exist yet.
    ///
    /// Must leave an existing collection and its content untouched.
    fn ensure_collection(&self) -> impl Future<Output = IssResult<()>> + Send;

    /// Appends a position and returns the identifier assigned to it.
    fn insert_position(
        &self,
        position: &Position,
    ) -> impl Future<Output = IssResult<SourceId>> + Send;

    /// Returns every stored reading in storage order.
    fn read_readings(&self) -> impl Future<Output = IssResult<Vec<Reading>>> + Send;
}
