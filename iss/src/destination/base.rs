use std::collections::HashSet;
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::IssResult;
use crate::types::{Reading, SourceId};

/// Store that receives replicated readings.
///
/// Implementations must reject a second row for the same [`SourceId`] with
/// [`crate::error::ErrorKind::UniqueViolation`], which is what makes re-running a
/// partially failed replication safe. Unreachable stores must be reported with a kind in
/// the [`crate::error::ErrorCategory::Connection`] category so that the run is aborted
/// instead of failing every remaining record one by one.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Releases the connections held by the destination.
    ///
    /// The default implementation is a no-op.
    fn shutdown(&self) -> impl Future<Output = IssResult<()>> + Send {
        async { Ok(()) }
    }

    /// Creates the target table when it does not exist yet.
    fn prepare(&self) -> impl Future<Output = IssResult<()>> + Send;

    /// Lists the identifiers of every reading already stored, in a single call.
    fn existing_source_ids(&self) -> impl Future<Output = IssResult<HashSet<SourceId>>> + Send;

    /// Writes one reading, stamped with the run's `created_at`.
    ///
    /// Each write commits on its own.
    fn write_reading(
        &self,
        reading: &Reading,
        created_at: DateTime<Utc>,
    ) -> impl Future<Output = IssResult<()>> + Send;
}
