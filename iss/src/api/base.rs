use std::future::Future;

use crate::error::IssResult;
use crate::types::Position;

/// Source of live position samples.
///
/// Implementations perform a single request per call and never retry on their own. Retries
/// are layered on top with [`crate::retry::retry_with_backoff`].
pub trait PositionApi {
    /// Fetches the station's current position.
    fn fetch_position(&self) -> impl Future<Output = IssResult<Position>> + Send;
}
