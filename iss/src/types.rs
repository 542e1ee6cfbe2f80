//! Data model shared by the API client, both stores and the pipelines.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::bail;
use crate::error::{ErrorKind, IssError, IssResult};

/// Stable identifier assigned to a reading by the document store.
///
/// For MongoDB this is the hex form of the document's `_id`. It is the deduplication key
/// of the replication pipeline and is stored in the sink's `source_id` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A position sample as returned by the API, not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Capture time reported by the API.
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Builds a position from coordinates in degrees and a Unix timestamp in seconds.
    ///
    /// Rejects non-finite or out of range coordinates and timestamps chrono cannot
    /// represent.
    pub fn from_unix(latitude: f64, longitude: f64, seconds: i64) -> IssResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            bail!(
                ErrorKind::InvalidData,
                "Latitude is out of range",
                format!("latitude {latitude} is not within [-90, 90]")
            );
        }

        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            bail!(
                ErrorKind::InvalidData,
                "Longitude is out of range",
                format!("longitude {longitude} is not within [-180, 180]")
            );
        }

        let Some(timestamp) = DateTime::from_timestamp(seconds, 0) else {
            bail!(
                ErrorKind::InvalidData,
                "Timestamp is out of range",
                format!("{seconds} seconds since the epoch")
            );
        };

        Ok(Self {
            latitude,
            longitude,
            timestamp,
        })
    }

    /// Returns the capture time as Unix seconds.
    pub fn unix_timestamp(&self) -> i64 {
        self.timestamp.timestamp()
    }
}

/// A persisted [`Position`] together with its [`SourceId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: SourceId,
    pub position: Position,
}

impl Reading {
    pub fn new(id: SourceId, position: Position) -> Self {
        Self { id, position }
    }
}

/// A reading the sink refused to store, with the reason.
#[derive(Debug, Clone)]
pub struct FailedRecord {
    pub id: SourceId,
    pub error: IssError,
}

/// Outcome of one replication run.
#[derive(Debug, Clone, Default)]
pub struct ReplicationReport {
    /// Readings written to the sink during this run.
    pub inserted: u64,
    /// Readings already present at the sink, including duplicates within the batch.
    pub skipped: u64,
    /// Readings whose write failed.
    pub failed: Vec<FailedRecord>,
}

impl ReplicationReport {
    /// Returns the number of readings considered by the run.
    pub fn total(&self) -> u64 {
        self.inserted + self.skipped + self.failed.len() as u64
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Success and error tallies of a poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub succeeded: u32,
    pub failed: u32,
}

impl PollReport {
    pub fn total(&self) -> u32 {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_seconds_become_utc_timestamps() {
        let position = Position::from_unix(-51.2, 12.75, 1_700_000_000).unwrap();

        assert_eq!(position.timestamp.to_rfc3339(), "2023-11-14T22:13:20+00:00");
        assert_eq!(position.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let err = Position::from_unix(91.0, 0.0, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);

        assert!(Position::from_unix(0.0, f64::NAN, 0).is_err());
        assert!(Position::from_unix(0.0, -180.0, 0).is_ok());
    }
}
