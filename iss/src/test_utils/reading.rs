use crate::types::{Position, Reading, SourceId};

/// Capture time used by the helpers, 2023-11-14T22:13:20Z.
pub const TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a position at `latitude` on the prime meridian.
pub fn position(latitude: f64) -> Position {
    Position::from_unix(latitude, 0.0, TEST_TIMESTAMP).expect("test position must be valid")
}

/// Returns a reading identified by `id`, at `latitude` on the prime meridian.
pub fn reading(id: &str, latitude: f64) -> Reading {
    Reading::new(SourceId::new(id), position(latitude))
}
