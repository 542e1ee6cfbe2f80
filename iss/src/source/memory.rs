use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::IssResult;
use crate::source::Source;
use crate::types::{Position, Reading, SourceId};

#[derive(Debug, Default)]
struct Inner {
    readings: Vec<Reading>,
    next_id: u64,
    collection_ensured: bool,
}

/// In-memory source for tests and dry runs.
///
/// Assigns 24 hex digit identifiers shaped like document store object ids. Readings pushed
/// with [`MemorySource::push_reading`] keep their identifier, which allows building
/// batches that contain duplicates.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source that already holds `readings`.
    pub fn with_readings(readings: Vec<Reading>) -> Self {
        let inner = Inner {
            readings,
            ..Inner::default()
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Appends a reading with a caller-chosen identifier.
    pub async fn push_reading(&self, reading: Reading) {
        self.inner.lock().await.readings.push(reading);
    }

    /// Returns a copy of all stored readings.
    pub async fn readings(&self) -> Vec<Reading> {
        self.inner.lock().await.readings.clone()
    }

    /// Returns whether [`Source::ensure_collection`] was called.
    pub async fn collection_ensured(&self) -> bool {
        self.inner.lock().await.collection_ensured
    }
}

impl Source for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn ensure_collection(&self) -> IssResult<()> {
        self.inner.lock().await.collection_ensured = true;

        Ok(())
    }

    async fn insert_position(&self, position: &Position) -> IssResult<SourceId> {
        let mut inner = self.inner.lock().await;

        inner.next_id += 1;
        let id = SourceId::new(format!("{:024x}", inner.next_id));
        inner.readings.push(Reading::new(id.clone(), *position));

        info!(source_id = %id, "stored position in memory");

        Ok(id)
    }

    async fn read_readings(&self) -> IssResult<Vec<Reading>> {
        Ok(self.inner.lock().await.readings.clone())
    }
}
