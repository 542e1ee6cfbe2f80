use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::destination::Destination;
use crate::error::{ErrorKind, IssResult};
use crate::types::{Reading, SourceId};

/// A row held by [`MemoryDestination`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub reading: Reading,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<StoredRow>,
    prepared: bool,
}

/// In-memory destination for tests and dry runs.
///
/// Enforces the same uniqueness rule on source identifiers as the relational table, so a
/// duplicate write fails with [`ErrorKind::UniqueViolation`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a destination that already holds `readings`, as if replicated earlier.
    pub fn with_readings(readings: Vec<Reading>, created_at: DateTime<Utc>) -> Self {
        let rows = readings
            .into_iter()
            .map(|reading| StoredRow {
                reading,
                created_at,
            })
            .collect();

        let inner = Inner {
            rows,
            prepared: false,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns a copy of all stored rows in insertion order.
    pub async fn rows(&self) -> Vec<StoredRow> {
        self.inner.lock().await.rows.clone()
    }

    /// Returns the identifiers of all stored rows in insertion order.
    pub async fn source_ids(&self) -> Vec<SourceId> {
        let inner = self.inner.lock().await;
        inner.rows.iter().map(|row| row.reading.id.clone()).collect()
    }

    /// Returns whether [`Destination::prepare`] was called.
    pub async fn prepared(&self) -> bool {
        self.inner.lock().await.prepared
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn prepare(&self) -> IssResult<()> {
        self.inner.lock().await.prepared = true;

        Ok(())
    }

    async fn existing_source_ids(&self) -> IssResult<HashSet<SourceId>> {
        let inner = self.inner.lock().await;

        Ok(inner.rows.iter().map(|row| row.reading.id.clone()).collect())
    }

    async fn write_reading(&self, reading: &Reading, created_at: DateTime<Utc>) -> IssResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.rows.iter().any(|row| row.reading.id == reading.id) {
            bail!(
                ErrorKind::UniqueViolation,
                "Reading is already stored",
                reading.id
            );
        }

        info!(source_id = %reading.id, "writing reading to memory");
        inner.rows.push(StoredRow {
            reading: reading.clone(),
            created_at,
        });

        Ok(())
    }
}
