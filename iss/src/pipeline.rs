//! Duplicate-safe replication from a [`Source`] into a [`Destination`].

use chrono::Utc;
use tracing::{error, info, warn};

use crate::destination::Destination;
use crate::error::{ErrorCategory, ErrorKind, IssResult};
use crate::source::Source;
use crate::types::{FailedRecord, ReplicationReport};

/// Copies every source reading the destination does not hold yet.
///
/// Each run reads the full source snapshot and lists the destination's identifiers once,
/// so running it again against an unchanged source inserts nothing. The pipeline keeps no
/// state between runs.
#[derive(Debug)]
pub struct ReplicationPipeline<S, D> {
    source: S,
    destination: D,
}

impl<S, D> ReplicationPipeline<S, D>
where
    S: Source,
    D: Destination,
{
    pub fn new(source: S, destination: D) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Runs one replication pass.
    ///
    /// The steps are:
    /// 1. create the destination table when missing;
    /// 2. read every source reading;
    /// 3. list the identifiers already at the destination;
    /// 4. write each reading whose identifier is unknown, adding it to the known set right
    ///    away so that duplicates within the batch are skipped as well.
    ///
    /// A write rejected as a duplicate counts as skipped. A write failing for any other
    /// record-level reason is recorded in the report and the run goes on. A connection
    /// failure aborts the run and is returned. Rows written before that stay committed;
    /// the destination's uniqueness rule keeps the next run from duplicating them.
    ///
    /// All rows written by one run share the `created_at` taken when the run starts.
    pub async fn run(&self) -> IssResult<ReplicationReport> {
        let created_at = Utc::now();

        info!(
            source = S::name(),
            destination = D::name(),
            "starting replication run"
        );

        self.destination.prepare().await?;

        let readings = self.source.read_readings().await?;
        let mut known_ids = self.destination.existing_source_ids().await?;

        info!(
            readings = readings.len(),
            existing = known_ids.len(),
            "loaded source snapshot and destination identifiers"
        );

        let mut report = ReplicationReport::default();

        for reading in &readings {
            if known_ids.contains(&reading.id) {
                report.skipped += 1;
                continue;
            }

            let Err(err) = self.destination.write_reading(reading, created_at).await else {
                report.inserted += 1;
                known_ids.insert(reading.id.clone());
                continue;
            };

            if err.kind() == ErrorKind::UniqueViolation {
                warn!(
                    source_id = %reading.id,
                    "reading was stored concurrently, skipping it"
                );
                report.skipped += 1;
                known_ids.insert(reading.id.clone());
                continue;
            }

            if err.category() == ErrorCategory::Connection {
                error!(
                    source_id = %reading.id,
                    inserted = report.inserted,
                    error = %err,
                    "destination became unavailable, aborting replication run"
                );
                return Err(err);
            }

            error!(
                source_id = %reading.id,
                error_kind = ?err.kind(),
                detail = err.detail().unwrap_or_default(),
                "failed to write reading"
            );
            report.failed.push(FailedRecord {
                id: reading.id.clone(),
                error: err,
            });
        }

        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            failed = report.failed.len(),
            total = report.total(),
            "replication run finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use iss_telemetry::tracing::init_test_tracing;

    use super::*;
    use crate::destination::memory::MemoryDestination;
    use crate::source::memory::MemorySource;
    use crate::test_utils::reading::reading;
    use crate::test_utils::test_destination_wrapper::TestDestinationWrapper;

    #[tokio::test]
    async fn empty_source_writes_nothing() {
        init_test_tracing();

        let memory = MemoryDestination::new();
        let destination = TestDestinationWrapper::wrap(memory.clone());
        let pipeline = ReplicationPipeline::new(MemorySource::new(), destination.clone());

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.total(), 0);
        assert!(destination.write_calls().await.is_empty());
        assert_eq!(destination.prepare_calls().await, 1);
        // The sink is still created so later queries find the table.
        assert!(memory.prepared().await);
    }

    #[tokio::test]
    async fn all_rows_of_a_run_share_created_at() {
        init_test_tracing();

        let source = MemorySource::with_readings(vec![reading("a", 1.0), reading("b", 2.0)]);
        let destination = MemoryDestination::new();
        let pipeline = ReplicationPipeline::new(source, destination.clone());

        pipeline.run().await.unwrap();

        let rows = destination.rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].created_at, rows[1].created_at);
        assert!(rows[0].created_at > DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn duplicates_within_one_batch_are_written_once() {
        init_test_tracing();

        let source = MemorySource::with_readings(vec![
            reading("a", 1.0),
            reading("a", 1.0),
            reading("b", 2.0),
        ]);
        let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
        let pipeline = ReplicationPipeline::new(source, destination.clone());

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(destination.write_calls().await.len(), 2);
    }
}
