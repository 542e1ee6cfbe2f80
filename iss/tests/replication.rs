#![cfg(feature = "test-utils")]

use chrono::Utc;
use iss::destination::memory::MemoryDestination;
use iss::error::{ErrorCategory, ErrorKind};
use iss::pipeline::ReplicationPipeline;
use iss::source::memory::MemorySource;
use iss::test_utils::reading::reading;
use iss::test_utils::test_destination_wrapper::TestDestinationWrapper;
use iss::types::SourceId;
use iss_telemetry::tracing::init_test_tracing;

fn ids(values: &[&str]) -> Vec<SourceId> {
    values.iter().map(|value| SourceId::new(*value)).collect()
}

fn abc_source() -> MemorySource {
    MemorySource::with_readings(vec![
        reading("a", 10.0),
        reading("b", 20.0),
        reading("c", 30.0),
    ])
}

#[tokio::test]
async fn second_run_against_unchanged_source_inserts_nothing() {
    init_test_tracing();

    let destination = MemoryDestination::new();
    let pipeline = ReplicationPipeline::new(abc_source(), destination.clone());

    let first = pipeline.run().await.unwrap();
    assert_eq!(first.inserted, 3);
    assert_eq!(first.skipped, 0);

    let second = pipeline.run().await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.total(), 3);

    assert_eq!(destination.source_ids().await, ids(&["a", "b", "c"]));
}

#[tokio::test]
async fn only_missing_readings_are_written() {
    init_test_tracing();

    let destination = TestDestinationWrapper::wrap(MemoryDestination::with_readings(
        vec![reading("b", 20.0)],
        Utc::now(),
    ));
    let pipeline = ReplicationPipeline::new(abc_source(), destination.clone());

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 1);
    assert!(report.failed.is_empty());
    assert_eq!(destination.write_calls().await, ids(&["a", "c"]));
    assert_eq!(destination.existing_source_ids_calls().await, 1);
}

#[tokio::test]
async fn record_failure_is_reported_and_the_run_continues() {
    init_test_tracing();

    let memory = MemoryDestination::new();
    let destination = TestDestinationWrapper::wrap(memory.clone());
    destination
        .fail_writes_for("c", ErrorKind::DestinationWriteFailed)
        .await;
    let pipeline = ReplicationPipeline::new(abc_source(), destination.clone());

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, SourceId::new("c"));
    assert_eq!(report.failed[0].error.category(), ErrorCategory::Record);
    assert_eq!(report.total(), 3);
    assert_eq!(destination.write_calls().await, ids(&["a", "b", "c"]));
    assert_eq!(destination.written().await, ids(&["a", "b"]));
    assert_eq!(memory.source_ids().await, ids(&["a", "b"]));
}

#[tokio::test]
async fn failure_in_the_middle_of_a_batch_keeps_later_readings() {
    init_test_tracing();

    let memory = MemoryDestination::new();
    let destination = TestDestinationWrapper::wrap(memory.clone());
    destination
        .fail_writes_for("b", ErrorKind::ConversionError)
        .await;
    let pipeline = ReplicationPipeline::new(abc_source(), destination);

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(memory.source_ids().await, ids(&["a", "c"]));
}

#[tokio::test]
async fn uniqueness_rejection_counts_as_skipped() {
    init_test_tracing();

    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    destination
        .fail_writes_for("b", ErrorKind::UniqueViolation)
        .await;
    let pipeline = ReplicationPipeline::new(abc_source(), destination.clone());

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 1);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn connection_failure_aborts_the_run() {
    init_test_tracing();

    let memory = MemoryDestination::new();
    let destination = TestDestinationWrapper::wrap(memory.clone());
    destination
        .fail_writes_for("b", ErrorKind::DestinationConnectionFailed)
        .await;
    let pipeline = ReplicationPipeline::new(abc_source(), destination.clone());

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);
    assert_eq!(destination.write_calls().await, ids(&["a", "b"]));
    assert_eq!(memory.source_ids().await, ids(&["a"]));

    // Rows committed before the failure are skipped by the next run.
    let retry = ReplicationPipeline::new(abc_source(), memory.clone());
    let report = retry.run().await.unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(memory.source_ids().await, ids(&["a", "b", "c"]));
}

#[tokio::test]
async fn readings_inserted_between_runs_are_picked_up() {
    init_test_tracing();

    let source = abc_source();
    let destination = MemoryDestination::new();
    let pipeline = ReplicationPipeline::new(source.clone(), destination.clone());

    pipeline.run().await.unwrap();
    source.push_reading(reading("d", 40.0)).await;
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 3);
    assert_eq!(destination.source_ids().await, ids(&["a", "b", "c", "d"]));
}
