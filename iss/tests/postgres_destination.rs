#![cfg(feature = "test-utils")]

use std::collections::HashSet;

use chrono::{NaiveDateTime, Utc};
use iss::destination::Destination;
use iss::error::{ErrorCategory, ErrorKind};
use iss::pipeline::ReplicationPipeline;
use iss::source::memory::MemorySource;
use iss::test_utils::database::spawn_test_database;
use iss::test_utils::reading::reading;
use iss::types::SourceId;
use iss_telemetry::tracing::init_test_tracing;

const TABLE: &str = "iss_data";

fn abc_source() -> MemorySource {
    MemorySource::with_readings(vec![
        reading("a", 10.0),
        reading("b", 20.0),
        reading("c", 30.0),
    ])
}

#[tokio::test(flavor = "multi_thread")]
async fn table_creation_is_idempotent() {
    init_test_tracing();

    let database = spawn_test_database(TABLE).await;
    let destination = database.destination();

    destination.prepare().await.unwrap();
    destination.prepare().await.unwrap();

    assert!(destination.existing_source_ids().await.unwrap().is_empty());

    let columns = sqlx::query_scalar::<_, String>(
        "select column_name::text from information_schema.columns where table_name = $1 order by ordinal_position",
    )
    .bind(TABLE)
    .fetch_all(destination.pool())
    .await
    .unwrap();
    assert_eq!(
        columns,
        vec![
            "id",
            "latitude",
            "longitude",
            "timestamp",
            "created_at",
            "source_id"
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn second_run_against_unchanged_source_inserts_nothing() {
    init_test_tracing();

    let database = spawn_test_database(TABLE).await;
    let pipeline = ReplicationPipeline::new(abc_source(), database.destination().clone());

    let first = pipeline.run().await.unwrap();
    assert_eq!(first.inserted, 3);
    assert_eq!(first.skipped, 0);

    let second = pipeline.run().await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 3);
    assert!(second.failed.is_empty());

    let existing = database.destination().existing_source_ids().await.unwrap();
    let expected: HashSet<SourceId> = ["a", "b", "c"].into_iter().map(SourceId::new).collect();
    assert_eq!(existing, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn rows_hold_the_reading_and_the_run_time() {
    init_test_tracing();

    let database = spawn_test_database(TABLE).await;
    let destination = database.destination();
    destination.prepare().await.unwrap();

    let reading = reading("a", -12.5);
    let created_at = Utc::now();
    destination.write_reading(&reading, created_at).await.unwrap();

    let (latitude, longitude, timestamp, stored_created_at, source_id) =
        sqlx::query_as::<_, (f64, f64, NaiveDateTime, NaiveDateTime, String)>(
            "select latitude, longitude, timestamp, created_at, source_id from iss_data",
        )
        .fetch_one(destination.pool())
        .await
        .unwrap();

    assert_eq!(latitude, -12.5);
    assert_eq!(longitude, reading.position.longitude);
    assert_eq!(timestamp, reading.position.timestamp.naive_utc());
    // Postgres keeps microseconds.
    assert_eq!(
        stored_created_at.and_utc().timestamp_micros(),
        created_at.timestamp_micros()
    );
    assert_eq!(source_id, "a");
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_writes_are_unique_violations() {
    init_test_tracing();

    let database = spawn_test_database(TABLE).await;
    let destination = database.destination();
    destination.prepare().await.unwrap();

    let reading = reading("a", 10.0);
    destination.write_reading(&reading, Utc::now()).await.unwrap();

    let err = destination
        .write_reading(&reading, Utc::now())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UniqueViolation);
    assert_eq!(err.category(), ErrorCategory::Record);
    assert_eq!(destination.existing_source_ids().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn writes_on_a_closed_pool_are_connection_failures() {
    init_test_tracing();

    let database = spawn_test_database(TABLE).await;
    let destination = database.destination();
    destination.prepare().await.unwrap();
    destination.shutdown().await.unwrap();

    let err = destination
        .write_reading(&reading("a", 10.0), Utc::now())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);
    assert_eq!(err.category(), ErrorCategory::Connection);
}

#[tokio::test(flavor = "multi_thread")]
async fn indexes_are_created_listed_and_dropped() {
    init_test_tracing();

    let database = spawn_test_database(TABLE).await;
    let destination = database.destination();
    destination.prepare().await.unwrap();

    destination
        .create_index("longitude", "idx_longitude")
        .await
        .unwrap();
    // Creating it again is a no-op.
    destination
        .create_index("longitude", "idx_longitude")
        .await
        .unwrap();
    assert_eq!(
        destination.list_indexes().await.unwrap(),
        vec!["idx_longitude", "iss_data_pkey", "iss_data_source_id_key"]
    );

    destination.drop_index("idx_longitude").await.unwrap();
    destination.drop_index("idx_longitude").await.unwrap();
    assert_eq!(
        destination.list_indexes().await.unwrap(),
        vec!["iss_data_pkey", "iss_data_source_id_key"]
    );
}
