//! Query timing comparison between the document store and the relational store.
//!
//! Both stores are queried for the same data: a full scan, a latitude filter, a count with
//! an average, and a longitude filter before and after indexing it. Each query is timed on
//! the client, results fetched included, and then explained.

mod mongo;
mod postgres;
pub mod report;

use iss::destination::Destination;
use iss::destination::postgres::PostgresDestination;
use iss::error::IssResult;
use iss::source::Source;
use iss::source::mongo::MongoSource;
use iss_config::shared::IssConfig;
use mongodb::bson::doc;
use tracing::{debug, info, warn};

use crate::benchmark::report::{
    Comparison, DocumentStats, IndexImpact, Measurement, RelationalStats,
};
use crate::core::{finish, shutdown_stores};

/// Field indexed in the document store by the indexed longitude test.
const LONGITUDE_FIELD: &str = "iss_position.longitude";
/// Name the document store gives to the ascending index on [`LONGITUDE_FIELD`].
const LONGITUDE_FIELD_INDEX: &str = "iss_position.longitude_1";
/// Column and index indexed in the relational store by the indexed longitude test.
const LONGITUDE_COLUMN: &str = "longitude";
const LONGITUDE_COLUMN_INDEX: &str = "idx_longitude";

const LONGITUDE_THRESHOLD: f64 = 30.0;

/// Everything measured by one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkResults {
    pub document_stats: DocumentStats,
    pub relational_stats: RelationalStats,
    /// Timed queries shown in the summary table, in execution order.
    pub comparisons: Vec<Comparison>,
    pub index_impact: IndexImpact,
}

/// Connects to both stores, runs every test and releases the stores.
pub async fn run_benchmark(config: &IssConfig) -> IssResult<BenchmarkResults> {
    info!("starting benchmark");

    let source = MongoSource::connect(&config.mongo).await?;
    let destination = match PostgresDestination::connect(&config.postgres).await {
        Ok(destination) => destination,
        Err(err) => return finish(Err(err), source.shutdown().await),
    };

    let result = run_tests(&source, &destination).await;
    let shutdown = shutdown_stores(&source, &destination).await;

    finish(result, shutdown)
}

async fn run_tests(
    source: &MongoSource,
    destination: &PostgresDestination,
) -> IssResult<BenchmarkResults> {
    // Both stores may be queried before anything was polled or migrated.
    source.ensure_collection().await?;
    destination.prepare().await?;

    let document_stats = mongo::collection_stats(source).await?;
    let relational_stats = postgres::table_stats(destination).await?;

    let table = destination.quoted_table();
    let mut comparisons = Vec::with_capacity(5);

    comparisons.push(compare(
        "simple select",
        mongo::timed_find(source, doc! {}).await?,
        postgres::timed_query(
            destination,
            &format!("select latitude, longitude, timestamp from {table}"),
        )
        .await?,
    ));

    comparisons.push(compare(
        "filtered select",
        mongo::timed_find(source, doc! { "iss_position.latitude": { "$gt": 0.0 } }).await?,
        postgres::timed_query(
            destination,
            &format!("select latitude, longitude, timestamp from {table} where latitude > 0"),
        )
        .await?,
    ));

    comparisons.push(compare(
        "aggregation",
        mongo::timed_aggregate(source).await?,
        postgres::timed_query(
            destination,
            &format!("select count(*) as count, avg(latitude) as avg_latitude from {table}"),
        )
        .await?,
    ));

    let longitude_filter = doc! { LONGITUDE_FIELD: { "$gt": LONGITUDE_THRESHOLD } };
    let longitude_query = format!(
        "select latitude, longitude, timestamp from {table} where longitude > {LONGITUDE_THRESHOLD}"
    );

    // The baseline is only meaningful without the indexes an earlier run left behind.
    drop_longitude_indexes(source, destination).await;
    comparisons.push(compare(
        "longitude filter",
        mongo::timed_find(source, longitude_filter.clone()).await?,
        postgres::timed_query(destination, &longitude_query).await?,
    ));

    create_longitude_indexes(source, destination).await;
    comparisons.push(compare(
        "longitude filter indexed",
        mongo::timed_find(source, longitude_filter.clone()).await?,
        postgres::timed_query(destination, &longitude_query).await?,
    ));

    let index_impact = IndexImpact {
        document_indexes: source.list_indexes().await?,
        relational_indexes: destination.list_indexes().await?,
        document: mongo::timed_count(source, longitude_filter).await?,
        relational: postgres::timed_count(
            destination,
            &format!("select count(*) from {table} where longitude > {LONGITUDE_THRESHOLD}"),
        )
        .await?,
    };

    info!("benchmark finished");

    Ok(BenchmarkResults {
        document_stats,
        relational_stats,
        comparisons,
        index_impact,
    })
}

fn compare(name: &'static str, document: Measurement, relational: Measurement) -> Comparison {
    log_measurement(name, "mongodb", &document);
    log_measurement(name, "postgres", &relational);

    Comparison {
        name,
        document,
        relational,
    }
}

fn log_measurement(test: &str, store: &str, measurement: &Measurement) {
    info!(
        test,
        store,
        elapsed_ms = measurement.millis(),
        rows = measurement.rows,
        "measured query"
    );
    if let Some(explain) = &measurement.explain {
        debug!(test, store, explain = %explain, "query plan");
    }
}

/// Index creation failures are logged and the test runs unindexed.
async fn create_longitude_indexes(source: &MongoSource, destination: &PostgresDestination) {
    if let Err(err) = source.create_index(LONGITUDE_FIELD).await {
        warn!(error = %err, index = LONGITUDE_FIELD_INDEX, "failed to create document store index");
    }
    if let Err(err) = destination
        .create_index(LONGITUDE_COLUMN, LONGITUDE_COLUMN_INDEX)
        .await
    {
        warn!(error = %err, index = LONGITUDE_COLUMN_INDEX, "failed to create relational store index");
    }
}

async fn drop_longitude_indexes(source: &MongoSource, destination: &PostgresDestination) {
    match source.list_indexes().await {
        Ok(indexes) if indexes.iter().any(|index| index == LONGITUDE_FIELD_INDEX) => {
            if let Err(err) = source.drop_index(LONGITUDE_FIELD_INDEX).await {
                warn!(error = %err, index = LONGITUDE_FIELD_INDEX, "failed to drop document store index");
            }
        }
        Ok(_) => {}
        Err(err) => warn!(error = %err, "failed to list document store indexes"),
    }

    if let Err(err) = destination.drop_index(LONGITUDE_COLUMN_INDEX).await {
        warn!(error = %err, index = LONGITUDE_COLUMN_INDEX, "failed to drop relational store index");
    }
}
