use iss::api::PositionApi;
use iss::api::client::IssApiClient;
use iss::destination::Destination;
use iss::destination::postgres::PostgresDestination;
use iss::error::{IssError, IssResult};
use iss::pipeline::ReplicationPipeline;
use iss::poll::fetch_and_store;
use iss::source::Source;
use iss::source::mongo::MongoSource;
use iss::types::{PollReport, ReplicationReport};
use iss_config::shared::{ApiConfig, IssConfig, MongoConfig, PgConnectionConfig, PollConfig};
use tracing::{debug, info, warn};

/// Polls the position API and stores every sample in the document store.
pub async fn run_poll(config: &IssConfig) -> IssResult<PollReport> {
    info!("starting poll");
    log_config(config);

    let api = IssApiClient::new(&config.api)?;
    let source = MongoSource::connect(&config.mongo).await?;

    poll_positions(&api, source, config).await
}

/// Replicates every stored sample into the relational store.
pub async fn run_migrate(config: &IssConfig) -> IssResult<ReplicationReport> {
    info!("starting migration");
    log_config(config);

    let source = MongoSource::connect(&config.mongo).await?;
    let destination = match PostgresDestination::connect(&config.postgres).await {
        Ok(destination) => destination,
        Err(err) => return finish(Err(err), source.shutdown().await),
    };

    replicate(source, destination).await
}

/// Polls, then replicates what was collected.
///
/// Failed poll iterations do not prevent the migration, since the readings stored before
/// them are still worth replicating.
pub async fn run_combined(config: &IssConfig) -> IssResult<(PollReport, ReplicationReport)> {
    let poll_report = run_poll(config).await?;
    if poll_report.failed > 0 {
        warn!(
            failed = poll_report.failed,
            "some poll iterations failed, migrating the stored readings anyway"
        );
    }

    let replication_report = run_migrate(config).await?;

    Ok((poll_report, replication_report))
}

/// Runs the poll loop against `source` and releases it afterwards.
///
/// The collection is created first when missing.
pub async fn poll_positions<A, S>(api: &A, source: S, config: &IssConfig) -> IssResult<PollReport>
where
    A: PositionApi,
    S: Source,
{
    let result = async {
        source.ensure_collection().await?;

        let report = fetch_and_store(
            api,
            std::slice::from_ref(&source),
            &config.api.retry,
            &config.poll,
        )
        .await;

        Ok::<_, IssError>(report)
    }
    .await;

    finish(result, source.shutdown().await)
}

/// Runs one replication pass and releases both stores afterwards, whatever the outcome.
pub async fn replicate<S, D>(source: S, destination: D) -> IssResult<ReplicationReport>
where
    S: Source,
    D: Destination,
{
    let pipeline = ReplicationPipeline::new(source, destination);
    let result = pipeline.run().await;

    let shutdown = shutdown_stores(pipeline.source(), pipeline.destination()).await;

    finish(result, shutdown)
}

/// Shuts down both stores, even when the first one fails to.
pub async fn shutdown_stores<S, D>(source: &S, destination: &D) -> IssResult<()>
where
    S: Source,
    D: Destination,
{
    let mut errors = Vec::new();

    if let Err(err) = source.shutdown().await {
        errors.push(err);
    }
    if let Err(err) = destination.shutdown().await {
        errors.push(err);
    }

    if errors.is_empty() {
        return Ok(());
    }

    Err(IssError::from(errors))
}

/// Combines the result of a run with the result of releasing its stores.
///
/// When both failed, the errors are aggregated with the run's error first.
pub fn finish<T>(result: IssResult<T>, shutdown: IssResult<()>) -> IssResult<T> {
    match (result, shutdown) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), Ok(())) => Err(err),
        (Ok(_), Err(err)) => {
            warn!(error = %err, "failed to release the stores after a successful run");
            Err(err)
        }
        (Err(err), Err(shutdown_err)) => Err(IssError::from(vec![err, shutdown_err])),
    }
}

fn log_config(config: &IssConfig) {
    log_api_config(&config.api);
    log_mongo_config(&config.mongo);
    log_pg_connection_config(&config.postgres);
    log_poll_config(&config.poll);
}

fn log_api_config(config: &ApiConfig) {
    debug!(
        url = config.url,
        timeout_ms = config.timeout_ms,
        max_attempts = config.retry.max_attempts,
        initial_delay_ms = config.retry.initial_delay_ms,
        backoff_multiplier = config.retry.backoff_multiplier,
        "position api config"
    );
}

fn log_mongo_config(config: &MongoConfig) {
    debug!(
        database = config.database,
        collection = config.collection,
        server_selection_timeout_ms = config.server_selection_timeout_ms,
        "document store config"
    );
}

fn log_pg_connection_config(config: &PgConnectionConfig) {
    debug!(
        table = config.table,
        acquire_timeout_ms = config.acquire_timeout_ms,
        "relational store config"
    );
}

fn log_poll_config(config: &PollConfig) {
    debug!(
        iterations = config.iterations,
        interval_ms = config.interval_ms,
        "poll config"
    );
}
