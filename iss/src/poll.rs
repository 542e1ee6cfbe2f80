//! Fetch-and-store loop feeding the document stores.

use iss_config::shared::{PollConfig, RetryConfig};
use tracing::{error, info};

use crate::api::PositionApi;
use crate::error::IssResult;
use crate::retry::retry_with_backoff;
use crate::source::Source;
use crate::types::{PollReport, SourceId};

/// Runs `config.iterations` rounds of fetching one position and storing it in every store.
///
/// Each fetch goes through [`retry_with_backoff`]. A round fails when the fetch runs out of
/// attempts or any store rejects the position. Failed rounds are logged and counted and
/// never stop the loop. The loop pauses `config.interval()` between rounds, never after
/// the last one.
pub async fn fetch_and_store<A, S>(
    api: &A,
    stores: &[S],
    retry: &RetryConfig,
    config: &PollConfig,
) -> PollReport
where
    A: PositionApi,
    S: Source,
{
    let mut report = PollReport::default();

    for iteration in 1..=config.iterations {
        match fetch_and_store_once(api, stores, retry).await {
            Ok(ids) => {
                report.succeeded += 1;
                info!(
                    iteration,
                    iterations = config.iterations,
                    stored = ids.len(),
                    "stored position"
                );
            }
            Err(err) => {
                report.failed += 1;
                error!(
                    iteration,
                    iterations = config.iterations,
                    error_kind = ?err.kind(),
                    detail = err.detail().unwrap_or_default(),
                    "iteration failed"
                );
            }
        }

        if iteration < config.iterations {
            tokio::time::sleep(config.interval()).await;
        }
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        iterations = config.iterations,
        "poll loop finished"
    );

    report
}

async fn fetch_and_store_once<A, S>(
    api: &A,
    stores: &[S],
    retry: &RetryConfig,
) -> IssResult<Vec<SourceId>>
where
    A: PositionApi,
    S: Source,
{
    let position = retry_with_backoff(retry, "fetch_position", || api.fetch_position()).await?;

    let mut ids = Vec::with_capacity(stores.len());
    for store in stores {
        ids.push(store.insert_position(&position).await?);
    }

    Ok(ids)
}
