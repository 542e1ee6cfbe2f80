use std::time::Instant;

use iss::destination::postgres::PostgresDestination;
use iss::error::IssResult;
use tracing::warn;

use crate::benchmark::report::{Measurement, RelationalStats};

/// Reads the row count and the pretty-printed total size of the table.
pub async fn table_stats(destination: &PostgresDestination) -> IssResult<RelationalStats> {
    let count_query = format!("select count(*) from {}", destination.quoted_table());
    let row_count = sqlx::query_scalar::<_, i64>(&count_query)
        .fetch_one(destination.pool())
        .await?;

    let total_size = sqlx::query_scalar::<_, String>(
        "select pg_size_pretty(pg_total_relation_size($1::regclass))",
    )
    .bind(destination.quoted_table())
    .fetch_one(destination.pool())
    .await?;

    Ok(RelationalStats {
        table: destination.table().to_owned(),
        row_count,
        total_size,
    })
}

/// Times fetching every row returned by `query`, then explains it.
pub async fn timed_query(destination: &PostgresDestination, query: &str) -> IssResult<Measurement> {
    let started = Instant::now();
    let rows = sqlx::query(query).fetch_all(destination.pool()).await?;
    let elapsed = started.elapsed();

    Ok(Measurement {
        elapsed,
        rows: rows.len() as u64,
        explain: explain_analyze(destination, query).await,
    })
}

/// Times a `select count(*)` query.
pub async fn timed_count(destination: &PostgresDestination, query: &str) -> IssResult<Measurement> {
    let started = Instant::now();
    let count = sqlx::query_scalar::<_, i64>(query)
        .fetch_one(destination.pool())
        .await?;
    let elapsed = started.elapsed();

    Ok(Measurement {
        elapsed,
        rows: u64::try_from(count).unwrap_or_default(),
        explain: None,
    })
}

/// Runs `explain analyze` on `query` and joins the plan lines.
///
/// Explaining is best effort, a failure only loses the plan.
async fn explain_analyze(destination: &PostgresDestination, query: &str) -> Option<String> {
    let explain_query = format!("explain analyze {query}");

    match sqlx::query_scalar::<_, String>(&explain_query)
        .fetch_all(destination.pool())
        .await
    {
        Ok(lines) => Some(lines.join("\n")),
        Err(err) => {
            warn!(error = %err, "failed to explain relational store query");
            None
        }
    }
}
