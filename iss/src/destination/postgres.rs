use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use iss_config::redact_url;
use iss_config::shared::PgConnectionConfig;
use pg_escape::quote_identifier;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::info;

use crate::destination::Destination;
use crate::error::{ErrorKind, IssError, IssResult};
use crate::iss_error;
use crate::types::{Reading, SourceId};

/// The whole run is sequential, so one connection is enough.
const MAX_CONNECTIONS: u32 = 1;

/// Postgres-backed [`Destination`].
///
/// Rows land in a table shaped as
/// `(id SERIAL PRIMARY KEY, latitude FLOAT NOT NULL, longitude FLOAT NOT NULL,
/// timestamp TIMESTAMP, created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP, source_id TEXT UNIQUE)`.
/// Timestamps are stored as UTC wall-clock time.
#[derive(Debug, Clone)]
pub struct PostgresDestination {
    pool: PgPool,
    table: String,
}

impl PostgresDestination {
    /// Opens the connection pool and checks a connection can be acquired.
    pub async fn connect(config: &PgConnectionConfig) -> IssResult<Self> {
        let options = PgConnectOptions::from_str(config.url.expose_secret())?;

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?;

        info!(
            url = %redact_url(&config.url),
            table = %config.table,
            "connected to the relational store"
        );

        Ok(Self::from_pool(pool, config.table.clone()))
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool, table: String) -> Self {
        Self { pool, table }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the table name quoted for interpolation into SQL.
    pub fn quoted_table(&self) -> String {
        quote_identifier(&self.table).into_owned()
    }

    /// Creates an index called `index_name` on `column` unless it exists.
    pub async fn create_index(&self, column: &str, index_name: &str) -> IssResult<()> {
        let query = format!(
            "create index if not exists {} on {} ({})",
            quote_identifier(index_name),
            self.quoted_table(),
            quote_identifier(column)
        );
        sqlx::query(&query).execute(&self.pool).await?;

        info!(index = index_name, column, "created relational store index");

        Ok(())
    }

    /// Drops the index called `index_name` if it exists.
    pub async fn drop_index(&self, index_name: &str) -> IssResult<()> {
        let query = format!("drop index if exists {}", quote_identifier(index_name));
        sqlx::query(&query).execute(&self.pool).await?;

        info!(index = index_name, "dropped relational store index");

        Ok(())
    }

    /// Returns the names of the table's indexes.
    pub async fn list_indexes(&self) -> IssResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "select indexname::text from pg_indexes where tablename = $1 order by indexname",
        )
        .bind(&self.table)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }
}

impl Destination for PostgresDestination {
    fn name() -> &'static str {
        "postgres"
    }

    async fn shutdown(&self) -> IssResult<()> {
        self.pool.close().await;

        info!("relational store connection closed");

        Ok(())
    }

    async fn prepare(&self) -> IssResult<()> {
        let query = format!(
            r#"
            create table if not exists {} (
                id serial primary key,
                latitude float not null,
                longitude float not null,
                timestamp timestamp,
                created_at timestamp default current_timestamp,
                source_id text unique
            )
            "#,
            self.quoted_table()
        );
        sqlx::query(&query).execute(&self.pool).await?;

        info!(table = %self.table, "table created or verified");

        Ok(())
    }

    async fn existing_source_ids(&self) -> IssResult<HashSet<SourceId>> {
        let query = format!(
            "select source_id from {} where source_id is not null",
            self.quoted_table()
        );
        let ids = sqlx::query_scalar::<_, String>(&query)
            .fetch_all(&self.pool)
            .await?;

        info!(existing = ids.len(), "listed replicated readings");

        Ok(ids.into_iter().map(SourceId::new).collect())
    }

    async fn write_reading(&self, reading: &Reading, created_at: DateTime<Utc>) -> IssResult<()> {
        let query = format!(
            "insert into {} (latitude, longitude, timestamp, created_at, source_id) values ($1, $2, $3, $4, $5)",
            self.quoted_table()
        );

        sqlx::query(&query)
            .bind(reading.position.latitude)
            .bind(reading.position.longitude)
            .bind(reading.position.timestamp.naive_utc())
            .bind(created_at.naive_utc())
            .bind(reading.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| write_error(reading, err))?;

        Ok(())
    }
}

/// Classifies a failed insert.
///
/// Uniqueness rejections and connection failures keep the kinds assigned by the generic
/// conversion. Any other statement error is a per-record failure.
fn write_error(reading: &Reading, err: sqlx::Error) -> IssError {
    let error = IssError::from(err);

    if error.kind() != ErrorKind::DestinationQueryFailed {
        return error;
    }

    iss_error!(
        ErrorKind::DestinationWriteFailed,
        "Failed to insert reading",
        format!(
            "source_id {}: {}",
            reading.id,
            error.detail().unwrap_or_default()
        ),
        source: error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::test_utils::reading::reading;

    #[test]
    fn failed_statements_are_record_failures() {
        let err = write_error(&reading("a", 1.0), sqlx::Error::RowNotFound);

        assert_eq!(err.kind(), ErrorKind::DestinationWriteFailed);
        assert_eq!(err.category(), ErrorCategory::Record);
        assert!(err.detail().unwrap().starts_with("source_id a: "));
    }

    #[test]
    fn connection_failures_during_a_write_abort_the_run() {
        let err = write_error(&reading("a", 1.0), sqlx::Error::PoolTimedOut);

        assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);
        assert_eq!(err.category(), ErrorCategory::Connection);
    }

    #[tokio::test]
    async fn table_names_are_quoted() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/iss")
            .unwrap();
        let destination = PostgresDestination::from_pool(pool, "ISS data".to_owned());

        assert_eq!(destination.table(), "ISS data");
        assert_eq!(destination.quoted_table(), r#""ISS data""#);
    }
}
