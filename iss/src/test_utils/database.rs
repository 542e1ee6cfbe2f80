use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, Executor, PgConnection};
use uuid::Uuid;

use crate::destination::postgres::PostgresDestination;

/// Database the server always has, used to create and drop test databases.
const ADMIN_DATABASE: &str = "postgres";

/// Builds connection options for the local test server.
///
/// Configuration is read from environment variables:
/// - `TESTS_DATABASE_HOST`: Postgres server hostname (required)
/// - `TESTS_DATABASE_PORT`: Postgres server port (required)
/// - `TESTS_DATABASE_USERNAME`: Database user (required)
/// - `TESTS_DATABASE_PASSWORD`: Database password (optional)
fn local_pg_connect_options() -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(&std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"))
        .port(
            std::env::var("TESTS_DATABASE_PORT")
                .expect("TESTS_DATABASE_PORT must be set")
                .parse()
                .expect("TESTS_DATABASE_PORT must be a valid port number"),
        )
        .username(
            &std::env::var("TESTS_DATABASE_USERNAME").expect("TESTS_DATABASE_USERNAME must be set"),
        )
        .database(ADMIN_DATABASE);

    match std::env::var("TESTS_DATABASE_PASSWORD") {
        Ok(password) => options.password(&password),
        Err(_) => options,
    }
}

/// A freshly created database with a [`PostgresDestination`] connected to it.
///
/// Every instance gets a random name so tests never share rows. The database is dropped
/// when the value is dropped, which requires a multi-threaded runtime.
#[derive(Debug)]
pub struct TestDatabase {
    name: String,
    admin_options: PgConnectOptions,
    destination: PostgresDestination,
}

impl TestDatabase {
    pub fn destination(&self) -> &PostgresDestination {
        &self.destination
    }
}

/// Creates a uniquely named database and a destination writing to `table` in it.
///
/// # Panics
///
/// Panics if the server is unreachable or the database cannot be created.
pub async fn spawn_test_database(table: &str) -> TestDatabase {
    let admin_options = local_pg_connect_options();
    let name = Uuid::new_v4().to_string();

    let mut connection = PgConnection::connect_with(&admin_options)
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"create database "{name}";"#))
        .await
        .expect("Failed to create database");

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(admin_options.clone().database(&name))
        .await
        .expect("Failed to connect to the test database");

    TestDatabase {
        name,
        admin_options,
        destination: PostgresDestination::from_pool(pool, table.to_owned()),
    }
}

/// Terminates every connection to the database called `name` and drops it.
///
/// Cleanup failures are reported on stderr and never panic.
async fn drop_test_database(admin_options: &PgConnectOptions, name: &str) {
    let mut connection = match PgConnection::connect_with(admin_options).await {
        Ok(connection) => connection,
        Err(err) => {
            eprintln!("warning: failed to connect to Postgres for cleanup: {err}");
            return;
        }
    };

    if let Err(err) = connection
        .execute(&*format!(
            r#"
            select pg_terminate_backend(pg_stat_activity.pid)
            from pg_stat_activity
            where pg_stat_activity.datname = '{name}'
            and pid <> pg_backend_pid();"#
        ))
        .await
    {
        eprintln!("warning: failed to terminate connections for database {name}: {err}");
    }

    if let Err(err) = connection
        .execute(&*format!(r#"drop database if exists "{name}";"#))
        .await
    {
        eprintln!("warning: failed to drop database {name}: {err}");
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        tokio::task::block_in_place(move || {
            tokio::runtime::Handle::current().block_on(async move {
                self.destination.pool().close().await;
                drop_test_database(&self.admin_options, &self.name).await;
            });
        });
    }
}
