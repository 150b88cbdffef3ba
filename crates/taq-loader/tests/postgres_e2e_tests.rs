//! End-to-end import into a real PostgreSQL
//!
//! These tests require Docker to be running. Run with:
//!
//! ```bash
//! cargo test -p taq-loader --test postgres_e2e_tests -- --ignored --nocapture
//! ```

mod common;

use anyhow::{Context, Result};
use common::{init_test_tracing, write_taq_file};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use taq_loader::{schema, ChunkedLoader, LoaderConfig, RunStatus};
use tempfile::TempDir;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;

/// PostgreSQL container with the taq_trades schema applied
struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
    connection_string: String,
}

impl TestPostgres {
    async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        schema::apply_migrations(&connection_string)
            .await
            .context("Failed to run migrations")?;

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            pool,
            connection_string,
        })
    }

    async fn row_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM taq_trades")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_native_copy_loads_all_rows() {
    init_test_tracing();
    let pg = TestPostgres::start()
        .await
        .expect("Failed to start PostgreSQL");
    let dir = TempDir::new().unwrap();
    let source = write_taq_file(dir.path(), "EQY_US_ALL_TRADE_20240102", 98);

    let before = pg.row_count().await.unwrap();

    let config = LoaderConfig::builder(&source)
        .chunks(8)
        .database_url(&pg.connection_string)
        .show_progress(false)
        .build();
    let mut loader = ChunkedLoader::from_config(config).unwrap();
    let report = loader.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.rows_loaded, 98);
    assert_eq!(pg.row_count().await.unwrap() - before, 98);

    let distinct: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT sequence_number) FROM taq_trades")
        .fetch_one(&pg.pool)
        .await
        .unwrap();
    assert_eq!(distinct, 98);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_table_fails_every_chunk() {
    init_test_tracing();
    let pg = TestPostgres::start()
        .await
        .expect("Failed to start PostgreSQL");
    let dir = TempDir::new().unwrap();
    let source = write_taq_file(dir.path(), "trades", 10);

    let config = LoaderConfig::builder(&source)
        .chunks(2)
        .table("no_such_table")
        .database_url(&pg.connection_string)
        .show_progress(false)
        .build();
    let mut loader = ChunkedLoader::from_config(config).unwrap();
    let report = loader.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report
        .failed()
        .all(|c| c.error.as_deref().unwrap_or_default().contains("no_such_table")));
    assert_eq!(pg.row_count().await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_migrations_are_idempotent() {
    init_test_tracing();
    let pg = TestPostgres::start()
        .await
        .expect("Failed to start PostgreSQL");

    schema::apply_migrations(&pg.connection_string)
        .await
        .expect("Second migration run failed");

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_name = 'taq_trades')",
    )
    .fetch_one(&pg.pool)
    .await
    .unwrap();
    assert!(exists);
}
