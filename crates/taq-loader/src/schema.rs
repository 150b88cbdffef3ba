//! Destination schema setup
//!
//! The `taq_trades` DDL lives in the workspace `migrations/` directory and is
//! embedded at compile time.

use crate::error::Result;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply all pending migrations to `database_url`
pub async fn apply_migrations(database_url: &str) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await?;

    info!(migrations = MIGRATOR.iter().count(), "Applying schema migrations");
    MIGRATOR.run(&pool).await?;
    pool.close().await;

    info!("Schema is up to date");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_taq_trades_migration_embedded() {
        let migration = MIGRATOR
            .iter()
            .find(|m| m.description.contains("taq trades"))
            .expect("taq_trades migration should be embedded");
        assert!(migration.sql.contains("CREATE TABLE IF NOT EXISTS taq_trades"));
        assert_eq!(migration.sql.matches(" NOT NULL").count(), 5);
    }
}
