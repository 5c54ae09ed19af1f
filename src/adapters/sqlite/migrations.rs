//! Versioned schema for the engine state store.
//!
//! Each migration runs in its own transaction together with the row that
//! records its version, so a failed step leaves the schema at the previous
//! version.

use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to apply schema version {version}: {source}")]
    Apply { version: i64, #[source] source: sqlx::Error },
    #[error("Failed to read schema version: {0}")]
    Version(#[source] sqlx::Error),
}

/// One step of the schema history.
#[derive(Debug, Clone, Copy)]
pub struct SchemaMigration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Every schema step, in version order.
pub const SCHEMA: &[SchemaMigration] = &[SchemaMigration {
    version: 1,
    description: "Engine runs and expert records",
    sql: include_str!("../../../migrations/001_initial_schema.sql"),
}];

/// Highest schema version recorded in the database, 0 for a fresh one.
pub async fn schema_version(pool: &SqlitePool) -> Result<i64, MigrationError> {
    let (version,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(MigrationError::Version)?;
    Ok(version)
}

/// Bring the schema up to date. Returns how many steps were applied.
pub async fn migrate(pool: &SqlitePool) -> Result<usize, MigrationError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now')),
            description TEXT
        )"
    )
    .execute(pool)
    .await
    .map_err(MigrationError::Version)?;

    let current = schema_version(pool).await?;
    let mut applied = 0;
    for step in SCHEMA.iter().filter(|m| m.version > current) {
        tracing::info!(version = step.version, description = step.description, "Applying schema migration");
        apply(pool, step)
            .await
            .map_err(|source| MigrationError::Apply { version: step.version, source })?;
        applied += 1;
    }
    Ok(applied)
}

async fn apply(pool: &SqlitePool, step: &SchemaMigration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::raw_sql(step.sql).execute(&mut *tx).await?;
    sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
        .bind(step.version)
        .bind(step.description)
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}
