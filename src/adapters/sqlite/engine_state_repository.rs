//! SQLite implementation of the EngineStateRepository.

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::SqlitePool;

use super::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::pioneer::{EngineSnapshot, ExpertId, ExpertRecord, Period};
use crate::domain::ports::EngineStateRepository;

#[derive(Clone)]
pub struct SqliteEngineStateRepository {
    pool: SqlitePool,
}

impl SqliteEngineStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn latest_run(&self) -> DomainResult<Option<RunRow>> {
        let row: Option<RunRow> = sqlx::query_as(
            "SELECT run_id, saved_at, config, dimension, last_closed FROM engine_runs ORDER BY saved_at DESC LIMIT 1"
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

fn period_to_sql(period: Option<Period>) -> DomainResult<Option<i64>> {
    period
        .map(i64::try_from)
        .transpose()
        .map_err(|e| DomainError::SerializationError(format!("period out of range: {e}")))
}

fn period_from_sql(value: Option<i64>) -> DomainResult<Option<Period>> {
    value
        .map(Period::try_from)
        .transpose()
        .map_err(|e| DomainError::SerializationError(format!("negative period: {e}")))
}

#[async_trait]
impl EngineStateRepository for SqliteEngineStateRepository {
    async fn save(&self, snapshot: &EngineSnapshot) -> DomainResult<()> {
        let run_id = snapshot.run_id.to_string();
        // Fixed precision keeps lexical order equal to time order.
        let saved_at = snapshot.saved_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let config_json = serde_json::to_string(&snapshot.config)?;
        let dimension = snapshot
            .dimension
            .map(i64::try_from)
            .transpose()
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        // A snapshot older than the stored one for the same run is ignored.
        let updated = sqlx::query(
            r#"INSERT INTO engine_runs (run_id, saved_at, config, dimension, last_closed)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(run_id) DO UPDATE SET
                   saved_at = excluded.saved_at,
                   config = excluded.config,
                   dimension = excluded.dimension,
                   last_closed = excluded.last_closed
               WHERE engine_runs.last_closed IS NULL
                  OR excluded.last_closed >= engine_runs.last_closed"#
        )
        .bind(&run_id)
        .bind(&saved_at)
        .bind(&config_json)
        .bind(dimension)
        .bind(period_to_sql(snapshot.last_closed)?)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            tracing::debug!(
                run_id = %run_id,
                last_closed = ?snapshot.last_closed,
                "Skipped stale engine snapshot"
            );
            return Ok(());
        }

        for record in &snapshot.experts {
            let state_json = serde_json::to_string(&record.state)?;
            let window_json = serde_json::to_string(&record.window)?;

            sqlx::query(
                r#"INSERT INTO expert_records (run_id, expert_id, state, window_entries, last_submitted, last_weight, saved_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(run_id, expert_id) DO UPDATE SET
                       state = excluded.state,
                       window_entries = excluded.window_entries,
                       last_submitted = excluded.last_submitted,
                       last_weight = excluded.last_weight,
                       saved_at = excluded.saved_at"#
            )
            .bind(&run_id)
            .bind(record.expert_id.as_str())
            .bind(&state_json)
            .bind(&window_json)
            .bind(period_to_sql(record.last_submitted)?)
            .bind(record.last_weight)
            .bind(&saved_at)
            .execute(&mut *tx)
            .await?;
        }

        // Experts removed since the previous save.
        let kept: Vec<&str> = snapshot.experts.iter().map(|r| r.expert_id.as_str()).collect();
        sqlx::query(
            "DELETE FROM expert_records WHERE run_id = ? AND expert_id NOT IN (SELECT value FROM json_each(?))"
        )
        .bind(&run_id)
        .bind(serde_json::to_string(&kept)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_latest(&self) -> DomainResult<Option<EngineSnapshot>> {
        let Some(run) = self.latest_run().await? else {
            return Ok(None);
        };

        let rows: Vec<ExpertRow> = sqlx::query_as(
            "SELECT expert_id, state, window_entries, last_submitted, last_weight FROM expert_records WHERE run_id = ? ORDER BY expert_id"
        )
        .bind(&run.run_id)
        .fetch_all(&self.pool)
        .await?;

        let experts = rows
            .into_iter()
            .map(ExpertRecord::try_from)
            .collect::<DomainResult<Vec<_>>>()?;

        let mut snapshot = EngineSnapshot::try_from(run)?;
        snapshot.experts = experts;
        Ok(Some(snapshot))
    }

    async fn load_expert(&self, expert_id: &ExpertId) -> DomainResult<Option<ExpertRecord>> {
        let Some(run) = self.latest_run().await? else {
            return Ok(None);
        };

        let row: Option<ExpertRow> = sqlx::query_as(
            "SELECT expert_id, state, window_entries, last_submitted, last_weight FROM expert_records WHERE run_id = ? AND expert_id = ?"
        )
        .bind(&run.run_id)
        .bind(expert_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ExpertRecord::try_from).transpose()
    }

    async fn clear(&self) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM expert_records").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM engine_runs").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    run_id: String,
    saved_at: String,
    config: String,
    dimension: Option<i64>,
    last_closed: Option<i64>,
}

impl TryFrom<RunRow> for EngineSnapshot {
    type Error = DomainError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let dimension = row
            .dimension
            .map(usize::try_from)
            .transpose()
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        Ok(Self {
            run_id: parse_uuid(&row.run_id)?,
            saved_at: parse_datetime(&row.saved_at)?,
            config: serde_json::from_str(&row.config)?,
            dimension,
            last_closed: period_from_sql(row.last_closed)?,
            experts: Vec::new(),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ExpertRow {
    expert_id: String,
    state: String,
    window_entries: String,
    last_submitted: Option<i64>,
    last_weight: Option<f64>,
}

impl TryFrom<ExpertRow> for ExpertRecord {
    type Error = DomainError;

    fn try_from(row: ExpertRow) -> Result<Self, Self::Error> {
        Ok(Self {
            expert_id: ExpertId::new(row.expert_id),
            window: serde_json::from_str(&row.window_entries)?,
            state: serde_json::from_str(&row.state)?,
            last_submitted: period_from_sql(row.last_submitted)?,
            last_weight: row.last_weight,
        })
    }
}
