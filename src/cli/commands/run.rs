//! `pioneer run`: feed an observation file through the engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::adapters::memory::InMemoryEngineStateRepository;
use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig, SqliteEngineStateRepository};
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::config::Config;
use crate::domain::models::pioneer::{Estimate, Observation, Period, PeriodOutcome};
use crate::domain::ports::EngineStateRepository;
use crate::services::PioneerService;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON-lines file, one observation per line
    #[arg(short, long)]
    pub input: PathBuf,

    /// SQLite database to persist into and resume from
    #[arg(short, long)]
    pub database: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PeriodRow {
    pub period: Period,
    pub reporters: usize,
    pub pooled: Option<Estimate>,
    pub pioneers: Vec<String>,
    pub degenerate: bool,
}

impl From<&PeriodOutcome> for PeriodRow {
    fn from(outcome: &PeriodOutcome) -> Self {
        Self {
            period: outcome.period,
            reporters: outcome.reporters(),
            pooled: outcome.pooled.clone(),
            pioneers: outcome.pioneers().iter().map(ToString::to_string).collect(),
            degenerate: outcome.weights.degenerate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RejectedObservation {
    pub expert_id: String,
    pub period: Period,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub run_id: String,
    pub periods: Vec<PeriodRow>,
    pub rejected: Vec<RejectedObservation>,
    /// Observations for periods already closed in a resumed run.
    pub skipped: usize,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["period", "reporters", "pooled", "pioneers"]);
        for row in &self.periods {
            let pooled = row.pooled.as_ref().map_or_else(|| "-".to_string(), ToString::to_string);
            let pooled = if row.degenerate { format!("{pooled} (uniform)") } else { pooled };
            table.add_row(vec![
                row.period.to_string(),
                row.reporters.to_string(),
                pooled,
                row.pioneers.join(", "),
            ]);
        }

        let mut lines = vec![format!("Run {}", self.run_id)];
        lines.push(render_list("period", &table, self.periods.len()));
        if self.skipped > 0 {
            lines.push(format!("Skipped {} observation(s) for already closed periods.", self.skipped));
        }
        if !self.rejected.is_empty() {
            lines.push(format!("\nRejected {} observation(s):", self.rejected.len()));
            for r in &self.rejected {
                lines.push(format!("  - {} @ {}: {}", r.expert_id, r.period, r.error));
            }
        }
        lines.join("\n")
    }
}

/// Parse a JSON-lines observation file. Blank lines are ignored.
pub fn read_observations(path: &Path) -> Result<Vec<Observation>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid observation", path.display(), index + 1))
        })
        .collect()
}

/// Group observations by period, keeping file order within a period.
pub fn group_by_period(observations: Vec<Observation>) -> BTreeMap<Period, Vec<Observation>> {
    let mut batches: BTreeMap<Period, Vec<Observation>> = BTreeMap::new();
    for observation in observations {
        batches.entry(observation.period).or_default().push(observation);
    }
    batches
}

/// Submit and close every batch in ascending period order.
///
/// Malformed observations are reported and skipped; anything else aborts.
pub async fn process<R: EngineStateRepository>(
    service: &PioneerService<R>,
    batches: BTreeMap<Period, Vec<Observation>>,
) -> Result<RunOutput> {
    let mut periods = Vec::new();
    let mut rejected = Vec::new();
    let mut skipped = 0;

    for (period, batch) in batches {
        if service.last_closed().await.is_some_and(|closed| period <= closed) {
            tracing::warn!(period, count = batch.len(), "Skipping observations for closed period");
            skipped += batch.len();
            continue;
        }

        for observation in batch {
            let expert_id = observation.expert_id.to_string();
            match service.submit(observation).await {
                Ok(()) => {}
                Err(err) if err.is_malformed_input() => rejected.push(RejectedObservation {
                    expert_id,
                    period,
                    error: err.to_string(),
                }),
                Err(err) => return Err(err).context(format!("Failed to submit for period {period}")),
            }
        }

        match service.close_period(period).await {
            Ok(outcome) => periods.push(PeriodRow::from(&outcome)),
            Err(DomainError::NoData(_)) => periods.push(PeriodRow::from(&PeriodOutcome::empty(period))),
            Err(err) => return Err(err).context(format!("Failed to close period {period}")),
        }
    }

    Ok(RunOutput {
        run_id: service.snapshot().await.run_id.to_string(),
        periods,
        rejected,
        skipped,
    })
}

async fn run_with<R: EngineStateRepository>(
    repository: Arc<R>,
    config: &Config,
    batches: BTreeMap<Period, Vec<Observation>>,
) -> Result<RunOutput> {
    let service = PioneerService::open(config.engine.clone(), repository)
        .await
        .context("Failed to start engine")?;
    process(&service, batches).await
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let batches = group_by_period(read_observations(&args.input)?);

    let result = match args.database {
        Some(path) => {
            let pool = initialize_database(&database_url(&path), Some(PoolConfig::from(&config.database)))
                .await
                .with_context(|| format!("Failed to open database {path}"))?;
            run_with(Arc::new(SqliteEngineStateRepository::new(pool)), config, batches).await?
        }
        None => run_with(Arc::new(InMemoryEngineStateRepository::new()), config, batches).await?,
    };

    output(&result, json_mode);
    Ok(())
}
