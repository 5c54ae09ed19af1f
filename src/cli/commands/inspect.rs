//! `pioneer inspect`: show persisted expert state.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig, SqliteEngineStateRepository};
use crate::cli::output::{format_float, list_table, output, render_list, CommandOutput};
use crate::domain::models::config::Config;
use crate::domain::models::pioneer::{EngineSnapshot, ExpertId, ExpertRecord, LifecycleState, Period, WindowEntry};
use crate::domain::ports::EngineStateRepository;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// SQLite database written by `pioneer run` (defaults to `database.path`)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Show a single expert with its rolling window
    #[arg(short, long)]
    pub expert: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExpertSummary {
    pub expert_id: String,
    pub state: LifecycleState,
    pub last_period: Option<Period>,
    pub last_weight: Option<f64>,
    pub last_distance: Option<f64>,
    pub history: usize,
}

impl From<&ExpertRecord> for ExpertSummary {
    fn from(record: &ExpertRecord) -> Self {
        let latest = record.window.latest();
        Self {
            expert_id: record.expert_id.to_string(),
            state: record.state,
            last_period: latest.map(|e| e.period),
            last_weight: record.last_weight,
            last_distance: latest.map(|e| e.distance),
            history: record.window.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InspectOutput {
    pub run_id: String,
    pub saved_at: String,
    pub last_closed: Option<Period>,
    pub experts: Vec<ExpertSummary>,
}

impl From<&EngineSnapshot> for InspectOutput {
    fn from(snapshot: &EngineSnapshot) -> Self {
        Self {
            run_id: snapshot.run_id.to_string(),
            saved_at: snapshot.saved_at.to_rfc3339(),
            last_closed: snapshot.last_closed,
            experts: snapshot.experts.iter().map(ExpertSummary::from).collect(),
        }
    }
}

impl CommandOutput for InspectOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["expert", "state", "last period", "weight", "distance", "history"]);
        for e in &self.experts {
            table.add_row(vec![
                e.expert_id.clone(),
                e.state.to_string(),
                e.last_period.map_or_else(|| "-".to_string(), |p| p.to_string()),
                format_float(e.last_weight),
                format_float(e.last_distance),
                e.history.to_string(),
            ]);
        }
        let last_closed = self.last_closed.map_or_else(|| "none".to_string(), |p| p.to_string());
        format!(
            "Run {} (saved {}, last closed period: {})\n{}",
            self.run_id,
            self.saved_at,
            last_closed,
            render_list("expert", &table, self.experts.len())
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ExpertDetailOutput {
    pub expert: ExpertSummary,
    pub window: Vec<WindowEntry>,
}

impl CommandOutput for ExpertDetailOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Expert: {}", self.expert.expert_id),
            format!("State: {}", self.expert.state),
            format!("Last weight: {}", format_float(self.expert.last_weight)),
        ];

        let mut table = list_table(&["period", "estimate", "distance"]);
        for entry in &self.window {
            table.add_row(vec![
                entry.period.to_string(),
                entry.estimate.to_string(),
                format_float(Some(entry.distance)),
            ]);
        }
        lines.push(render_list("window entry", &table, self.window.len()));
        lines.join("\n")
    }
}

pub async fn execute(args: InspectArgs, config: &Config, json_mode: bool) -> Result<()> {
    let path = args.database.unwrap_or_else(|| config.database.path.clone());
    let pool = initialize_database(&database_url(&path), Some(PoolConfig::from(&config.database)))
        .await
        .with_context(|| format!("Failed to open database {path}"))?;
    let repo = SqliteEngineStateRepository::new(pool);

    if let Some(expert) = args.expert {
        let record = repo
            .load_expert(&ExpertId::new(&expert))
            .await?
            .with_context(|| format!("Expert not found: {expert}"))?;
        let detail = ExpertDetailOutput {
            expert: ExpertSummary::from(&record),
            window: record.window.history().cloned().collect(),
        };
        output(&detail, json_mode);
        return Ok(());
    }

    let snapshot = repo
        .load_latest()
        .await?
        .context("No persisted run found. Run 'pioneer run --database' first.")?;
    output(&InspectOutput::from(&snapshot), json_mode);
    Ok(())
}
