//! Persistable engine state.
//!
//! One [`ExpertRecord`] per expert holds everything needed to resume at the
//! next period without replaying history: the rolling window, the lifecycle
//! state (with its consecutive-period counters) and the last published weight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ExpertId, LifecycleState, Period, RollingWindow};
use crate::domain::models::config::EngineConfig;

/// Per-expert state owned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertRecord {
    pub expert_id: ExpertId,
    pub window: RollingWindow,
    pub state: LifecycleState,
    /// Last period accepted from this expert (staged or closed).
    pub last_submitted: Option<Period>,
    /// Weight published for the last closed period this expert reported in.
    pub last_weight: Option<f64>,
}

impl ExpertRecord {
    pub fn new(expert_id: ExpertId, window_length: usize) -> Self {
        Self {
            expert_id,
            window: RollingWindow::new(window_length),
            state: LifecycleState::default(),
            last_submitted: None,
            last_weight: None,
        }
    }

    /// Whether this expert reported in `period` (its newest window entry).
    pub fn reported_in(&self, period: Period) -> bool {
        self.window.latest().is_some_and(|e| e.period == period)
    }
}

/// Full engine snapshot, as written to and read from a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub run_id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub config: EngineConfig,
    /// Estimate dimension fixed by the first accepted observation.
    pub dimension: Option<usize>,
    pub last_closed: Option<Period>,
    pub experts: Vec<ExpertRecord>,
}
