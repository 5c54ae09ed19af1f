//! Published per-period results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Estimate, ExpertId, LifecycleState, LifecycleTransition, Period, TestScore, WeightVector};

/// What the engine published for one expert in one closed period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertPeriodRecord {
    pub state: LifecycleState,
    pub scores: TestScore,
    pub weight: f64,
    /// Distance to the period's benchmark.
    pub distance: f64,
}

/// Everything published when a period closes. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodOutcome {
    pub period: Period,
    /// Pooled estimate; `None` when nobody reported for the period.
    pub pooled: Option<Estimate>,
    pub group_mean: Option<Estimate>,
    pub weights: WeightVector,
    pub experts: BTreeMap<ExpertId, ExpertPeriodRecord>,
    pub transitions: Vec<LifecycleTransition>,
}

impl PeriodOutcome {
    /// Outcome of a period closed without any submission.
    pub fn empty(period: Period) -> Self {
        Self {
            period,
            pooled: None,
            group_mean: None,
            weights: WeightVector::default(),
            experts: BTreeMap::new(),
            transitions: Vec::new(),
        }
    }

    pub fn reporters(&self) -> usize {
        self.experts.len()
    }

    /// Experts in the `Pioneer` state after this period.
    pub fn pioneers(&self) -> Vec<&ExpertId> {
        self.experts
            .iter()
            .filter(|(_, r)| r.state.is_pioneer())
            .map(|(id, _)| id)
            .collect()
    }
}

/// Audit view of one expert at one closed period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertStateView {
    pub expert_id: ExpertId,
    pub period: Period,
    pub lifecycle_state: LifecycleState,
    pub weight: f64,
    pub test_scores: TestScore,
}
