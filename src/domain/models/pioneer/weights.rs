//! Weight assignment.
//!
//! Maps lifecycle states and test scores to raw weights, normalizes them over
//! the experts that reported in the period and enforces the dominance cap.
//!
//! Raw weight tiers:
//!
//! | State                | Raw weight                                              |
//! |----------------------|---------------------------------------------------------|
//! | Observing / Demoted  | `floor`                                                 |
//! | Candidate            | `floor + candidate_weight × orientation`                |
//! | Pioneer              | `floor + candidate_weight + pioneer_weight × attribution` |
//!
//! A pioneer whose attribution has no verdict this period is credited at the
//! attribution threshold, the lowest ratio that confirmed it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ExpertId, LifecycleState, Period, TestScore};
use crate::domain::models::config::EngineConfig;

/// Normalized weights for one period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeightVector {
    /// Final weights of the reporting experts; sums to 1.
    pub weights: BTreeMap<ExpertId, f64>,
    /// Raw (pre-normalization) weights, kept for audit.
    pub raw: BTreeMap<ExpertId, f64>,
    /// True when every raw weight was zero and uniform weights were used.
    pub degenerate: bool,
}

impl WeightVector {
    pub fn get(&self, id: &ExpertId) -> Option<f64> {
        self.weights.get(id).copied()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Raw weight of one expert for one period.
///
/// Monotone non-decreasing in the orientation score for candidates and in the
/// attribution ratio for pioneers; never negative.
pub fn raw_weight(state: &LifecycleState, score: &TestScore, config: &EngineConfig) -> f64 {
    let floor = config.floor_weight.max(0.0);
    let raw = match state {
        LifecycleState::Observing | LifecycleState::Demoted => floor,
        LifecycleState::Candidate { .. } => {
            let orientation = score.orientation.unwrap_or(0.0).clamp(0.0, 1.0);
            floor + config.candidate_weight * orientation
        }
        LifecycleState::Pioneer { .. } => {
            let attribution = score
                .attribution
                .unwrap_or(config.attribution_threshold)
                .clamp(0.0, 1.0);
            floor + config.candidate_weight + config.pioneer_weight * attribution
        }
    };
    raw.max(0.0)
}

/// Build the normalized, capped weight vector for the reporting experts.
///
/// `entries` holds every expert that reported in `period` with its new state and
/// scores. Experts that did not report are absent, which redistributes their
/// share over the reporters.
pub fn assign_weights<'a, I>(period: Period, entries: I, config: &EngineConfig) -> WeightVector
where
    I: IntoIterator<Item = (&'a ExpertId, &'a LifecycleState, &'a TestScore)>,
{
    let raw: BTreeMap<ExpertId, f64> = entries
        .into_iter()
        .map(|(id, state, score)| (id.clone(), raw_weight(state, score, config)))
        .collect();

    if raw.is_empty() {
        return WeightVector::default();
    }

    let total: f64 = raw.values().sum();
    if total <= 0.0 {
        warn!(
            period,
            experts = raw.len(),
            "degenerate weights: every raw weight is zero, falling back to uniform weights"
        );
        let uniform = 1.0 / raw.len() as f64;
        return WeightVector {
            weights: raw.keys().map(|id| (id.clone(), uniform)).collect(),
            raw,
            degenerate: true,
        };
    }

    let weights = cap_weights(&raw, config.weight_cap);
    WeightVector {
        weights,
        raw,
        degenerate: false,
    }
}

/// Normalize `raw` and cap every share at `cap` when two or more experts carry
/// positive raw weight, redistributing the excess proportionally among the
/// uncapped ones. An infeasible cap (`positive × cap < 1`) splits equally.
fn cap_weights(raw: &BTreeMap<ExpertId, f64>, cap: f64) -> BTreeMap<ExpertId, f64> {
    let positive: Vec<&ExpertId> = raw
        .iter()
        .filter(|(_, w)| **w > 0.0)
        .map(|(id, _)| id)
        .collect();
    let total: f64 = raw.values().sum();
    let mut weights: BTreeMap<ExpertId, f64> =
        raw.iter().map(|(id, w)| (id.clone(), w / total)).collect();

    if positive.len() < 2 || cap >= 1.0 {
        return weights;
    }
    if (positive.len() as f64) * cap < 1.0 {
        let equal = 1.0 / positive.len() as f64;
        for id in positive {
            weights.insert(id.clone(), equal);
        }
        return weights;
    }

    let mut capped: Vec<&ExpertId> = Vec::new();
    loop {
        let free: Vec<&ExpertId> = positive
            .iter()
            .copied()
            .filter(|id| !capped.contains(id))
            .collect();
        if free.is_empty() {
            let equal = 1.0 / positive.len() as f64;
            for id in &positive {
                weights.insert((*id).clone(), equal);
            }
            return weights;
        }

        let remaining = 1.0 - capped.len() as f64 * cap;
        let free_raw: f64 = free.iter().map(|id| raw[*id]).sum();
        let mut newly_capped = false;
        for id in &free {
            let share = remaining * raw[*id] / free_raw;
            if share > cap {
                capped.push(*id);
                newly_capped = true;
            } else {
                weights.insert((*id).clone(), share);
            }
        }
        if !newly_capped {
            break;
        }
    }
    for id in capped {
        weights.insert(id.clone(), cap);
    }
    weights
}
