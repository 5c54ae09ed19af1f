//! Per-expert, per-period test scores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
    attribution_ratio, distance_reduction, orientation_score, ExpertId, GroupSnapshot,
    RollingWindow, TrendVerdict,
};
use crate::domain::models::config::EngineConfig;

/// Outputs of the three detection tests for one expert and one period.
///
/// Each component is `None` when the test has no verdict: not enough history,
/// no peers with a prior-period estimate, or no net movement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TestScore {
    pub distance_reduction: Option<TrendVerdict>,
    pub orientation: Option<f64>,
    pub attribution: Option<f64>,
}

impl TestScore {
    /// Distance narrowing verdict (false when no verdict exists).
    pub fn is_narrowing(&self) -> bool {
        self.distance_reduction.is_some_and(|v| v.narrowing)
    }
}

/// Run all three tests for `expert`.
///
/// `window` must already contain the current period. `previous` is the snapshot
/// of the last closed period, if any; without it the peer-based tests have no
/// verdict. The tests only read raw estimates, never other experts' scores, so
/// experts can be evaluated in any order.
pub fn evaluate_expert(
    expert: &ExpertId,
    window: &RollingWindow,
    current: &GroupSnapshot,
    previous: Option<&GroupSnapshot>,
    peer_weights: &BTreeMap<ExpertId, f64>,
    config: &EngineConfig,
) -> TestScore {
    let distance_reduction = distance_reduction(window, config);
    let (orientation, attribution) = match previous {
        Some(previous) => (
            orientation_score(expert, current, previous, peer_weights, config),
            attribution_ratio(expert, current, previous, config),
        ),
        None => (None, None),
    };
    TestScore {
        distance_reduction,
        orientation,
        attribution,
    }
}
