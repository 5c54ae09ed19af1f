//! Per-period group snapshots.
//!
//! A `GroupSnapshot` is the read-only fan-in every test uses to look at peers:
//! tests never hold references to other experts, only to the snapshot of the
//! current period and the snapshot of the previous closed period.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Estimate, ExpertId, Period};
use crate::domain::models::config::{Benchmark, GroupMeanKind};

/// All estimates reported for one closed period, plus their group mean.
///
/// Built once when the period closes and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub period: Period,
    pub estimates: BTreeMap<ExpertId, Estimate>,
    pub mean: Estimate,
}

impl GroupSnapshot {
    /// Build the snapshot for `period`.
    ///
    /// With `GroupMeanKind::Weighted` the mean uses `prior_weights` (the weights
    /// published for the previous period), renormalized over the experts that
    /// reported now. It falls back to the simple mean when none of them carries
    /// a positive prior weight. Returns `None` when no expert reported.
    pub fn build(
        period: Period,
        estimates: BTreeMap<ExpertId, Estimate>,
        kind: GroupMeanKind,
        prior_weights: &BTreeMap<ExpertId, f64>,
    ) -> Option<Self> {
        let simple = Estimate::mean(estimates.values())?;
        let mean = match kind {
            GroupMeanKind::Simple => simple,
            GroupMeanKind::Weighted => {
                let total: f64 = estimates
                    .keys()
                    .filter_map(|id| prior_weights.get(id))
                    .sum();
                if total > 0.0 {
                    Estimate::weighted_sum(estimates.iter().map(|(id, e)| {
                        (prior_weights.get(id).copied().unwrap_or(0.0) / total, e)
                    }))
                    .unwrap_or(simple)
                } else {
                    simple
                }
            }
        };
        Some(Self {
            period,
            estimates,
            mean,
        })
    }

    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    pub fn get(&self, id: &ExpertId) -> Option<&Estimate> {
        self.estimates.get(id)
    }

    pub fn contains(&self, id: &ExpertId) -> bool {
        self.estimates.contains_key(id)
    }

    /// Simple mean of every reporting expert except `id`.
    pub fn leave_one_out_mean(&self, id: &ExpertId) -> Option<Estimate> {
        Estimate::mean(
            self.estimates
                .iter()
                .filter(|(other, _)| *other != id)
                .map(|(_, e)| e),
        )
    }

    /// The point `id`'s distance is measured against.
    ///
    /// A lone expert under `LeaveOneOut` has no peers and is measured against
    /// the group mean (itself), giving a zero distance.
    pub fn benchmark_for(&self, id: &ExpertId, benchmark: Benchmark) -> Estimate {
        match benchmark {
            Benchmark::GroupMean => self.mean.clone(),
            Benchmark::LeaveOneOut => self
                .leave_one_out_mean(id)
                .unwrap_or_else(|| self.mean.clone()),
        }
    }

    /// Distance of `id`'s estimate to its benchmark, if `id` reported.
    pub fn distance_of(&self, id: &ExpertId, benchmark: Benchmark) -> Option<f64> {
        self.get(id)
            .map(|e| e.distance(&self.benchmark_for(id, benchmark)))
    }
}
