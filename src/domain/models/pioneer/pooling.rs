//! Pooled estimate aggregation.

use super::{Estimate, GroupSnapshot, WeightVector};

/// `Σ w_i · x_i` over the experts that reported in the snapshot's period.
///
/// A degenerate (or empty) weight vector falls back to the unweighted mean of
/// the reporting experts. Returns `None` only for an empty snapshot.
pub fn pool(snapshot: &GroupSnapshot, weights: &WeightVector) -> Option<Estimate> {
    if weights.degenerate || weights.is_empty() {
        return Estimate::mean(snapshot.estimates.values());
    }
    Estimate::weighted_sum(
        snapshot
            .estimates
            .iter()
            .map(|(id, estimate)| (weights.get(id).unwrap_or(0.0), estimate)),
    )
}
