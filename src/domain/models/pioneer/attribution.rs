//! Attribution ratio.
//!
//! Splits the convergence around a candidate between periods `t-1` and `t` into
//! the part caused by peers moving and the part caused by the candidate moving.
//! A high ratio means the others are doing the work: they converge on a
//! stationary-ish candidate, which is the signature of a pioneer.

use super::{ExpertId, GroupSnapshot, EPSILON};
use crate::domain::models::config::{AttributionMethod, EngineConfig};

/// The two contributions behind an attribution ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attribution {
    pub peer_contribution: f64,
    pub candidate_contribution: f64,
}

impl Attribution {
    /// `peer / (peer + candidate)` clamped to [0, 1], or `None` when the total
    /// is not strictly positive.
    pub fn ratio(&self) -> Option<f64> {
        let total = self.peer_contribution + self.candidate_contribution;
        if total <= EPSILON {
            return None;
        }
        Some((self.peer_contribution / total).clamp(0.0, 1.0))
    }
}

/// Attribution ratio for `candidate` using the configured decomposition.
pub fn attribution_ratio(
    candidate: &ExpertId,
    current: &GroupSnapshot,
    previous: &GroupSnapshot,
    config: &EngineConfig,
) -> Option<f64> {
    let attribution = match config.attribution_method {
        AttributionMethod::PeerPaths => peer_path_attribution(candidate, current, previous)?,
        AttributionMethod::Slopes => slope_attribution(candidate, current, previous)?,
    };
    attribution.ratio()
}

/// Decompose the change in summed peer-to-candidate distances.
///
/// Holding the candidate at its period-`t` estimate, the peers' share is
/// `Σ |x_j(t-1) - x_i(t)| - |x_j(t) - x_i(t)|`; the candidate's share is the
/// residual of the total reduction `Σ |x_j(t-1) - x_i(t-1)| - |x_j(t) - x_i(t)|`.
/// Only peers present in both periods take part.
pub fn peer_path_attribution(
    candidate: &ExpertId,
    current: &GroupSnapshot,
    previous: &GroupSnapshot,
) -> Option<Attribution> {
    let now = current.get(candidate)?;
    let before = previous.get(candidate)?;

    let mut peer = 0.0;
    let mut total = 0.0;
    let mut shared = 0_usize;
    for (id, peer_now) in &current.estimates {
        if id == candidate {
            continue;
        }
        let Some(peer_before) = previous.get(id) else {
            continue;
        };
        let settled = peer_now.distance(now);
        peer += peer_before.distance(now) - settled;
        total += peer_before.distance(before) - settled;
        shared += 1;
    }

    if shared == 0 {
        return None;
    }
    Some(Attribution {
        peer_contribution: peer,
        candidate_contribution: total - peer,
    })
}

/// Single-period slopes: movement of the peers' mean against the candidate's.
///
/// Both contributions are magnitudes, so the ratio is
/// `|Δm| / (|Δm| + |Δx|)` with `m` the leave-one-out mean of the reporting peers.
pub fn slope_attribution(
    candidate: &ExpertId,
    current: &GroupSnapshot,
    previous: &GroupSnapshot,
) -> Option<Attribution> {
    let now = current.get(candidate)?;
    let before = previous.get(candidate)?;
    let peers_now = current.leave_one_out_mean(candidate)?;
    let peers_before = previous.leave_one_out_mean(candidate)?;

    Some(Attribution {
        peer_contribution: peers_now.distance(&peers_before),
        candidate_contribution: now.distance(before),
    })
}
