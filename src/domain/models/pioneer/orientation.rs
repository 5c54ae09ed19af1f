//! Orientation change test.
//!
//! Measures whether peers adjusted their estimates toward a candidate between
//! the previous closed period and the current one. Peer `j` moves toward
//! candidate `i` when its change `Δj = x_j(t) - x_j(t-1)` points along
//! `x_i(t-1) - x_j(t-1)` (positive dot product, i.e. matching sign for
//! scalars) and `|Δj|` exceeds the configured noise floor.

use std::collections::BTreeMap;

use super::{ExpertId, GroupSnapshot};
use crate::domain::models::config::{EngineConfig, OrientationWeighting};

/// Share of peers moving toward `candidate`, in [0, 1].
///
/// With `OrientationWeighting::Weighted` each peer counts with its most
/// recently published weight (`peer_weights`); if those weights sum to zero the
/// unweighted share is used instead. Returns `None` when the candidate has no
/// prior-period estimate or no peer reported in both periods.
pub fn orientation_score(
    candidate: &ExpertId,
    current: &GroupSnapshot,
    previous: &GroupSnapshot,
    peer_weights: &BTreeMap<ExpertId, f64>,
    config: &EngineConfig,
) -> Option<f64> {
    let candidate_prior = previous.get(candidate)?;

    let mut peers = 0_usize;
    let mut toward = 0_usize;
    let mut weight_total = 0.0;
    let mut weight_toward = 0.0;

    for (peer, now) in &current.estimates {
        if peer == candidate {
            continue;
        }
        let Some(before) = previous.get(peer) else {
            continue;
        };

        let change = now.sub(before);
        let direction = candidate_prior.sub(before);
        let moves_toward =
            change.dot(&direction) > 0.0 && change.norm() > config.orientation_noise_floor;

        let weight = peer_weights.get(peer).copied().unwrap_or(0.0);
        peers += 1;
        weight_total += weight;
        if moves_toward {
            toward += 1;
            weight_toward += weight;
        }
    }

    if peers == 0 {
        return None;
    }

    let score = match config.orientation_weighting {
        OrientationWeighting::Weighted if weight_total > 0.0 => weight_toward / weight_total,
        _ => toward as f64 / peers as f64,
    };
    Some(score.clamp(0.0, 1.0))
}
