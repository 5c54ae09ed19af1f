//! Distance reduction test.
//!
//! Detects a statistically meaningful narrowing of an expert's distance to the
//! group benchmark over its rolling window. Two trend statistics are available:
//!
//! - **Slope** -- least-squares slope of distance against period, multiplied by
//!   the window's period span and divided by the largest retained distance.
//!   The result is the fitted relative change across the window, clamped to
//!   [-1, 1]. Narrowing when it is at or below `-narrowing_significance`.
//!
//! - **Mann-Kendall** -- Kendall's S statistic normalised to a tau in [-1, 1],
//!   with an exact one-sided p-value taken from the distribution of inversion
//!   counts over all orderings of the window. Narrowing when S is negative and
//!   the p-value is at or below `narrowing_significance`.
//!
//! A zero score never counts as narrowing: ties are not convergence.

use serde::{Deserialize, Serialize};

use super::{RollingWindow, EPSILON};
use crate::domain::models::config::{EngineConfig, TrendMethod};

/// Outcome of the distance reduction test for one expert and period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendVerdict {
    /// Trend score in [-1, 1]; negative means the distance is shrinking.
    pub score: f64,
    /// Whether the shrinkage clears the configured bound.
    pub narrowing: bool,
    /// One-sided p-value (Mann-Kendall only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
}

/// Run the distance reduction test over an expert's window.
///
/// Returns `None` when fewer than `max(min_history_for_test, 2)` distances are
/// retained, or when the expert already coincides with the benchmark (the two
/// most recent distances are both zero, or every retained distance is).
pub fn distance_reduction(window: &RollingWindow, config: &EngineConfig) -> Option<TrendVerdict> {
    let required = config.min_history_for_test.max(2);
    let window = window.require(required).ok()?;

    let distances = window.distances();
    let n = distances.len();
    if distances[n - 2..].iter().all(|d| d.abs() <= EPSILON) {
        return None;
    }
    let max_distance = distances.iter().copied().fold(0.0_f64, f64::max);
    if max_distance <= EPSILON {
        return None;
    }

    let verdict = match config.trend_method {
        TrendMethod::Slope => {
            let periods: Vec<f64> = window.history().map(|e| e.period as f64).collect();
            let score = relative_slope(&periods, &distances, max_distance);
            TrendVerdict {
                score,
                narrowing: score < 0.0 && score <= -config.narrowing_significance,
                p_value: None,
            }
        }
        TrendMethod::MannKendall => {
            let s = mann_kendall_s(&distances);
            let pairs = (n * (n - 1) / 2) as i64;
            let score = s as f64 / pairs as f64;
            let p_value = mann_kendall_lower_p(n, s);
            TrendVerdict {
                score,
                narrowing: s < 0 && p_value <= config.narrowing_significance,
                p_value: Some(p_value),
            }
        }
    };
    Some(verdict)
}

/// Fitted change across the window relative to its largest distance.
fn relative_slope(periods: &[f64], distances: &[f64], max_distance: f64) -> f64 {
    let n = periods.len() as f64;
    let mean_p = periods.iter().sum::<f64>() / n;
    let mean_d = distances.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (p, d) in periods.iter().zip(distances) {
        sxy += (p - mean_p) * (d - mean_d);
        sxx += (p - mean_p) * (p - mean_p);
    }
    if sxx <= 0.0 {
        return 0.0;
    }

    let span = periods[periods.len() - 1] - periods[0];
    ((sxy / sxx) * span / max_distance).clamp(-1.0, 1.0)
}

/// Kendall's S: concordant minus discordant pairs, ties counted as zero.
fn mann_kendall_s(values: &[f64]) -> i64 {
    let mut s = 0_i64;
    for i in 0..values.len() {
        for j in i + 1..values.len() {
            let diff = values[j] - values[i];
            if diff > EPSILON {
                s += 1;
            } else if diff < -EPSILON {
                s -= 1;
            }
        }
    }
    s
}

/// Exact `P(S <= s)` for a series of `n` values with no trend.
///
/// With `N = n(n-1)/2` pairs, `S = N - 2D` where `D` is the inversion count of
/// the ordering, so the tail is the probability of at least
/// `ceil((N - s) / 2)` inversions.
fn mann_kendall_lower_p(n: usize, s: i64) -> f64 {
    let distribution = inversion_distribution(n);
    let pairs = (n * (n - 1) / 2) as i64;
    let min_inversions = usize::try_from((pairs - s + 1).div_euclid(2)).unwrap_or(0);
    let tail: f64 = distribution.iter().skip(min_inversions).sum();
    tail.clamp(0.0, 1.0)
}

/// Probability that a uniformly random permutation of `n` items has `k`
/// inversions, for every `k`.
///
/// Built one item at a time: inserting the `m`-th item adds between 0 and
/// `m - 1` inversions with equal probability. Dividing by `m` at each step
/// keeps every entry in [0, 1] for any `n`.
fn inversion_distribution(n: usize) -> Vec<f64> {
    let mut probs = vec![1.0];
    let mut prefix = Vec::new();
    for m in 2..=n {
        prefix.clear();
        prefix.push(0.0);
        let mut running = 0.0;
        for p in &probs {
            running += p;
            prefix.push(running);
        }

        let max_k = m * (m - 1) / 2;
        let last = probs.len() - 1;
        let scale = 1.0 / m as f64;
        probs = (0..=max_k)
            .map(|k| {
                let lo = k.saturating_sub(m - 1);
                let hi = k.min(last);
                if lo > hi {
                    0.0
                } else {
                    ((prefix[hi + 1] - prefix[lo]) * scale).max(0.0)
                }
            })
            .collect();
    }
    probs
}
