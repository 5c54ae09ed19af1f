//! Pioneer lifecycle classification.
//!
//! Each expert carries an explicit lifecycle state that moves only at period
//! boundaries, as a pure function of its previous state and the period's
//! [`TestScore`]. The consecutive-period counters live inside the variants,
//! so the state alone (plus the rolling window) is enough to resume a run.
//!
//! ```text
//!   Observing ──narrowing ∧ oriented──▶ Candidate ──confirmed ∧ attributed──▶ Pioneer
//!       ▲                                   │  │                                  │
//!       └──────────narrowing stops──────────┘  └─attribution fails─┐   fails ─────┘
//!                                                                   ▼      ▼
//!                             Candidate ◀──narrowing ∧ oriented── Demoted
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ExpertId, Period, TestScore};
use crate::domain::models::config::EngineConfig;

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

/// Lifecycle state of an expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifecycleState {
    /// Initial state; no convergence signal yet.
    #[default]
    Observing,

    /// Narrowing with favourable peer orientation, not yet confirmed.
    Candidate {
        /// Consecutive confirming periods, including the one that entered this state.
        confirmations: u32,
        /// Consecutive periods with a failing attribution ratio.
        failures: u32,
    },

    /// Confirmed pioneer.
    Pioneer {
        /// Consecutive periods failing the distance or attribution test.
        failures: u32,
    },

    /// Former candidate or pioneer that lost its signal. Not terminal.
    Demoted,
}

impl LifecycleState {
    /// Stable lowercase label, used in logs, tables and persistence.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Observing => "observing",
            Self::Candidate { .. } => "candidate",
            Self::Pioneer { .. } => "pioneer",
            Self::Demoted => "demoted",
        }
    }

    pub const fn is_pioneer(&self) -> bool {
        matches!(self, Self::Pioneer { .. })
    }

    /// Whether `other` is the same variant, ignoring counters.
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// The subset of the engine configuration the classifier reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierThresholds {
    pub orientation_threshold: f64,
    pub attribution_threshold: f64,
    pub confirmation_periods: u32,
    pub demotion_periods: u32,
}

impl From<&EngineConfig> for ClassifierThresholds {
    fn from(config: &EngineConfig) -> Self {
        Self {
            orientation_threshold: config.orientation_threshold,
            attribution_threshold: config.attribution_threshold,
            confirmation_periods: config.confirmation_periods.max(1),
            demotion_periods: config.demotion_periods.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// transition
// ---------------------------------------------------------------------------

/// Compute the next lifecycle state.
///
/// A missing distance verdict (insufficient history or not applicable) leaves
/// the state unchanged. Otherwise:
///
/// - **Observing / Demoted** enter `Candidate` when the distance narrows and the
///   orientation score clears its threshold, or go straight to `Pioneer` when a
///   single confirmation suffices and the attribution ratio clears its threshold.
/// - **Candidate** reverts to `Observing` as soon as narrowing stops, is demoted
///   after `demotion_periods` consecutive failing attribution ratios, and is
///   promoted once `confirmation_periods` consecutive confirming periods coincide
///   with a passing attribution ratio.
/// - **Pioneer** is demoted after `demotion_periods` consecutive periods that
///   either stop narrowing or fail the attribution threshold.
pub fn transition(
    state: LifecycleState,
    score: &TestScore,
    thresholds: &ClassifierThresholds,
) -> LifecycleState {
    let Some(verdict) = score.distance_reduction else {
        return state;
    };

    let narrowing = verdict.narrowing;
    let oriented = score
        .orientation
        .is_some_and(|o| o >= thresholds.orientation_threshold);
    let attributed = score
        .attribution
        .is_some_and(|a| a >= thresholds.attribution_threshold);
    let attribution_failed = score
        .attribution
        .is_some_and(|a| a < thresholds.attribution_threshold);

    match state {
        LifecycleState::Observing | LifecycleState::Demoted => {
            if narrowing && oriented {
                promote_or_hold(1, 0, attributed, thresholds)
            } else {
                state
            }
        }
        LifecycleState::Candidate {
            confirmations,
            failures,
        } => {
            if !narrowing {
                return LifecycleState::Observing;
            }
            let failures = if attribution_failed { failures + 1 } else { 0 };
            if failures >= thresholds.demotion_periods {
                return LifecycleState::Demoted;
            }
            let confirmations = if oriented { confirmations + 1 } else { 0 };
            promote_or_hold(confirmations, failures, attributed, thresholds)
        }
        LifecycleState::Pioneer { failures } => {
            let failing = !narrowing || attribution_failed;
            let failures = if failing { failures + 1 } else { 0 };
            if failures >= thresholds.demotion_periods {
                LifecycleState::Demoted
            } else {
                LifecycleState::Pioneer { failures }
            }
        }
    }
}

fn promote_or_hold(
    confirmations: u32,
    failures: u32,
    attributed: bool,
    thresholds: &ClassifierThresholds,
) -> LifecycleState {
    if confirmations >= thresholds.confirmation_periods && attributed {
        LifecycleState::Pioneer { failures: 0 }
    } else {
        LifecycleState::Candidate {
            confirmations,
            failures,
        }
    }
}

// ---------------------------------------------------------------------------
// LifecycleTransition
// ---------------------------------------------------------------------------

/// Audit record of a state change at a period boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleTransition {
    pub expert_id: ExpertId,
    pub period: Period,
    pub from: LifecycleState,
    pub to: LifecycleState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::pioneer::TrendVerdict;

    fn thresholds() -> ClassifierThresholds {
        ClassifierThresholds::from(&EngineConfig::default())
    }

    fn score(narrowing: Option<bool>, orientation: Option<f64>, attribution: Option<f64>) -> TestScore {
        TestScore {
            distance_reduction: narrowing.map(|n| TrendVerdict {
                score: if n { -0.5 } else { 0.0 },
                narrowing: n,
                p_value: None,
            }),
            orientation,
            attribution,
        }
    }

    #[test]
    fn test_no_distance_verdict_keeps_state() {
        let t = thresholds();
        let s = score(None, Some(1.0), Some(1.0));
        assert_eq!(transition(LifecycleState::Observing, &s, &t), LifecycleState::Observing);
        let pioneer = LifecycleState::Pioneer { failures: 1 };
        assert_eq!(transition(pioneer, &s, &t), pioneer);
    }

    #[test]
    fn test_observing_to_candidate_to_pioneer() {
        let t = thresholds();
        let strong = score(Some(true), Some(0.8), Some(0.9));
        let s1 = transition(LifecycleState::Observing, &strong, &t);
        assert_eq!(
            s1,
            LifecycleState::Candidate {
                confirmations: 1,
                failures: 0
            }
        );
        let s2 = transition(s1, &strong, &t);
        assert_eq!(s2, LifecycleState::Pioneer { failures: 0 });
    }

    #[test]
    fn test_candidate_needs_attribution_to_promote() {
        let t = thresholds();
        let no_attr = score(Some(true), Some(0.8), None);
        let s = transition(LifecycleState::Observing, &no_attr, &t);
        let s = transition(s, &no_attr, &t);
        assert_eq!(
            s,
            LifecycleState::Candidate {
                confirmations: 2,
                failures: 0
            }
        );
        let s = transition(s, &score(Some(true), Some(0.8), Some(0.7)), &t);
        assert!(s.is_pioneer());
    }

    #[test]
    fn test_single_confirmation_promotes_directly() {
        let t = ClassifierThresholds {
            confirmation_periods: 1,
            ..thresholds()
        };
        let s = transition(
            LifecycleState::Demoted,
            &score(Some(true), Some(0.6), Some(0.6)),
            &t,
        );
        assert_eq!(s, LifecycleState::Pioneer { failures: 0 });
    }

    #[test]
    fn test_candidate_reverts_when_narrowing_stops() {
        let t = thresholds();
        let candidate = LifecycleState::Candidate {
            confirmations: 1,
            failures: 0,
        };
        let s = transition(candidate, &score(Some(false), Some(1.0), Some(1.0)), &t);
        assert_eq!(s, LifecycleState::Observing);
    }

    #[test]
    fn test_weak_orientation_resets_confirmations() {
        let t = thresholds();
        let candidate = LifecycleState::Candidate {
            confirmations: 1,
            failures: 0,
        };
        let s = transition(candidate, &score(Some(true), Some(0.2), Some(0.9)), &t);
        assert_eq!(
            s,
            LifecycleState::Candidate {
                confirmations: 0,
                failures: 0
            }
        );
    }

    #[test]
    fn test_candidate_demoted_after_failing_attribution() {
        let t = thresholds();
        let weak = score(Some(true), Some(0.9), Some(0.1));
        let s = transition(LifecycleState::Observing, &weak, &t);
        assert_eq!(
            s,
            LifecycleState::Candidate {
                confirmations: 1,
                failures: 0
            }
        );
        let s = transition(s, &weak, &t);
        assert_eq!(
            s,
            LifecycleState::Candidate {
                confirmations: 2,
                failures: 1
            }
        );
        let s = transition(s, &weak, &t);
        assert_eq!(s, LifecycleState::Demoted);
    }

    #[test]
    fn test_pioneer_demotion_needs_consecutive_failures() {
        let t = thresholds();
        let pioneer = LifecycleState::Pioneer { failures: 0 };
        let failing = score(Some(false), None, None);
        let passing = score(Some(true), Some(0.1), None);

        let s = transition(pioneer, &failing, &t);
        assert_eq!(s, LifecycleState::Pioneer { failures: 1 });
        let s = transition(s, &passing, &t);
        assert_eq!(s, LifecycleState::Pioneer { failures: 0 });
        let s = transition(s, &failing, &t);
        let s = transition(s, &failing, &t);
        assert_eq!(s, LifecycleState::Demoted);
    }

    #[test]
    fn test_demoted_reenters_candidate() {
        let t = thresholds();
        let s = transition(
            LifecycleState::Demoted,
            &score(Some(true), Some(0.5), None),
            &t,
        );
        assert_eq!(
            s,
            LifecycleState::Candidate {
                confirmations: 1,
                failures: 0
            }
        );
        let idle = transition(LifecycleState::Demoted, &score(Some(false), Some(1.0), None), &t);
        assert_eq!(idle, LifecycleState::Demoted);
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_string(&LifecycleState::Candidate {
            confirmations: 2,
            failures: 1,
        })
        .unwrap();
        assert_eq!(json, r#"{"state":"candidate","confirmations":2,"failures":1}"#);
        let back: LifecycleState = serde_json::from_str(r#"{"state":"observing"}"#).unwrap();
        assert_eq!(back, LifecycleState::Observing);
    }
}
