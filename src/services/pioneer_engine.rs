//! Pioneer detection engine.
//!
//! Owns every expert's rolling window and lifecycle state, stages submissions
//! per period, and runs the full pipeline when a period is closed:
//! snapshot, distances, the three tests, the classifier, the weight assigner
//! and pooling. Closed periods are recorded in an in-memory ledger and are
//! immutable afterwards.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::{EngineConfig, GroupMeanKind};
use crate::domain::models::pioneer::{
    assign_weights, evaluate_expert, pool, transition, ClassifierThresholds, EngineSnapshot,
    Estimate, ExpertId, ExpertPeriodRecord, ExpertRecord, ExpertStateView, GroupSnapshot,
    LifecycleTransition, Observation, Period, PeriodOutcome,
};
use crate::infrastructure::config::{ConfigError, ConfigLoader};

/// Synchronous engine driving one detection run.
///
/// Callers serialize access; [`crate::services::PioneerService`] wraps the
/// engine in an async lock for shared use.
#[derive(Debug)]
pub struct PioneerEngine {
    run_id: Uuid,
    config: EngineConfig,
    thresholds: ClassifierThresholds,
    dimension: Option<usize>,
    experts: BTreeMap<ExpertId, ExpertRecord>,
    pending: BTreeMap<Period, BTreeMap<ExpertId, Observation>>,
    last_closed: Option<Period>,
    /// Snapshot of `last_closed`, `None` when that period had no reporters.
    previous: Option<GroupSnapshot>,
    outcomes: BTreeMap<Period, PeriodOutcome>,
}

impl PioneerEngine {
    /// Create an engine for a fresh run. Rejects invalid parameters.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        ConfigLoader::validate_engine(&config)?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            thresholds: ClassifierThresholds::from(&config),
            config,
            dimension: None,
            experts: BTreeMap::new(),
            pending: BTreeMap::new(),
            last_closed: None,
            previous: None,
            outcomes: BTreeMap::new(),
        })
    }

    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn last_closed(&self) -> Option<Period> {
        self.last_closed
    }

    /// Estimate dimension fixed by the first accepted observation.
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Known experts in id order.
    pub fn experts(&self) -> impl Iterator<Item = &ExpertRecord> {
        self.experts.values()
    }

    pub fn expert(&self, id: &ExpertId) -> Option<&ExpertRecord> {
        self.experts.get(id)
    }

    /// Number of staged, not yet closed submissions.
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(BTreeMap::len).sum()
    }

    /// Periods with staged submissions, oldest first.
    pub fn pending_periods(&self) -> impl Iterator<Item = Period> + '_ {
        self.pending.keys().copied()
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Stage one expert's estimate for a period.
    ///
    /// A rejected observation leaves the engine exactly as it was.
    pub fn submit(&mut self, observation: Observation) -> DomainResult<()> {
        if let Err(err) = self.validate_submission(&observation) {
            tracing::warn!(
                expert_id = %observation.expert_id,
                period = observation.period,
                error = %err,
                "Rejected observation"
            );
            return Err(err);
        }

        let dimension = observation.estimate.dimension();
        self.dimension.get_or_insert(dimension);

        let window_length = self.config.window_length;
        let record = self
            .experts
            .entry(observation.expert_id.clone())
            .or_insert_with_key(|id| {
                tracing::info!(expert_id = %id, "Registered new expert");
                ExpertRecord::new(id.clone(), window_length)
            });
        record.last_submitted = Some(observation.period);

        tracing::debug!(
            expert_id = %observation.expert_id,
            period = observation.period,
            "Staged observation"
        );
        self.pending
            .entry(observation.period)
            .or_default()
            .insert(observation.expert_id.clone(), observation);
        Ok(())
    }

    /// Convenience wrapper around [`Self::submit`].
    pub fn submit_estimate(
        &mut self,
        expert_id: impl Into<ExpertId>,
        period: Period,
        estimate: impl Into<Estimate>,
    ) -> DomainResult<()> {
        self.submit(Observation::new(expert_id, period, estimate))
    }

    fn validate_submission(&self, observation: &Observation) -> DomainResult<()> {
        let expert_id = &observation.expert_id;
        let period = observation.period;

        if !expert_id.is_valid() {
            return Err(DomainError::InvalidExpertId(expert_id.to_string()));
        }
        if observation.estimate.dimension() == 0 {
            return Err(DomainError::EmptyEstimate {
                expert_id: expert_id.to_string(),
                period,
            });
        }
        if !observation.estimate.is_finite() {
            return Err(DomainError::NonFiniteEstimate {
                expert_id: expert_id.to_string(),
                period,
            });
        }
        if let Some(expected) = self.dimension {
            let actual = observation.estimate.dimension();
            if actual != expected {
                return Err(DomainError::DimensionMismatch {
                    expert_id: expert_id.to_string(),
                    expected,
                    actual,
                });
            }
        }
        if let Some(last) = self.experts.get(expert_id).and_then(|r| r.last_submitted) {
            if period == last {
                return Err(DomainError::DuplicatePeriod {
                    expert_id: expert_id.to_string(),
                    period,
                });
            }
            if period < last {
                return Err(DomainError::OutOfOrderPeriod {
                    expert_id: expert_id.to_string(),
                    period,
                    last,
                });
            }
        }
        if self.last_closed.is_some_and(|closed| period <= closed) {
            return Err(DomainError::PeriodAlreadyClosed(period));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Period close
    // -----------------------------------------------------------------------

    /// Finalize `period` and publish its outcome.
    ///
    /// Experts without a submission for `period` abstain: their window and
    /// state are left untouched and their weight share goes to the reporters.
    /// Closing a period nobody reported for records an empty outcome and
    /// returns [`DomainError::NoData`].
    #[tracing::instrument(skip(self), fields(run_id = %self.run_id))]
    pub fn close_period(&mut self, period: Period) -> DomainResult<&PeriodOutcome> {
        if self.outcomes.contains_key(&period) || self.last_closed == Some(period) {
            return Err(DomainError::PeriodAlreadyClosed(period));
        }
        if let Some(last_closed) = self.last_closed {
            if period < last_closed {
                return Err(DomainError::PeriodOutOfOrder {
                    period,
                    last_closed,
                });
            }
        }
        if let Some(&pending) = self.pending.keys().find(|p| **p < period) {
            return Err(DomainError::UnclosedPeriod {
                pending,
                requested: period,
            });
        }

        let staged = self.pending.remove(&period).unwrap_or_default();
        if staged.is_empty() {
            tracing::warn!(period, "Closing period without any submission");
            self.outcomes.insert(period, PeriodOutcome::empty(period));
            self.last_closed = Some(period);
            self.previous = None;
            return Err(DomainError::NoData(period));
        }

        let prior_weights = self.prior_weights();
        let estimates: BTreeMap<ExpertId, Estimate> = staged
            .into_iter()
            .map(|(id, observation)| (id, observation.estimate))
            .collect();
        let Some(snapshot) = GroupSnapshot::build(
            period,
            estimates,
            self.config.group_mean,
            &prior_weights,
        ) else {
            return Err(DomainError::NoData(period));
        };

        // Distances first, so every window holds the current period before
        // any test reads it.
        let mut distances = BTreeMap::new();
        for (id, estimate) in &snapshot.estimates {
            let Some(record) = self.experts.get_mut(id) else {
                continue;
            };
            let distance = snapshot
                .distance_of(id, self.config.benchmark)
                .unwrap_or(0.0);
            record.window.push(period, estimate.clone(), distance);
            distances.insert(id.clone(), distance);
        }

        let mut evaluated = BTreeMap::new();
        let mut transitions = Vec::new();
        for id in distances.keys() {
            let Some(record) = self.experts.get(id) else {
                continue;
            };
            let score = evaluate_expert(
                id,
                &record.window,
                &snapshot,
                self.previous.as_ref(),
                &prior_weights,
                &self.config,
            );
            let next = transition(record.state, &score, &self.thresholds);
            if !next.same_kind(&record.state) {
                tracing::info!(
                    expert_id = %id,
                    period,
                    from = record.state.name(),
                    to = next.name(),
                    "Lifecycle transition"
                );
                transitions.push(LifecycleTransition {
                    expert_id: id.clone(),
                    period,
                    from: record.state,
                    to: next,
                });
            }
            tracing::debug!(
                expert_id = %id,
                period,
                narrowing = score.is_narrowing(),
                orientation = ?score.orientation,
                attribution = ?score.attribution,
                state = next.name(),
                "Evaluated expert"
            );
            evaluated.insert(id.clone(), (next, score));
        }

        let weights = assign_weights(
            period,
            evaluated.iter().map(|(id, (state, score))| (id, state, score)),
            &self.config,
        );
        let pooled = pool(&snapshot, &weights);

        let mut experts = BTreeMap::new();
        for (id, (state, scores)) in evaluated {
            let weight = weights.get(&id).unwrap_or(0.0);
            if let Some(record) = self.experts.get_mut(&id) {
                record.state = state;
                record.last_weight = Some(weight);
            }
            let distance = distances.get(&id).copied().unwrap_or(0.0);
            experts.insert(
                id,
                ExpertPeriodRecord {
                    state,
                    scores,
                    weight,
                    distance,
                },
            );
        }

        let outcome = PeriodOutcome {
            period,
            pooled,
            group_mean: Some(snapshot.mean.clone()),
            weights,
            experts,
            transitions,
        };
        tracing::info!(
            period,
            reporters = outcome.reporters(),
            pioneers = outcome.pioneers().len(),
            degenerate = outcome.weights.degenerate,
            pooled = %outcome.pooled.as_ref().map_or_else(String::new, ToString::to_string),
            "Closed period"
        );

        self.last_closed = Some(period);
        self.previous = Some(snapshot);
        Ok(self.outcomes.entry(period).or_insert(outcome))
    }

    /// Weights published for the last closed period, keyed by its reporters.
    fn prior_weights(&self) -> BTreeMap<ExpertId, f64> {
        let Some(last_closed) = self.last_closed else {
            return BTreeMap::new();
        };
        self.experts
            .values()
            .filter(|r| r.reported_in(last_closed))
            .filter_map(|r| r.last_weight.map(|w| (r.expert_id.clone(), w)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Full outcome of a closed period.
    pub fn period_outcome(&self, period: Period) -> DomainResult<&PeriodOutcome> {
        if let Some(outcome) = self.outcomes.get(&period) {
            return Ok(outcome);
        }
        match self.last_closed {
            Some(last_closed) if period <= last_closed => {
                Err(DomainError::OutcomeNotRetained(period))
            }
            _ => Err(DomainError::PeriodNotClosed(period)),
        }
    }

    /// Pooled estimate published for a closed period.
    pub fn pooled_estimate(&self, period: Period) -> DomainResult<&Estimate> {
        self.period_outcome(period)?
            .pooled
            .as_ref()
            .ok_or(DomainError::NoData(period))
    }

    /// Lifecycle state, weight and test scores of one expert at a closed period.
    pub fn expert_state(&self, expert_id: &ExpertId, period: Period) -> DomainResult<ExpertStateView> {
        if !self.experts.contains_key(expert_id) {
            return Err(DomainError::ExpertNotFound(expert_id.to_string()));
        }
        let outcome = self.period_outcome(period)?;
        let record = outcome
            .experts
            .get(expert_id)
            .ok_or_else(|| DomainError::ExpertAbsent {
                expert_id: expert_id.to_string(),
                period,
            })?;
        Ok(ExpertStateView {
            expert_id: expert_id.clone(),
            period,
            lifecycle_state: record.state,
            weight: record.weight,
            test_scores: record.scores,
        })
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Forget an expert and its staged submissions. Published outcomes keep
    /// their entries for it.
    pub fn remove_expert(&mut self, expert_id: &ExpertId) -> DomainResult<ExpertRecord> {
        let record = self
            .experts
            .remove(expert_id)
            .ok_or_else(|| DomainError::ExpertNotFound(expert_id.to_string()))?;
        for staged in self.pending.values_mut() {
            staged.remove(expert_id);
        }
        self.pending.retain(|_, staged| !staged.is_empty());
        // A removed expert is no longer a peer of the last closed period.
        if let Some(previous) = self.previous.take() {
            let mut estimates = previous.estimates;
            estimates.remove(expert_id);
            self.previous = prior_snapshot(previous.period, estimates);
        }
        tracing::info!(expert_id = %expert_id, "Removed expert");
        Ok(record)
    }

    /// Swap the detection parameters between periods.
    ///
    /// Windows are resized (keeping the newest entries); lifecycle states and
    /// counters carry over.
    pub fn reconfigure(&mut self, config: EngineConfig) -> DomainResult<()> {
        let pending = self.pending_count();
        if pending > 0 {
            return Err(DomainError::ReconfigureWithPending(pending));
        }
        ConfigLoader::validate_engine(&config)?;
        for record in self.experts.values_mut() {
            record.window.resize(config.window_length);
        }
        self.thresholds = ClassifierThresholds::from(&config);
        self.config = config;
        tracing::info!(
            window_length = self.config.window_length,
            "Engine reconfigured"
        );
        Ok(())
    }

    /// Capture the closed-period state. Staged submissions are not included.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            run_id: self.run_id,
            saved_at: Utc::now(),
            config: self.config.clone(),
            dimension: self.dimension,
            last_closed: self.last_closed,
            experts: self.experts.values().cloned().collect(),
        }
    }

    /// Rebuild an engine from a snapshot.
    ///
    /// Processing resumes at the next period with results identical to an
    /// uninterrupted run. Outcomes of periods before the snapshot are not
    /// retained.
    pub fn restore(snapshot: EngineSnapshot) -> Result<Self, ConfigError> {
        ConfigLoader::validate_engine(&snapshot.config)?;

        let experts: BTreeMap<ExpertId, ExpertRecord> = snapshot
            .experts
            .into_iter()
            .map(|mut record| {
                record.window.resize(snapshot.config.window_length);
                record.last_submitted = record.window.latest().map(|e| e.period);
                (record.expert_id.clone(), record)
            })
            .collect();

        let previous = snapshot.last_closed.and_then(|last_closed| {
            let estimates = experts
                .values()
                .filter(|r| r.reported_in(last_closed))
                .filter_map(|r| {
                    r.window
                        .latest()
                        .map(|e| (r.expert_id.clone(), e.estimate.clone()))
                })
                .collect();
            prior_snapshot(last_closed, estimates)
        });

        tracing::info!(
            run_id = %snapshot.run_id,
            experts = experts.len(),
            last_closed = ?snapshot.last_closed,
            "Restored engine state"
        );
        Ok(Self {
            run_id: snapshot.run_id,
            thresholds: ClassifierThresholds::from(&snapshot.config),
            config: snapshot.config,
            dimension: snapshot.dimension,
            experts,
            pending: BTreeMap::new(),
            last_closed: snapshot.last_closed,
            previous,
            outcomes: BTreeMap::new(),
        })
    }
}

/// Snapshot of the last closed period as seen by the next period's tests.
///
/// Only its estimates are read downstream, so the mean is the simple one.
fn prior_snapshot(period: Period, estimates: BTreeMap<ExpertId, Estimate>) -> Option<GroupSnapshot> {
    GroupSnapshot::build(period, estimates, GroupMeanKind::Simple, &BTreeMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{AttributionMethod, Benchmark, TrendMethod};
    use crate::domain::models::pioneer::LifecycleState;

    fn config() -> EngineConfig {
        EngineConfig {
            window_length: 3,
            min_history_for_test: 2,
            confirmation_periods: 1,
            ..EngineConfig::default()
        }
    }

    fn engine() -> PioneerEngine {
        PioneerEngine::new(config()).unwrap()
    }

    fn id(s: &str) -> ExpertId {
        ExpertId::new(s)
    }

    /// A holds still at 10 while B and C walk toward it.
    const CONVERGING: [(u64, [f64; 3]); 5] = [
        (1, [10.0, 0.0, 2.0]),
        (2, [10.0, 2.0, 4.0]),
        (3, [10.0, 4.0, 6.0]),
        (4, [10.0, 6.0, 8.0]),
        (5, [10.0, 8.0, 9.0]),
    ];

    fn run_converging(engine: &mut PioneerEngine, periods: std::ops::RangeInclusive<u64>) {
        for (period, [a, b, c]) in CONVERGING {
            if !periods.contains(&period) {
                continue;
            }
            engine.submit_estimate("A", period, a).unwrap();
            engine.submit_estimate("B", period, b).unwrap();
            engine.submit_estimate("C", period, c).unwrap();
            engine.close_period(period).unwrap();
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let bad = EngineConfig {
            window_length: 1,
            ..EngineConfig::default()
        };
        assert!(PioneerEngine::new(bad).is_err());
    }

    #[test]
    fn test_single_reporter_takes_all_weight() {
        let mut engine = engine();
        engine.submit_estimate("A", 1, 42.0).unwrap();
        let outcome = engine.close_period(1).unwrap();

        assert_eq!(outcome.weights.get(&id("A")), Some(1.0));
        assert_eq!(outcome.pooled, Some(Estimate::Scalar(42.0)));
        assert_eq!(engine.pooled_estimate(1).unwrap(), &Estimate::Scalar(42.0));
    }

    #[test]
    fn test_first_period_everyone_observing_equal_weights() {
        let mut engine = engine();
        engine.submit_estimate("A", 1, 10.0).unwrap();
        engine.submit_estimate("B", 1, 20.0).unwrap();
        engine.submit_estimate("C", 1, 30.0).unwrap();
        let outcome = engine.close_period(1).unwrap();

        for expert in ["A", "B", "C"] {
            let record = &outcome.experts[&id(expert)];
            assert_eq!(record.state, LifecycleState::Observing);
            assert!((record.weight - 1.0 / 3.0).abs() < 1e-12);
            assert_eq!(record.scores.distance_reduction, None);
        }
        match outcome.pooled.as_ref().unwrap() {
            Estimate::Scalar(v) => assert!((v - 20.0).abs() < 1e-9),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_weights_sum_to_one_every_period() {
        let mut engine = engine();
        run_converging(&mut engine, 1..=5);
        for period in 1..=5 {
            let outcome = engine.period_outcome(period).unwrap();
            assert!((outcome.weights.total() - 1.0).abs() < 1e-9);
            assert!(outcome.weights.weights.values().all(|w| *w >= 0.0));
        }
    }

    #[test]
    fn test_stationary_leader_becomes_pioneer() {
        let mut engine = engine();
        run_converging(&mut engine, 1..=5);

        let view = engine.expert_state(&id("A"), 5).unwrap();
        assert!(view.lifecycle_state.is_pioneer());
        assert!(view.test_scores.is_narrowing());
        assert!(view.test_scores.attribution.unwrap() >= 0.6);

        let outcome = engine.period_outcome(5).unwrap();
        let a = outcome.weights.get(&id("A")).unwrap();
        let b = outcome.weights.get(&id("B")).unwrap();
        assert!(a > b);
        assert!(a <= 0.7 + 1e-9);
    }

    #[test]
    fn test_duplicate_submission_rejected() {
        let mut engine = engine();
        engine.submit_estimate("A", 1, 1.0).unwrap();
        let err = engine.submit_estimate("A", 1, 2.0).unwrap_err();
        assert!(matches!(err, DomainError::DuplicatePeriod { period: 1, .. }));
        assert_eq!(engine.pending_count(), 1);
    }

    #[test]
    fn test_out_of_order_submission_leaves_state_unchanged() {
        let mut engine = engine();
        engine.submit_estimate("X", 5, 1.0).unwrap();
        let before = engine.expert(&id("X")).cloned();

        let err = engine.submit_estimate("X", 3, 1.0).unwrap_err();
        assert!(matches!(
            err,
            DomainError::OutOfOrderPeriod {
                period: 3,
                last: 5,
                ..
            }
        ));
        assert!(err.is_malformed_input());
        assert_eq!(engine.expert(&id("X")).cloned(), before);
        assert_eq!(engine.pending_count(), 1);
    }

    #[test]
    fn test_malformed_estimates_rejected() {
        let mut engine = engine();
        assert!(matches!(
            engine.submit_estimate("A", 1, f64::NAN).unwrap_err(),
            DomainError::NonFiniteEstimate { .. }
        ));
        assert!(matches!(
            engine.submit_estimate("A", 1, Vec::<f64>::new()).unwrap_err(),
            DomainError::EmptyEstimate { .. }
        ));
        assert!(matches!(
            engine.submit_estimate("", 1, 1.0).unwrap_err(),
            DomainError::InvalidExpertId(_)
        ));
        assert_eq!(engine.experts().count(), 0);
        assert_eq!(engine.dimension(), None);
    }

    #[test]
    fn test_dimension_fixed_by_first_observation() {
        let mut engine = engine();
        engine.submit_estimate("A", 1, vec![1.0, 2.0]).unwrap();
        let err = engine.submit_estimate("B", 1, 3.0).unwrap_err();
        assert!(matches!(
            err,
            DomainError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_vector_estimates_pool_componentwise() {
        let mut engine = engine();
        engine.submit_estimate("A", 1, vec![1.0, 10.0]).unwrap();
        engine.submit_estimate("B", 1, vec![3.0, 30.0]).unwrap();
        let outcome = engine.close_period(1).unwrap();
        assert_eq!(outcome.pooled, Some(Estimate::Vector(vec![2.0, 20.0])));
    }

    #[test]
    fn test_close_empty_period_is_no_data() {
        let mut engine = engine();
        assert!(matches!(engine.close_period(1), Err(DomainError::NoData(1))));
        assert_eq!(engine.last_closed(), Some(1));
        assert!(matches!(engine.pooled_estimate(1), Err(DomainError::NoData(1))));
        assert_eq!(engine.period_outcome(1).unwrap().pooled, None);
    }

    #[test]
    fn test_close_twice_and_submit_after_close() {
        let mut engine = engine();
        engine.submit_estimate("A", 1, 1.0).unwrap();
        engine.close_period(1).unwrap();

        assert!(matches!(
            engine.close_period(1),
            Err(DomainError::PeriodAlreadyClosed(1))
        ));
        assert!(matches!(
            engine.submit_estimate("B", 1, 1.0),
            Err(DomainError::PeriodAlreadyClosed(1))
        ));
    }

    #[test]
    fn test_close_out_of_order_and_unclosed() {
        let mut engine = engine();
        engine.submit_estimate("A", 2, 1.0).unwrap();
        engine.submit_estimate("A", 3, 1.0).unwrap();
        assert!(matches!(
            engine.close_period(3),
            Err(DomainError::UnclosedPeriod {
                pending: 2,
                requested: 3
            })
        ));

        engine.close_period(2).unwrap();
        engine.close_period(3).unwrap();
        assert!(matches!(
            engine.close_period(1),
            Err(DomainError::PeriodOutOfOrder {
                period: 1,
                last_closed: 3
            })
        ));
    }

    #[test]
    fn test_abstaining_expert_keeps_state_and_loses_share() {
        let mut engine = engine();
        run_converging(&mut engine, 1..=3);
        let before = engine.expert(&id("C")).cloned().unwrap();

        engine.submit_estimate("A", 4, 10.0).unwrap();
        engine.submit_estimate("B", 4, 6.0).unwrap();
        let outcome = engine.close_period(4).unwrap();

        assert!(!outcome.experts.contains_key(&id("C")));
        assert!((outcome.weights.total() - 1.0).abs() < 1e-9);
        let after = engine.expert(&id("C")).unwrap();
        assert_eq!(after.window, before.window);
        assert_eq!(after.state, before.state);
        assert!(matches!(
            engine.expert_state(&id("C"), 4),
            Err(DomainError::ExpertAbsent { period: 4, .. })
        ));
    }

    #[test]
    fn test_expert_state_errors() {
        let mut engine = engine();
        engine.submit_estimate("A", 1, 1.0).unwrap();
        assert!(matches!(
            engine.expert_state(&id("Z"), 1),
            Err(DomainError::ExpertNotFound(_))
        ));
        assert!(matches!(
            engine.expert_state(&id("A"), 1),
            Err(DomainError::PeriodNotClosed(1))
        ));
    }

    #[test]
    fn test_remove_expert_drops_staged_submissions() {
        let mut engine = engine();
        engine.submit_estimate("A", 1, 1.0).unwrap();
        engine.submit_estimate("B", 1, 3.0).unwrap();
        engine.remove_expert(&id("B")).unwrap();

        let outcome = engine.close_period(1).unwrap();
        assert_eq!(outcome.reporters(), 1);
        assert_eq!(outcome.pooled, Some(Estimate::Scalar(1.0)));
        assert!(matches!(
            engine.remove_expert(&id("B")),
            Err(DomainError::ExpertNotFound(_))
        ));
    }

    #[test]
    fn test_reconfigure_requires_no_pending() {
        let mut engine = engine();
        run_converging(&mut engine, 1..=3);
        engine.submit_estimate("A", 4, 10.0).unwrap();

        let narrower = EngineConfig {
            window_length: 2,
            ..config()
        };
        assert!(matches!(
            engine.reconfigure(narrower.clone()),
            Err(DomainError::ReconfigureWithPending(1))
        ));

        engine.remove_expert(&id("A")).unwrap();
        engine.reconfigure(narrower).unwrap();
        assert!(engine.experts().all(|r| r.window.len() <= 2));
        assert_eq!(engine.config().window_length, 2);
    }

    #[test]
    fn test_reconfigure_rejects_invalid() {
        let mut engine = engine();
        let bad = EngineConfig {
            weight_cap: 2.0,
            ..config()
        };
        assert!(matches!(
            engine.reconfigure(bad),
            Err(DomainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_snapshot_restore_replays_identically() {
        let mut uninterrupted = engine();
        run_converging(&mut uninterrupted, 1..=5);

        let mut first = engine();
        run_converging(&mut first, 1..=3);
        let json = serde_json::to_string(&first.snapshot()).unwrap();
        let snapshot: EngineSnapshot = serde_json::from_str(&json).unwrap();
        let mut resumed = PioneerEngine::restore(snapshot).unwrap();
        run_converging(&mut resumed, 4..=5);

        for period in 4..=5 {
            assert_eq!(
                resumed.period_outcome(period).unwrap(),
                uninterrupted.period_outcome(period).unwrap()
            );
        }
        assert!(matches!(
            resumed.period_outcome(2),
            Err(DomainError::OutcomeNotRetained(2))
        ));
        assert_eq!(resumed.run_id(), first.run_id());
    }

    #[test]
    fn test_restore_rejects_duplicate_of_closed_period() {
        let mut first = engine();
        run_converging(&mut first, 1..=2);
        let mut resumed = PioneerEngine::restore(first.snapshot()).unwrap();
        assert!(matches!(
            resumed.submit_estimate("A", 2, 10.0),
            Err(DomainError::DuplicatePeriod { period: 2, .. })
        ));
    }

    /// B and C close in on a stationary A.
    const NARROWING: [(u64, [f64; 3]); 5] = [
        (1, [10.0, 20.0, 25.0]),
        (2, [10.0, 17.0, 19.0]),
        (3, [10.0, 14.0, 13.0]),
        (4, [10.0, 11.0, 10.5]),
        (5, [10.0, 10.2, 10.1]),
    ];

    fn run_narrowing(engine: &mut PioneerEngine, periods: std::ops::RangeInclusive<u64>) {
        for (period, [a, b, c]) in NARROWING {
            if !periods.contains(&period) {
                continue;
            }
            engine.submit_estimate("A", period, a).unwrap();
            engine.submit_estimate("B", period, b).unwrap();
            engine.submit_estimate("C", period, c).unwrap();
            engine.close_period(period).unwrap();
        }
    }

    fn scalar(estimate: Option<&Estimate>) -> f64 {
        match estimate {
            Some(Estimate::Scalar(v)) => *v,
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    fn trend(outcome: &PeriodOutcome, expert: &str) -> Option<f64> {
        outcome.experts[&id(expert)]
            .scores
            .distance_reduction
            .map(|v| v.score)
    }

    #[test]
    fn test_leave_one_out_with_slopes_attribution() {
        let mut engine = PioneerEngine::new(EngineConfig {
            benchmark: Benchmark::LeaveOneOut,
            attribution_method: AttributionMethod::Slopes,
            ..config()
        })
        .unwrap();
        run_narrowing(&mut engine, 1..=5);

        let p1 = engine.period_outcome(1).unwrap();
        assert_eq!(p1.experts[&id("A")].distance, 12.5);
        assert_eq!(p1.experts[&id("B")].distance, 2.5);
        assert_eq!(p1.experts[&id("C")].distance, 10.0);

        // Peers' mean moves 22.5 -> 18 while A holds still: full credit.
        let p2 = engine.period_outcome(2).unwrap();
        let a = &p2.experts[&id("A")];
        assert_eq!(a.state, LifecycleState::Pioneer { failures: 0 });
        assert!((trend(p2, "A").unwrap() + 0.36).abs() < 1e-9);
        assert_eq!(a.scores.orientation, Some(1.0));
        assert_eq!(a.scores.attribution, Some(1.0));
        let c = &p2.experts[&id("C")];
        assert!((trend(p2, "C").unwrap() + 0.45).abs() < 1e-9);
        assert!((c.scores.attribution.unwrap() - 0.2).abs() < 1e-9);
        assert_eq!(c.state, LifecycleState::Observing);
        assert!((p2.weights.get(&id("A")).unwrap() - 0.7).abs() < 1e-9);
        assert!((p2.weights.get(&id("B")).unwrap() - 0.15).abs() < 1e-9);
        assert!((scalar(p2.pooled.as_ref()) - 12.4).abs() < 1e-9);

        let p3 = engine.period_outcome(3).unwrap();
        assert!((trend(p3, "A").unwrap() + 0.72).abs() < 1e-9);
        assert!((trend(p3, "C").unwrap() + 0.9).abs() < 1e-9);
        assert!((scalar(p3.pooled.as_ref()) - 11.05).abs() < 1e-9);

        let p4 = engine.period_outcome(4).unwrap();
        assert!((trend(p4, "A").unwrap() + 0.90625).abs() < 1e-9);
        assert_eq!(p4.experts[&id("C")].distance, 0.0);
        assert!((trend(p4, "C").unwrap() + 1.0).abs() < 1e-9);
        let b = &p4.experts[&id("B")];
        assert!((b.scores.attribution.unwrap() - 5.0 / 17.0).abs() < 1e-9);
        assert!((scalar(p4.pooled.as_ref()) - 10.225).abs() < 1e-9);

        // C sits on its peers' mean twice in a row: no verdict.
        let p5 = engine.period_outcome(5).unwrap();
        assert_eq!(trend(p5, "C"), None);
        assert!(p5.experts[&id("A")].state.is_pioneer());
        assert!((scalar(p5.pooled.as_ref()) - 10.045).abs() < 1e-9);
    }

    #[test]
    fn test_lone_reporter_under_leave_one_out() {
        let mut engine = PioneerEngine::new(EngineConfig {
            benchmark: Benchmark::LeaveOneOut,
            ..config()
        })
        .unwrap();
        engine.submit_estimate("A", 1, 5.0).unwrap();
        let p1 = engine.close_period(1).unwrap();
        assert_eq!(p1.experts[&id("A")].distance, 0.0);
        assert_eq!(p1.weights.get(&id("A")), Some(1.0));

        engine.submit_estimate("A", 2, 5.0).unwrap();
        engine.submit_estimate("B", 2, 9.0).unwrap();
        let p2 = engine.close_period(2).unwrap();
        assert_eq!(p2.experts[&id("A")].distance, 4.0);
        assert_eq!(trend(p2, "A"), Some(1.0));
        assert!(!p2.experts[&id("A")].scores.is_narrowing());
        assert_eq!(trend(p2, "B"), None);
        assert_eq!(p2.pooled, Some(Estimate::Scalar(7.0)));
    }

    #[test]
    fn test_weighted_group_mean_follows_published_weights() {
        let weighted = EngineConfig {
            group_mean: GroupMeanKind::Weighted,
            ..config()
        };
        let mut engine = PioneerEngine::new(weighted.clone()).unwrap();
        run_narrowing(&mut engine, 1..=5);

        // Period 2 publishes 0.7 / 0.15 / 0.15, which sets period 3's mean.
        let p3 = engine.period_outcome(3).unwrap();
        assert!((scalar(p3.group_mean.as_ref()) - 11.05).abs() < 1e-9);
        assert!((p3.experts[&id("A")].distance - 1.05).abs() < 1e-9);
        assert!((trend(p3, "A").unwrap() + 0.874).abs() < 1e-9);
        let p4 = engine.period_outcome(4).unwrap();
        assert!((scalar(p4.group_mean.as_ref()) - 10.225).abs() < 1e-9);

        let mut first = PioneerEngine::new(weighted).unwrap();
        run_narrowing(&mut first, 1..=3);
        let json = serde_json::to_string(&first.snapshot()).unwrap();
        let mut resumed = PioneerEngine::restore(serde_json::from_str(&json).unwrap()).unwrap();
        run_narrowing(&mut resumed, 4..=5);
        for period in 4..=5 {
            assert_eq!(
                resumed.period_outcome(period).unwrap(),
                engine.period_outcome(period).unwrap()
            );
        }
    }

    #[test]
    fn test_mann_kendall_trend_drives_promotion() {
        let mut engine = PioneerEngine::new(EngineConfig {
            window_length: 4,
            min_history_for_test: 4,
            narrowing_significance: 0.05,
            trend_method: TrendMethod::MannKendall,
            ..config()
        })
        .unwrap();
        run_narrowing(&mut engine, 1..=3);
        let p3 = engine.period_outcome(3).unwrap();
        assert_eq!(trend(p3, "A"), None);
        assert_eq!(p3.experts[&id("A")].state, LifecycleState::Observing);

        run_narrowing(&mut engine, 4..=4);
        let a = &engine.period_outcome(4).unwrap().experts[&id("A")];
        let verdict = a.scores.distance_reduction.unwrap();
        assert_eq!(verdict.score, -1.0);
        assert!((verdict.p_value.unwrap() - 1.0 / 24.0).abs() < 1e-12);
        assert!(verdict.narrowing);
        assert_eq!(a.state, LifecycleState::Pioneer { failures: 0 });
    }

    #[test]
    fn test_removed_expert_is_not_a_peer_after_restore_either() {
        let mut live = engine();
        run_narrowing(&mut live, 1..=2);
        live.remove_expert(&id("B")).unwrap();
        let mut resumed = PioneerEngine::restore(live.snapshot()).unwrap();

        for engine in [&mut live, &mut resumed] {
            engine.submit_estimate("A", 3, 10.0).unwrap();
            engine.submit_estimate("B", 3, 14.0).unwrap();
            engine.submit_estimate("C", 3, 13.0).unwrap();
            engine.close_period(3).unwrap();
        }

        let outcome = live.period_outcome(3).unwrap();
        assert_eq!(outcome, resumed.period_outcome(3).unwrap());
        assert_eq!(outcome.experts[&id("B")].scores.orientation, None);
        assert_eq!(outcome.experts[&id("B")].scores.attribution, None);
    }
}
