//! Shared, persistent front of the engine.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::EngineConfig;
use crate::domain::models::pioneer::{
    EngineSnapshot, Estimate, ExpertId, ExpertStateView, Observation, Period, PeriodOutcome,
};
use crate::domain::ports::EngineStateRepository;
use crate::services::PioneerEngine;

/// Async wrapper around [`PioneerEngine`].
///
/// Submissions from many tasks interleave under the write lock; queries share
/// the read lock. A snapshot is written to the repository after every close.
///
/// Saves are serialized by `persist`, which is taken before the engine lock is
/// released, so snapshots reach the repository in the order they were taken.
pub struct PioneerService<R: EngineStateRepository> {
    engine: Arc<RwLock<PioneerEngine>>,
    repository: Arc<R>,
    persist: Arc<Mutex<()>>,
}

impl<R: EngineStateRepository> Clone for PioneerService<R> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            repository: Arc::clone(&self.repository),
            persist: Arc::clone(&self.persist),
        }
    }
}

impl<R: EngineStateRepository> PioneerService<R> {
    pub fn new(engine: PioneerEngine, repository: Arc<R>) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            repository,
            persist: Arc::new(Mutex::new(())),
        }
    }

    /// Resume from the latest persisted snapshot, or start a fresh run with
    /// `config` when the repository is empty.
    ///
    /// A persisted run keeps its own detection parameters.
    pub async fn open(config: EngineConfig, repository: Arc<R>) -> DomainResult<Self> {
        let engine = match repository.load_latest().await? {
            Some(snapshot) => {
                tracing::info!(
                    run_id = %snapshot.run_id,
                    last_closed = ?snapshot.last_closed,
                    "Resuming persisted run"
                );
                PioneerEngine::restore(snapshot)?
            }
            None => PioneerEngine::new(config)?,
        };
        Ok(Self::new(engine, repository))
    }

    pub async fn submit(&self, observation: Observation) -> DomainResult<()> {
        self.engine.write().await.submit(observation)
    }

    pub async fn submit_estimate(
        &self,
        expert_id: impl Into<ExpertId>,
        period: Period,
        estimate: impl Into<Estimate>,
    ) -> DomainResult<()> {
        self.submit(Observation::new(expert_id, period, estimate)).await
    }

    /// Close `period` and persist the resulting state.
    ///
    /// An empty period is persisted as closed before `NoData` is returned.
    pub async fn close_period(&self, period: Period) -> DomainResult<PeriodOutcome> {
        let mut engine = self.engine.write().await;
        let result = engine.close_period(period).cloned();
        if matches!(result, Ok(_) | Err(DomainError::NoData(_))) {
            let snapshot = engine.snapshot();
            let _persist = self.persist.lock().await;
            drop(engine);
            self.repository.save(&snapshot).await?;
            tracing::debug!(period, "Persisted engine snapshot");
        }
        result
    }

    pub async fn pooled_estimate(&self, period: Period) -> DomainResult<Estimate> {
        self.engine.read().await.pooled_estimate(period).cloned()
    }

    pub async fn expert_state(
        &self,
        expert_id: &ExpertId,
        period: Period,
    ) -> DomainResult<ExpertStateView> {
        self.engine.read().await.expert_state(expert_id, period)
    }

    pub async fn period_outcome(&self, period: Period) -> DomainResult<PeriodOutcome> {
        self.engine.read().await.period_outcome(period).cloned()
    }

    pub async fn last_closed(&self) -> Option<Period> {
        self.engine.read().await.last_closed()
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.engine.read().await.snapshot()
    }

    /// Remove an expert and persist the change.
    pub async fn remove_expert(&self, expert_id: &ExpertId) -> DomainResult<()> {
        let mut engine = self.engine.write().await;
        engine.remove_expert(expert_id)?;
        let snapshot = engine.snapshot();
        let _persist = self.persist.lock().await;
        drop(engine);
        self.repository.save(&snapshot).await
    }

    pub async fn reconfigure(&self, config: EngineConfig) -> DomainResult<()> {
        let mut engine = self.engine.write().await;
        engine.reconfigure(config)?;
        let snapshot = engine.snapshot();
        let _persist = self.persist.lock().await;
        drop(engine);
        self.repository.save(&snapshot).await
    }
}
