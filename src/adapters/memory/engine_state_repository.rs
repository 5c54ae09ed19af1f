//! Process-local EngineStateRepository.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::pioneer::{EngineSnapshot, ExpertId, ExpertRecord};
use crate::domain::ports::EngineStateRepository;

/// Keeps only the most recent snapshot.
#[derive(Debug, Default)]
pub struct InMemoryEngineStateRepository {
    latest: RwLock<Option<EngineSnapshot>>,
}

impl InMemoryEngineStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EngineStateRepository for InMemoryEngineStateRepository {
    async fn save(&self, snapshot: &EngineSnapshot) -> DomainResult<()> {
        let mut latest = self.latest.write().await;
        let stale = latest.as_ref().is_some_and(|stored| {
            stored.run_id == snapshot.run_id && stored.last_closed > snapshot.last_closed
        });
        if !stale {
            *latest = Some(snapshot.clone());
        }
        Ok(())
    }

    async fn load_latest(&self) -> DomainResult<Option<EngineSnapshot>> {
        Ok(self.latest.read().await.clone())
    }

    async fn load_expert(&self, expert_id: &ExpertId) -> DomainResult<Option<ExpertRecord>> {
        Ok(self.latest.read().await.as_ref().and_then(|snapshot| {
            snapshot
                .experts
                .iter()
                .find(|r| &r.expert_id == expert_id)
                .cloned()
        }))
    }

    async fn clear(&self) -> DomainResult<()> {
        *self.latest.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::EngineConfig;
    use crate::services::PioneerEngine;

    #[tokio::test]
    async fn test_save_load_clear() {
        let repo = InMemoryEngineStateRepository::new();
        assert!(repo.load_latest().await.unwrap().is_none());

        let mut engine = PioneerEngine::new(EngineConfig::default()).unwrap();
        engine.submit_estimate("A", 1, 3.0).unwrap();
        engine.close_period(1).unwrap();
        let snapshot = engine.snapshot();

        repo.save(&snapshot).await.unwrap();
        assert_eq!(repo.load_latest().await.unwrap(), Some(snapshot));
        let record = repo.load_expert(&ExpertId::new("A")).await.unwrap().unwrap();
        assert_eq!(record.last_weight, Some(1.0));
        assert!(repo.load_expert(&ExpertId::new("B")).await.unwrap().is_none());

        repo.clear().await.unwrap();
        assert!(repo.load_latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_older_snapshot_of_same_run_is_ignored() {
        let repo = InMemoryEngineStateRepository::new();
        let mut engine = PioneerEngine::new(EngineConfig::default()).unwrap();
        engine.submit_estimate("A", 1, 3.0).unwrap();
        engine.close_period(1).unwrap();
        let older = engine.snapshot();
        engine.submit_estimate("A", 2, 4.0).unwrap();
        engine.close_period(2).unwrap();

        repo.save(&engine.snapshot()).await.unwrap();
        repo.save(&older).await.unwrap();
        assert_eq!(repo.load_latest().await.unwrap().unwrap().last_closed, Some(2));
    }
}
