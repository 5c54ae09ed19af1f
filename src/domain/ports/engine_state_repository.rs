//! Engine state repository port for resuming runs across restarts.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::pioneer::{EngineSnapshot, ExpertId, ExpertRecord};

/// Repository interface for engine snapshot persistence.
///
/// A run is keyed by its `run_id`. Saving replaces the stored snapshot of that
/// run: meta data is upserted, one row per expert is upserted, and experts no
/// longer present in the snapshot are removed. Abstracts the underlying
/// storage backend (SQLite, in-memory, etc.).
#[async_trait]
pub trait EngineStateRepository: Send + Sync {
    /// Persist or replace the snapshot of `snapshot.run_id`.
    async fn save(&self, snapshot: &EngineSnapshot) -> DomainResult<()>;

    /// Load the most recently saved snapshot, if any.
    async fn load_latest(&self) -> DomainResult<Option<EngineSnapshot>>;

    /// Load the record of a single expert from the most recent snapshot.
    async fn load_expert(&self, expert_id: &ExpertId) -> DomainResult<Option<ExpertRecord>>;

    /// Delete every stored snapshot.
    async fn clear(&self) -> DomainResult<()>;
}
