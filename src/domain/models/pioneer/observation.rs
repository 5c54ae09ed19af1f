//! Expert identifiers and submitted observations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Estimate;

/// Period index. Periods are totally ordered and strictly increasing per expert.
pub type Period = u64;

/// Stable, unique expert identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpertId(String);

impl ExpertId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifiers must be non-empty once trimmed.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for ExpertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExpertId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ExpertId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One expert's estimate for one period, as pushed in by the ingestion side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub expert_id: ExpertId,
    pub period: Period,
    pub estimate: Estimate,
    /// Opaque ingestion timestamp, kept for audit only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Observation {
    pub fn new(expert_id: impl Into<ExpertId>, period: Period, estimate: impl Into<Estimate>) -> Self {
        Self {
            expert_id: expert_id.into(),
            period,
            estimate: estimate.into(),
            timestamp: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
