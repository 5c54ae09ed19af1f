//! Domain errors for the pioneer detection engine.

use thiserror::Error;

use crate::domain::models::pioneer::Period;

/// Domain-level errors that can occur while driving the engine.
///
/// Submission errors (`DuplicatePeriod` through `InvalidExpertId`) form the
/// malformed-input family: the offending observation is rejected and the run
/// continues with its prior state untouched.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Duplicate period {period} for expert '{expert_id}'")]
    DuplicatePeriod { expert_id: String, period: Period },

    #[error("Out-of-order period {period} for expert '{expert_id}' (last submitted: {last})")]
    OutOfOrderPeriod {
        expert_id: String,
        period: Period,
        last: Period,
    },

    #[error("Non-finite estimate from expert '{expert_id}' for period {period}")]
    NonFiniteEstimate { expert_id: String, period: Period },

    #[error("Empty estimate from expert '{expert_id}' for period {period}")]
    EmptyEstimate { expert_id: String, period: Period },

    #[error("Estimate dimension mismatch for expert '{expert_id}': expected {expected}, got {actual}")]
    DimensionMismatch {
        expert_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid expert id: {0:?}")]
    InvalidExpertId(String),

    #[error("Period {0} is already closed")]
    PeriodAlreadyClosed(Period),

    #[error("Period {period} cannot be closed after period {last_closed}")]
    PeriodOutOfOrder { period: Period, last_closed: Period },

    #[error("Period {pending} has staged submissions and must be closed before period {requested}")]
    UnclosedPeriod { pending: Period, requested: Period },

    #[error("Period {0} is not closed")]
    PeriodNotClosed(Period),

    #[error("Outcome of period {0} predates the restored snapshot and is not retained")]
    OutcomeNotRetained(Period),

    #[error("No expert reported for period {0}")]
    NoData(Period),

    #[error("Expert not found: {0}")]
    ExpertNotFound(String),

    #[error("Expert '{expert_id}' did not report for period {period}")]
    ExpertAbsent { expert_id: String, period: Period },

    #[error("Cannot reconfigure with {0} staged submission(s) pending")]
    ReconfigureWithPending(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    /// Whether this error belongs to the malformed-input family rejected at
    /// submission time.
    pub const fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::DuplicatePeriod { .. }
                | Self::OutOfOrderPeriod { .. }
                | Self::NonFiniteEstimate { .. }
                | Self::EmptyEstimate { .. }
                | Self::DimensionMismatch { .. }
                | Self::InvalidExpertId(_)
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<crate::infrastructure::config::ConfigError> for DomainError {
    fn from(err: crate::infrastructure::config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
