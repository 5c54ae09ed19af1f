//! Pioneer - convergence-leader detection and weighted pooling
//!
//! A group of experts reports one estimate per period. The engine watches each
//! expert's distance to the group over a rolling window, checks whether peers
//! move toward that expert, and attributes the narrowing to the peers or to the
//! expert itself. Experts the group converges on are promoted to pioneers and
//! receive more weight in the pooled estimate.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): estimates, windows, the three tests, the
//!   lifecycle classifier, weighting and pooling, plus the persistence port
//! - **Service Layer** (`services`): the synchronous engine and its async,
//!   persistent wrapper
//! - **Adapters** (`adapters`): in-memory and SQLite snapshot repositories
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```
//! use pioneer::{EngineConfig, PioneerEngine};
//!
//! let mut engine = PioneerEngine::new(EngineConfig::default()).unwrap();
//! engine.submit_estimate("alice", 1, 10.0).unwrap();
//! engine.submit_estimate("bob", 1, 14.0).unwrap();
//! let outcome = engine.close_period(1).unwrap();
//! assert_eq!(outcome.reporters(), 2);
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    AttributionMethod, Benchmark, Config, EngineConfig, Estimate, ExpertId, ExpertStateView,
    GroupMeanKind, LifecycleState, Observation, OrientationWeighting, Period, PeriodOutcome,
    TestScore, TrendMethod, WeightVector,
};
pub use domain::ports::EngineStateRepository;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{PioneerEngine, PioneerService};
