pub mod config;
pub mod pioneer;

pub use config::{
    AttributionMethod, Benchmark, Config, DatabaseConfig, EngineConfig, GroupMeanKind,
    LoggingConfig, OrientationWeighting, TrendMethod,
};
pub use pioneer::{
    Estimate, ExpertId, ExpertStateView, LifecycleState, Observation, Period, PeriodOutcome,
    TestScore, WeightVector,
};
