use serde::{Deserialize, Serialize};

/// Main configuration structure for the pioneer engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Detection and weighting parameters
    #[serde(default)]
    pub engine: EngineConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============================================================================
// Engine configuration
// ============================================================================

/// How the per-period group mean is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupMeanKind {
    /// Arithmetic mean of all reporting experts.
    #[default]
    Simple,
    /// Mean weighted by the previous period's published weights.
    Weighted,
}

/// Reference point an expert's distance is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Benchmark {
    /// The group mean, including the expert itself.
    #[default]
    GroupMean,
    /// Simple mean of every other reporting expert.
    LeaveOneOut,
}

/// Trend statistic used by the distance reduction test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendMethod {
    /// Least-squares slope relative to the window's largest distance.
    #[default]
    Slope,
    /// Mann-Kendall rank trend with an exact one-sided p-value.
    MannKendall,
}

/// Decomposition used for the attribution ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    /// Peer-to-candidate distance reduction with the candidate held fixed.
    #[default]
    PeerPaths,
    /// `|Δ peer mean| / (|Δ peer mean| + |Δ candidate|)`.
    Slopes,
}

/// Whether peers count equally in the orientation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrientationWeighting {
    /// Peers weighted by their most recently published weight.
    #[default]
    Weighted,
    Unweighted,
}

/// Parameters of the detection, classification and weighting pipeline.
///
/// Static for a run unless the engine is explicitly reconfigured between periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Rolling window length per expert (>= 2)
    #[serde(default = "default_window_length")]
    pub window_length: usize,

    /// Minimum retained observations before any test issues a verdict (>= 1)
    #[serde(default = "default_min_history_for_test")]
    pub min_history_for_test: usize,

    /// Narrowing bound: relative slope bound for `slope`, p-value for `mann_kendall`
    #[serde(default = "default_narrowing_significance")]
    pub narrowing_significance: f64,

    /// Orientation score needed to become a candidate, in [0, 1]
    #[serde(default = "default_orientation_threshold")]
    pub orientation_threshold: f64,

    /// Attribution ratio needed to become (and stay) a pioneer, in [0, 1]
    #[serde(default = "default_attribution_threshold")]
    pub attribution_threshold: f64,

    /// Consecutive confirming periods before a candidate is promoted (>= 1)
    #[serde(default = "default_confirmation_periods")]
    pub confirmation_periods: u32,

    /// Consecutive failing periods before demotion (>= 1)
    #[serde(default = "default_demotion_periods")]
    pub demotion_periods: u32,

    /// Raw weight of observing and demoted experts (>= 0)
    #[serde(default = "default_floor_weight")]
    pub floor_weight: f64,

    /// Maximum normalized weight of any single expert, in (0, 1]
    #[serde(default = "default_weight_cap")]
    pub weight_cap: f64,

    /// Raw weight added to candidates, scaled by orientation score (>= 0)
    #[serde(default = "default_candidate_weight")]
    pub candidate_weight: f64,

    /// Raw weight added to pioneers, scaled by attribution ratio (>= 0)
    #[serde(default = "default_pioneer_weight")]
    pub pioneer_weight: f64,

    /// Peer moves smaller than this are treated as jitter (>= 0)
    #[serde(default = "default_orientation_noise_floor")]
    pub orientation_noise_floor: f64,

    #[serde(default)]
    pub group_mean: GroupMeanKind,

    #[serde(default)]
    pub benchmark: Benchmark,

    #[serde(default)]
    pub trend_method: TrendMethod,

    #[serde(default)]
    pub attribution_method: AttributionMethod,

    #[serde(default)]
    pub orientation_weighting: OrientationWeighting,
}

const fn default_window_length() -> usize {
    8
}

const fn default_min_history_for_test() -> usize {
    3
}

const fn default_narrowing_significance() -> f64 {
    0.10
}

const fn default_orientation_threshold() -> f64 {
    0.5
}

const fn default_attribution_threshold() -> f64 {
    0.6
}

const fn default_confirmation_periods() -> u32 {
    2
}

const fn default_demotion_periods() -> u32 {
    2
}

const fn default_floor_weight() -> f64 {
    0.01
}

const fn default_weight_cap() -> f64 {
    0.7
}

const fn default_candidate_weight() -> f64 {
    0.5
}

const fn default_pioneer_weight() -> f64 {
    1.0
}

const fn default_orientation_noise_floor() -> f64 {
    1e-9
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_length: default_window_length(),
            min_history_for_test: default_min_history_for_test(),
            narrowing_significance: default_narrowing_significance(),
            orientation_threshold: default_orientation_threshold(),
            attribution_threshold: default_attribution_threshold(),
            confirmation_periods: default_confirmation_periods(),
            demotion_periods: default_demotion_periods(),
            floor_weight: default_floor_weight(),
            weight_cap: default_weight_cap(),
            candidate_weight: default_candidate_weight(),
            pioneer_weight: default_pioneer_weight(),
            orientation_noise_floor: default_orientation_noise_floor(),
            group_mean: GroupMeanKind::default(),
            benchmark: Benchmark::default(),
            trend_method: TrendMethod::default(),
            attribution_method: AttributionMethod::default(),
            orientation_weighting: OrientationWeighting::default(),
        }
    }
}

// ============================================================================
// Database / logging configuration
// ============================================================================

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file holding engine snapshots
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".pioneer/pioneer.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_log_rotation(),
        }
    }
}
