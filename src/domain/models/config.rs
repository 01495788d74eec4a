//! Configuration sections as read from YAML and the environment.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::pattern::SimilarityMetric;
use super::routing::{ComplexityModel, ExecutionMode, RetryPolicy, RoutingConfig};
use super::score::Rubric;
use super::synthesis::SynthesisStrategy;

/// Main configuration structure for the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Worker pool configuration
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Routing defaults applied to every submitted task
    #[serde(default)]
    pub routing: RoutingSection,

    /// Retry policy for all-workers-failed dispatches
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Judge rubric and heuristics
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Pattern matching configuration
    #[serde(default)]
    pub learner: LearnerConfig,

    /// Approval gate configuration
    #[serde(default)]
    pub approval: ApprovalConfig,
}

impl Config {
    /// Rubric described by the `judge` section.
    pub fn rubric(&self) -> Rubric {
        Rubric::new(
            self.judge
                .weights
                .iter()
                .map(|(name, weight)| (name.clone(), *weight)),
            self.judge.pass_threshold,
        )
    }

    /// Build the runtime routing configuration from the loaded sections.
    pub fn routing_config(&self) -> RoutingConfig {
        RoutingConfig {
            mode: self.routing.mode,
            worker_count: self.routing.worker_count,
            max_workers: self.routing.max_workers,
            adaptive: self.routing.adaptive,
            complexity: self.routing.complexity.clone(),
            strategy: self.routing.strategy,
            alternate_strategy: self.routing.alternate_strategy,
            worker_timeout: Duration::from_secs(self.executor.worker_timeout_secs),
            require_approval: self.routing.require_approval,
            rubric: self.rubric(),
            retry: self.retry.clone(),
            reliability: BTreeMap::new(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".brain/brain.db".to_string()
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
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    #[serde(default = "default_true")]
    pub enable_stdout: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            enable_stdout: true,
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorConfig {
    /// Process-wide cap on workers running at once, across all workflows
    #[serde(default = "default_max_concurrent_workers")]
    pub max_concurrent_workers: usize,

    /// Per-worker timeout in seconds
    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,
}

const fn default_max_concurrent_workers() -> usize {
    16
}

const fn default_worker_timeout_secs() -> u64 {
    300
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: default_max_concurrent_workers(),
            worker_timeout_secs: default_worker_timeout_secs(),
        }
    }
}

/// Routing defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoutingSection {
    #[serde(default)]
    pub mode: ExecutionMode,

    #[serde(default = "default_worker_count")]
    pub worker_count: u32,

    #[serde(default = "default_max_workers")]
    pub max_workers: u32,

    /// Let the complexity estimate pick mode and worker count
    #[serde(default = "default_true")]
    pub adaptive: bool,

    #[serde(default)]
    pub complexity: ComplexityModel,

    #[serde(default)]
    pub strategy: SynthesisStrategy,

    #[serde(default = "default_alternate_strategy")]
    pub alternate_strategy: SynthesisStrategy,

    /// Park completed workflows at the approval gate
    #[serde(default)]
    pub require_approval: bool,
}

const fn default_worker_count() -> u32 {
    3
}

const fn default_max_workers() -> u32 {
    5
}

const fn default_alternate_strategy() -> SynthesisStrategy {
    SynthesisStrategy::WeightedVote
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            worker_count: default_worker_count(),
            max_workers: default_max_workers(),
            adaptive: true,
            complexity: ComplexityModel::default(),
            strategy: SynthesisStrategy::default(),
            alternate_strategy: default_alternate_strategy(),
            require_approval: false,
        }
    }
}

/// Judge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JudgeConfig {
    /// Dimension name to weight; must sum to 1.0
    #[serde(default = "default_weights")]
    pub weights: BTreeMap<String, f64>,

    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,

    /// Outputs shorter than this score low on length
    #[serde(default = "default_min_output_chars")]
    pub min_output_chars: usize,

    /// Outputs longer than this score low on length
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

fn default_weights() -> BTreeMap<String, f64> {
    Rubric::default().weights
}

const fn default_pass_threshold() -> f64 {
    70.0
}

const fn default_min_output_chars() -> usize {
    20
}

const fn default_max_output_chars() -> usize {
    20_000
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            pass_threshold: default_pass_threshold(),
            min_output_chars: default_min_output_chars(),
            max_output_chars: default_max_output_chars(),
        }
    }
}

/// Learner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LearnerConfig {
    #[serde(default)]
    pub similarity: SimilarityMetric,

    /// Minimum similarity (0-1) a success pattern needs to be recommended
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
}

const fn default_confidence_floor() -> f64 {
    0.3
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            similarity: SimilarityMetric::default(),
            confidence_floor: default_confidence_floor(),
        }
    }
}

/// Approval gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApprovalConfig {
    /// Seconds a gate may stay undecided before the expiry sweep rejects it
    #[serde(default = "default_approval_expiry_secs")]
    pub expiry_secs: u64,
}

const fn default_approval_expiry_secs() -> u64 {
    86_400
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_approval_expiry_secs(),
        }
    }
}

impl ApprovalConfig {
    /// Maximum age of an undecided gate.
    pub const fn max_age(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_config_from_sections() {
        let mut config = Config::default();
        config.executor.worker_timeout_secs = 12;
        config.routing.require_approval = true;
        config.retry.max_attempts = 3;

        let routing = config.routing_config();
        assert_eq!(routing.worker_timeout, Duration::from_secs(12));
        assert!(routing.require_approval);
        assert_eq!(routing.retry.max_attempts, 3);
        assert_eq!(routing.rubric, Rubric::default());
        routing.validate().expect("derived routing config should be valid");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r"
routing:
  mode: mixture-of-strategies
  complexity:
    threshold: 10
learner:
  similarity: overlap
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.routing.mode, ExecutionMode::MixtureOfStrategies);
        assert!((config.routing.complexity.threshold - 10.0).abs() < f64::EPSILON);
        assert!(!config.routing.complexity.keywords.is_empty());
        assert_eq!(config.routing.worker_count, 3);
        assert_eq!(config.learner.similarity, SimilarityMetric::Overlap);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.approval.max_age(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_approval_expiry_from_yaml() {
        let config: Config =
            serde_yaml::from_str("approval:\n  expiry_secs: 90\n").expect("YAML should parse");
        assert_eq!(config.approval.max_age(), Duration::from_secs(90));
    }
}
