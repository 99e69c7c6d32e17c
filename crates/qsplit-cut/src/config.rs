//! Configuration for the cutting pipeline.
//!
//! Configuration is resolved in three layers:
//! 1. Default values
//! 2. A YAML configuration file
//! 3. Environment variables with the `QSPLIT_` prefix
//!
//! Later layers override earlier ones. The merged result is validated
//! before use.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which cut-selection solver to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// Exact search for small circuits, greedy otherwise.
    #[default]
    Auto,
    /// Branch and bound over all labelings.
    Exact,
    /// Balanced sweep followed by local improvement.
    Greedy,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionStrategy::Auto => write!(f, "auto"),
            SelectionStrategy::Exact => write!(f, "exact"),
            SelectionStrategy::Greedy => write!(f, "greedy"),
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SelectionStrategy::Auto),
            "exact" => Ok(SelectionStrategy::Exact),
            "greedy" => Ok(SelectionStrategy::Greedy),
            other => Err(ConfigError::Validation(format!(
                "Unknown selection strategy: {other}"
            ))),
        }
    }
}

/// How the reconstructed distribution is post-processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconstructionMode {
    /// Raw signed sum, may contain small negative entries.
    #[default]
    Direct,
    /// Nearest valid probability distribution to the signed sum.
    Likely,
}

impl FromStr for ReconstructionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(ReconstructionMode::Direct),
            "likely" => Ok(ReconstructionMode::Likely),
            other => Err(ConfigError::Validation(format!(
                "Unknown reconstruction mode: {other}"
            ))),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutConfig {
    /// Maximum number of wires in any fragment.
    #[serde(default = "default_max_wires")]
    pub max_wires_per_fragment: usize,

    /// Minimum number of operation-bearing fragments.
    #[serde(default = "default_min_fragments")]
    pub min_fragments: usize,

    /// Maximum number of operation-bearing fragments.
    #[serde(default = "default_max_fragments")]
    pub max_fragments: usize,

    /// Trade-off between cut count and fragment width. When set, the
    /// selector minimizes `weight * cuts + max_fragment_wires`.
    #[serde(default)]
    pub cut_cost_weight: Option<f64>,

    /// Cut-selection solver.
    #[serde(default)]
    pub strategy: SelectionStrategy,

    /// Largest multi-wire operation count handed to the exact solver under
    /// `auto`.
    #[serde(default = "default_exact_node_limit")]
    pub exact_node_limit: usize,

    /// Maximum number of fragment executions in flight.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_executions: usize,

    /// Cache collapsed terms and Kronecker prefixes during reconstruction.
    #[serde(default = "default_true")]
    pub memoize: bool,

    /// Spread reconstruction over the rayon thread pool.
    #[serde(default)]
    pub parallel: bool,

    /// Allowed deviation of the reconstructed total mass from 1.
    #[serde(default = "default_normalization_tolerance")]
    pub normalization_tolerance: f64,

    /// Post-processing of the reconstructed distribution.
    #[serde(default)]
    pub mode: ReconstructionMode,
}

fn default_max_wires() -> usize {
    10
}

fn default_min_fragments() -> usize {
    2
}

fn default_max_fragments() -> usize {
    4
}

fn default_exact_node_limit() -> usize {
    18
}

fn default_max_concurrent() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_normalization_tolerance() -> f64 {
    1e-6
}

impl Default for CutConfig {
    fn default() -> Self {
        Self {
            max_wires_per_fragment: default_max_wires(),
            min_fragments: default_min_fragments(),
            max_fragments: default_max_fragments(),
            cut_cost_weight: None,
            strategy: SelectionStrategy::default(),
            exact_node_limit: default_exact_node_limit(),
            max_concurrent_executions: default_max_concurrent(),
            memoize: true,
            parallel: false,
            normalization_tolerance: default_normalization_tolerance(),
            mode: ReconstructionMode::default(),
        }
    }
}

impl CutConfig {
    /// Create a configuration with the given wire budget and defaults for
    /// everything else.
    pub fn new(max_wires_per_fragment: usize) -> Self {
        Self {
            max_wires_per_fragment,
            ..Self::default()
        }
    }

    /// Set the allowed range of operation-bearing fragments.
    pub fn with_fragment_range(mut self, min: usize, max: usize) -> Self {
        self.min_fragments = min;
        self.max_fragments = max;
        self
    }

    /// Set the cut cost weight.
    pub fn with_cut_cost_weight(mut self, weight: f64) -> Self {
        self.cut_cost_weight = Some(weight);
        self
    }

    /// Set the selection strategy.
    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable memoization.
    pub fn with_memoization(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    /// Enable or disable parallel reconstruction.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the reconstruction mode.
    pub fn with_mode(mut self, mode: ReconstructionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.as_ref().display())))?;

        let config: CutConfig =
            serde_yaml_ng::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Environment variables
    /// 2. Configuration file, if provided
    /// 3. Default values
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let config = config.merge_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Merge environment overrides into this configuration.
    ///
    /// `lookup` resolves a variable name to its value. Variables that are
    /// absent leave the corresponding fields unchanged; values that fail to
    /// parse are logged and ignored.
    pub fn merge_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(key: &str, value: &str) -> Option<T> {
            let parsed = value.trim().parse().ok();
            if parsed.is_none() {
                warn!("Ignoring unparseable value for {key}: {value:?}");
            }
            parsed
        }

        if let Some(v) = lookup("QSPLIT_MAX_WIRES") {
            if let Some(val) = parsed("QSPLIT_MAX_WIRES", &v) {
                self.max_wires_per_fragment = val;
            }
        }
        if let Some(v) = lookup("QSPLIT_MIN_FRAGMENTS") {
            if let Some(val) = parsed("QSPLIT_MIN_FRAGMENTS", &v) {
                self.min_fragments = val;
            }
        }
        if let Some(v) = lookup("QSPLIT_MAX_FRAGMENTS") {
            if let Some(val) = parsed("QSPLIT_MAX_FRAGMENTS", &v) {
                self.max_fragments = val;
            }
        }
        if let Some(v) = lookup("QSPLIT_CUT_COST_WEIGHT") {
            if let Some(val) = parsed("QSPLIT_CUT_COST_WEIGHT", &v) {
                self.cut_cost_weight = Some(val);
            }
        }
        if let Some(v) = lookup("QSPLIT_STRATEGY") {
            if let Some(val) = parsed("QSPLIT_STRATEGY", &v) {
                self.strategy = val;
            }
        }
        if let Some(v) = lookup("QSPLIT_MAX_CONCURRENT") {
            if let Some(val) = parsed("QSPLIT_MAX_CONCURRENT", &v) {
                self.max_concurrent_executions = val;
            }
        }
        if let Some(v) = lookup("QSPLIT_MEMOIZE") {
            if let Some(val) = parsed("QSPLIT_MEMOIZE", &v) {
                self.memoize = val;
            }
        }
        if let Some(v) = lookup("QSPLIT_PARALLEL") {
            if let Some(val) = parsed("QSPLIT_PARALLEL", &v) {
                self.parallel = val;
            }
        }

        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_wires_per_fragment == 0 {
            return Err(ConfigError::Validation(
                "max_wires_per_fragment must be greater than 0".to_string(),
            ));
        }

        if self.min_fragments == 0 {
            return Err(ConfigError::Validation(
                "min_fragments must be at least 1".to_string(),
            ));
        }

        if self.min_fragments > self.max_fragments {
            return Err(ConfigError::Validation(format!(
                "Fragment range is empty: min {} > max {}",
                self.min_fragments, self.max_fragments
            )));
        }

        if let Some(weight) = self.cut_cost_weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "cut_cost_weight must be a non-negative number, got {weight}"
                )));
            }
        }

        if self.max_concurrent_executions == 0 {
            return Err(ConfigError::Validation(
                "max_concurrent_executions must be greater than 0".to_string(),
            ));
        }

        if self.normalization_tolerance.is_nan() || self.normalization_tolerance <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "normalization_tolerance must be positive, got {}",
                self.normalization_tolerance
            )));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(String),

    /// The configuration file is not valid YAML for this schema.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: FxHashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CutConfig::default();
        assert_eq!(config.max_wires_per_fragment, 10);
        assert_eq!(config.min_fragments, 2);
        assert_eq!(config.max_fragments, 4);
        assert!(config.memoize);
        assert!(!config.parallel);
        assert_eq!(config.strategy, SelectionStrategy::Auto);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_range() {
        let config = CutConfig::new(4).with_fragment_range(3, 2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        assert!(CutConfig::new(0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let config = CutConfig::new(4).with_cut_cost_weight(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_wires_per_fragment: 3").unwrap();
        writeln!(file, "strategy: greedy").unwrap();
        writeln!(file, "mode: likely").unwrap();

        let config = CutConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_wires_per_fragment, 3);
        assert_eq!(config.strategy, SelectionStrategy::Greedy);
        assert_eq!(config.mode, ReconstructionMode::Likely);
        assert_eq!(config.max_fragments, 4);
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            CutConfig::from_file("/nonexistent/qsplit.yaml"),
            Err(ConfigError::Io(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_wires_per_fragment: [not, a, number]").unwrap();
        assert!(matches!(
            CutConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = CutConfig::default().merge_env(env(&[
            ("QSPLIT_MAX_WIRES", "5"),
            ("QSPLIT_MIN_FRAGMENTS", "1"),
            ("QSPLIT_STRATEGY", "exact"),
            ("QSPLIT_MEMOIZE", "false"),
            ("QSPLIT_PARALLEL", "true"),
            ("QSPLIT_CUT_COST_WEIGHT", "0.5"),
        ]));
        assert_eq!(config.max_wires_per_fragment, 5);
        assert_eq!(config.min_fragments, 1);
        assert_eq!(config.strategy, SelectionStrategy::Exact);
        assert!(!config.memoize);
        assert!(config.parallel);
        assert_eq!(config.cut_cost_weight, Some(0.5));
    }

    #[test]
    fn test_env_unparseable_values_are_ignored() {
        let config = CutConfig::default().merge_env(env(&[
            ("QSPLIT_MAX_WIRES", "lots"),
            ("QSPLIT_STRATEGY", "magic"),
        ]));
        assert_eq!(config, CutConfig::default());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Greedy".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::Greedy);
        assert!("fastest".parse::<SelectionStrategy>().is_err());
        assert_eq!(SelectionStrategy::Exact.to_string(), "exact");
    }
}
