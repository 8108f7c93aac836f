use crate::core::density::bandwidth::BandwidthMethod;
use crate::core::models::bounds::Bounds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How candidate starting points for the local optimizer are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MinimizerStrategy {
    /// Seeds from the local minima of a regular grid over the bounds.
    #[default]
    GridSearch,
    /// Seeds from uniform random points drawn with a fixed seed.
    RandomRestarts,
}

impl fmt::Display for MinimizerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinimizerStrategy::GridSearch => write!(f, "grid-search"),
            MinimizerStrategy::RandomRestarts => write!(f, "random-restarts"),
        }
    }
}

impl FromStr for MinimizerStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid-search" | "grid" => Ok(MinimizerStrategy::GridSearch),
            "random-restarts" | "random" => Ok(MinimizerStrategy::RandomRestarts),
            other => Err(ConfigError::InvalidParameter {
                name: "strategy",
                reason: format!("unknown optimizer '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizerConfig {
    pub strategy: MinimizerStrategy,
    /// Grid points per dimension for [`MinimizerStrategy::GridSearch`].
    pub grid_points: usize,
    /// Convergence threshold on the spread of function values over the simplex.
    pub tolerance: f64,
    /// Iteration cap for a single refinement.
    pub max_iterations: usize,
    /// Number of random starts for [`MinimizerStrategy::RandomRestarts`].
    pub restarts: usize,
    pub seed: u64,
    /// Merge radius, as a fraction of the bounding-box diagonal.
    pub merge_tolerance: f64,
    /// Caps the number of refined seeds, lowest seeds first.
    pub max_candidates: Option<usize>,
    pub keep_boundary_minima: bool,
}

impl Default for MinimizerConfig {
    fn default() -> Self {
        Self {
            strategy: MinimizerStrategy::GridSearch,
            grid_points: 25,
            tolerance: 1e-8,
            max_iterations: 1000,
            restarts: 64,
            seed: 0,
            merge_tolerance: 1e-2,
            max_candidates: None,
            keep_boundary_minima: false,
        }
    }
}

impl MinimizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy == MinimizerStrategy::GridSearch && self.grid_points < 2 {
            return Err(ConfigError::InvalidParameter {
                name: "grid_points",
                reason: format!(
                    "at least 2 points per dimension are needed, got {}",
                    self.grid_points
                ),
            });
        }
        if self.strategy == MinimizerStrategy::RandomRestarts && self.restarts == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "restarts",
                reason: "at least one restart is needed".to_string(),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "tolerance",
                reason: format!("must be non-negative and finite, got {}", self.tolerance),
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.merge_tolerance.is_finite() && self.merge_tolerance >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "merge_tolerance",
                reason: format!(
                    "must be non-negative and finite, got {}",
                    self.merge_tolerance
                ),
            });
        }
        if self.max_candidates == Some(0) {
            return Err(ConfigError::InvalidParameter {
                name: "max_candidates",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}

/// How the free energy of every frame is evaluated during basin selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Batching {
    #[default]
    Whole,
    /// Splits the frames into `splits` nearly equal chunks, the first `N % splits` one row
    /// larger, to bound peak memory.
    Chunked { splits: usize },
}

impl Batching {
    pub fn from_memory_saver(memory_saver: bool, splits: usize) -> Self {
        if memory_saver {
            Batching::Chunked { splits }
        } else {
            Batching::Whole
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    /// Frames whose free energy lies at least this far above their basin minimum are not selected.
    pub fes_cutoff: f64,
    pub batching: Batching,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            fes_cutoff: 5.0,
            batching: Batching::Whole,
        }
    }
}

/// Where per-frame statistical weights come from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WeightSource {
    #[default]
    Uniform,
    /// Log-weights read from a column of the collective-variable table.
    LogWeightsColumn(String),
    /// Log-weights supplied directly, one per frame.
    LogWeights(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifyConfig {
    pub selected_cvs: Vec<String>,
    pub bounds: Bounds,
    pub weights: WeightSource,
    pub bandwidth: BandwidthMethod,
    pub minimizer: MinimizerConfig,
    pub selection: SelectionConfig,
}

#[derive(Default)]
pub struct IdentifyConfigBuilder {
    selected_cvs: Option<Vec<String>>,
    bounds: Option<Bounds>,
    weights: Option<WeightSource>,
    bandwidth: Option<BandwidthMethod>,
    minimizer: Option<MinimizerConfig>,
    fes_cutoff: Option<f64>,
    batching: Option<Batching>,
}

impl IdentifyConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_cvs<S: Into<String>>(mut self, cvs: impl IntoIterator<Item = S>) -> Self {
        self.selected_cvs = Some(cvs.into_iter().map(Into::into).collect());
        self
    }
    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }
    pub fn weights(mut self, weights: WeightSource) -> Self {
        self.weights = Some(weights);
        self
    }
    pub fn bandwidth(mut self, method: BandwidthMethod) -> Self {
        self.bandwidth = Some(method);
        self
    }
    pub fn minimizer(mut self, config: MinimizerConfig) -> Self {
        self.minimizer = Some(config);
        self
    }
    pub fn fes_cutoff(mut self, cutoff: f64) -> Self {
        self.fes_cutoff = Some(cutoff);
        self
    }
    pub fn batching(mut self, batching: Batching) -> Self {
        self.batching = Some(batching);
        self
    }

    pub fn build(self) -> Result<IdentifyConfig, ConfigError> {
        let selected_cvs = self
            .selected_cvs
            .ok_or(ConfigError::MissingParameter("selected_cvs"))?;
        if selected_cvs.is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "selected_cvs",
                reason: "at least one collective variable must be selected".to_string(),
            });
        }
        let bounds = self.bounds.ok_or(ConfigError::MissingParameter("bounds"))?;
        if bounds.dim() != selected_cvs.len() {
            return Err(ConfigError::InvalidParameter {
                name: "bounds",
                reason: format!(
                    "{} ranges given for {} collective variables",
                    bounds.dim(),
                    selected_cvs.len()
                ),
            });
        }

        let minimizer = self.minimizer.unwrap_or_default();
        minimizer.validate()?;

        let defaults = SelectionConfig::default();
        let selection = SelectionConfig {
            fes_cutoff: self.fes_cutoff.unwrap_or(defaults.fes_cutoff),
            batching: self.batching.unwrap_or(defaults.batching),
        };

        Ok(IdentifyConfig {
            selected_cvs,
            bounds,
            weights: self.weights.unwrap_or_default(),
            bandwidth: self.bandwidth.unwrap_or_default(),
            minimizer,
            selection,
        })
    }
}
