use crate::error::{CliError, Result};
use serde::Deserialize;
use statescope::core::density::bandwidth::BandwidthMethod;
use statescope::engine::config::MinimizerStrategy;
use std::path::Path;
use tracing::debug;

/// A bandwidth given either as a rule name or as a fixed factor.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileBandwidth {
    Factor(f64),
    Rule(String),
}

impl TryFrom<FileBandwidth> for BandwidthMethod {
    type Error = CliError;

    fn try_from(value: FileBandwidth) -> Result<Self> {
        match value {
            FileBandwidth::Factor(f) => Ok(BandwidthMethod::Factor(f)),
            FileBandwidth::Rule(name) => name
                .parse()
                .map_err(|e| CliError::Config(format!("fes.bandwidth: {e}"))),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileFesConfig {
    pub kbt: Option<f64>,
    pub bandwidth: Option<FileBandwidth>,
    pub grid_points: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileMinimizerConfig {
    pub strategy: Option<MinimizerStrategy>,
    pub grid_points: Option<usize>,
    pub tolerance: Option<f64>,
    pub max_iterations: Option<usize>,
    pub restarts: Option<usize>,
    pub seed: Option<u64>,
    pub merge_tolerance: Option<f64>,
    pub max_candidates: Option<usize>,
    pub keep_boundary_minima: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSelectionConfig {
    pub fes_cutoff: Option<f64>,
    pub memory_saver: Option<bool>,
    pub splits: Option<usize>,
}

/// Every value of the TOML configuration file is optional; the builder layers
/// command-line flags on top and falls back to [`super::defaults::DefaultsConfig`].
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub cvs: Option<Vec<String>>,
    pub bounds: Option<Vec<[f64; 2]>>,
    pub stride: Option<usize>,
    pub logweights: Option<String>,
    pub fes: Option<FileFesConfig>,
    pub minimizer: Option<FileMinimizerConfig>,
    pub selection: Option<FileSelectionConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
