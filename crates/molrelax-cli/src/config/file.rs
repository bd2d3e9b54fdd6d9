use crate::error::{CliError, Result};
use molrelax::engine::config::{Algorithm, ConvergenceCriterion, GradientMode, RunMode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileForcefieldConfig {
    pub evaluator: Option<String>,
    pub lj_params: Option<PathBuf>,
    pub restraint_force_constant: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileOptimizationConfig {
    pub max_steps: Option<usize>,
    pub algorithm: Option<Algorithm>,
    pub gradients: Option<GradientMode>,
    pub convergence: Option<f64>,
    pub convergence_exponent: Option<i32>,
    pub criterion: Option<ConvergenceCriterion>,
    pub run_mode: Option<RunMode>,
    pub step_size: Option<f64>,
    pub max_displacement: Option<f64>,
    pub progress_interval: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileDynamicsConfig {
    pub time_step: Option<f64>,
    pub damping: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub constraints: Option<PathBuf>,
    pub forcefield: Option<FileForcefieldConfig>,
    pub optimization: Option<FileOptimizationConfig>,
    pub dynamics: Option<FileDynamicsConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
