use molrelax::engine::config::OptimizationParameters;
use std::path::PathBuf;

pub struct AppConfig {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub constraints_path: Option<PathBuf>,
    pub lj_params_path: Option<PathBuf>,
    pub parameters: OptimizationParameters,
}
