mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{build_energy_config, build_optimize_config};
pub use models::AppConfig;
