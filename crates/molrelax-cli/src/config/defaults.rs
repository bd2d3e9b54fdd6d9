use molrelax::core::forcefield::registry::LENNARD_JONES;
use molrelax::engine::config::{
    Algorithm, ConvergenceCriterion, DEFAULT_CONVERGENCE_EXPONENT, DEFAULT_DAMPING,
    DEFAULT_MAX_DISPLACEMENT, DEFAULT_PROGRESS_INTERVAL, DEFAULT_RESTRAINT_FORCE_CONSTANT,
    DEFAULT_STEP_SIZE, DEFAULT_TIME_STEP, GradientMode, RunMode,
};

pub struct DefaultsConfig {
    pub evaluator: String,
    pub max_steps: usize,
    pub algorithm: Algorithm,
    pub gradients: GradientMode,
    pub convergence_exponent: i32,
    pub criterion: ConvergenceCriterion,
    pub run_mode: RunMode,
    pub step_size: f64,
    pub max_displacement: f64,
    pub progress_interval: usize,
    pub time_step: f64,
    pub damping: f64,
    pub restraint_force_constant: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            evaluator: LENNARD_JONES.to_string(),
            max_steps: 500,
            algorithm: Algorithm::SteepestDescent,
            gradients: GradientMode::Analytical,
            convergence_exponent: DEFAULT_CONVERGENCE_EXPONENT,
            criterion: ConvergenceCriterion::Gradient,
            run_mode: RunMode::Minimize,
            step_size: DEFAULT_STEP_SIZE,
            max_displacement: DEFAULT_MAX_DISPLACEMENT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            time_step: DEFAULT_TIME_STEP,
            damping: DEFAULT_DAMPING,
            restraint_force_constant: DEFAULT_RESTRAINT_FORCE_CONSTANT,
        }
    }
}
