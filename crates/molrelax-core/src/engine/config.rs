use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[default]
    SteepestDescent,
    ConjugateGradients,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GradientMode {
    #[default]
    Analytical,
    Numerical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConvergenceCriterion {
    /// RMS gradient below the threshold.
    #[default]
    Gradient,
    /// Absolute energy change between accepted steps below the threshold.
    Energy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    #[default]
    Minimize,
    SinglePoint,
    Dynamics,
}

pub const DEFAULT_CONVERGENCE_EXPONENT: i32 = 7;
pub const DEFAULT_STEP_SIZE: f64 = 0.01;
pub const DEFAULT_MAX_DISPLACEMENT: f64 = 0.3;
pub const DEFAULT_PROGRESS_INTERVAL: usize = 5;
pub const DEFAULT_TIME_STEP: f64 = 0.01;
pub const DEFAULT_DAMPING: f64 = 0.05;
pub const DEFAULT_RESTRAINT_FORCE_CONSTANT: f64 = 100.0;

/// Converts a threshold exponent `n` into the threshold `10^-n`.
pub fn convergence_from_exponent(exponent: i32) -> f64 {
    10f64.powi(-exponent)
}

/// Configuration of one optimization run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OptimizationParameters {
    /// Id of the evaluator in the registry.
    pub evaluator: String,
    pub max_steps: usize,
    pub algorithm: Algorithm,
    pub gradients: GradientMode,
    pub convergence: f64,
    pub criterion: ConvergenceCriterion,
    pub run_mode: RunMode,
    /// Initial step length per unit gradient (Å² mol/kcal).
    pub step_size: f64,
    /// Largest distance any particle may move in one cycle (Å).
    pub max_displacement: f64,
    /// Emit a progress event every `progress_interval` cycles.
    pub progress_interval: usize,
    /// Integration time step, dynamics only.
    pub time_step: f64,
    /// Fraction of velocity removed per step, dynamics only.
    pub damping: f64,
    /// Force constant of distance and angle restraints.
    pub restraint_force_constant: f64,
}

impl OptimizationParameters {
    pub fn builder() -> OptimizationParametersBuilder {
        OptimizationParametersBuilder::new()
    }

    /// Returns `true` if runs with `self` and `other` may be folded into one history entry.
    ///
    /// Step counts, thresholds and step sizes may differ; the evaluator, algorithm, gradient
    /// mode and run mode must match.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.evaluator == other.evaluator
            && self.algorithm == other.algorithm
            && self.gradients == other.gradients
            && self.run_mode == other.run_mode
    }

    /// Checks every value for range errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::InvalidParameter {
                name,
                reason: reason.into(),
            }
        }
        fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(invalid(name, format!("{} must be positive and finite", value)))
            }
        }

        if self.evaluator.trim().is_empty() {
            return Err(invalid("evaluator", "must not be empty"));
        }
        if self.max_steps == 0 && self.run_mode != RunMode::SinglePoint {
            return Err(invalid("max_steps", "must be at least 1"));
        }
        positive("convergence", self.convergence)?;
        positive("step_size", self.step_size)?;
        positive("max_displacement", self.max_displacement)?;
        positive("time_step", self.time_step)?;
        if self.progress_interval == 0 {
            return Err(invalid("progress_interval", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.damping) {
            return Err(invalid(
                "damping",
                format!("{} is outside [0, 1)", self.damping),
            ));
        }
        if !self.restraint_force_constant.is_finite() || self.restraint_force_constant < 0.0 {
            return Err(invalid(
                "restraint_force_constant",
                format!("{} must be non-negative", self.restraint_force_constant),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct OptimizationParametersBuilder {
    evaluator: Option<String>,
    max_steps: Option<usize>,
    algorithm: Option<Algorithm>,
    gradients: Option<GradientMode>,
    convergence: Option<f64>,
    criterion: Option<ConvergenceCriterion>,
    run_mode: Option<RunMode>,
    step_size: Option<f64>,
    max_displacement: Option<f64>,
    progress_interval: Option<usize>,
    time_step: Option<f64>,
    damping: Option<f64>,
    restraint_force_constant: Option<f64>,
}

impl OptimizationParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluator(mut self, id: impl Into<String>) -> Self {
        self.evaluator = Some(id.into());
        self
    }
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }
    pub fn gradients(mut self, mode: GradientMode) -> Self {
        self.gradients = Some(mode);
        self
    }
    pub fn convergence(mut self, threshold: f64) -> Self {
        self.convergence = Some(threshold);
        self
    }
    pub fn convergence_exponent(mut self, exponent: i32) -> Self {
        self.convergence = Some(convergence_from_exponent(exponent));
        self
    }
    pub fn criterion(mut self, criterion: ConvergenceCriterion) -> Self {
        self.criterion = Some(criterion);
        self
    }
    pub fn run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = Some(mode);
        self
    }
    pub fn step_size(mut self, step: f64) -> Self {
        self.step_size = Some(step);
        self
    }
    pub fn max_displacement(mut self, distance: f64) -> Self {
        self.max_displacement = Some(distance);
        self
    }
    pub fn progress_interval(mut self, cycles: usize) -> Self {
        self.progress_interval = Some(cycles);
        self
    }
    pub fn time_step(mut self, dt: f64) -> Self {
        self.time_step = Some(dt);
        self
    }
    pub fn damping(mut self, damping: f64) -> Self {
        self.damping = Some(damping);
        self
    }
    pub fn restraint_force_constant(mut self, k: f64) -> Self {
        self.restraint_force_constant = Some(k);
        self
    }

    pub fn build(self) -> Result<OptimizationParameters, ConfigError> {
        let params = OptimizationParameters {
            evaluator: self
                .evaluator
                .ok_or(ConfigError::MissingParameter("evaluator"))?,
            max_steps: self
                .max_steps
                .ok_or(ConfigError::MissingParameter("max_steps"))?,
            algorithm: self.algorithm.unwrap_or_default(),
            gradients: self.gradients.unwrap_or_default(),
            convergence: self
                .convergence
                .unwrap_or_else(|| convergence_from_exponent(DEFAULT_CONVERGENCE_EXPONENT)),
            criterion: self.criterion.unwrap_or_default(),
            run_mode: self.run_mode.unwrap_or_default(),
            step_size: self.step_size.unwrap_or(DEFAULT_STEP_SIZE),
            max_displacement: self.max_displacement.unwrap_or(DEFAULT_MAX_DISPLACEMENT),
            progress_interval: self.progress_interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL),
            time_step: self.time_step.unwrap_or(DEFAULT_TIME_STEP),
            damping: self.damping.unwrap_or(DEFAULT_DAMPING),
            restraint_force_constant: self
                .restraint_force_constant
                .unwrap_or(DEFAULT_RESTRAINT_FORCE_CONSTANT),
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> OptimizationParametersBuilder {
        OptimizationParameters::builder()
            .evaluator("lennard-jones")
            .max_steps(100)
    }

    #[test]
    fn builder_succeeds_with_required_fields_and_fills_defaults() {
        let params = base().build().unwrap();
        assert_eq!(params.algorithm, Algorithm::SteepestDescent);
        assert_eq!(params.gradients, GradientMode::Analytical);
        assert_eq!(params.run_mode, RunMode::Minimize);
        assert_eq!(params.convergence, 1e-7);
        assert_eq!(params.progress_interval, DEFAULT_PROGRESS_INTERVAL);
    }

    #[test]
    fn builder_fails_if_required_fields_are_missing() {
        let result = OptimizationParameters::builder().max_steps(10).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("evaluator")));

        let result = OptimizationParameters::builder().evaluator("x").build();
        assert_eq!(result, Err(ConfigError::MissingParameter("max_steps")));
    }

    #[test]
    fn builder_rejects_out_of_range_values() {
        let err = base().progress_interval(0).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                name: "progress_interval",
                ..
            }
        ));
        assert!(base().convergence(-1.0).build().is_err());
        assert!(base().step_size(f64::NAN).build().is_err());
        assert!(base().damping(1.0).build().is_err());
        assert!(base().max_steps(0).build().is_err());
        assert!(
            base()
                .max_steps(0)
                .run_mode(RunMode::SinglePoint)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn convergence_exponent_maps_to_power_of_ten() {
        assert_eq!(convergence_from_exponent(0), 1.0);
        assert_eq!(convergence_from_exponent(3), 1e-3);
        assert_eq!(base().convergence_exponent(4).build().unwrap().convergence, 1e-4);
    }

    #[test]
    fn compatibility_ignores_step_counts_and_thresholds() {
        let a = base().build().unwrap();
        let b = base().max_steps(500).convergence(1e-3).build().unwrap();
        assert!(a.is_compatible_with(&b));

        let c = base()
            .algorithm(Algorithm::ConjugateGradients)
            .build()
            .unwrap();
        assert!(!a.is_compatible_with(&c));

        let d = base().evaluator("other").build().unwrap();
        assert!(!a.is_compatible_with(&d));
    }

    #[test]
    fn enums_serialize_in_kebab_case() {
        let params = base()
            .algorithm(Algorithm::ConjugateGradients)
            .run_mode(RunMode::SinglePoint)
            .build()
            .unwrap();
        let text = toml::to_string(&params).unwrap();
        assert!(text.contains("algorithm = \"conjugate-gradients\""));
        assert!(text.contains("run-mode = \"single-point\""));

        let back: OptimizationParameters = toml::from_str(&text).unwrap();
        assert_eq!(back, params);
    }
}
