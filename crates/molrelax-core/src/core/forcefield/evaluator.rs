use crate::core::constraints::ConstraintSet;
use crate::core::utils::geometry;
use nalgebra::{Point3, Vector3};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Particle count mismatch: evaluator expects {expected}, got {found}")]
    ParticleCountMismatch { expected: usize, found: usize },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Non-finite {0} encountered")]
    NonFinite(&'static str),

    #[error("Evaluation diverged: {0}")]
    Diverged(String),

    #[error("Missing parameters: {0}")]
    MissingParameters(String),
}

/// Energy and gradient of one geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Total energy in kcal/mol.
    pub energy: f64,
    /// dE/dx for every particle, in kcal/(mol·Å).
    pub gradient: Vec<Vector3<f64>>,
}

impl Evaluation {
    pub fn new(energy: f64, gradient: Vec<Vector3<f64>>) -> Self {
        Self { energy, gradient }
    }

    /// Returns `true` if the energy and every gradient component are finite.
    pub fn is_finite(&self) -> bool {
        self.energy.is_finite()
            && self
                .gradient
                .iter()
                .all(|g| g.iter().all(|c| c.is_finite()))
    }

    /// Root-mean-square of the gradient over all 3N components.
    pub fn rms_gradient(&self) -> f64 {
        geometry::rms(&self.gradient)
    }
}

/// A pluggable energy model.
///
/// Evaluators are shared with the background worker thread, so they must be `Send + Sync` and
/// must not rely on interior state that changes between calls.
pub trait Evaluator: Send + Sync {
    /// A short identifier used in logs and progress messages.
    fn name(&self) -> &str;

    /// Computes the energy and gradient of `positions`.
    ///
    /// # Arguments
    ///
    /// * `positions` - Current coordinates, one per particle.
    /// * `constraints` - The active constraint set. Evaluators skip ignored particles; frozen
    ///   degrees of freedom are masked by the engine, not here.
    ///
    /// # Errors
    ///
    /// Returns an [`EvaluationError`] if the geometry cannot be evaluated.
    fn evaluate(
        &self,
        positions: &[Point3<f64>],
        constraints: &ConstraintSet,
    ) -> Result<Evaluation, EvaluationError>;

    /// Computes only the energy. The default delegates to [`Evaluator::evaluate`].
    fn energy(
        &self,
        positions: &[Point3<f64>],
        constraints: &ConstraintSet,
    ) -> Result<f64, EvaluationError> {
        self.evaluate(positions, constraints).map(|e| e.energy)
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluate(
        &self,
        positions: &[Point3<f64>],
        constraints: &ConstraintSet,
    ) -> Result<Evaluation, EvaluationError> {
        (**self).evaluate(positions, constraints)
    }

    fn energy(
        &self,
        positions: &[Point3<f64>],
        constraints: &ConstraintSet,
    ) -> Result<f64, EvaluationError> {
        (**self).energy(positions, constraints)
    }
}

pub(crate) fn check_particle_count(expected: usize, found: usize) -> Result<(), EvaluationError> {
    if expected != found {
        return Err(EvaluationError::ParticleCountMismatch { expected, found });
    }
    Ok(())
}
