use super::evaluator::{Evaluation, EvaluationError, Evaluator, check_particle_count};
use super::potentials::harmonic;
use crate::core::constraints::ConstraintSet;
use nalgebra::{Point3, Vector3};

/// A quadratic well: `E = Σ k/2 |x_i - t_i|²` with a known minimum at the targets.
#[derive(Debug, Clone)]
pub struct HarmonicWell {
    targets: Vec<Point3<f64>>,
    force_constant: f64,
}

impl HarmonicWell {
    pub fn new(targets: Vec<Point3<f64>>, force_constant: f64) -> Self {
        Self {
            targets,
            force_constant,
        }
    }

    pub fn targets(&self) -> &[Point3<f64>] {
        &self.targets
    }
}

impl Evaluator for HarmonicWell {
    fn name(&self) -> &str {
        "harmonic-well"
    }

    fn evaluate(
        &self,
        positions: &[Point3<f64>],
        constraints: &ConstraintSet,
    ) -> Result<Evaluation, EvaluationError> {
        check_particle_count(self.targets.len(), positions.len())?;

        let mut energy = 0.0;
        let mut gradient = vec![Vector3::zeros(); positions.len()];
        for (i, (x, t)) in positions.iter().zip(&self.targets).enumerate() {
            if constraints.is_ignored(i) {
                continue;
            }
            let d = x - t;
            energy += harmonic(d.norm_squared(), self.force_constant);
            gradient[i] = d * self.force_constant;
        }
        Ok(Evaluation::new(energy, gradient))
    }
}
