use super::evaluator::{Evaluation, EvaluationError, Evaluator};
use crate::core::constraints::ConstraintSet;
use nalgebra::Point3;

/// Adds the constraint set's distance and angle restraints to another evaluator.
///
/// The restraint terms are harmonic penalties with force constant `k`; see
/// [`ConstraintSet::restraint_terms`].
#[derive(Debug, Clone)]
pub struct Restrained<E> {
    inner: E,
    force_constant: f64,
}

impl<E: Evaluator> Restrained<E> {
    pub fn new(inner: E, force_constant: f64) -> Self {
        Self {
            inner,
            force_constant,
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn force_constant(&self) -> f64 {
        self.force_constant
    }
}

impl<E: Evaluator> Evaluator for Restrained<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn evaluate(
        &self,
        positions: &[Point3<f64>],
        constraints: &ConstraintSet,
    ) -> Result<Evaluation, EvaluationError> {
        let mut evaluation = self.inner.evaluate(positions, constraints)?;
        let (energy, gradient) = constraints.restraint_terms(positions, self.force_constant);
        evaluation.energy += energy;
        for (total, extra) in evaluation.gradient.iter_mut().zip(gradient) {
            *total += extra;
        }
        Ok(evaluation)
    }

    fn energy(
        &self,
        positions: &[Point3<f64>],
        constraints: &ConstraintSet,
    ) -> Result<f64, EvaluationError> {
        let (restraint, _) = constraints.restraint_terms(positions, self.force_constant);
        Ok(self.inner.energy(positions, constraints)? + restraint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraints::Constraint;
    use crate::core::forcefield::harmonic::HarmonicWell;

    #[test]
    fn restraints_add_to_inner_energy_and_gradient() {
        let targets = vec![Point3::origin(), Point3::new(2.0, 0.0, 0.0)];
        let restrained = Restrained::new(HarmonicWell::new(targets.clone(), 1.0), 5.0);
        let constraints: ConstraintSet = [Constraint::Distance {
            a: 0,
            b: 1,
            target: 1.0,
        }]
        .into_iter()
        .collect();

        let eval = restrained.evaluate(&targets, &constraints).unwrap();
        assert!((eval.energy - 5.0).abs() < 1e-12);
        assert!((eval.gradient[0].x + 10.0).abs() < 1e-12);
        assert!((eval.gradient[1].x - 10.0).abs() < 1e-12);
        assert_eq!(restrained.name(), "harmonic-well");
    }

    #[test]
    fn without_restraints_the_inner_result_is_unchanged() {
        let targets = vec![Point3::origin()];
        let well = HarmonicWell::new(targets, 1.0);
        let positions = [Point3::new(1.0, 1.0, 1.0)];
        let plain = well.evaluate(&positions, &ConstraintSet::new()).unwrap();
        let restrained = Restrained::new(well, 100.0)
            .evaluate(&positions, &ConstraintSet::new())
            .unwrap();
        assert_eq!(plain, restrained);
    }
}
