use super::evaluator::{Evaluation, EvaluationError, Evaluator, check_particle_count};
use super::params::LennardJonesParams;
use super::potentials::{
    combine_radius, combine_well_depth, lennard_jones_12_6, lennard_jones_12_6_derivative,
};
use crate::core::constraints::ConstraintSet;
use nalgebra::{Point3, Vector3};

const MIN_DISTANCE: f64 = 1e-6;

/// Pairwise 12-6 van der Waals energy over every pair of non-ignored particles.
///
/// Per-particle parameters are resolved once, at construction, from the element list of the
/// structure the evaluator will be used with.
#[derive(Debug, Clone)]
pub struct LennardJones {
    radii: Vec<f64>,
    well_depths: Vec<f64>,
    cutoff: Option<f64>,
}

impl LennardJones {
    /// Builds an evaluator for a structure with the given element symbols.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::MissingParameters`] if an element has neither a built-in
    /// entry nor an override in `params`.
    pub fn for_elements<S: AsRef<str>>(
        elements: &[S],
        params: &LennardJonesParams,
    ) -> Result<Self, EvaluationError> {
        let mut radii = Vec::with_capacity(elements.len());
        let mut well_depths = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let element = element.as_ref();
            let vdw = params.lookup(element).ok_or_else(|| {
                EvaluationError::MissingParameters(format!(
                    "no van der Waals parameters for element '{}' (particle {})",
                    element, index
                ))
            })?;
            radii.push(vdw.radius);
            well_depths.push(vdw.well_depth);
        }
        Ok(Self {
            radii,
            well_depths,
            cutoff: params.cutoff,
        })
    }

    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }
}

impl Evaluator for LennardJones {
    fn name(&self) -> &str {
        "lennard-jones"
    }

    fn evaluate(
        &self,
        positions: &[Point3<f64>],
        constraints: &ConstraintSet,
    ) -> Result<Evaluation, EvaluationError> {
        check_particle_count(self.len(), positions.len())?;

        let active: Vec<bool> = (0..positions.len())
            .map(|i| !constraints.is_ignored(i))
            .collect();
        let cutoff_sq = self.cutoff.map(|c| c * c);

        let mut energy = 0.0;
        let mut gradient = vec![Vector3::zeros(); positions.len()];

        for i in 0..positions.len() {
            if !active[i] {
                continue;
            }
            for j in (i + 1)..positions.len() {
                if !active[j] {
                    continue;
                }
                let r = positions[i] - positions[j];
                let dist_sq = r.norm_squared();
                if cutoff_sq.is_some_and(|c| dist_sq > c) {
                    continue;
                }
                let dist = dist_sq.sqrt();
                if dist < MIN_DISTANCE {
                    return Err(EvaluationError::InvalidGeometry(format!(
                        "particles {} and {} coincide",
                        i, j
                    )));
                }

                let r_min = combine_radius(self.radii[i], self.radii[j]);
                let depth = combine_well_depth(self.well_depths[i], self.well_depths[j]);
                energy += lennard_jones_12_6(dist, r_min, depth);

                let g = r * (lennard_jones_12_6_derivative(dist, r_min, depth) / dist);
                gradient[i] += g;
                gradient[j] -= g;
            }
        }

        Ok(Evaluation::new(energy, gradient))
    }
}
