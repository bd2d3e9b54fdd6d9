use super::constraint::Constraint;
use crate::core::utils::geometry::{angle_with_gradient, distance_with_gradient};
use nalgebra::{Point3, Vector3};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("Invalid constraint #{index} ({constraint}): {reason}")]
pub struct ConstraintError {
    pub index: usize,
    pub constraint: String,
    pub reason: String,
}

/// An ordered collection of constraints.
///
/// Constraints have no identity beyond their position in the list; removing one shifts the
/// indices of everything after it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    /// Creates an empty constraint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a constraint and returns its index.
    pub fn add(&mut self, constraint: Constraint) -> usize {
        self.constraints.push(constraint);
        self.constraints.len() - 1
    }

    /// Removes and returns the constraint at `index`, or `None` if out of range.
    pub fn remove(&mut self, index: usize) -> Option<Constraint> {
        (index < self.constraints.len()).then(|| self.constraints.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<&Constraint> {
        self.constraints.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
    }

    /// Checks every constraint against a structure of `particle_count` particles.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConstraintError`] found: an index out of range, the same particle
    /// referenced twice by one constraint, or a non-finite / out-of-range target.
    pub fn validate(&self, particle_count: usize) -> Result<(), ConstraintError> {
        for (index, constraint) in self.constraints.iter().enumerate() {
            let invalid = |reason: String| ConstraintError {
                index,
                constraint: constraint.to_string(),
                reason,
            };

            let particles = constraint.particles();
            if let Some(&p) = particles.iter().find(|&&p| p >= particle_count) {
                return Err(invalid(format!(
                    "particle {} does not exist (structure has {} particles)",
                    p, particle_count
                )));
            }
            let unique: HashSet<_> = particles.iter().collect();
            if unique.len() != particles.len() {
                return Err(invalid("the same particle is referenced twice".to_string()));
            }

            match *constraint {
                Constraint::Distance { target, .. } if !target.is_finite() || target < 0.0 => {
                    return Err(invalid(format!("distance target {} is not valid", target)));
                }
                Constraint::Angle { target, .. }
                    if !target.is_finite() || !(0.0..=180.0).contains(&target) =>
                {
                    return Err(invalid(format!(
                        "angle target {} is outside [0, 180] degrees",
                        target
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` if `particle` is fully frozen.
    pub fn is_fixed(&self, particle: usize) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(*c, Constraint::Fixed { particle: p } if p == particle))
    }

    /// Returns `true` if `particle` is excluded from the energy model.
    pub fn is_ignored(&self, particle: usize) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(*c, Constraint::Ignore { particle: p } if p == particle))
    }

    /// Zeroes every gradient component belonging to a frozen degree of freedom.
    ///
    /// Out-of-range particle indices are skipped; callers validate beforehand.
    pub fn mask_gradient(&self, gradient: &mut [Vector3<f64>]) {
        for constraint in &self.constraints {
            match *constraint {
                Constraint::Fixed { particle } => {
                    if let Some(g) = gradient.get_mut(particle) {
                        *g = Vector3::zeros();
                    }
                }
                Constraint::FixedAxis { particle, axis } => {
                    if let Some(g) = gradient.get_mut(particle) {
                        g[axis.index()] = 0.0;
                    }
                }
                _ => {}
            }
        }
    }

    /// Harmonic restraint energy and gradient for every distance and angle constraint.
    ///
    /// Distances contribute `k (d - d0)^2` with `d` in Angstroms; angles contribute
    /// `k (θ - θ0)^2` with `θ` in radians.
    ///
    /// # Arguments
    ///
    /// * `positions` - Current coordinates.
    /// * `force_constant` - The restraint force constant `k`.
    ///
    /// # Return
    ///
    /// The restraint energy and a gradient with one entry per particle. Degenerate geometries
    /// (coincident particles) contribute energy but no gradient.
    pub fn restraint_terms(
        &self,
        positions: &[Point3<f64>],
        force_constant: f64,
    ) -> (f64, Vec<Vector3<f64>>) {
        let mut energy = 0.0;
        let mut gradient = vec![Vector3::zeros(); positions.len()];

        for constraint in &self.constraints {
            match *constraint {
                Constraint::Distance { a, b, target } => {
                    let (Some(pa), Some(pb)) = (positions.get(a), positions.get(b)) else {
                        continue;
                    };
                    match distance_with_gradient(pa, pb) {
                        Some((d, dir)) => {
                            let delta = d - target;
                            energy += force_constant * delta * delta;
                            let g = dir * (2.0 * force_constant * delta);
                            gradient[a] += g;
                            gradient[b] -= g;
                        }
                        None => energy += force_constant * target * target,
                    }
                }
                Constraint::Angle { a, b, c, target } => {
                    let (Some(pa), Some(pb), Some(pc)) =
                        (positions.get(a), positions.get(b), positions.get(c))
                    else {
                        continue;
                    };
                    if let Some((theta, grads)) = angle_with_gradient(pa, pb, pc) {
                        let delta = theta - target.to_radians();
                        energy += force_constant * delta * delta;
                        let scale = 2.0 * force_constant * delta;
                        gradient[a] += grads[0] * scale;
                        gradient[b] += grads[1] * scale;
                        gradient[c] += grads[2] * scale;
                    }
                }
                _ => {}
            }
        }

        (energy, gradient)
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        Self {
            constraints: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ConstraintSet {
    type Item = &'a Constraint;
    type IntoIter = std::slice::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.constraints.iter()
    }
}
