use super::config::{Algorithm, ConvergenceCriterion, OptimizationParameters};
use crate::core::constraints::ConstraintSet;
use crate::core::forcefield::{EvaluationError, Evaluator};
use crate::core::utils::geometry::{max_norm, rms};
use nalgebra::{Point3, Vector3};

const STEP_GROWTH: f64 = 1.2;
const STEP_SHRINK: f64 = 0.5;
const MAX_STEP_FACTOR: f64 = 10.0;
const MIN_STEP_FACTOR: f64 = 1e-8;
const FINITE_DIFFERENCE_STEP: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Positions were updated; keep iterating.
    Moved,
    /// The current geometry satisfies the convergence criterion. Positions are untouched.
    Converged,
    /// No step size lowers the energy any further; positions were reset to the best geometry.
    Stalled,
}

#[derive(Debug, Clone)]
struct Accepted {
    positions: Vec<Point3<f64>>,
    energy: f64,
    gradient: Vec<Vector3<f64>>,
}

/// Energy minimizer performing one evaluation per cycle.
///
/// Every cycle hands it the energy and (masked) gradient of the current positions. A
/// geometry whose energy did not rise is accepted, checked for convergence and used for the
/// next move, and the step grows. A geometry whose energy rose is rejected: the positions go
/// back to the last accepted geometry and the step is halved.
#[derive(Debug, Clone)]
pub struct Minimizer {
    algorithm: Algorithm,
    criterion: ConvergenceCriterion,
    threshold: f64,
    step: f64,
    initial_step: f64,
    max_displacement: f64,
    accepted: Option<Accepted>,
    direction: Vec<Vector3<f64>>,
}

impl Minimizer {
    pub fn new(params: &OptimizationParameters) -> Self {
        Self {
            algorithm: params.algorithm,
            criterion: params.criterion,
            threshold: params.convergence,
            step: params.step_size,
            initial_step: params.step_size,
            max_displacement: params.max_displacement,
            accepted: None,
            direction: Vec::new(),
        }
    }

    /// Energy of the last accepted geometry.
    pub fn best_energy(&self) -> Option<f64> {
        self.accepted.as_ref().map(|a| a.energy)
    }

    pub fn step_size(&self) -> f64 {
        self.step
    }

    /// Processes the evaluation of `positions` and moves them for the next cycle.
    ///
    /// # Arguments
    ///
    /// * `positions` - The geometry that was just evaluated; updated in place.
    /// * `energy` - Its energy.
    /// * `gradient` - Its gradient, with frozen degrees of freedom already zeroed.
    pub fn step(
        &mut self,
        positions: &mut [Point3<f64>],
        energy: f64,
        gradient: &[Vector3<f64>],
    ) -> StepOutcome {
        let previous = self.accepted.take();

        let Some(previous) = previous else {
            let current = Accepted {
                positions: positions.to_vec(),
                energy,
                gradient: gradient.to_vec(),
            };
            if self.criterion == ConvergenceCriterion::Gradient && rms(gradient) < self.threshold {
                self.accepted = Some(current);
                return StepOutcome::Converged;
            }
            self.direction = gradient.iter().map(|g| -g).collect();
            self.accepted = Some(current);
            self.advance(positions);
            return StepOutcome::Moved;
        };

        if energy > previous.energy {
            positions.copy_from_slice(&previous.positions);
            self.step *= STEP_SHRINK;
            if self.step < self.initial_step * MIN_STEP_FACTOR {
                self.accepted = Some(previous);
                return StepOutcome::Stalled;
            }
            self.direction = previous.gradient.iter().map(|g| -g).collect();
            self.accepted = Some(previous);
            self.advance(positions);
            return StepOutcome::Moved;
        }

        let converged = match self.criterion {
            ConvergenceCriterion::Gradient => rms(gradient) < self.threshold,
            ConvergenceCriterion::Energy => (previous.energy - energy).abs() < self.threshold,
        };
        if converged {
            self.accepted = Some(Accepted {
                positions: positions.to_vec(),
                energy,
                gradient: gradient.to_vec(),
            });
            return StepOutcome::Converged;
        }

        self.step = (self.step * STEP_GROWTH).min(self.initial_step * MAX_STEP_FACTOR);
        self.direction = match self.algorithm {
            Algorithm::SteepestDescent => gradient.iter().map(|g| -g).collect(),
            Algorithm::ConjugateGradients => {
                polak_ribiere_direction(gradient, &previous.gradient, &self.direction)
            }
        };
        self.accepted = Some(Accepted {
            positions: positions.to_vec(),
            energy,
            gradient: gradient.to_vec(),
        });
        self.advance(positions);
        StepOutcome::Moved
    }

    fn advance(&self, positions: &mut [Point3<f64>]) {
        let mut displacement: Vec<Vector3<f64>> =
            self.direction.iter().map(|d| d * self.step).collect();
        clamp_displacement(&mut displacement, self.max_displacement);
        for (p, d) in positions.iter_mut().zip(&displacement) {
            *p += d;
        }
    }
}

/// Polak–Ribière direction with automatic restart (PR+).
fn polak_ribiere_direction(
    gradient: &[Vector3<f64>],
    previous_gradient: &[Vector3<f64>],
    previous_direction: &[Vector3<f64>],
) -> Vec<Vector3<f64>> {
    let denominator: f64 = previous_gradient.iter().map(|g| g.norm_squared()).sum();
    let numerator: f64 = gradient
        .iter()
        .zip(previous_gradient)
        .map(|(g, p)| g.dot(&(g - p)))
        .sum();
    let beta = if denominator > 0.0 {
        (numerator / denominator).max(0.0)
    } else {
        0.0
    };

    let direction: Vec<Vector3<f64>> = gradient
        .iter()
        .zip(previous_direction)
        .map(|(g, d)| -g + d * beta)
        .collect();
    let slope: f64 = direction.iter().zip(gradient).map(|(d, g)| d.dot(g)).sum();
    if slope >= 0.0 {
        gradient.iter().map(|g| -g).collect()
    } else {
        direction
    }
}

/// Scales `displacement` uniformly so no entry is longer than `max`.
pub fn clamp_displacement(displacement: &mut [Vector3<f64>], max: f64) {
    let longest = max_norm(displacement);
    if longest > max {
        let scale = max / longest;
        for d in displacement.iter_mut() {
            *d *= scale;
        }
    }
}

/// Damped velocity-Verlet integration with unit masses.
#[derive(Debug, Clone)]
pub struct Integrator {
    time_step: f64,
    damping: f64,
    max_displacement: f64,
    velocities: Vec<Vector3<f64>>,
    acceleration: Option<Vec<Vector3<f64>>>,
}

impl Integrator {
    pub fn new(params: &OptimizationParameters, particle_count: usize) -> Self {
        Self {
            time_step: params.time_step,
            damping: params.damping,
            max_displacement: params.max_displacement,
            velocities: vec![Vector3::zeros(); particle_count],
            acceleration: None,
        }
    }

    pub fn velocities(&self) -> &[Vector3<f64>] {
        &self.velocities
    }

    /// Completes the velocity update for the evaluated `positions` and advances them.
    pub fn step(&mut self, positions: &mut [Point3<f64>], gradient: &[Vector3<f64>]) {
        let dt = self.time_step;
        let acceleration: Vec<Vector3<f64>> = gradient.iter().map(|g| -g).collect();

        if let Some(previous) = &self.acceleration {
            let keep = 1.0 - self.damping;
            for ((v, a0), a1) in self.velocities.iter_mut().zip(previous).zip(&acceleration) {
                *v = (*v + (a0 + a1) * (0.5 * dt)) * keep;
            }
        }

        let mut displacement: Vec<Vector3<f64>> = self
            .velocities
            .iter()
            .zip(&acceleration)
            .map(|(v, a)| v * dt + a * (0.5 * dt * dt))
            .collect();
        clamp_displacement(&mut displacement, self.max_displacement);
        for (p, d) in positions.iter_mut().zip(&displacement) {
            *p += d;
        }
        self.acceleration = Some(acceleration);
    }
}

/// Central-difference gradient built from energy-only evaluations.
///
/// Costs `6N` energy evaluations.
pub fn numerical_gradient(
    evaluator: &dyn Evaluator,
    positions: &[Point3<f64>],
    constraints: &ConstraintSet,
) -> Result<Vec<Vector3<f64>>, EvaluationError> {
    let h = FINITE_DIFFERENCE_STEP;
    let mut probe = positions.to_vec();
    let mut gradient = vec![Vector3::zeros(); positions.len()];
    for i in 0..positions.len() {
        for k in 0..3 {
            let original = probe[i][k];
            probe[i][k] = original + h;
            let plus = evaluator.energy(&probe, constraints)?;
            probe[i][k] = original - h;
            let minus = evaluator.energy(&probe, constraints)?;
            probe[i][k] = original;
            gradient[i][k] = (plus - minus) / (2.0 * h);
        }
    }
    Ok(gradient)
}
