#![allow(dead_code)]

use molrelax::core::constraints::ConstraintSet;
use molrelax::core::forcefield::harmonic::HarmonicWell;
use molrelax::core::forcefield::{Evaluation, EvaluationError, Evaluator};
use molrelax::core::models::document::Document;
use molrelax::engine::config::OptimizationParameters;
use molrelax::engine::progress::{Progress, ProgressReporter, ProgressStream, progress_channel};
use molrelax::workflows::command::OptimizationCommand;
use nalgebra::{Point3, Vector3};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(20);

pub fn bowl_targets() -> Vec<Point3<f64>> {
    vec![
        Point3::new(1.0, -2.0, 0.5),
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(-1.5, 1.0, 2.0),
    ]
}

pub fn bowl_start() -> Vec<Point3<f64>> {
    vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(2.0, -1.0, 0.5),
    ]
}

pub fn bowl() -> Arc<dyn Evaluator> {
    Arc::new(HarmonicWell::new(bowl_targets(), 1.0))
}

pub fn bowl_document() -> Document {
    Document::from_positions(bowl_start())
}

pub fn params(max_steps: usize) -> OptimizationParameters {
    OptimizationParameters::builder()
        .evaluator("bowl")
        .max_steps(max_steps)
        .convergence(1e-6)
        .step_size(0.5)
        .max_displacement(0.5)
        .progress_interval(1)
        .build()
        .unwrap()
}

pub fn channel() -> (ProgressReporter, ProgressStream) {
    progress_channel(4096)
}

pub fn command(
    document: &Document,
    reporter: &ProgressReporter,
    params: OptimizationParameters,
    evaluator: Arc<dyn Evaluator>,
) -> OptimizationCommand {
    OptimizationCommand::new(
        document.clone(),
        Arc::new(ConstraintSet::new()),
        params,
        evaluator,
        reporter.clone(),
    )
}

/// Wraps another evaluator and sleeps before every call.
pub struct Slow<E> {
    pub inner: E,
    pub delay: Duration,
}

impl<E: Evaluator> Evaluator for Slow<E> {
    fn name(&self) -> &str {
        "slow"
    }

    fn evaluate(
        &self,
        positions: &[Point3<f64>],
        constraints: &ConstraintSet,
    ) -> Result<Evaluation, EvaluationError> {
        thread::sleep(self.delay);
        self.inner.evaluate(positions, constraints)
    }
}

pub fn slow_bowl(delay_ms: u64) -> Arc<dyn Evaluator> {
    Arc::new(Slow {
        inner: HarmonicWell::new(bowl_targets(), 1e-4),
        delay: Duration::from_millis(delay_ms),
    })
}

/// Behaves like the wrapped evaluator until call number `fail_at` (zero-based), which
/// returns a non-finite gradient.
pub struct FailingAt<E> {
    pub inner: E,
    pub fail_at: usize,
    pub calls: AtomicUsize,
}

impl<E: Evaluator> Evaluator for FailingAt<E> {
    fn name(&self) -> &str {
        "failing"
    }

    fn evaluate(
        &self,
        positions: &[Point3<f64>],
        constraints: &ConstraintSet,
    ) -> Result<Evaluation, EvaluationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut evaluation = self.inner.evaluate(positions, constraints)?;
        if call == self.fail_at {
            evaluation.gradient[0] = Vector3::new(f64::NAN, 0.0, 0.0);
        }
        Ok(evaluation)
    }
}

/// Collects every event of `task` up to and including its terminal event.
pub fn events_until_finished(
    stream: &ProgressStream,
    task: molrelax::core::models::ids::TaskId,
) -> Vec<Progress> {
    let mut events = Vec::new();
    while let Some(event) = stream.recv_timeout(TIMEOUT) {
        if event.task() != task {
            continue;
        }
        let done = event.is_terminal();
        events.push(event);
        if done {
            break;
        }
    }
    events
}
