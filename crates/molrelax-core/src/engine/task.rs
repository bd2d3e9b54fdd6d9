use super::cancel::CancellationToken;
use super::config::{GradientMode, OptimizationParameters, RunMode};
use super::error::EngineError;
use super::optimizer::{Integrator, Minimizer, StepOutcome, numerical_gradient};
use super::progress::{Progress, ProgressReporter};
use super::state::{TaskOutcome, TaskReport, TaskState, TerminalState};
use crate::core::constraints::ConstraintSet;
use crate::core::forcefield::restraint::Restrained;
use crate::core::forcefield::{Evaluation, EvaluationError, Evaluator};
use crate::core::models::document::{Document, RunGuard};
use crate::core::models::ids::TaskId;
use nalgebra::Point3;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Everything a run needs, captured by value when it starts.
#[derive(Clone)]
pub struct OptimizationJob {
    pub document: Document,
    pub constraints: Arc<ConstraintSet>,
    pub parameters: OptimizationParameters,
    pub evaluator: Arc<dyn Evaluator>,
}

impl fmt::Debug for OptimizationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizationJob")
            .field("document", &self.document)
            .field("constraints", &self.constraints.len())
            .field("parameters", &self.parameters)
            .field("evaluator", &self.evaluator.name())
            .finish()
    }
}

/// Handle to a background optimization run.
///
/// The run itself lives on its own thread and owns the document's run lock for its whole
/// lifetime. The handle only observes and steers it: dropping or detaching the handle never
/// stops the run, and the run never touches the handle.
#[derive(Debug)]
pub struct OptimizationTask {
    id: TaskId,
    token: CancellationToken,
    document: Document,
    handle: Option<JoinHandle<TaskReport>>,
    report: Option<TaskReport>,
}

impl OptimizationTask {
    /// Acquires the document's run lock and starts a run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Document`] if another task holds the run lock, or
    /// [`EngineError::Spawn`] if the worker thread cannot be created.
    pub fn start(job: OptimizationJob, reporter: ProgressReporter) -> Result<Self, EngineError> {
        let guard = job
            .document
            .try_begin_run(TaskId::next(), CancellationToken::new())?;
        Self::spawn(job, guard, reporter)
    }

    /// Starts a run on a worker thread, handing it the run lock held by `guard`.
    ///
    /// Returns as soon as the thread exists. If spawning fails the guard is dropped and the
    /// lock released.
    pub fn spawn(
        job: OptimizationJob,
        guard: RunGuard,
        reporter: ProgressReporter,
    ) -> Result<Self, EngineError> {
        let id = guard.task();
        let token = guard.token().clone();
        let document = job.document.clone();

        let handle = thread::Builder::new()
            .name(format!("molrelax-{}", id))
            .spawn(move || run(job, guard, reporter))
            .map_err(|source| EngineError::Spawn { task: id, source })?;

        Ok(Self {
            id,
            token,
            document,
            handle: Some(handle),
            report: None,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Asks the run to stop at its next checkpoint. Idempotent; a no-op once finished.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` while the run still holds the document's run lock.
    ///
    /// Once this turns `false` the document holds the run's final geometry, even if the
    /// worker thread has not exited yet.
    pub fn is_active(&self) -> bool {
        self.document.active_task() == Some(self.id)
    }

    /// Returns `true` once the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.report.is_some() || self.handle.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// The report of a run that has already been joined.
    pub fn report(&self) -> Option<&TaskReport> {
        self.report.as_ref()
    }

    /// Blocks until the worker exits and returns its report. Joins at most once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkerPanicked`] if the worker died outside the guarded
    /// iteration loop.
    pub fn wait(&mut self) -> Result<&TaskReport, EngineError> {
        if let Some(handle) = self.handle.take() {
            let report = handle
                .join()
                .map_err(|_| EngineError::WorkerPanicked(self.id))?;
            self.report = Some(report);
        }
        self.report
            .as_ref()
            .ok_or(EngineError::WorkerPanicked(self.id))
    }

    /// Gives up the handle without waiting. The run continues and cleans up after itself.
    pub fn detach(mut self) {
        if self.handle.take().is_some() {
            debug!(task = %self.id, "Task detached from its handle.");
        }
    }
}

#[derive(Debug, Default)]
struct RunProgress {
    cycles: usize,
    energy: Option<f64>,
}

enum Propagator {
    Minimizer(Minimizer),
    Integrator(Integrator),
}

impl Propagator {
    fn advance(&mut self, positions: &mut [Point3<f64>], evaluation: &Evaluation) -> StepOutcome {
        match self {
            Propagator::Minimizer(m) => m.step(positions, evaluation.energy, &evaluation.gradient),
            Propagator::Integrator(i) => {
                i.step(positions, &evaluation.gradient);
                StepOutcome::Moved
            }
        }
    }

    fn reported_energy(&self, current: f64) -> f64 {
        match self {
            Propagator::Minimizer(m) => m.best_energy().unwrap_or(current),
            Propagator::Integrator(_) => current,
        }
    }
}

fn run(job: OptimizationJob, guard: RunGuard, reporter: ProgressReporter) -> TaskReport {
    let task = guard.task();
    let document = job.document.clone();
    info!(
        %task,
        document = %document.id(),
        evaluator = job.evaluator.name(),
        mode = ?job.parameters.run_mode,
        max_steps = job.parameters.max_steps,
        "Optimization started."
    );
    let max_steps = match job.parameters.run_mode {
        RunMode::SinglePoint => 0,
        _ => job.parameters.max_steps,
    };
    reporter.report(Progress::Started { task, max_steps });

    let mut progress = RunProgress::default();
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
        drive(&job, &guard, &reporter, &mut progress)
    })) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(%task, cycles = progress.cycles, "Evaluator panicked: {}", message);
            TaskOutcome::new(TerminalState::Aborted, progress.cycles, progress.energy)
                .with_message(format!("evaluator panicked: {}", message))
        }
    };

    let geometry = document.snapshot();
    drop(guard);

    if outcome.state.is_error() {
        warn!(
            %task,
            cycles = outcome.cycles,
            "Optimization aborted: {}",
            outcome.message.as_deref().unwrap_or("unknown error")
        );
    } else {
        info!(
            %task,
            state = %outcome.state,
            cycles = outcome.cycles,
            energy = ?outcome.energy,
            "Optimization finished."
        );
    }
    reporter.report(Progress::Finished {
        task,
        outcome: outcome.clone(),
    });

    TaskReport { outcome, geometry }
}

fn terminate(
    task: TaskId,
    state: &mut TaskState,
    terminal: TerminalState,
    progress: &RunProgress,
) -> TaskOutcome {
    if let Err(e) = state.transition(TaskState::Terminated(terminal)) {
        warn!(%task, "Ignoring invalid state transition: {:?}", e);
    }
    TaskOutcome::new(terminal, progress.cycles, progress.energy)
}

fn drive(
    job: &OptimizationJob,
    guard: &RunGuard,
    reporter: &ProgressReporter,
    progress: &mut RunProgress,
) -> TaskOutcome {
    let task = guard.task();
    let token = guard.token();
    let params = &job.parameters;
    let constraints = job.constraints.as_ref();
    let evaluator = Restrained::new(job.evaluator.clone(), params.restraint_force_constant);
    let mut state = TaskState::Idle;

    if let Err(e) = constraints.validate(job.document.len()) {
        return terminate(task, &mut state, TerminalState::Aborted, progress)
            .with_message(e.to_string());
    }
    if token.is_cancelled() {
        return terminate(task, &mut state, TerminalState::Cancelled, progress);
    }
    if let Err(e) = state.transition(TaskState::Running) {
        warn!(%task, "Ignoring invalid state transition: {:?}", e);
    }

    let mut positions = job.document.positions();

    if params.run_mode == RunMode::SinglePoint {
        return match evaluate(&evaluator, params.gradients, constraints, &positions) {
            Ok(evaluation) => {
                progress.energy = Some(evaluation.energy);
                terminate(task, &mut state, TerminalState::Converged, progress)
            }
            Err(e) => terminate(task, &mut state, TerminalState::Aborted, progress)
                .with_message(e.to_string()),
        };
    }

    let mut propagator = match params.run_mode {
        RunMode::Dynamics => Propagator::Integrator(Integrator::new(params, positions.len())),
        _ => Propagator::Minimizer(Minimizer::new(params)),
    };

    loop {
        if token.is_cancelled() {
            return terminate(task, &mut state, TerminalState::Cancelled, progress);
        }
        if progress.cycles >= params.max_steps {
            return terminate(task, &mut state, TerminalState::StepLimitReached, progress);
        }

        let evaluation = match evaluate(&evaluator, params.gradients, constraints, &positions) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                return terminate(task, &mut state, TerminalState::Aborted, progress)
                    .with_message(e.to_string());
            }
        };

        let step = propagator.advance(&mut positions, &evaluation);
        if positions.iter().any(|p| p.iter().any(|c| !c.is_finite())) {
            let e = EvaluationError::Diverged(format!(
                "non-finite coordinates after cycle {}",
                progress.cycles + 1
            ));
            return terminate(task, &mut state, TerminalState::Aborted, progress)
                .with_message(e.to_string());
        }
        if let Err(e) = job.document.publish(guard, &positions) {
            return terminate(task, &mut state, TerminalState::Aborted, progress)
                .with_message(e.to_string());
        }

        progress.cycles += 1;
        progress.energy = Some(propagator.reported_energy(evaluation.energy));

        if progress.cycles % params.progress_interval == 0 {
            debug!(%task, cycle = progress.cycles, energy = evaluation.energy, "Optimization step.");
            reporter.report(Progress::Step {
                task,
                cycle: progress.cycles,
                energy: evaluation.energy,
            });
        }

        if token.is_cancelled() {
            return terminate(task, &mut state, TerminalState::Cancelled, progress);
        }
        match step {
            StepOutcome::Moved => {}
            StepOutcome::Converged => {
                return terminate(task, &mut state, TerminalState::Converged, progress);
            }
            StepOutcome::Stalled => {
                debug!(%task, cycle = progress.cycles, "Step size collapsed at a minimum.");
                return terminate(task, &mut state, TerminalState::Converged, progress);
            }
        }
    }
}

/// Evaluates `positions` and masks frozen degrees of freedom out of the gradient.
fn evaluate(
    evaluator: &dyn Evaluator,
    mode: GradientMode,
    constraints: &ConstraintSet,
    positions: &[Point3<f64>],
) -> Result<Evaluation, EvaluationError> {
    let mut evaluation = match mode {
        GradientMode::Analytical => evaluator.evaluate(positions, constraints)?,
        GradientMode::Numerical => {
            let energy = evaluator.energy(positions, constraints)?;
            let gradient = numerical_gradient(evaluator, positions, constraints)?;
            Evaluation::new(energy, gradient)
        }
    };

    if !evaluation.energy.is_finite() {
        return Err(EvaluationError::NonFinite("energy"));
    }
    if !evaluation.is_finite() {
        return Err(EvaluationError::NonFinite("gradient"));
    }
    constraints.mask_gradient(&mut evaluation.gradient);
    Ok(evaluation)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraints::Constraint;
    use crate::core::forcefield::harmonic::HarmonicWell;
    use crate::engine::progress::progress_channel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    struct Panicking;

    impl Evaluator for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn evaluate(
            &self,
            _positions: &[Point3<f64>],
            _constraints: &ConstraintSet,
        ) -> Result<Evaluation, EvaluationError> {
            panic!("boom")
        }
    }

    struct Slow {
        inner: HarmonicWell,
        calls: AtomicUsize,
    }

    impl Evaluator for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn evaluate(
            &self,
            positions: &[Point3<f64>],
            constraints: &ConstraintSet,
        ) -> Result<Evaluation, EvaluationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            self.inner.evaluate(positions, constraints)
        }
    }

    fn job(evaluator: Arc<dyn Evaluator>, params: OptimizationParameters) -> OptimizationJob {
        OptimizationJob {
            document: Document::from_positions(vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 1.0),
            ]),
            constraints: Arc::new(ConstraintSet::new()),
            parameters: params,
            evaluator,
        }
    }

    fn bowl() -> Arc<dyn Evaluator> {
        Arc::new(HarmonicWell::new(
            vec![Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 2.0, 0.0)],
            1.0,
        ))
    }

    fn params() -> OptimizationParameters {
        OptimizationParameters::builder()
            .evaluator("bowl")
            .max_steps(500)
            .convergence(1e-8)
            .step_size(0.5)
            .progress_interval(1)
            .build()
            .unwrap()
    }

    #[test]
    fn minimization_converges_and_releases_the_lock() {
        let (reporter, stream) = progress_channel(1024);
        let job = job(bowl(), params());
        let document = job.document.clone();
        let mut task = OptimizationTask::start(job, reporter).unwrap();
        let report = task.wait().unwrap().clone();

        assert_eq!(report.outcome.state, TerminalState::Converged);
        assert!(report.outcome.cycles > 0);
        assert!(!document.is_busy());
        assert!(report.geometry.matches(&document.positions()));
        assert!(task.is_finished());

        let events = stream.drain();
        assert!(matches!(events.first(), Some(Progress::Started { .. })));
        assert!(events.last().unwrap().is_terminal());
        let cycles: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Progress::Step { cycle, .. } => Some(*cycle),
                _ => None,
            })
            .collect();
        assert!(cycles.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn single_point_evaluates_once_without_moving() {
        let (reporter, _stream) = progress_channel(16);
        let mut p = params();
        p.run_mode = RunMode::SinglePoint;
        let job = job(bowl(), p);
        let before = job.document.snapshot();
        let document = job.document.clone();
        let mut task = OptimizationTask::start(job, reporter).unwrap();
        let outcome = task.wait().unwrap().outcome.clone();

        assert_eq!(outcome.state, TerminalState::Converged);
        assert_eq!(outcome.cycles, 0);
        // (|(-1, 0, 0)|² + |(1, -1, 1)|²) / 2
        assert_eq!(outcome.energy, Some(2.0));
        assert!(before.matches(&document.positions()));
    }

    #[test]
    fn dynamics_runs_to_the_step_limit() {
        let (reporter, _stream) = progress_channel(16);
        let mut p = params();
        p.run_mode = RunMode::Dynamics;
        p.max_steps = 25;
        let mut task = OptimizationTask::start(job(bowl(), p), reporter).unwrap();
        let outcome = &task.wait().unwrap().outcome;
        assert_eq!(outcome.state, TerminalState::StepLimitReached);
        assert_eq!(outcome.cycles, 25);
    }

    #[test]
    fn evaluator_panic_is_reported_as_aborted() {
        let (reporter, stream) = progress_channel(16);
        let job = job(Arc::new(Panicking), params());
        let document = job.document.clone();
        let mut task = OptimizationTask::start(job, reporter).unwrap();
        let outcome = task.wait().unwrap().outcome.clone();

        assert_eq!(outcome.state, TerminalState::Aborted);
        assert_eq!(outcome.cycles, 0);
        assert!(outcome.message.unwrap().contains("boom"));
        assert!(!document.is_busy());
        assert!(
            stream
                .wait_for_finish(task.id(), TIMEOUT)
                .is_some_and(|o| o.state.is_error())
        );
    }

    #[test]
    fn invalid_constraints_abort_before_the_first_cycle() {
        let (reporter, _stream) = progress_channel(16);
        let mut job = job(bowl(), params());
        job.constraints = Arc::new([Constraint::Fixed { particle: 9 }].into_iter().collect());
        let mut task = OptimizationTask::start(job, reporter).unwrap();
        let outcome = &task.wait().unwrap().outcome;
        assert_eq!(outcome.state, TerminalState::Aborted);
        assert_eq!(outcome.cycles, 0);
    }

    #[test]
    fn fixed_particles_do_not_move() {
        let (reporter, _stream) = progress_channel(16);
        let mut job = job(bowl(), params());
        job.constraints = Arc::new([Constraint::Fixed { particle: 0 }].into_iter().collect());
        let document = job.document.clone();
        let mut task = OptimizationTask::start(job, reporter).unwrap();
        assert_eq!(task.wait().unwrap().outcome.state, TerminalState::Converged);

        let positions = document.positions();
        assert_eq!(positions[0], Point3::origin());
        assert!((positions[1] - Point3::new(0.0, 2.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn numerical_gradients_reach_the_same_minimum() {
        let (reporter, _stream) = progress_channel(16);
        let mut p = params();
        p.gradients = GradientMode::Numerical;
        p.convergence = 1e-6;
        let job = job(bowl(), p);
        let document = job.document.clone();
        let mut task = OptimizationTask::start(job, reporter).unwrap();
        assert_eq!(task.wait().unwrap().outcome.state, TerminalState::Converged);
        assert!((document.positions()[0] - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn start_is_refused_while_another_task_holds_the_document() {
        let (reporter, _stream) = progress_channel(16);
        let job = job(bowl(), params());
        let _guard = job
            .document
            .try_begin_run(TaskId::next(), CancellationToken::new())
            .unwrap();
        let err = OptimizationTask::start(job, reporter).unwrap_err();
        assert!(err.is_busy());
    }

    #[test]
    fn cancel_stops_a_long_run_early() {
        let (reporter, stream) = progress_channel(16);
        let slow = Arc::new(Slow {
            inner: HarmonicWell::new(vec![Point3::origin(); 2], 1e-6),
            calls: AtomicUsize::new(0),
        });
        let mut p = params();
        p.max_steps = 100_000;
        let mut task = OptimizationTask::start(job(slow.clone(), p), reporter).unwrap();
        thread::sleep(Duration::from_millis(20));
        task.cancel();
        task.cancel();

        let outcome = task.wait().unwrap().outcome.clone();
        assert_eq!(outcome.state, TerminalState::Cancelled);
        assert!(outcome.cycles < 100_000);
        assert_eq!(slow.calls.load(Ordering::SeqCst), outcome.cycles);
        assert_eq!(
            stream.wait_for_finish(task.id(), TIMEOUT).map(|o| o.state),
            Some(TerminalState::Cancelled)
        );
    }

    #[test]
    fn detached_task_still_finishes_and_reports() {
        let (reporter, stream) = progress_channel(16);
        let job = job(bowl(), params());
        let document = job.document.clone();
        let task = OptimizationTask::start(job, reporter).unwrap();
        let id = task.id();
        task.detach();

        let outcome = stream.wait_for_finish(id, TIMEOUT).unwrap();
        assert_eq!(outcome.state, TerminalState::Converged);
        assert!(!document.is_busy());
    }
}
