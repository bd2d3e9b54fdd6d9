use super::history::CommandKind;
use crate::core::constraints::ConstraintSet;
use crate::core::forcefield::Evaluator;
use crate::core::models::document::Document;
use crate::core::models::ids::TaskId;
use crate::core::models::snapshot::GeometrySnapshot;
use crate::engine::cancel::CancellationToken;
use crate::engine::config::{OptimizationParameters, RunMode};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::state::{TaskOutcome, TaskReport};
use crate::engine::task::{OptimizationJob, OptimizationTask};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// End state of a run that converged or hit its step limit, kept so `redo` can re-apply it.
#[derive(Debug, Clone)]
struct CompletedRun {
    geometry: GeometrySnapshot,
    outcome: TaskOutcome,
}

/// One undo-history entry wrapping a background optimization.
///
/// The command captures the document's coordinates when it is built. `redo` starts a run (or
/// re-applies the result of an earlier one) and returns at once; `undo` stops any run still
/// going and restores the captured coordinates bit for bit.
///
/// The run is owned through an [`OptimizationTask`] handle. Dropping the command while the
/// run is still going detaches the run instead of waiting for it.
pub struct OptimizationCommand {
    document: Document,
    constraints: Arc<ConstraintSet>,
    parameters: OptimizationParameters,
    evaluator: Arc<dyn Evaluator>,
    reporter: ProgressReporter,
    snapshot: GeometrySnapshot,
    task: Option<OptimizationTask>,
    last_task: Option<TaskId>,
    completed: Option<CompletedRun>,
    last_outcome: Option<TaskOutcome>,
    applied: bool,
    total_cycles: usize,
    merged_runs: usize,
}

impl OptimizationCommand {
    /// Builds a command and captures the document's current coordinates.
    ///
    /// Nothing runs until [`OptimizationCommand::redo`].
    ///
    /// # Arguments
    ///
    /// * `document` - The live document to optimize.
    /// * `constraints` - The constraint set; shared read-only with the run.
    /// * `parameters` - The run configuration, assumed validated.
    /// * `evaluator` - The energy model selected by `parameters.evaluator`.
    /// * `reporter` - Where the run sends its progress events.
    pub fn new(
        document: Document,
        constraints: Arc<ConstraintSet>,
        parameters: OptimizationParameters,
        evaluator: Arc<dyn Evaluator>,
        reporter: ProgressReporter,
    ) -> Self {
        let snapshot = document.snapshot();
        Self {
            document,
            constraints,
            parameters,
            evaluator,
            reporter,
            snapshot,
            task: None,
            last_task: None,
            completed: None,
            last_outcome: None,
            applied: false,
            total_cycles: 0,
            merged_runs: 1,
        }
    }

    pub fn kind(&self) -> CommandKind {
        CommandKind::Optimization
    }

    /// The label shown in undo/redo menus.
    pub fn text(&self) -> &'static str {
        match self.parameters.run_mode {
            RunMode::Minimize => "Optimize Geometry",
            RunMode::SinglePoint => "Calculate Energy",
            RunMode::Dynamics => "Run Dynamics",
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The coordinates `undo` restores.
    pub fn snapshot(&self) -> &GeometrySnapshot {
        &self.snapshot
    }

    pub fn parameters(&self) -> &OptimizationParameters {
        &self.parameters
    }

    pub fn constraints(&self) -> &Arc<ConstraintSet> {
        &self.constraints
    }

    /// Cycles completed by every run this command has harvested, merged runs included.
    pub fn total_cycles(&self) -> usize {
        self.total_cycles
    }

    /// Number of commands folded into this one, counting itself.
    pub fn merged_runs(&self) -> usize {
        self.merged_runs
    }

    /// Outcome of the most recently harvested run.
    pub fn last_outcome(&self) -> Option<&TaskOutcome> {
        self.last_outcome.as_ref()
    }

    /// Id of the most recently started run, kept after the run is harvested.
    pub fn last_task(&self) -> Option<TaskId> {
        self.last_task
    }

    /// Returns `true` between a successful `redo` and the next `undo`.
    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Returns `true` while this command's run still holds the document.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(OptimizationTask::is_active)
    }

    /// Token of the owned run, for progress sinks that want to stop it.
    pub fn cancellation_token(&self) -> Option<CancellationToken> {
        self.task.as_ref().map(|t| t.token().clone())
    }

    /// Starts the optimization, or re-applies the geometry of an earlier completed run.
    ///
    /// Returns without waiting for the run. Calling `redo` while this command's own run is
    /// still going does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Document`] if another run holds the document, and
    /// [`EngineError::Spawn`] if the worker thread cannot be started.
    pub fn redo(&mut self) -> Result<(), EngineError> {
        self.cleanup();
        if self.is_running() {
            debug!(task = ?self.last_task, "Redo ignored; run still in progress.");
            return Ok(());
        }

        if let Some(completed) = &self.completed {
            if self.document.with_positions(|p| self.snapshot.matches(p)) {
                self.document.restore(&completed.geometry)?;
                self.last_outcome = Some(completed.outcome.clone());
                self.applied = true;
                debug!(document = %self.document.id(), "Re-applied cached optimization result.");
                return Ok(());
            }
            debug!(document = %self.document.id(), "Cached result is stale; recomputing.");
            self.completed = None;
        }

        let job = OptimizationJob {
            document: self.document.clone(),
            constraints: Arc::clone(&self.constraints),
            parameters: self.parameters.clone(),
            evaluator: Arc::clone(&self.evaluator),
        };
        let task = OptimizationTask::start(job, self.reporter.clone())?;
        self.last_task = Some(task.id());
        self.task = Some(task);
        self.applied = true;
        Ok(())
    }

    /// Stops any run still going, waits for it, then restores the captured coordinates.
    ///
    /// Safe to call repeatedly, before any `redo`, and after the run finished. A run that
    /// was still going when `undo` was called is not kept for re-apply.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Document`] if a run of another command holds the document.
    pub fn undo(&mut self) -> Result<(), EngineError> {
        if let Some(mut task) = self.task.take() {
            let interrupted = task.is_active();
            task.cancel();
            match task.wait().cloned() {
                Ok(report) => self.harvest(report, !interrupted),
                Err(e) => warn!(task = %task.id(), "Run ended abnormally: {}", e),
            }
        }
        self.document.restore(&self.snapshot)?;
        self.applied = false;
        Ok(())
    }

    /// Harvests the run once it has released the document. Idempotent.
    ///
    /// # Return
    ///
    /// Returns `true` if a finished run was collected by this call.
    pub fn cleanup(&mut self) -> bool {
        let finished = self
            .task
            .as_ref()
            .is_some_and(|t| t.is_finished() || !t.is_active());
        if !finished {
            return false;
        }
        let Some(mut task) = self.task.take() else {
            return false;
        };
        match task.wait().cloned() {
            Ok(report) => self.harvest(report, true),
            Err(e) => warn!(task = %task.id(), "Run ended abnormally: {}", e),
        }
        true
    }

    /// Gives up ownership of a run that is still going. The run keeps going and delivers its
    /// terminal event on its own; this command never touches it again.
    ///
    /// # Return
    ///
    /// The id of the detached run, or `None` if there was nothing to detach.
    pub fn detach(&mut self) -> Option<TaskId> {
        if !self.is_running() {
            self.cleanup();
            return None;
        }
        let task = self.task.take()?;
        let id = task.id();
        task.detach();
        Some(id)
    }

    /// Returns `true` if `other` can be folded into this command.
    ///
    /// Both must be applied optimizations of the same document with compatible parameters,
    /// and this command's own run must no longer be active.
    pub fn can_merge_with(&self, other: &OptimizationCommand) -> bool {
        self.applied
            && other.applied
            && self.document.id() == other.document.id()
            && self.parameters.is_compatible_with(&other.parameters)
            && !self.is_running()
    }

    /// Folds `other` into this command if [`can_merge_with`](Self::can_merge_with) allows it.
    ///
    /// The merged command keeps this command's snapshot and takes over `other`'s run,
    /// parameters and results, so one `undo` returns to the state before the first run.
    ///
    /// # Errors
    ///
    /// Hands `other` back unchanged if the commands cannot be merged.
    #[allow(clippy::result_large_err)]
    pub fn merge_with(&mut self, other: OptimizationCommand) -> Result<(), OptimizationCommand> {
        self.cleanup();
        if !self.can_merge_with(&other) {
            return Err(other);
        }
        self.absorb(other);
        Ok(())
    }

    fn absorb(&mut self, mut other: OptimizationCommand) {
        debug!(
            document = %self.document.id(),
            runs = self.merged_runs + other.merged_runs,
            "Merging optimization commands."
        );
        self.task = other.task.take();
        self.last_task = other.last_task.or(self.last_task);
        self.completed = other.completed.take();
        self.last_outcome = other.last_outcome.take().or(self.last_outcome.take());
        self.parameters = other.parameters.clone();
        self.constraints = Arc::clone(&other.constraints);
        self.evaluator = Arc::clone(&other.evaluator);
        self.total_cycles += other.total_cycles;
        self.merged_runs += other.merged_runs;
        self.applied = true;
    }

    /// Records a finished run. Only runs that ran to completion are kept for re-apply.
    fn harvest(&mut self, report: TaskReport, cache: bool) {
        self.total_cycles += report.outcome.cycles;
        if cache && report.outcome.state.ran_to_completion() {
            self.completed = Some(CompletedRun {
                geometry: report.geometry,
                outcome: report.outcome.clone(),
            });
        }
        self.last_outcome = Some(report.outcome);
    }
}

impl Drop for OptimizationCommand {
    fn drop(&mut self) {
        if let Some(mut task) = self.task.take() {
            if task.is_active() && !task.is_finished() {
                debug!(task = %task.id(), "Command dropped with run in progress; detaching.");
                task.detach();
            } else if let Err(e) = task.wait() {
                warn!(task = %task.id(), "Run ended abnormally: {}", e);
            }
        }
    }
}

impl fmt::Debug for OptimizationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizationCommand")
            .field("document", &self.document.id())
            .field("evaluator", &self.parameters.evaluator)
            .field("applied", &self.applied)
            .field("running", &self.is_running())
            .field("total_cycles", &self.total_cycles)
            .field("merged_runs", &self.merged_runs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraints::Constraint;
    use crate::core::forcefield::harmonic::HarmonicWell;
    use crate::core::forcefield::{Evaluation, EvaluationError};
    use crate::engine::progress::{ProgressStream, progress_channel};
    use crate::engine::state::TerminalState;
    use nalgebra::Point3;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    /// A downhill slope with no minimum; runs on it only end when stopped.
    struct Slope;

    impl Evaluator for Slope {
        fn name(&self) -> &str {
            "slope"
        }

        fn evaluate(
            &self,
            positions: &[Point3<f64>],
            _constraints: &ConstraintSet,
        ) -> Result<Evaluation, EvaluationError> {
            std::thread::sleep(Duration::from_millis(1));
            let energy = positions.iter().map(|p| p.x).sum();
            Ok(Evaluation::new(
                energy,
                vec![nalgebra::Vector3::x(); positions.len()],
            ))
        }
    }

    fn setup() -> (Document, ProgressReporter, ProgressStream) {
        let document = Document::from_positions(vec![Point3::origin(), Point3::new(2.0, 0.0, 0.0)]);
        let (reporter, stream) = progress_channel(64);
        (document, reporter, stream)
    }

    fn bowl() -> Arc<dyn Evaluator> {
        Arc::new(HarmonicWell::new(
            vec![Point3::new(0.0, 1.0, 0.0), Point3::new(1.0, 1.0, 0.0)],
            1.0,
        ))
    }

    fn command_with(
        document: &Document,
        reporter: &ProgressReporter,
        max_steps: usize,
        evaluator: Arc<dyn Evaluator>,
    ) -> OptimizationCommand {
        let params = OptimizationParameters::builder()
            .evaluator("bowl")
            .max_steps(max_steps)
            .step_size(0.5)
            .build()
            .unwrap();
        OptimizationCommand::new(
            document.clone(),
            Arc::new(ConstraintSet::new()),
            params,
            evaluator,
            reporter.clone(),
        )
    }

    fn command(document: &Document, reporter: &ProgressReporter, max_steps: usize) -> OptimizationCommand {
        command_with(document, reporter, max_steps, bowl())
    }

    fn endless(document: &Document, reporter: &ProgressReporter) -> OptimizationCommand {
        command_with(document, reporter, 1_000_000, Arc::new(Slope))
    }

    fn finish(command: &mut OptimizationCommand, stream: &ProgressStream) -> TaskOutcome {
        let task = command.last_task().unwrap();
        let outcome = stream.wait_for_finish(task, TIMEOUT).unwrap();
        command.cleanup();
        outcome
    }

    #[test]
    fn undo_before_redo_is_harmless() {
        let (document, reporter, _stream) = setup();
        let mut cmd = command(&document, &reporter, 100);
        cmd.undo().unwrap();
        assert!(cmd.snapshot().matches(&document.positions()));
        assert!(!cmd.is_applied());
        assert_eq!(cmd.kind(), CommandKind::Optimization);
    }

    #[test]
    fn finished_run_is_reapplied_without_recomputing() {
        let (document, reporter, stream) = setup();
        let mut cmd = command(&document, &reporter, 200);
        cmd.redo().unwrap();
        assert_eq!(finish(&mut cmd, &stream).state, TerminalState::Converged);
        let optimized = document.snapshot();
        let first_run = cmd.last_task();
        let cycles = cmd.total_cycles();

        cmd.undo().unwrap();
        assert!(cmd.snapshot().matches(&document.positions()));

        cmd.redo().unwrap();
        assert!(optimized.matches(&document.positions()));
        assert_eq!(cmd.last_task(), first_run);
        assert_eq!(cmd.total_cycles(), cycles);
        assert!(!document.is_busy());
    }

    #[test]
    fn stale_cache_is_recomputed() {
        let (document, reporter, stream) = setup();
        let mut cmd = command(&document, &reporter, 200);
        cmd.redo().unwrap();
        finish(&mut cmd, &stream);
        let first_run = cmd.last_task();
        cmd.undo().unwrap();

        document
            .edit(|p| p[0] = Point3::new(0.5, 0.5, 0.5))
            .unwrap();
        cmd.redo().unwrap();
        assert_ne!(cmd.last_task(), first_run);
        finish(&mut cmd, &stream);
    }

    #[test]
    fn redo_while_running_does_nothing() {
        let (document, reporter, _stream) = setup();
        let mut cmd = endless(&document, &reporter);
        cmd.redo().unwrap();
        let task = cmd.last_task();
        cmd.redo().unwrap();
        assert_eq!(cmd.last_task(), task);
        assert!(cmd.is_running());

        cmd.undo().unwrap();
        assert!(cmd.snapshot().matches(&document.positions()));
        assert_eq!(cmd.last_outcome().map(|o| o.state), Some(TerminalState::Cancelled));
    }

    #[test]
    fn merge_is_refused_while_the_receiver_is_running() {
        let (document, reporter, stream) = setup();
        let mut first = endless(&document, &reporter);
        first.redo().unwrap();

        let mut other_document_cmd = {
            let (other, _, _) = setup();
            command(&other, &reporter, 10)
        };
        other_document_cmd.redo().unwrap();
        let other_document_cmd = first.merge_with(other_document_cmd).unwrap_err();
        assert_eq!(first.merged_runs(), 1);
        drop(other_document_cmd);

        first.undo().unwrap();
        let _ = stream.drain();
    }

    #[test]
    fn incompatible_parameters_do_not_merge() {
        let (document, reporter, stream) = setup();
        let mut first = command(&document, &reporter, 200);
        first.redo().unwrap();
        finish(&mut first, &stream);

        let mut second = command(&document, &reporter, 200);
        second.parameters.evaluator = "other".to_string();
        second.redo().unwrap();
        assert!(!first.can_merge_with(&second));
        finish(&mut second, &stream);
    }

    #[test]
    fn detach_hands_back_the_run_id_and_leaves_it_running() {
        let (document, reporter, stream) = setup();
        let mut cmd = endless(&document, &reporter);
        cmd.redo().unwrap();
        let id = cmd.detach().unwrap();
        assert!(!cmd.is_running());
        assert!(cmd.detach().is_none());

        assert!(document.cancel_active());
        let outcome = stream.wait_for_finish(id, TIMEOUT).unwrap();
        assert_eq!(outcome.state, TerminalState::Cancelled);
    }

    #[test]
    fn constraints_travel_with_the_command() {
        let (document, reporter, stream) = setup();
        let mut cmd = command(&document, &reporter, 200);
        cmd.constraints = Arc::new([Constraint::Fixed { particle: 0 }].into_iter().collect());
        cmd.redo().unwrap();
        finish(&mut cmd, &stream);
        assert_eq!(document.positions()[0], Point3::origin());
    }
}
