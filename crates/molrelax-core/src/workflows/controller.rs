use super::command::OptimizationCommand;
use super::history::UndoStack;
use crate::core::constraints::ConstraintSet;
use crate::core::forcefield::registry::EvaluatorRegistry;
use crate::core::models::document::{Document, DocumentError};
use crate::core::models::ids::TaskId;
use crate::engine::config::OptimizationParameters;
use crate::engine::error::EngineError;
use crate::engine::progress::{ProgressReporter, ProgressStream, progress_channel};
use std::sync::Arc;
use tracing::{info, instrument};

pub const DEFAULT_PROGRESS_CAPACITY: usize = 256;

/// Turns user actions into optimization commands on one document.
///
/// The controller owns the document handle, the constraint set being edited, the evaluators
/// and the progress channel all of its runs report through.
#[derive(Debug)]
pub struct OptimizationController {
    document: Document,
    constraints: Arc<ConstraintSet>,
    registry: EvaluatorRegistry,
    reporter: ProgressReporter,
    events: ProgressStream,
}

impl OptimizationController {
    pub fn new(document: Document, registry: EvaluatorRegistry) -> Self {
        Self::with_progress_capacity(document, registry, DEFAULT_PROGRESS_CAPACITY)
    }

    pub fn with_progress_capacity(
        document: Document,
        registry: EvaluatorRegistry,
        capacity: usize,
    ) -> Self {
        let (reporter, events) = progress_channel(capacity);
        Self {
            document,
            constraints: Arc::new(ConstraintSet::new()),
            registry,
            reporter,
            events,
        }
    }

    /// Validates `params`, builds an optimization command and pushes it onto `stack`.
    ///
    /// # Return
    ///
    /// The id of the run now owned by the top history entry, which is the new run whether
    /// or not the command was merged into the previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Document`] while a run is active on the document,
    /// [`EngineError::Config`] for invalid parameters, [`EngineError::UnknownEvaluator`] for
    /// an unregistered evaluator and [`EngineError::InvalidConstraint`] if the constraint set
    /// does not fit the document.
    #[instrument(skip_all, name = "optimize", fields(document = %self.document.id(), evaluator = %params.evaluator))]
    pub fn optimize(
        &mut self,
        stack: &mut UndoStack,
        params: OptimizationParameters,
    ) -> Result<Option<TaskId>, EngineError> {
        if let Some(active) = self.document.active_task() {
            return Err(DocumentError::Busy {
                document: self.document.id(),
                active,
            }
            .into());
        }
        params.validate()?;
        let evaluator = self
            .registry
            .get(&params.evaluator)
            .ok_or_else(|| EngineError::UnknownEvaluator(params.evaluator.clone()))?;
        self.constraints.validate(self.document.len())?;

        let command = OptimizationCommand::new(
            self.document.clone(),
            Arc::clone(&self.constraints),
            params,
            evaluator,
            self.reporter.clone(),
        );
        let merged = stack.push(command)?;

        let task = stack
            .top()
            .and_then(|top| top.as_optimization())
            .and_then(|c| c.last_task());
        info!(?task, merged, "Optimization command pushed.");
        Ok(task)
    }

    /// Asks the run active on the document, if any, to stop.
    #[instrument(skip_all, fields(document = %self.document.id()))]
    pub fn cancel(&self) -> bool {
        let cancelled = self.document.cancel_active();
        if cancelled {
            info!("Cancellation requested.");
        }
        cancelled
    }

    pub fn events(&self) -> &ProgressStream {
        &self.events
    }

    /// A reporter feeding this controller's progress stream.
    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Mutable access to the constraint set.
    ///
    /// If a run still references the current set, the caller edits a fresh copy and the run
    /// keeps the set it started with.
    pub fn constraints_mut(&mut self) -> &mut ConstraintSet {
        Arc::make_mut(&mut self.constraints)
    }

    pub fn set_constraints(&mut self, constraints: ConstraintSet) {
        self.constraints = Arc::new(constraints);
    }

    pub fn registry(&self) -> &EvaluatorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EvaluatorRegistry {
        &mut self.registry
    }
}
