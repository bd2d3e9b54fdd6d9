use thiserror::Error;

use super::config::ConfigError;
use crate::core::constraints::ConstraintError;
use crate::core::models::document::DocumentError;
use crate::core::models::ids::TaskId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Unknown evaluator '{0}'")]
    UnknownEvaluator(String),

    #[error(transparent)]
    InvalidConstraint(#[from] ConstraintError),

    #[error("Failed to spawn worker thread for {task}: {source}")]
    Spawn {
        task: TaskId,
        source: std::io::Error,
    },

    #[error("Worker thread of {0} panicked")]
    WorkerPanicked(TaskId),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Returns `true` if the error means another run currently holds the document.
    pub fn is_busy(&self) -> bool {
        matches!(self, EngineError::Document(DocumentError::Busy { .. }))
    }
}
