use molrelax::core::models::ids::TaskId;
use molrelax::engine::error::EngineError;
use molrelax::engine::state::TaskOutcome;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run failed: {0}")]
    RunFailed(TaskOutcome),

    #[error("Interrupted while waiting for {0} to stop")]
    Interrupted(TaskId),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
