pub mod energy;
pub mod optimize;

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::ui::UiEvent;
use molrelax::core::constraints::ConstraintSet;
use molrelax::core::forcefield::params::LennardJonesParams;
use molrelax::core::forcefield::registry::EvaluatorRegistry;
use molrelax::core::io::traits::MolecularFile;
use molrelax::core::io::xyz::XyzFile;
use molrelax::core::models::document::Document;
use molrelax::core::models::ids::TaskId;
use molrelax::engine::config::OptimizationParameters;
use molrelax::engine::progress::{Progress, ProgressStream};
use molrelax::engine::state::TaskOutcome;
use molrelax::workflows::controller::OptimizationController;
use molrelax::workflows::history::UndoStack;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::{signal, task};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Quiet polls tolerated after the run lock is released before giving up on its terminal event.
const FINISH_GRACE_POLLS: usize = 20;

/// Reads the structure, force field overrides and constraints named by `config` and wires
/// them into a controller.
pub(crate) fn load_session(config: &AppConfig) -> Result<OptimizationController> {
    info!("Loading input structure from {:?}", &config.input_path);
    let frame =
        XyzFile::read_from_path(&config.input_path).map_err(|e| CliError::FileParsing {
            path: config.input_path.clone(),
            source: e.into(),
        })?;
    info!(particles = frame.len(), comment = %frame.comment, "Structure loaded.");

    let lj_params = match &config.lj_params_path {
        Some(path) => {
            info!("Loading Lennard-Jones parameters from {:?}", path);
            LennardJonesParams::load(path).map_err(|e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            })?
        }
        None => LennardJonesParams::default(),
    };

    let document = Document::new(frame);
    let registry = EvaluatorRegistry::with_defaults(document.elements(), &lj_params)
        .map_err(|e| CliError::Config(e.to_string()))?;
    debug!("Registered evaluators: {:?}", registry.ids().collect::<Vec<_>>());

    let mut controller = OptimizationController::new(document, registry);
    if let Some(path) = &config.constraints_path {
        info!("Loading constraints from {:?}", path);
        let constraints = ConstraintSet::load_csv(path).map_err(|e| CliError::FileParsing {
            path: path.clone(),
            source: e.into(),
        })?;
        info!(count = constraints.len(), "Constraints loaded.");
        controller.set_constraints(constraints);
    }
    Ok(controller)
}

/// Starts a run through the undo history and forwards its progress to the UI until it ends.
///
/// Ctrl-C asks the run to stop; the run then finishes as cancelled. A second Ctrl-C gives up
/// waiting and leaves the run to finish on its own.
pub(crate) async fn execute(
    controller: &mut OptimizationController,
    parameters: OptimizationParameters,
    ui_sender: mpsc::Sender<UiEvent>,
) -> Result<TaskOutcome> {
    execute_until(controller, parameters, ui_sender, signal::ctrl_c).await
}

async fn execute_until<F, Fut>(
    controller: &mut OptimizationController,
    parameters: OptimizationParameters,
    ui_sender: mpsc::Sender<UiEvent>,
    mut interrupt: F,
) -> Result<TaskOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut stack = UndoStack::new();
    let run = controller
        .optimize(&mut stack, parameters)?
        .ok_or_else(|| CliError::Other(anyhow::anyhow!("No run was started.")))?;

    let events = controller.events().clone();
    let document = controller.document().clone();
    let forward = task::spawn_blocking(move || forward_progress(&events, &document, run, &ui_sender));
    tokio::pin!(forward);

    let joined = tokio::select! {
        joined = &mut forward => joined,
        _ = interrupt() => {
            warn!("Interrupt received; cancelling {}. Interrupt again to stop waiting.", run);
            controller.cancel();
            tokio::select! {
                joined = &mut forward => joined,
                _ = interrupt() => {
                    warn!("Second interrupt received; abandoning {}.", run);
                    return Err(CliError::Interrupted(run));
                }
            }
        }
    };
    let outcome = joined
        .map_err(|e| CliError::Other(anyhow::anyhow!("Progress forwarding failed: {}", e)))??;

    let collected = stack.sync();
    debug!(collected, "History synchronized.");
    Ok(outcome)
}

fn forward_progress(
    events: &ProgressStream,
    document: &Document,
    run: TaskId,
    ui_sender: &mpsc::Sender<UiEvent>,
) -> Result<TaskOutcome> {
    let mut quiet_polls = 0;
    loop {
        match events.recv_timeout(POLL_INTERVAL) {
            Some(event) => {
                let finished = match &event {
                    Progress::Finished { task, outcome } if *task == run => Some(outcome.clone()),
                    _ => None,
                };
                if ui_sender.blocking_send(UiEvent::Progress(event)).is_err() {
                    debug!("UI closed; progress is no longer displayed.");
                }
                if let Some(outcome) = finished {
                    return Ok(outcome);
                }
            }
            None if document.active_task() != Some(run) => {
                quiet_polls += 1;
                if quiet_polls > FINISH_GRACE_POLLS {
                    return Err(CliError::Other(anyhow::anyhow!(
                        "{} released the document without reporting an outcome",
                        run
                    )));
                }
            }
            None => {}
        }
    }
}
