use super::{execute, load_session};
use crate::cli::EnergyArgs;
use crate::config::build_energy_config;
use crate::error::{CliError, Result};
use crate::ui::UiEvent;
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: EnergyArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let config = build_energy_config(&args)?;
    let mut controller = load_session(&config)?;

    info!("Evaluating single-point energy with '{}'.", config.parameters.evaluator);
    let outcome = execute(&mut controller, config.parameters.clone(), ui_sender).await?;
    if outcome.state.is_error() {
        return Err(CliError::RunFailed(outcome));
    }

    match outcome.energy {
        Some(energy) => println!("Energy: {:.6} kcal/mol", energy),
        None => println!("Energy: not evaluated ({})", outcome),
    }
    Ok(())
}
