use super::{execute, load_session};
use crate::cli::OptimizeArgs;
use crate::config::build_optimize_config;
use crate::error::{CliError, Result};
use crate::ui::UiEvent;
use molrelax::core::io::traits::MolecularFile;
use molrelax::core::io::xyz::XyzFile;
use molrelax::engine::state::TerminalState;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(args: OptimizeArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = build_optimize_config(&args)?;
    let mut controller = load_session(&config)?;

    println!(
        "Starting {:?} run ({:?}, up to {} steps)...",
        config.parameters.run_mode, config.parameters.algorithm, config.parameters.max_steps
    );
    let outcome = execute(&mut controller, config.parameters.clone(), ui_sender).await?;
    info!("Run finished: {}", outcome);

    if outcome.state.is_error() {
        return Err(CliError::RunFailed(outcome));
    }
    if outcome.state == TerminalState::Cancelled {
        warn!("Run was cancelled; writing the partially relaxed structure.");
    }

    let Some(output_path) = &config.output_path else {
        return Ok(());
    };
    let frame = controller.document().to_frame(&format!(
        "molrelax: {} ({})",
        outcome, config.parameters.evaluator
    ));
    XyzFile::write_to_path(&frame, output_path).map_err(|e| CliError::FileParsing {
        path: output_path.clone(),
        source: e.into(),
    })?;

    println!("✓ {}", outcome);
    println!("  Structure written to: {}", output_path.display());
    Ok(())
}
