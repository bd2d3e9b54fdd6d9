use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use molrelax::core::models::ids::TaskId;
use molrelax::engine::progress::Progress;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Log(String),
}

pub struct UiManager {
    mp: Arc<MultiProgress>,
    state: BarState,
    event_receiver: mpsc::Receiver<UiEvent>,
    shutdown_receiver: watch::Receiver<bool>,
    _sentinel_bar: ProgressBar,
}

#[derive(Default)]
struct BarState {
    active_bar: Option<ProgressBar>,
    task: Option<TaskId>,
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, event_receiver) = mpsc::channel(1024);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mp = Arc::new(MultiProgress::new());
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let _sentinel_bar = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            state: BarState::default(),
            event_receiver,
            shutdown_receiver,
            _sentinel_bar,
        };

        (manager, event_sender, shutdown_sender)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.event_receiver.recv() => {
                    self.handle_event(event);
                }
                result = self.shutdown_receiver.changed() => {
                    if result.is_err() || *self.shutdown_receiver.borrow() {
                        break;
                    }
                }
            }
        }
        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_event(event);
        }
        if let Some(bar) = self.state.active_bar.take() {
            bar.finish_and_clear();
        }
        self._sentinel_bar.finish_and_clear();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(msg) => {
                self.mp.println(msg).ok();
            }
            UiEvent::Progress(progress) => self.handle_progress(progress),
        }
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::Started { task, max_steps } => self.begin(task, max_steps),
            Progress::Step {
                task,
                cycle,
                energy,
            } => {
                // A dropped `Started` leaves the run untracked; follow it from here.
                if self.state.task.is_none() {
                    self.begin(task, 0);
                }
                if self.state.task != Some(task) {
                    return;
                }
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.set_position(cycle as u64);
                    bar.set_message(format!("{}  E = {:.4}", task, energy));
                }
            }
            Progress::Finished { task, outcome } => {
                if self.state.task == Some(task) {
                    if let Some(bar) = self.state.active_bar.take() {
                        bar.finish_and_clear();
                    }
                    self.state.task = None;
                }
                let mark = if outcome.state.is_error() { "✗" } else { "✓" };
                self.mp.println(format!("{} {}: {}", mark, task, outcome)).ok();
            }
        }
    }

    /// Replaces the current bar with one for `task`; a spinner when the length is unknown.
    fn begin(&mut self, task: TaskId, max_steps: usize) {
        if let Some(bar) = self.state.active_bar.take() {
            bar.finish_and_clear();
        }

        let pb = if max_steps == 0 {
            let pb = self.mp.add(ProgressBar::new_spinner());
            pb.enable_steady_tick(Duration::from_millis(80));
            pb.set_style(Self::spinner_style());
            pb
        } else {
            let pb = self.mp.add(ProgressBar::new(max_steps as u64));
            pb.set_style(Self::bar_style());
            pb
        };
        pb.set_message(format!("Running {}", task));

        self.state.active_bar = Some(pb);
        self.state.task = Some(task);
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<32} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("━╸ ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use molrelax::engine::state::{TaskOutcome, TerminalState};

    fn setup_manager() -> (UiManager, mpsc::Sender<UiEvent>) {
        let (manager, sender, _) = UiManager::new();
        manager.mp.set_draw_target(ProgressDrawTarget::hidden());
        (manager, sender)
    }

    #[test]
    fn started_with_steps_creates_a_bar() {
        let (mut manager, _) = setup_manager();
        let task = TaskId::next();

        manager.handle_event(UiEvent::Progress(Progress::Started {
            task,
            max_steps: 100,
        }));

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.length(), Some(100));
        assert_eq!(bar.position(), 0);
        assert_eq!(manager.state.task, Some(task));
    }

    #[test]
    fn started_without_steps_creates_a_spinner() {
        let (mut manager, _) = setup_manager();
        let task = TaskId::next();

        manager.handle_event(UiEvent::Progress(Progress::Started { task, max_steps: 0 }));

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.message(), format!("Running {}", task));
    }

    #[test]
    fn step_moves_the_bar_of_the_current_task_only() {
        let (mut manager, _) = setup_manager();
        let task = TaskId::next();
        let stranger = TaskId::next();
        manager.handle_event(UiEvent::Progress(Progress::Started {
            task,
            max_steps: 50,
        }));

        manager.handle_event(UiEvent::Progress(Progress::Step {
            task,
            cycle: 10,
            energy: -1.5,
        }));
        manager.handle_event(UiEvent::Progress(Progress::Step {
            task: stranger,
            cycle: 40,
            energy: 0.0,
        }));

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.position(), 10);
        assert!(bar.message().contains("-1.5000"));
    }

    #[test]
    fn step_without_started_begins_tracking_the_run() {
        let (mut manager, _) = setup_manager();
        let task = TaskId::next();

        manager.handle_event(UiEvent::Progress(Progress::Step {
            task,
            cycle: 4,
            energy: -2.25,
        }));

        assert_eq!(manager.state.task, Some(task));
        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.position(), 4);
        assert!(bar.message().contains("-2.2500"));

        manager.handle_event(UiEvent::Progress(Progress::Finished {
            task,
            outcome: TaskOutcome::new(TerminalState::Converged, 4, Some(-2.25)),
        }));
        assert!(manager.state.active_bar.is_none());
    }

    #[test]
    fn finished_clears_the_bar() {
        let (mut manager, _) = setup_manager();
        let task = TaskId::next();
        manager.handle_event(UiEvent::Progress(Progress::Started {
            task,
            max_steps: 10,
        }));

        manager.handle_event(UiEvent::Progress(Progress::Finished {
            task,
            outcome: TaskOutcome::new(TerminalState::Converged, 7, Some(-3.0)),
        }));

        assert!(manager.state.active_bar.is_none());
        assert!(manager.state.task.is_none());
    }

    #[test]
    fn log_events_are_printed_without_a_bar() {
        let (mut manager, _) = setup_manager();
        manager.handle_event(UiEvent::Log("Test log message".to_string()));
        assert!(manager.state.active_bar.is_none());
    }

    #[tokio::test]
    async fn run_exits_on_shutdown_signal() {
        let (manager, sender, shutdown) = UiManager::new();
        manager.mp.set_draw_target(ProgressDrawTarget::hidden());
        let handle = tokio::spawn(manager.run());

        sender
            .send(UiEvent::Log("before shutdown".to_string()))
            .await
            .unwrap();
        shutdown.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
