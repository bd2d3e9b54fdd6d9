use crate::core::models::snapshot::GeometrySnapshot;
use std::fmt;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalState {
    Converged,
    StepLimitReached,
    Cancelled,
    Aborted,
}

impl TerminalState {
    /// Only an aborted run is an error; the rest are normal ways for a run to end.
    pub fn is_error(self) -> bool {
        matches!(self, TerminalState::Aborted)
    }

    /// Returns `true` if the run stopped on its own criteria rather than being interrupted.
    pub fn ran_to_completion(self) -> bool {
        matches!(self, TerminalState::Converged | TerminalState::StepLimitReached)
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminalState::Converged => "converged",
            TerminalState::StepLimitReached => "step limit reached",
            TerminalState::Cancelled => "cancelled",
            TerminalState::Aborted => "aborted",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Idle,
    Running,
    Terminated(TerminalState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: TaskState,
    pub to: TaskState,
}

impl TaskState {
    /// Moves to `next` if the transition is allowed.
    ///
    /// Allowed: `Idle -> Running`, `Idle -> Terminated` (a run that fails before its first
    /// iteration) and `Running -> Terminated`. Terminal states are final.
    pub fn transition(&mut self, next: TaskState) -> Result<(), InvalidTransition> {
        let allowed = matches!(
            (*self, next),
            (TaskState::Idle, TaskState::Running)
                | (TaskState::Idle, TaskState::Terminated(_))
                | (TaskState::Running, TaskState::Terminated(_))
        );
        if !allowed {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    pub fn is_running(self) -> bool {
        self == TaskState::Running
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Terminated(_))
    }

    pub fn terminal(self) -> Option<TerminalState> {
        match self {
            TaskState::Terminated(state) => Some(state),
            _ => None,
        }
    }
}

/// The final result of a run, as delivered to progress sinks and callers.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub state: TerminalState,
    /// Completed cycles. Cycles interrupted by an error are not counted.
    pub cycles: usize,
    /// Energy of the last accepted geometry, if any was evaluated.
    pub energy: Option<f64>,
    /// Failure details for aborted runs.
    pub message: Option<String>,
}

impl TaskOutcome {
    pub fn new(state: TerminalState, cycles: usize, energy: Option<f64>) -> Self {
        Self {
            state,
            cycles,
            energy,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} cycle(s)", self.state, self.cycles)?;
        if let Some(energy) = self.energy {
            write!(f, ", E = {:.6} kcal/mol", energy)?;
        }
        if let Some(message) = &self.message {
            write!(f, " ({})", message)?;
        }
        Ok(())
    }
}

/// What a worker thread returns when joined.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub outcome: TaskOutcome,
    /// The geometry the run left in the document.
    pub geometry: GeometrySnapshot,
}
