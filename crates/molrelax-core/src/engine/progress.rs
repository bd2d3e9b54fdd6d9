use super::state::TaskOutcome;
use crate::core::models::ids::TaskId;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use std::time::{Duration, Instant};
use tracing::warn;

/// Slots kept free for terminal events.
const RESERVED_SLOTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Started { task: TaskId, max_steps: usize },
    Step { task: TaskId, cycle: usize, energy: f64 },
    Finished { task: TaskId, outcome: TaskOutcome },
}

impl Progress {
    pub fn task(&self) -> TaskId {
        match self {
            Progress::Started { task, .. }
            | Progress::Step { task, .. }
            | Progress::Finished { task, .. } => *task,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Progress::Finished { .. })
    }
}

/// Creates a bounded progress channel.
///
/// `capacity` is raised to at least three so that two slots can be reserved for terminal
/// events.
pub fn progress_channel(capacity: usize) -> (ProgressReporter, ProgressStream) {
    let capacity = capacity.max(RESERVED_SLOTS + 1);
    let (sender, receiver) = bounded(capacity);
    (
        ProgressReporter { sender, capacity },
        ProgressStream { receiver },
    )
}

/// Sending half of a progress channel, owned by worker threads. Never blocks.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: Sender<Progress>,
    capacity: usize,
}

impl ProgressReporter {
    /// Sends an event without blocking.
    ///
    /// Non-terminal events are dropped when the stream is not keeping up; consumers only see
    /// fewer intermediate steps, still in order. Terminal events may use the reserved slots.
    ///
    /// # Return
    ///
    /// Returns `true` if the event was queued.
    pub fn report(&self, event: Progress) -> bool {
        if !event.is_terminal() && self.sender.len() + RESERVED_SLOTS >= self.capacity {
            return false;
        }
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                if event.is_terminal() {
                    warn!(task = %event.task(), "Progress stream full; terminal event dropped.");
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Receiving half of a progress channel, consumed on the owner's schedule.
///
/// Clones share one queue; every event goes to exactly one of them.
#[derive(Debug, Clone)]
pub struct ProgressStream {
    receiver: Receiver<Progress>,
}

impl ProgressStream {
    /// Returns the next queued event, if any.
    pub fn try_next(&self) -> Option<Progress> {
        self.receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Progress> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes every queued event.
    pub fn drain(&self) -> Vec<Progress> {
        self.receiver.try_iter().collect()
    }

    /// Consumes events until `task` finishes or `timeout` elapses.
    ///
    /// Events of other tasks are discarded.
    pub fn wait_for_finish(&self, task: TaskId, timeout: Duration) -> Option<TaskOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.recv_timeout(remaining)? {
                Progress::Finished { task: t, outcome } if t == task => return Some(outcome),
                _ => continue,
            }
        }
    }

    /// A blocking iterator that ends when every reporter is gone.
    pub fn iter(&self) -> impl Iterator<Item = Progress> + '_ {
        self.receiver.iter()
    }
}
