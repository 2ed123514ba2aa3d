use std::fmt;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Zero-based round index.
    Round(usize),
    Complete,
}

impl TaskState {
    pub fn label(self) -> String {
        match self {
            TaskState::Round(index) => format!("ROUND_{}", index + 1),
            TaskState::Complete => "COMPLETE".to_string(),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Round(index) => write!(f, "ROUND_{}", index + 1),
            TaskState::Complete => f.write_str("COMPLETE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsmError {
    #[error("a task needs at least one round")]
    NoRounds,
}

/// Linear round machine: `Round(0) -> .. -> Round(n-1) -> Complete`.
#[derive(Debug, Clone)]
pub struct TaskFsm {
    round_count: usize,
    state: TaskState,
    started: bool,
}

impl TaskFsm {
    pub fn new(round_count: usize) -> Result<Self, FsmError> {
        if round_count == 0 {
            return Err(FsmError::NoRounds);
        }
        Ok(Self {
            round_count,
            state: TaskState::Round(0),
            started: false,
        })
    }

    pub fn start(&mut self) {
        self.state = TaskState::Round(0);
        self.started = true;
    }

    /// Advances one state. Inert once complete. Returns whether the state
    /// changed.
    pub fn next(&mut self) -> bool {
        if !self.started {
            warn!(state = %self.state, "fsm_next_before_start");
            return false;
        }
        self.state = match self.state {
            TaskState::Round(index) if index + 1 < self.round_count => TaskState::Round(index + 1),
            TaskState::Round(_) => TaskState::Complete,
            TaskState::Complete => return false,
        };
        true
    }

    pub fn is(&self, state: TaskState) -> bool {
        self.state == state
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn label(&self) -> String {
        self.state.label()
    }

    /// Number of rounds passed so far; equals `round_count` once complete.
    pub fn index(&self) -> usize {
        match self.state {
            TaskState::Round(index) => index,
            TaskState::Complete => self.round_count,
        }
    }

    /// Round whose goal is on display: the last one after completion.
    pub fn current_round(&self) -> usize {
        self.index().min(self.round_count - 1)
    }

    pub fn round_count(&self) -> usize {
        self.round_count
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_complete(&self) -> bool {
        self.state == TaskState::Complete
    }

    /// Every state in transition order.
    pub fn states(&self) -> impl Iterator<Item = TaskState> {
        (0..self.round_count)
            .map(TaskState::Round)
            .chain(std::iter::once(TaskState::Complete))
    }
}
