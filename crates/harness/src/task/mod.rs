//! Scripted multi-round tasks.
//!
//! A task owns an ordered list of [`Round`]s and a [`TaskFsm`] that walks
//! them. The driver calls [`Task::update`] once per tick with the live
//! end-effector pose and [`Task::log`] whenever it wants a data record.

mod fsm;
mod matching;
mod pose_match;

use thiserror::Error;

use crate::app::SimWorld;
use crate::math::Pose;
use crate::objects::{Goal, LifecycleError};
use crate::resources::ResourceError;
use crate::sink::SinkError;

pub use fsm::{FsmError, TaskFsm, TaskState};
pub use matching::{pose_matches, MatchTolerance, ANGULAR_TOLERANCE, LINEAR_TOLERANCE};
pub use pose_match::{default_rounds, PoseMatch, PoseMatchOptions, INSTRUCTIONS_ID, TASK_CHANNEL};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Fsm(#[from] FsmError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Live robot state sampled by the driver each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiveFrame {
    pub end_effector: Pose,
}

#[derive(Debug)]
pub struct Round {
    goal: Goal,
    label: Option<String>,
}

impl Round {
    pub fn new(goal: Goal) -> Self {
        Self { goal, label: None }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(crate) fn goal_mut(&mut self) -> &mut Goal {
        &mut self.goal
    }
}

pub trait Task {
    fn id(&self) -> &str;
    fn fsm(&self) -> &TaskFsm;

    /// Starts the round machine, puts the goals into the world and shows the
    /// instructions.
    fn start(&mut self, world: &mut SimWorld) -> Result<(), TaskError>;

    /// Judges the live frame against the current goal. Returns whether the
    /// task advanced a round on this call.
    fn update(&mut self, time: f64, live: &LiveFrame, world: &SimWorld) -> bool;

    fn log(&mut self, time: f64, world: &SimWorld) -> Result<(), TaskError>;

    /// Hides the instructions and takes every loaded goal out of the world.
    fn destruct(&mut self, world: &mut SimWorld) -> Result<(), TaskError>;

    fn state(&self) -> TaskState {
        self.fsm().state()
    }

    fn is_complete(&self) -> bool {
        self.fsm().is_complete()
    }
}
