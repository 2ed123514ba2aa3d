use std::f32::consts::{FRAC_PI_2, FRAC_PI_3, FRAC_PI_4};

use glam::Vec3;
use tracing::{info, warn};

use crate::app::SimWorld;
use crate::math::{euler_xyz, Pose};
use crate::objects::Goal;
use crate::resources::ResourceResolver;
use crate::sink::DataSink;
use crate::ui::{ContainerHandle, LayoutOptions, TextStyle, UiLayer};

use super::{pose_matches, LiveFrame, MatchTolerance, Round, Task, TaskError, TaskFsm};

pub const TASK_CHANNEL: &str = "pose-match";
pub const INSTRUCTIONS_ID: &str = "pose-match-instructions";

const TITLE: &str = "Pose Matching\n";
const TITLE_FONT_SIZE: f32 = 0.08;
const INSTRUCTIONS: &str = "Complete the task by moving the gripper into the correct pose\n\n";

#[derive(Debug, Clone, Default)]
pub struct PoseMatchOptions {
    /// Keeps only the first `n` rounds.
    pub num_rounds: Option<usize>,
    pub tolerance: MatchTolerance,
    /// Lines appended under the instructions when the task starts.
    pub extra_text: Vec<String>,
}

/// The three gripper poses of the stock pose-matching task.
pub fn default_rounds(world: &mut SimWorld) -> Vec<Round> {
    [
        Pose::from_euler_xyz(Vec3::new(1.0, 1.0, 0.0), 0.0, FRAC_PI_2, FRAC_PI_2),
        Pose::from_euler_xyz(Vec3::new(0.5, 1.0, 0.5), 0.0, 0.0, FRAC_PI_4),
        Pose::from_euler_xyz(Vec3::new(0.5, 1.0, -0.5), FRAC_PI_3, FRAC_PI_2, 0.0),
    ]
    .into_iter()
    .map(|pose| Round::new(Goal::gripper(world.allocate_id(), pose)))
    .collect()
}

fn instructions_layout() -> LayoutOptions {
    LayoutOptions {
        height: 0.4,
        position: Vec3::new(2.0, 1.5, 0.0),
        rotation: euler_xyz(0.0, -FRAC_PI_2, 0.0),
        background_opacity: 0.0,
        ..LayoutOptions::default()
    }
}

/// Leads the operator through a fixed sequence of gripper poses.
pub struct PoseMatch {
    id: String,
    rounds: Vec<Round>,
    fsm: TaskFsm,
    tolerance: MatchTolerance,
    instructions: ContainerHandle,
    extra_text: Vec<String>,
    sink: Box<dyn DataSink>,
}

impl PoseMatch {
    pub fn new(
        id: impl Into<String>,
        mut rounds: Vec<Round>,
        options: PoseMatchOptions,
        ui: &mut UiLayer,
        sink: Box<dyn DataSink>,
    ) -> Result<Self, TaskError> {
        let id = id.into();
        if let Some(limit) = options.num_rounds {
            if limit > rounds.len() {
                warn!(
                    task = %id,
                    requested = limit,
                    available = rounds.len(),
                    "task_round_limit_exceeds_rounds"
                );
            }
            rounds.truncate(limit);
        }
        let fsm = TaskFsm::new(rounds.len())?;

        let instructions = ui.create_container(INSTRUCTIONS_ID, instructions_layout());
        let title = ui.create_text(
            TITLE,
            TextStyle {
                font_size: TITLE_FONT_SIZE,
            },
        );
        let body = ui.create_text(INSTRUCTIONS, TextStyle::default());
        ui.append_child(instructions, title);
        ui.append_child(instructions, body);

        Ok(Self {
            id,
            rounds,
            fsm,
            tolerance: options.tolerance,
            instructions,
            extra_text: options.extra_text,
            sink,
        })
    }

    /// Builds the stock rounds and fetches every goal.
    pub async fn init<R: ResourceResolver>(
        id: impl Into<String>,
        options: PoseMatchOptions,
        world: &mut SimWorld,
        resolver: &R,
        sink: Box<dyn DataSink>,
    ) -> Result<Self, TaskError> {
        let rounds = default_rounds(world);
        let mut task = Self::new(id, rounds, options, world.ui_mut(), sink)?;
        task.fetch_goals(resolver).await?;
        Ok(task)
    }

    pub async fn fetch_goals<R: ResourceResolver>(&mut self, resolver: &R) -> Result<(), TaskError> {
        for round in &mut self.rounds {
            round.goal_mut().fetch(resolver).await?;
        }
        Ok(())
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// The round on display; the last one once the task is complete.
    pub fn current_round(&self) -> &Round {
        &self.rounds[self.fsm.current_round()]
    }

    pub fn tolerance(&self) -> MatchTolerance {
        self.tolerance
    }

    pub fn instructions(&self) -> ContainerHandle {
        self.instructions
    }
}

impl Task for PoseMatch {
    fn id(&self) -> &str {
        &self.id
    }

    fn fsm(&self) -> &TaskFsm {
        &self.fsm
    }

    fn start(&mut self, world: &mut SimWorld) -> Result<(), TaskError> {
        let mut loaded_now = Vec::new();
        let mut failure = None;
        for (index, round) in self.rounds.iter_mut().enumerate() {
            let object = round.goal_mut().object_mut();
            if object.is_loaded() {
                continue;
            }
            match object.load(world.object_context()) {
                Ok(()) => loaded_now.push(index),
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }
        if let Some(error) = failure {
            // Leave the goals as they were before the call.
            for index in loaded_now {
                self.rounds[index]
                    .goal_mut()
                    .object_mut()
                    .destruct(world.object_context())?;
            }
            return Err(error.into());
        }

        self.fsm.start();
        for line in std::mem::take(&mut self.extra_text) {
            let node = world.ui().create_text(line, TextStyle::default());
            world.ui_mut().append_child(self.instructions, node);
        }
        world.ui_mut().show(self.instructions);
        info!(
            task = %self.id,
            rounds = self.fsm.round_count(),
            "task_started"
        );
        Ok(())
    }

    fn update(&mut self, time: f64, live: &LiveFrame, world: &SimWorld) -> bool {
        if !self.fsm.is_started() || self.fsm.is_complete() {
            return false;
        }
        let goal = self.current_round().goal().current_pose(world.scene());
        if !pose_matches(&live.end_effector, &goal, self.tolerance) {
            return false;
        }

        let from = self.fsm.state();
        self.fsm.next();
        info!(
            task = %self.id,
            from = %from,
            to = %self.fsm.state(),
            time,
            "round_advanced"
        );
        if self.fsm.is_complete() {
            info!(task = %self.id, time, "task_complete");
        }
        true
    }

    fn log(&mut self, time: f64, world: &SimWorld) -> Result<(), TaskError> {
        let pose = self.current_round().goal().current_pose(world.scene());
        let fields = [
            self.id.clone(),
            self.fsm.label(),
            pose.format_position(),
            pose.format_orientation(),
        ];
        self.sink.log(time, &fields, TASK_CHANNEL)?;
        Ok(())
    }

    fn destruct(&mut self, world: &mut SimWorld) -> Result<(), TaskError> {
        world.ui_mut().hide(self.instructions);
        for round in &mut self.rounds {
            let object = round.goal_mut().object_mut();
            if object.is_loaded() {
                object.destruct(world.object_context())?;
            }
        }
        self.sink.flush()?;
        info!(task = %self.id, state = %self.fsm.state(), "task_destructed");
        Ok(())
    }
}
