use glam::{Quat, Vec3};
use harness::Pose;

use super::config::OperatorConfig;

const POSITION_ARRIVAL_THRESHOLD: f32 = 0.001;
const ANGLE_ARRIVAL_THRESHOLD: f32 = 0.001;

/// Stands in for a teleoperated gripper: moves the end effector toward a
/// goal pose at bounded linear and angular speed.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedOperator {
    pose: Pose,
    linear_speed: f32,
    angular_speed: f32,
}

impl ScriptedOperator {
    pub(crate) fn new(config: &OperatorConfig) -> Self {
        Self {
            pose: Pose::new(config.start_position(), Quat::IDENTITY),
            linear_speed: config.linear_speed,
            angular_speed: config.angular_speed_degrees.to_radians(),
        }
    }

    pub(crate) fn pose(&self) -> Pose {
        self.pose
    }

    /// Advances one tick. Returns `true` once both position and orientation
    /// sit on the goal.
    pub(crate) fn step(&mut self, goal: &Pose, fixed_dt_seconds: f32) -> bool {
        let (position, reached_position) = step_toward(
            self.pose.position,
            goal.position,
            self.linear_speed,
            fixed_dt_seconds,
            POSITION_ARRIVAL_THRESHOLD,
        );
        let (orientation, reached_orientation) = rotate_toward(
            self.pose.orientation,
            goal.orientation,
            self.angular_speed * fixed_dt_seconds,
            ANGLE_ARRIVAL_THRESHOLD,
        );
        self.pose = Pose::new(position, orientation);
        reached_position && reached_orientation
    }
}

fn step_toward(
    current: Vec3,
    target: Vec3,
    speed: f32,
    fixed_dt_seconds: f32,
    arrival_threshold: f32,
) -> (Vec3, bool) {
    let delta = target - current;
    let distance_sq = delta.length_squared();
    if distance_sq <= arrival_threshold * arrival_threshold {
        return (target, true);
    }

    let distance = distance_sq.sqrt();
    let max_step = speed * fixed_dt_seconds;
    if max_step >= distance {
        return (target, true);
    }

    (current + delta * (max_step / distance), false)
}

fn rotate_toward(
    current: Quat,
    target: Quat,
    max_angle: f32,
    arrival_threshold: f32,
) -> (Quat, bool) {
    let angle = current.angle_between(target);
    if angle <= arrival_threshold || max_angle >= angle {
        return (target, true);
    }
    (current.slerp(target, max_angle / angle).normalize(), false)
}
