use serde::{Deserialize, Serialize};

use crate::math::Pose;

pub const LINEAR_TOLERANCE: f32 = 0.02;
pub const ANGULAR_TOLERANCE: f32 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchTolerance {
    /// Maximum position distance, exclusive, in world units.
    pub linear: f32,
    /// A match needs `|dot(q_live, q_goal)| > 1 - angular`.
    pub angular: f32,
}

impl Default for MatchTolerance {
    fn default() -> Self {
        Self {
            linear: LINEAR_TOLERANCE,
            angular: ANGULAR_TOLERANCE,
        }
    }
}

/// Pose equality up to tolerance. Position and orientation must both hold on
/// the same call. The absolute dot product treats `q` and `-q` as the same
/// rotation.
pub fn pose_matches(live: &Pose, goal: &Pose, tolerance: MatchTolerance) -> bool {
    let position_ok = live.position.distance(goal.position) < tolerance.linear;
    let orientation_ok = live.orientation.dot(goal.orientation).abs() > 1.0 - tolerance.angular;
    position_ok && orientation_ok
}
