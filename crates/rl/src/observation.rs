//! # Observation Encoding
//!
//! Turns a snapshot of the creature and the current goal into the flat
//! feature vector handed to the policy. Layout, for `n` joints:
//!
//! | index | feature |
//! |---|---|
//! | 0, 1 | `sin`, `cos` of the angle between heading and goal |
//! | 2, 3 | roll, pitch |
//! | 4..7 | base linear velocity in the yaw-aligned frame, scaled |
//! | 7 + 2i | joint `i` position mapped onto `[-1, 1]` |
//! | 8 + 2i | joint `i` velocity, scaled |
//!
//! The angle is emitted as a sine/cosine pair so the feature stays bounded
//! and has no jump at `±π`.

use physics::{
    euler_from_quat, BackendError, BodyHandle, JointState, PhysicsBackend, Pose, Quat, Vec3,
    Velocity,
};

use crate::body::BodyDescriptor;
use crate::config::EnvConfig;
use crate::goal::Goal;

/// Number of features preceding the per-joint pairs.
pub const BASE_FEATURES: usize = 7;

#[must_use]
pub const fn observation_len(num_joints: usize) -> usize {
    BASE_FEATURES + 2 * num_joints
}

/// Raw backend state the encoder reads.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyState {
    pub pose: Pose,
    pub velocity: Velocity,
    pub joints: Vec<JointState>,
}

impl BodyState {
    /// # Errors
    ///
    /// Propagates any backend query failure.
    pub fn read<B: PhysicsBackend + ?Sized>(
        backend: &B,
        body: BodyHandle,
        num_joints: usize,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            pose: backend.pose(body)?,
            velocity: backend.velocity(body)?,
            joints: (0..num_joints)
                .map(|i| backend.joint_state(body, i))
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ObservationScales {
    pub local_velocity: f32,
    pub joint_velocity: f32,
}

impl From<&EnvConfig> for ObservationScales {
    fn from(config: &EnvConfig) -> Self {
        Self {
            local_velocity: config.local_velocity_scale,
            joint_velocity: config.joint_velocity_scale,
        }
    }
}

/// Rotates a world-frame vector by `-yaw` about the vertical axis.
#[must_use]
pub fn to_heading_frame(world: Vec3, yaw: f32) -> Vec3 {
    Quat::from_rotation_z(-yaw) * world
}

#[must_use]
pub fn encode(
    state: &BodyState,
    goal: &Goal,
    descriptor: &BodyDescriptor,
    scales: ObservationScales,
) -> Vec<f32> {
    let (roll, pitch, yaw) = euler_from_quat(state.pose.orientation);
    let angle_to_goal = goal.angle_from(state.pose.position) - yaw;
    let (sin, cos) = angle_to_goal.sin_cos();
    let local = to_heading_frame(state.velocity.linear, yaw) * scales.local_velocity;

    let mut observation = Vec::with_capacity(observation_len(descriptor.num_joints()));
    observation.extend_from_slice(&[sin, cos, roll, pitch, local.x, local.y, local.z]);
    for (joint, spec) in state.joints.iter().zip(descriptor.joints()) {
        observation.push(spec.normalize(joint.position));
        observation.push(joint.velocity * scales.joint_velocity);
    }
    observation
}
