//! Construction-time description of the creature.

use physics::{BodyHandle, JointLimits, Link, Material, PhysicsBackend, Pose};
use tracing::{info, warn};

use crate::error::EnvError;

/// Normalization and motor limits of one joint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JointSpec {
    /// Midpoint of the position range.
    pub middle: f32,
    /// Half-width of the position range. Always strictly positive.
    pub range: f32,
    pub max_force: f32,
    pub max_velocity: f32,
}

impl JointSpec {
    /// # Errors
    ///
    /// Returns [`EnvError::DegenerateJoint`] if the range has zero (or
    /// non-finite) width.
    pub fn from_limits(joint: usize, limits: JointLimits) -> Result<Self, EnvError> {
        let middle = 0.5 * (limits.lower + limits.upper);
        let range = 0.5 * (limits.upper - limits.lower);
        if !(range.is_finite() && range > 0.0) {
            return Err(EnvError::DegenerateJoint {
                joint,
                lower: limits.lower,
                upper: limits.upper,
            });
        }
        Ok(Self {
            middle,
            range,
            max_force: limits.max_force,
            max_velocity: limits.max_velocity,
        })
    }

    /// Maps the position range onto `[-1, 1]`.
    #[must_use]
    pub fn normalize(&self, position: f32) -> f32 {
        (position - self.middle) / self.range
    }

    /// Inverse of [`normalize`](Self::normalize): action `0` targets the
    /// midpoint and `±1` the limits.
    #[must_use]
    pub fn target(&self, action: f32) -> f32 {
        self.middle + action * self.range
    }

    #[must_use]
    pub fn contains(&self, position: f32) -> bool {
        (position - self.middle).abs() <= self.range
    }
}

/// Joint limits and initial pose, fixed for the lifetime of one backend
/// connection.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyDescriptor {
    joints: Vec<JointSpec>,
    initial_pose: Pose,
}

impl BodyDescriptor {
    /// # Errors
    ///
    /// Returns [`EnvError::DegenerateJoint`] for the first joint whose range
    /// has zero width.
    pub fn from_limits(limits: &[JointLimits], initial_pose: Pose) -> Result<Self, EnvError> {
        let joints = limits
            .iter()
            .enumerate()
            .map(|(i, l)| JointSpec::from_limits(i, *l))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            joints,
            initial_pose,
        })
    }

    /// Records the body's current pose and joint limits, then assigns
    /// `material` to the base and every link.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report the body's metadata or
    /// a joint range is degenerate.
    pub fn from_backend<B: PhysicsBackend + ?Sized>(
        backend: &mut B,
        body: BodyHandle,
        material: Material,
    ) -> Result<Self, EnvError> {
        let joint_count = backend.joint_count(body)?;
        let limits = (0..joint_count)
            .map(|i| backend.joint_limits(body, i))
            .collect::<Result<Vec<_>, _>>()?;
        let descriptor = Self::from_limits(&limits, backend.pose(body)?)?;

        backend.set_material(body, Link::Base, material)?;
        for i in 0..joint_count {
            backend.set_material(body, Link::Joint(i), material)?;
        }

        for (i, joint) in descriptor.joints.iter().enumerate() {
            if !joint.contains(0.0) {
                warn!(
                    "Joint {} resets to 0, outside its range [{:.3}, {:.3}]",
                    i,
                    joint.middle - joint.range,
                    joint.middle + joint.range
                );
            }
        }
        info!(
            "Body descriptor ready: {} joints, initial position {:?}",
            joint_count, descriptor.initial_pose.position
        );
        Ok(descriptor)
    }

    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    #[must_use]
    pub fn joints(&self) -> &[JointSpec] {
        &self.joints
    }

    #[must_use]
    pub fn joint(&self, index: usize) -> Option<&JointSpec> {
        self.joints.get(index)
    }

    #[must_use]
    pub const fn initial_pose(&self) -> Pose {
        self.initial_pose
    }
}
