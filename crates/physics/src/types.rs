//! Value types exchanged across the backend contract.
//!
//! The world frame is Z-up: `x` and `y` span the ground plane and gravity acts
//! along `-z`. Orientations are unit quaternions.

pub use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// How a backend connection is opened.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// A human is watching; callers are expected to pace the simulation.
    Interactive,
    #[default]
    Headless,
}

/// Opaque handle to a body loaded into a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub usize);

/// A collision link of a body: the base or the child link of joint `i`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Link {
    Base,
    Joint(usize),
}

/// Contact material coefficients.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub friction: f32,
    pub restitution: f32,
}

impl Material {
    #[must_use]
    pub const fn new(friction: f32, restitution: f32) -> Self {
        Self {
            friction,
            restitution,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(0.5, 0.0)
    }
}

/// Fixed-step integration settings.
///
/// Every call to `step_integration` advances simulated time by
/// `fixed_time_step`, split internally into `sub_steps` solver passes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntegrationParams {
    pub fixed_time_step: f32,
    pub solver_iterations: u32,
    pub sub_steps: u32,
}

impl IntegrationParams {
    /// Duration of one internal solver pass.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sub_step_duration(&self) -> f32 {
        self.fixed_time_step / self.sub_steps.max(1) as f32
    }
}

impl Default for IntegrationParams {
    fn default() -> Self {
        Self {
            fixed_time_step: 1.0 / 240.0,
            solver_iterations: 50,
            sub_steps: 1,
        }
    }
}

/// World-frame base pose.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    #[must_use]
    pub const fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// World-frame base velocity.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Velocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl Velocity {
    pub const ZERO: Self = Self {
        linear: Vec3::ZERO,
        angular: Vec3::ZERO,
    };
}

/// Declared limits of a single joint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JointLimits {
    pub lower: f32,
    pub upper: f32,
    pub max_force: f32,
    pub max_velocity: f32,
}

/// Instantaneous joint coordinate and its rate.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct JointState {
    pub position: f32,
    pub velocity: f32,
}

impl JointState {
    pub const ZERO: Self = Self {
        position: 0.0,
        velocity: 0.0,
    };
}

/// Roll, pitch and yaw of an orientation, using the extrinsic X-Y-Z
/// convention (`R = Rz(yaw) * Ry(pitch) * Rx(roll)`).
#[must_use]
pub fn euler_from_quat(orientation: Quat) -> (f32, f32, f32) {
    let (yaw, pitch, roll) = orientation.to_euler(glam::EulerRot::ZYX);
    (roll, pitch, yaw)
}

/// Inverse of [`euler_from_quat`].
#[must_use]
pub fn quat_from_euler(roll: f32, pitch: f32, yaw: f32) -> Quat {
    Quat::from_euler(glam::EulerRot::ZYX, yaw, pitch, roll)
}
