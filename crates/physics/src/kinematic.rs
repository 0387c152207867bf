//! # Kinematic Backend
//!
//! A deterministic, in-process implementation of [`PhysicsBackend`]. It does
//! not solve contact dynamics. Instead each body follows a small kinematic
//! model that is cheap, reproducible bit-for-bit, and good enough to drive the
//! environment layer end to end:
//!
//! -   **Joints** slew toward their motor target at no more than the commanded
//!     velocity limit and never overshoot it. Targets are clamped to the joint
//!     limits, so a joint that starts inside its limits stays inside them.
//! -   **Locomotion** only happens while the base rests on the ground. The
//!     base moves along its heading at `stride * mean(|joint velocity|)` and
//!     yaws at `turn * mean(joint velocity)`, both scaled by traction (ground
//!     friction times mean link friction, capped at 1).
//! -   **Vertical motion** follows the `z` component of gravity down to the
//!     body's rest height, bouncing with the product of the ground and base
//!     restitution.
//!
//! Every tick is split into `sub_steps` equal passes.

use std::path::Path;

use tracing::{debug, trace};

use crate::backend::{BackendResult, PhysicsBackend};
use crate::error::BackendError;
use crate::model::BodyModel;
use crate::types::{
    BodyHandle, ConnectionMode, IntegrationParams, JointLimits, JointState, Link, Material,
    Pose, Quat, Vec3, Velocity,
};

// Bounce speeds below this are absorbed so the base comes to rest.
const SETTLE_SPEED: f32 = 1e-3;

#[derive(Clone, Copy, Debug)]
struct Motor {
    target: f32,
    max_force: f32,
    max_velocity: f32,
}

#[derive(Clone, Debug)]
struct KinematicJoint {
    limits: JointLimits,
    state: JointState,
    material: Material,
    motor: Option<Motor>,
}

#[derive(Clone, Debug)]
struct KinematicBody {
    model: BodyModel,
    pose: Pose,
    velocity: Velocity,
    base_material: Material,
    joints: Vec<KinematicJoint>,
}

impl KinematicBody {
    fn from_model(model: BodyModel) -> Self {
        let joints = model
            .joints
            .iter()
            .map(|def| KinematicJoint {
                limits: def.limits(),
                state: JointState::ZERO,
                material: Material::default(),
                motor: None,
            })
            .collect();
        Self {
            pose: Pose::new(model.base.position, model.base.orientation),
            velocity: Velocity::ZERO,
            base_material: Material::default(),
            joints,
            model,
        }
    }

    fn joint(&self, handle: BodyHandle, joint: usize) -> BackendResult<&KinematicJoint> {
        self.joints
            .get(joint)
            .ok_or(BackendError::UnknownJoint {
                body: handle,
                joint,
            })
    }

    fn joint_mut(
        &mut self,
        handle: BodyHandle,
        joint: usize,
    ) -> BackendResult<&mut KinematicJoint> {
        self.joints
            .get_mut(joint)
            .ok_or(BackendError::UnknownJoint {
                body: handle,
                joint,
            })
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean_friction(&self) -> f32 {
        let total: f32 = self.joints.iter().map(|j| j.material.friction).sum::<f32>()
            + self.base_material.friction;
        total / (self.joints.len() + 1) as f32
    }

    fn drive_joints(&mut self, dt: f32) {
        for joint in &mut self.joints {
            let Some(motor) = joint.motor else {
                joint.state.velocity = 0.0;
                continue;
            };
            if motor.max_force <= 0.0 {
                joint.state.velocity = 0.0;
                continue;
            }
            let target = motor.target.clamp(joint.limits.lower, joint.limits.upper);
            let error = target - joint.state.position;
            let velocity = (error / dt).clamp(-motor.max_velocity, motor.max_velocity);
            joint.state.position += velocity * dt;
            joint.state.velocity = velocity;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn joint_activity(&self) -> (f32, f32) {
        if self.joints.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.joints.len() as f32;
        let speed = self.joints.iter().map(|j| j.state.velocity.abs()).sum::<f32>() / n;
        let drive = self.joints.iter().map(|j| j.state.velocity).sum::<f32>() / n;
        (speed, drive)
    }

    fn advance_base(&mut self, dt: f32, gravity: Vec3, ground: Option<Material>) {
        let rest = self.model.rest_height();
        let grounded = ground.is_some() && self.pose.position.z <= rest + f32::EPSILON;

        if grounded {
            let traction = ground.map_or(0.0, |g| (g.friction * self.mean_friction()).min(1.0));
            let (speed, drive) = self.joint_activity();
            let yaw_rate = self.model.gait.turn * drive * traction;
            self.pose.orientation =
                (Quat::from_rotation_z(yaw_rate * dt) * self.pose.orientation).normalize();

            let facing = self.pose.orientation * Vec3::X;
            let heading = Vec3::new(facing.x, facing.y, 0.0).try_normalize().unwrap_or(Vec3::X);
            let forward = heading * (self.model.gait.stride * speed * traction);
            self.velocity.linear.x = forward.x;
            self.velocity.linear.y = forward.y;
            self.velocity.angular = Vec3::new(0.0, 0.0, yaw_rate);
        } else {
            self.velocity.angular = Vec3::ZERO;
        }

        if !grounded || self.velocity.linear.z.abs() > f32::EPSILON {
            self.velocity.linear.z += gravity.z * dt;
        }
        self.pose.position += self.velocity.linear * dt;

        if let Some(ground) = ground {
            if self.pose.position.z < rest {
                self.pose.position.z = rest;
                let restitution = ground.restitution * self.base_material.restitution;
                let bounce = -self.velocity.linear.z * restitution;
                self.velocity.linear.z = if bounce > SETTLE_SPEED { bounce } else { 0.0 };
            }
        }
    }
}

/// Deterministic kinematic stand-in for a rigid-body engine.
#[derive(Debug)]
pub struct KinematicBackend {
    mode: ConnectionMode,
    connected: bool,
    integration: IntegrationParams,
    gravity: Vec3,
    ground: Option<Material>,
    bodies: Vec<KinematicBody>,
}

impl KinematicBackend {
    #[must_use]
    pub fn new(mode: ConnectionMode) -> Self {
        Self {
            mode,
            connected: true,
            integration: IntegrationParams::default(),
            gravity: Vec3::ZERO,
            ground: None,
            bodies: Vec::new(),
        }
    }

    /// Adds a body from an already parsed model.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the model is invalid.
    pub fn add_body(&mut self, model: BodyModel) -> BackendResult<BodyHandle> {
        self.ensure_connected()?;
        model.validate()?;
        let handle = BodyHandle(self.bodies.len());
        debug!(
            "Loaded body {:?} '{}' with {} joints",
            handle,
            model.name,
            model.joints.len()
        );
        self.bodies.push(KinematicBody::from_model(model));
        Ok(handle)
    }

    #[must_use]
    pub const fn mode(&self) -> ConnectionMode {
        self.mode
    }

    #[must_use]
    pub const fn integration(&self) -> IntegrationParams {
        self.integration
    }

    #[must_use]
    pub const fn gravity(&self) -> Vec3 {
        self.gravity
    }

    #[must_use]
    pub const fn ground(&self) -> Option<Material> {
        self.ground
    }

    /// Material currently assigned to a link.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown body or link, or a closed connection.
    pub fn material(&self, body: BodyHandle, link: Link) -> BackendResult<Material> {
        let b = self.body(body)?;
        match link {
            Link::Base => Ok(b.base_material),
            Link::Joint(i) => b
                .joints
                .get(i)
                .map(|j| j.material)
                .ok_or(BackendError::UnknownLink { body, link: i }),
        }
    }

    /// Last position target commanded on a joint, if any.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown body or joint, or a closed connection.
    pub fn motor_target(&self, body: BodyHandle, joint: usize) -> BackendResult<Option<f32>> {
        Ok(self.body(body)?.joint(body, joint)?.motor.map(|m| m.target))
    }

    fn ensure_connected(&self) -> BackendResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(BackendError::NotConnected)
        }
    }

    fn body(&self, handle: BodyHandle) -> BackendResult<&KinematicBody> {
        self.ensure_connected()?;
        self.bodies
            .get(handle.0)
            .ok_or(BackendError::UnknownBody(handle))
    }

    fn body_mut(&mut self, handle: BodyHandle) -> BackendResult<&mut KinematicBody> {
        self.ensure_connected()?;
        self.bodies
            .get_mut(handle.0)
            .ok_or(BackendError::UnknownBody(handle))
    }
}

impl PhysicsBackend for KinematicBackend {
    fn connect(mode: ConnectionMode) -> BackendResult<Self> {
        debug!("Opening kinematic backend in {:?} mode", mode);
        Ok(Self::new(mode))
    }

    fn configure_integration(&mut self, params: IntegrationParams) -> BackendResult<()> {
        self.ensure_connected()?;
        if !(params.fixed_time_step.is_finite() && params.fixed_time_step > 0.0) {
            return Err(BackendError::InvalidParameter("fixed time step must be positive"));
        }
        if params.sub_steps == 0 {
            return Err(BackendError::InvalidParameter("sub-step count must be positive"));
        }
        if params.solver_iterations == 0 {
            return Err(BackendError::InvalidParameter("solver iteration count must be positive"));
        }
        self.integration = params;
        Ok(())
    }

    fn set_gravity(&mut self, gravity: Vec3) -> BackendResult<()> {
        self.ensure_connected()?;
        if !gravity.is_finite() {
            return Err(BackendError::InvalidParameter("gravity must be finite"));
        }
        self.gravity = gravity;
        Ok(())
    }

    fn create_ground_plane(&mut self, material: Material) -> BackendResult<()> {
        self.ensure_connected()?;
        self.ground = Some(material);
        Ok(())
    }

    fn load_body(&mut self, path: &Path) -> BackendResult<BodyHandle> {
        self.ensure_connected()?;
        let model = BodyModel::from_file(path)?;
        self.add_body(model)
    }

    fn joint_count(&self, body: BodyHandle) -> BackendResult<usize> {
        Ok(self.body(body)?.joints.len())
    }

    fn joint_limits(&self, body: BodyHandle, joint: usize) -> BackendResult<JointLimits> {
        Ok(self.body(body)?.joint(body, joint)?.limits)
    }

    fn set_material(
        &mut self,
        body: BodyHandle,
        link: Link,
        material: Material,
    ) -> BackendResult<()> {
        let b = self.body_mut(body)?;
        match link {
            Link::Base => b.base_material = material,
            Link::Joint(i) => {
                b.joints
                    .get_mut(i)
                    .ok_or(BackendError::UnknownLink { body, link: i })?
                    .material = material;
            }
        }
        Ok(())
    }

    fn pose(&self, body: BodyHandle) -> BackendResult<Pose> {
        Ok(self.body(body)?.pose)
    }

    fn velocity(&self, body: BodyHandle) -> BackendResult<Velocity> {
        Ok(self.body(body)?.velocity)
    }

    fn joint_state(&self, body: BodyHandle, joint: usize) -> BackendResult<JointState> {
        Ok(self.body(body)?.joint(body, joint)?.state)
    }

    fn set_joint_position_target(
        &mut self,
        body: BodyHandle,
        joint: usize,
        target: f32,
        max_force: f32,
        max_velocity: f32,
    ) -> BackendResult<()> {
        if !(target.is_finite() && max_force.is_finite() && max_velocity.is_finite()) {
            return Err(BackendError::InvalidParameter("motor command must be finite"));
        }
        let j = self.body_mut(body)?.joint_mut(body, joint)?;
        j.motor = Some(Motor {
            target,
            max_force,
            max_velocity: max_velocity.abs(),
        });
        Ok(())
    }

    fn step_integration(&mut self) -> BackendResult<()> {
        self.ensure_connected()?;
        let dt = self.integration.sub_step_duration();
        let gravity = self.gravity;
        let ground = self.ground;
        for _ in 0..self.integration.sub_steps {
            for body in &mut self.bodies {
                body.drive_joints(dt);
                body.advance_base(dt, gravity, ground);
            }
        }
        trace!("Advanced {} bodies by {}s", self.bodies.len(), self.integration.fixed_time_step);
        Ok(())
    }

    fn reset_pose(&mut self, body: BodyHandle, pose: Pose) -> BackendResult<()> {
        self.body_mut(body)?.pose = pose;
        Ok(())
    }

    fn reset_velocity(&mut self, body: BodyHandle, velocity: Velocity) -> BackendResult<()> {
        self.body_mut(body)?.velocity = velocity;
        Ok(())
    }

    /// Also clears any motor command on the joint.
    fn reset_joint_state(
        &mut self,
        body: BodyHandle,
        joint: usize,
        state: JointState,
    ) -> BackendResult<()> {
        let j = self.body_mut(body)?.joint_mut(body, joint)?;
        j.state = state;
        j.motor = None;
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            debug!("Closing kinematic backend with {} bodies", self.bodies.len());
        }
        self.connected = false;
        self.bodies.clear();
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
