//! # Rigid-Body Backend
//!
//! [`RapierBackend`] runs the backend contract on the rapier engine. The base
//! and every joint's child link of a [`BodyModel`] become dynamic boxes, and
//! each joint becomes a limited revolute impulse joint.
//!
//! Position targets are tracked through the joint's velocity motor. Before
//! every solver pass the motor is asked for a velocity proportional to the
//! remaining error, capped at the commanded velocity limit, and its force is
//! capped at the commanded force limit. A joint without a command is limp.
//!
//! Joint coordinates are measured from the model's rest configuration, in
//! which every link shares its parent's orientation. The links of a body only
//! collide with the ground, never with each other.

use std::path::Path;

use rapier3d::na::{point, Quaternion, UnitQuaternion, Vector3};
use rapier3d::prelude::*;
use tracing::{debug, trace};

use crate::backend::{BackendResult, PhysicsBackend};
use crate::error::BackendError;
use crate::model::BodyModel;
use crate::types::{
    BodyHandle, ConnectionMode, IntegrationParams, JointLimits, JointState, Link, Material,
    Pose, Quat, Vec3, Velocity,
};

const GROUND_GROUP: Group = Group::GROUP_1;
const BODY_GROUP: Group = Group::GROUP_2;

// The ground is a wide slab whose top face is the plane z = 0.
const GROUND_HALF_WIDTH: f32 = 500.0;
const GROUND_HALF_THICKNESS: f32 = 0.5;

/// Commanded joint speed per radian of tracking error, in 1/s.
const POSITION_GAIN: f32 = 20.0;
const MOTOR_RESPONSE: f32 = 16.0;

#[derive(Clone, Copy, Debug)]
struct Motor {
    target: f32,
    max_force: f32,
    max_velocity: f32,
}

struct RapierLink {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    joint: ImpulseJointHandle,
    parent: Option<usize>,
    parent_body: RigidBodyHandle,
    /// Hinge point in the parent link's frame.
    anchor: Vec3,
    /// Hinge point in this link's frame.
    offset: Vec3,
    axis: Vec3,
    limits: JointLimits,
    motor: Option<Motor>,
}

struct RapierBody {
    base: RigidBodyHandle,
    base_collider: ColliderHandle,
    links: Vec<RapierLink>,
}

impl RapierBody {
    fn link(&self, handle: BodyHandle, joint: usize) -> BackendResult<&RapierLink> {
        self.links.get(joint).ok_or(BackendError::UnknownJoint {
            body: handle,
            joint,
        })
    }

    fn link_mut(&mut self, handle: BodyHandle, joint: usize) -> BackendResult<&mut RapierLink> {
        self.links.get_mut(joint).ok_or(BackendError::UnknownJoint {
            body: handle,
            joint,
        })
    }

    fn collider(&self, handle: BodyHandle, link: Link) -> BackendResult<ColliderHandle> {
        match link {
            Link::Base => Ok(self.base_collider),
            Link::Joint(i) => self
                .links
                .get(i)
                .map(|l| l.collider)
                .ok_or(BackendError::UnknownLink {
                    body: handle,
                    link: i,
                }),
        }
    }
}

/// World-frame pose and velocity of one link.
#[derive(Clone, Copy, Debug)]
struct Frame {
    position: Vec3,
    orientation: Quat,
    linear: Vec3,
    angular: Vec3,
}

impl Frame {
    fn of(body: &RigidBody) -> Self {
        Self {
            position: from_vector(body.translation()),
            orientation: from_rotation(body.rotation()),
            linear: from_vector(body.linvel()),
            angular: from_vector(body.angvel()),
        }
    }

    fn apply(&self, body: &mut RigidBody) {
        body.set_translation(to_vector(self.position), true);
        body.set_rotation(to_rotation(self.orientation), true);
        body.set_linvel(to_vector(self.linear), true);
        body.set_angvel(to_vector(self.angular), true);
    }
}

fn to_vector(v: Vec3) -> Vector3<f32> {
    Vector3::new(v.x, v.y, v.z)
}

fn from_vector(v: &Vector3<f32>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn to_rotation(q: Quat) -> UnitQuaternion<f32> {
    UnitQuaternion::new_normalize(Quaternion::new(q.w, q.x, q.y, q.z))
}

fn from_rotation(q: &UnitQuaternion<f32>) -> Quat {
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

/// Hinge angle and rate of `link` relative to its parent.
fn measure(bodies: &RigidBodySet, link: &RapierLink) -> Option<JointState> {
    let parent = bodies.get(link.parent_body)?;
    let child = bodies.get(link.body)?;
    let parent_rotation = from_rotation(parent.rotation());
    let mut relative = parent_rotation.inverse() * from_rotation(child.rotation());
    if relative.w < 0.0 {
        relative = -relative;
    }
    let position = 2.0 * relative.xyz().dot(link.axis).atan2(relative.w);
    let spin = from_vector(child.angvel()) - from_vector(parent.angvel());
    Some(JointState {
        position,
        velocity: spin.dot(parent_rotation * link.axis),
    })
}

fn measure_all(
    bodies: &RigidBodySet,
    handle: BodyHandle,
    creature: &RapierBody,
) -> BackendResult<Vec<JointState>> {
    creature
        .links
        .iter()
        .map(|link| measure(bodies, link).ok_or(BackendError::UnknownBody(handle)))
        .collect()
}

/// Re-places every link from the base frame outwards so that joint `i` sits
/// at `states[i]`.
fn place_links(
    bodies: &mut RigidBodySet,
    handle: BodyHandle,
    creature: &RapierBody,
    states: &[JointState],
) -> BackendResult<()> {
    let base = bodies
        .get(creature.base)
        .map(Frame::of)
        .ok_or(BackendError::UnknownBody(handle))?;
    let mut frames: Vec<Frame> = Vec::with_capacity(creature.links.len());
    for (link, state) in creature.links.iter().zip(states) {
        let parent = match link.parent {
            Some(p) => frames.get(p).copied().ok_or(BackendError::UnknownBody(handle))?,
            None => base,
        };
        let orientation = parent.orientation * Quat::from_axis_angle(link.axis, state.position);
        let pivot = parent.position + parent.orientation * link.anchor;
        let position = pivot - orientation * link.offset;
        let angular = parent.angular + parent.orientation * link.axis * state.velocity;
        let linear = parent.linear
            + parent.angular.cross(pivot - parent.position)
            + angular.cross(position - pivot);
        let frame = Frame {
            position,
            orientation,
            linear,
            angular,
        };
        let body = bodies
            .get_mut(link.body)
            .ok_or(BackendError::UnknownBody(handle))?;
        frame.apply(body);
        frames.push(frame);
    }
    Ok(())
}

/// Rigid-body backend on the rapier engine.
pub struct RapierBackend {
    mode: ConnectionMode,
    connected: bool,
    integration: IntegrationParams,
    gravity: Vec3,
    parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    ground: Option<ColliderHandle>,
    creatures: Vec<RapierBody>,
}

impl RapierBackend {
    #[must_use]
    pub fn new(mode: ConnectionMode) -> Self {
        let integration = IntegrationParams::default();
        let mut parameters = IntegrationParameters::default();
        parameters.dt = integration.sub_step_duration();
        Self {
            mode,
            connected: true,
            integration,
            gravity: Vec3::ZERO,
            parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            ground: None,
            creatures: Vec::new(),
        }
    }

    /// Builds the links and joints of an already parsed model at its rest
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the model is invalid.
    pub fn add_body(&mut self, model: &BodyModel) -> BackendResult<BodyHandle> {
        self.ensure_connected()?;
        model.validate()?;
        let handle = BodyHandle(self.creatures.len());
        let base_pose = Pose::new(model.base.position, model.base.orientation);
        let (base, base_collider) =
            self.insert_box(base_pose, model.base.half_extents, model.density);

        let mut links: Vec<RapierLink> = Vec::with_capacity(model.joints.len());
        let mut poses: Vec<Pose> = Vec::with_capacity(model.joints.len());
        for def in &model.joints {
            let (parent_body, parent_pose) = match def.parent {
                Some(p) => links
                    .get(p)
                    .map(|l| l.body)
                    .zip(poses.get(p).copied())
                    .ok_or_else(|| {
                        BackendError::InvalidModel(format!("joint {} has no parent link", def.name))
                    })?,
                None => (base, base_pose),
            };
            let axis = def.axis.normalize();
            let offset = Vec3::new(0.0, 0.0, def.link.z);
            let pivot = parent_pose.position + parent_pose.orientation * def.anchor;
            let pose = Pose::new(pivot - parent_pose.orientation * offset, parent_pose.orientation);
            let (body, collider) = self.insert_box(pose, def.link, model.density);

            let joint = RevoluteJointBuilder::new(UnitVector::new_normalize(to_vector(axis)))
                .local_anchor1(point![def.anchor.x, def.anchor.y, def.anchor.z])
                .local_anchor2(point![offset.x, offset.y, offset.z])
                .limits([def.lower, def.upper])
                .contacts_enabled(false);
            let joint = self.impulse_joints.insert(parent_body, body, joint, true);
            if let Some(j) = self.impulse_joints.get_mut(joint, false) {
                j.data.set_motor_model(JointAxis::AngX, MotorModel::ForceBased);
                j.data.set_motor_velocity(JointAxis::AngX, 0.0, MOTOR_RESPONSE);
                j.data.set_motor_max_force(JointAxis::AngX, 0.0);
            }

            links.push(RapierLink {
                body,
                collider,
                joint,
                parent: def.parent,
                parent_body,
                anchor: def.anchor,
                offset,
                axis,
                limits: def.limits(),
                motor: None,
            });
            poses.push(pose);
        }

        debug!(
            "Built body {:?} '{}' from {} rigid links",
            handle,
            model.name,
            links.len() + 1
        );
        self.creatures.push(RapierBody {
            base,
            base_collider,
            links,
        });
        Ok(handle)
    }

    fn insert_box(
        &mut self,
        pose: Pose,
        half_extents: Vec3,
        density: f32,
    ) -> (RigidBodyHandle, ColliderHandle) {
        let body = RigidBodyBuilder::dynamic()
            .translation(to_vector(pose.position))
            .build();
        let handle = self.bodies.insert(body);
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_rotation(to_rotation(pose.orientation), false);
        }
        let material = Material::default();
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .density(density)
            .friction(material.friction)
            .restitution(material.restitution)
            .collision_groups(InteractionGroups::new(
                BODY_GROUP,
                GROUND_GROUP,
                InteractionTestMode::And,
            ))
            .build();
        let collider = self
            .colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        (handle, collider)
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

    /// Material of the ground plane, if one was created.
    #[must_use]
    pub fn ground(&self) -> Option<Material> {
        let collider = self.colliders.get(self.ground?)?;
        Some(Material::new(collider.friction(), collider.restitution()))
    }

    /// Material currently assigned to a link.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown body or link, or a closed connection.
    pub fn material(&self, body: BodyHandle, link: Link) -> BackendResult<Material> {
        let handle = self.creature(body)?.collider(body, link)?;
        let collider = self
            .colliders
            .get(handle)
            .ok_or(BackendError::UnknownBody(body))?;
        Ok(Material::new(collider.friction(), collider.restitution()))
    }

    /// Last position target commanded on a joint, if any.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown body or joint, or a closed connection.
    pub fn motor_target(&self, body: BodyHandle, joint: usize) -> BackendResult<Option<f32>> {
        Ok(self.creature(body)?.link(body, joint)?.motor.map(|m| m.target))
    }

    fn ensure_connected(&self) -> BackendResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(BackendError::NotConnected)
        }
    }

    fn creature(&self, handle: BodyHandle) -> BackendResult<&RapierBody> {
        self.ensure_connected()?;
        self.creatures
            .get(handle.0)
            .ok_or(BackendError::UnknownBody(handle))
    }

    fn base(&self, handle: BodyHandle) -> BackendResult<&RigidBody> {
        let base = self.creature(handle)?.base;
        self.bodies.get(base).ok_or(BackendError::UnknownBody(handle))
    }

    fn joint_states(&self, handle: BodyHandle) -> BackendResult<Vec<JointState>> {
        measure_all(&self.bodies, handle, self.creature(handle)?)
    }

    fn base_mut(&mut self, handle: BodyHandle) -> BackendResult<&mut RigidBody> {
        let base = self.creature(handle)?.base;
        self.bodies
            .get_mut(base)
            .ok_or(BackendError::UnknownBody(handle))
    }

    /// Re-places every link of `handle` around its current base.
    fn place(&mut self, handle: BodyHandle, states: &[JointState]) -> BackendResult<()> {
        self.ensure_connected()?;
        let creature = self
            .creatures
            .get(handle.0)
            .ok_or(BackendError::UnknownBody(handle))?;
        place_links(&mut self.bodies, handle, creature, states)
    }

    fn drive_motors(&mut self) {
        for creature in &self.creatures {
            for link in &creature.links {
                let Some(motor) = link.motor else {
                    continue;
                };
                let Some(state) = measure(&self.bodies, link) else {
                    continue;
                };
                let target = motor.target.clamp(link.limits.lower, link.limits.upper);
                let speed = (POSITION_GAIN * (target - state.position))
                    .clamp(-motor.max_velocity, motor.max_velocity);
                if let Some(joint) = self.impulse_joints.get_mut(link.joint, true) {
                    joint
                        .data
                        .set_motor_velocity(JointAxis::AngX, speed, MOTOR_RESPONSE);
                    joint
                        .data
                        .set_motor_max_force(JointAxis::AngX, motor.max_force);
                }
            }
        }
    }
}

impl PhysicsBackend for RapierBackend {
    fn connect(mode: ConnectionMode) -> BackendResult<Self> {
        debug!("Opening rapier backend in {:?} mode", mode);
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
        let iterations = usize::try_from(params.solver_iterations)
            .ok()
            .filter(|&n| n > 0)
            .ok_or(BackendError::InvalidParameter(
                "solver iteration count must be positive",
            ))?;
        self.parameters.dt = params.sub_step_duration();
        self.parameters.num_solver_iterations = iterations;
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
        if let Some(collider) = self.ground.and_then(|h| self.colliders.get_mut(h)) {
            collider.set_friction(material.friction);
            collider.set_restitution(material.restitution);
            return Ok(());
        }
        let ground = self.bodies.insert(RigidBodyBuilder::fixed().build());
        let collider =
            ColliderBuilder::cuboid(GROUND_HALF_WIDTH, GROUND_HALF_WIDTH, GROUND_HALF_THICKNESS)
                .translation(Vector3::new(0.0, 0.0, -GROUND_HALF_THICKNESS))
                .friction(material.friction)
                .restitution(material.restitution)
                .collision_groups(InteractionGroups::new(
                    GROUND_GROUP,
                    BODY_GROUP,
                    InteractionTestMode::And,
                ))
                .build();
        self.ground = Some(
            self.colliders
                .insert_with_parent(collider, ground, &mut self.bodies),
        );
        Ok(())
    }

    fn load_body(&mut self, path: &Path) -> BackendResult<BodyHandle> {
        self.ensure_connected()?;
        let model = BodyModel::from_file(path)?;
        self.add_body(&model)
    }

    fn joint_count(&self, body: BodyHandle) -> BackendResult<usize> {
        Ok(self.creature(body)?.links.len())
    }

    fn joint_limits(&self, body: BodyHandle, joint: usize) -> BackendResult<JointLimits> {
        Ok(self.creature(body)?.link(body, joint)?.limits)
    }

    fn set_material(
        &mut self,
        body: BodyHandle,
        link: Link,
        material: Material,
    ) -> BackendResult<()> {
        let handle = self.creature(body)?.collider(body, link)?;
        let collider = self
            .colliders
            .get_mut(handle)
            .ok_or(BackendError::UnknownBody(body))?;
        collider.set_friction(material.friction);
        collider.set_restitution(material.restitution);
        Ok(())
    }

    fn pose(&self, body: BodyHandle) -> BackendResult<Pose> {
        let base = self.base(body)?;
        Ok(Pose::new(
            from_vector(base.translation()),
            from_rotation(base.rotation()),
        ))
    }

    fn velocity(&self, body: BodyHandle) -> BackendResult<Velocity> {
        let base = self.base(body)?;
        Ok(Velocity {
            linear: from_vector(base.linvel()),
            angular: from_vector(base.angvel()),
        })
    }

    fn joint_state(&self, body: BodyHandle, joint: usize) -> BackendResult<JointState> {
        let link = self.creature(body)?.link(body, joint)?;
        measure(&self.bodies, link).ok_or(BackendError::UnknownBody(body))
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
        self.ensure_connected()?;
        let link = self
            .creatures
            .get_mut(body.0)
            .ok_or(BackendError::UnknownBody(body))?
            .link_mut(body, joint)?;
        link.motor = Some(Motor {
            target,
            max_force: max_force.max(0.0),
            max_velocity: max_velocity.abs(),
        });
        Ok(())
    }

    fn step_integration(&mut self) -> BackendResult<()> {
        self.ensure_connected()?;
        let gravity = to_vector(self.gravity);
        for _ in 0..self.integration.sub_steps {
            self.drive_motors();
            self.pipeline.step(
                &gravity,
                &self.parameters,
                &mut self.islands,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                &(),
                &(),
            );
        }
        trace!(
            "Advanced {} rigid bodies by {}s",
            self.bodies.len(),
            self.integration.fixed_time_step
        );
        Ok(())
    }

    /// Moves the whole body rigidly, keeping its joint configuration.
    fn reset_pose(&mut self, body: BodyHandle, pose: Pose) -> BackendResult<()> {
        if !(pose.position.is_finite() && pose.orientation.is_finite()) {
            return Err(BackendError::InvalidParameter("pose must be finite"));
        }
        let states = self.joint_states(body)?;
        let base = self.base_mut(body)?;
        base.set_translation(to_vector(pose.position), true);
        base.set_rotation(to_rotation(pose.orientation), true);
        self.place(body, &states)
    }

    /// Gives the whole body the base velocity on top of its joint rates.
    fn reset_velocity(&mut self, body: BodyHandle, velocity: Velocity) -> BackendResult<()> {
        let states = self.joint_states(body)?;
        let base = self.base_mut(body)?;
        base.set_linvel(to_vector(velocity.linear), true);
        base.set_angvel(to_vector(velocity.angular), true);
        self.place(body, &states)
    }

    /// Also clears any motor command on the joint, leaving it limp.
    fn reset_joint_state(
        &mut self,
        body: BodyHandle,
        joint: usize,
        state: JointState,
    ) -> BackendResult<()> {
        self.ensure_connected()?;
        let link = self
            .creatures
            .get_mut(body.0)
            .ok_or(BackendError::UnknownBody(body))?
            .link_mut(body, joint)?;
        link.motor = None;
        let handle = link.joint;
        if let Some(j) = self.impulse_joints.get_mut(handle, true) {
            j.data.set_motor_velocity(JointAxis::AngX, 0.0, MOTOR_RESPONSE);
            j.data.set_motor_max_force(JointAxis::AngX, 0.0);
        }
        let mut states = self.joint_states(body)?;
        if let Some(slot) = states.get_mut(joint) {
            *slot = state;
        }
        self.place(body, &states)
    }

    fn disconnect(&mut self) {
        if self.connected {
            debug!(
                "Closing rapier backend with {} bodies",
                self.creatures.len()
            );
        }
        let mode = self.mode;
        *self = Self::new(mode);
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
