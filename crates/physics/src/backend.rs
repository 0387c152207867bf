//! # Physics Backend Contract
//!
//! The environment layer never talks to a simulator directly. Body loading,
//! state queries, joint motors and time stepping all go through
//! [`PhysicsBackend`]. Implementations are
//! free to subdivide a tick into as many solver passes as they like; callers
//! only ever observe whole fixed steps.
//!
//! A backend instance is one exclusively owned connection. It is `Send` so a
//! worker thread can own it, but it is never shared between threads.

use std::path::Path;

use crate::error::BackendError;
use crate::types::{
    BodyHandle, ConnectionMode, IntegrationParams, JointLimits, JointState, Link, Material,
    Pose, Vec3, Velocity,
};

pub type BackendResult<T> = Result<T, BackendError>;

pub trait PhysicsBackend: Send {
    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the simulator refuses the connection.
    fn connect(mode: ConnectionMode) -> BackendResult<Self>
    where
        Self: Sized;

    /// Sets the fixed tick length, solver iteration count and sub-step count.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or a parameter is not
    /// strictly positive.
    fn configure_integration(&mut self, params: IntegrationParams) -> BackendResult<()>;

    /// # Errors
    ///
    /// Returns an error if the connection is closed.
    fn set_gravity(&mut self, gravity: Vec3) -> BackendResult<()>;

    /// Adds a static ground plane at `z = 0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed.
    fn create_ground_plane(&mut self, material: Material) -> BackendResult<()>;

    /// Loads an articulated body from a model file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not describe a
    /// valid body.
    fn load_body(&mut self, path: &Path) -> BackendResult<BodyHandle>;

    /// # Errors
    ///
    /// Returns an error for an unknown body or a closed connection.
    fn joint_count(&self, body: BodyHandle) -> BackendResult<usize>;

    /// # Errors
    ///
    /// Returns an error for an unknown body or joint, or a closed connection.
    fn joint_limits(&self, body: BodyHandle, joint: usize) -> BackendResult<JointLimits>;

    /// # Errors
    ///
    /// Returns an error for an unknown body or link, or a closed connection.
    fn set_material(&mut self, body: BodyHandle, link: Link, material: Material)
        -> BackendResult<()>;

    /// # Errors
    ///
    /// Returns an error for an unknown body or a closed connection.
    fn pose(&self, body: BodyHandle) -> BackendResult<Pose>;

    /// # Errors
    ///
    /// Returns an error for an unknown body or a closed connection.
    fn velocity(&self, body: BodyHandle) -> BackendResult<Velocity>;

    /// # Errors
    ///
    /// Returns an error for an unknown body or joint, or a closed connection.
    fn joint_state(&self, body: BodyHandle, joint: usize) -> BackendResult<JointState>;

    /// Commands the joint's position controller. The controller may not
    /// exceed `max_force` or `max_velocity` while tracking `target`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown body or joint, or a closed connection.
    fn set_joint_position_target(
        &mut self,
        body: BodyHandle,
        joint: usize,
        target: f32,
        max_force: f32,
        max_velocity: f32,
    ) -> BackendResult<()>;

    /// Advances the simulation by exactly one fixed tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed.
    fn step_integration(&mut self) -> BackendResult<()>;

    /// # Errors
    ///
    /// Returns an error for an unknown body or a closed connection.
    fn reset_pose(&mut self, body: BodyHandle, pose: Pose) -> BackendResult<()>;

    /// # Errors
    ///
    /// Returns an error for an unknown body or a closed connection.
    fn reset_velocity(&mut self, body: BodyHandle, velocity: Velocity) -> BackendResult<()>;

    /// # Errors
    ///
    /// Returns an error for an unknown body or joint, or a closed connection.
    fn reset_joint_state(
        &mut self,
        body: BodyHandle,
        joint: usize,
        state: JointState,
    ) -> BackendResult<()>;

    /// Releases the connection. Calling it again is a no-op.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}
