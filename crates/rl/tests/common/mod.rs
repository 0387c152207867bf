#![allow(dead_code)]

use std::path::{Path, PathBuf};

use physics::{
    BackendError, BackendResult, BodyHandle, ConnectionMode, IntegrationParams, JointLimits,
    JointState, KinematicBackend, Link, Material, PhysicsBackend, Pose, Vec3, Velocity,
};
use rl::{EnvConfig, WalkerEnv};

pub fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

pub fn walker(seed: u64) -> WalkerEnv {
    walker_with(EnvConfig {
        seed: Some(seed),
        ..EnvConfig::default()
    })
}

pub fn walker_with(config: EnvConfig) -> WalkerEnv {
    WalkerEnv::new(&data("walker.json"), config, ConnectionMode::Headless)
        .expect("walker model loads")
}

/// Uniform actions in `[-1, 1]` from a seeded stream.
pub fn random_action(rng: &mut fastrand::Rng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.f32() * 2.0 - 1.0).collect()
}

/// Kinematic backend that counts integration ticks and motor commands, and
/// can be told to fail the next joint reset or integration tick.
pub struct CountingBackend {
    pub inner: KinematicBackend,
    pub ticks: usize,
    pub commands: Vec<(usize, f32, f32, f32)>,
    pub fail_next_joint_reset: bool,
    pub fail_next_tick: bool,
}

fn injected() -> BackendError {
    BackendError::InvalidParameter("injected failure")
}

impl PhysicsBackend for CountingBackend {
    fn connect(mode: ConnectionMode) -> BackendResult<Self> {
        Ok(Self {
            inner: KinematicBackend::connect(mode)?,
            ticks: 0,
            commands: Vec::new(),
            fail_next_joint_reset: false,
            fail_next_tick: false,
        })
    }

    fn configure_integration(&mut self, params: IntegrationParams) -> BackendResult<()> {
        self.inner.configure_integration(params)
    }

    fn set_gravity(&mut self, gravity: Vec3) -> BackendResult<()> {
        self.inner.set_gravity(gravity)
    }

    fn create_ground_plane(&mut self, material: Material) -> BackendResult<()> {
        self.inner.create_ground_plane(material)
    }

    fn load_body(&mut self, path: &Path) -> BackendResult<BodyHandle> {
        self.inner.load_body(path)
    }

    fn joint_count(&self, body: BodyHandle) -> BackendResult<usize> {
        self.inner.joint_count(body)
    }

    fn joint_limits(&self, body: BodyHandle, joint: usize) -> BackendResult<JointLimits> {
        self.inner.joint_limits(body, joint)
    }

    fn set_material(
        &mut self,
        body: BodyHandle,
        link: Link,
        material: Material,
    ) -> BackendResult<()> {
        self.inner.set_material(body, link, material)
    }

    fn pose(&self, body: BodyHandle) -> BackendResult<Pose> {
        self.inner.pose(body)
    }

    fn velocity(&self, body: BodyHandle) -> BackendResult<Velocity> {
        self.inner.velocity(body)
    }

    fn joint_state(&self, body: BodyHandle, joint: usize) -> BackendResult<JointState> {
        self.inner.joint_state(body, joint)
    }

    fn set_joint_position_target(
        &mut self,
        body: BodyHandle,
        joint: usize,
        target: f32,
        max_force: f32,
        max_velocity: f32,
    ) -> BackendResult<()> {
        self.commands.push((joint, target, max_force, max_velocity));
        self.inner
            .set_joint_position_target(body, joint, target, max_force, max_velocity)
    }

    fn step_integration(&mut self) -> BackendResult<()> {
        if std::mem::take(&mut self.fail_next_tick) {
            return Err(injected());
        }
        self.ticks += 1;
        self.inner.step_integration()
    }

    fn reset_pose(&mut self, body: BodyHandle, pose: Pose) -> BackendResult<()> {
        self.inner.reset_pose(body, pose)
    }

    fn reset_velocity(&mut self, body: BodyHandle, velocity: Velocity) -> BackendResult<()> {
        self.inner.reset_velocity(body, velocity)
    }

    fn reset_joint_state(
        &mut self,
        body: BodyHandle,
        joint: usize,
        state: JointState,
    ) -> BackendResult<()> {
        if std::mem::take(&mut self.fail_next_joint_reset) {
            return Err(injected());
        }
        self.inner.reset_joint_state(body, joint, state)
    }

    fn disconnect(&mut self) {
        self.inner.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}
