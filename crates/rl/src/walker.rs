//! # Walker Environment
//!
//! [`WalkerEnv`] is the episode controller: it owns one backend connection,
//! the body loaded into it, the current goal and the episode counters.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --reset--> Running --step (done)--> Done --reset--> Running
//!        \                    |                       |
//!         \-------------------+-------close-----------+--> Closed
//! ```
//!
//! `step` is only legal while `Running`. A terminal step moves the episode to
//! `Done`; the environment never resets itself. A backend failure in the
//! middle of `reset` or `step` drops back to `Uninitialized`, so the next
//! episode has to start with a successful `reset`.

use std::path::Path;
use std::time::Duration;

use physics::{
    BodyHandle, ConnectionMode, JointState, KinematicBackend, PhysicsBackend, Velocity,
};
use tracing::{debug, info, trace, warn};

use crate::body::BodyDescriptor;
use crate::config::EnvConfig;
use crate::env::{BoxSpace, Env, Step, StepInfo};
use crate::error::EnvError;
use crate::goal::Goal;
use crate::observation::{encode, observation_len, BodyState, ObservationScales};
use crate::reward::RewardShaper;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Running,
    Done,
    Closed,
}

pub struct WalkerEnv<B: PhysicsBackend = KinematicBackend> {
    backend: B,
    body: BodyHandle,
    descriptor: BodyDescriptor,
    config: EnvConfig,
    scales: ObservationScales,
    rng: fastrand::Rng,
    goal: Goal,
    shaper: RewardShaper,
    step_count: u32,
    phase: Phase,
}

impl<B: PhysicsBackend> WalkerEnv<B> {
    /// Connects a fresh backend and loads the model at `model`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the backend refuses the
    /// connection, the model cannot be loaded, or a joint range is
    /// degenerate.
    pub fn new(model: &Path, config: EnvConfig, mode: ConnectionMode) -> Result<Self, EnvError> {
        config.validate()?;
        let backend = B::connect(mode)?;
        Self::with_backend(backend, model, config)
    }

    /// Builds the environment on an already connected backend.
    ///
    /// # Errors
    ///
    /// Same as [`WalkerEnv::new`], minus connection failures.
    pub fn with_backend(mut backend: B, model: &Path, config: EnvConfig) -> Result<Self, EnvError> {
        config.validate()?;
        backend.configure_integration(config.integration_params())?;
        backend.set_gravity(config.gravity_vector())?;
        backend.create_ground_plane(config.ground_material())?;
        let body = backend.load_body(model)?;
        let descriptor = BodyDescriptor::from_backend(&mut backend, body, config.body_material())?;

        let rng = config.seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        info!(
            "Walker environment ready: model {}, {} joints, fixed step {}s",
            model.display(),
            descriptor.num_joints(),
            config.fixed_time_step()
        );
        Ok(Self {
            backend,
            body,
            descriptor,
            scales: ObservationScales::from(&config),
            shaper: RewardShaper::new(config.fixed_time_step()),
            config,
            rng,
            goal: Goal::default(),
            step_count: 0,
            phase: Phase::Uninitialized,
        })
    }

    /// Starts a new episode from any phase except `Closed`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Closed`] after [`close`](Self::close), or any
    /// backend failure.
    pub fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        self.ensure_open()?;
        self.phase = Phase::Uninitialized;
        self.step_count = 0;
        self.goal = Goal::sample(&mut self.rng, self.config.goal_distance);

        self.backend.reset_pose(self.body, self.descriptor.initial_pose())?;
        self.backend.reset_velocity(self.body, Velocity::ZERO)?;
        for joint in 0..self.descriptor.num_joints() {
            self.backend.reset_joint_state(self.body, joint, JointState::ZERO)?;
        }

        let state = self.read_state()?;
        let distance = self.goal.distance_from(state.pose.position);
        self.shaper.seed(distance);
        self.phase = Phase::Running;
        debug!(
            "Episode reset: goal ({:.2}, {:.2}), distance {:.3}",
            self.goal.x, self.goal.y, distance
        );
        Ok(self.encode(&state))
    }

    /// Applies one action and advances the simulation by one fixed step.
    ///
    /// # Errors
    ///
    /// Returns a contract violation if the episode is not running or the
    /// action has the wrong length, a non-finite component, or a component
    /// that maps to a non-finite joint target; in that case nothing is sent
    /// to the backend. Backend failures are propagated and leave the
    /// environment `Uninitialized`.
    pub fn step(&mut self, action: &[f32]) -> Result<Step, EnvError> {
        match self.phase {
            Phase::Running => {}
            Phase::Uninitialized => return Err(EnvError::NotReset),
            Phase::Done => return Err(EnvError::EpisodeDone),
            Phase::Closed => return Err(EnvError::Closed),
        }
        let targets = self.joint_targets(action)?;
        let result = self.advance(&targets);
        if let Err(err) = &result {
            warn!("Step {} failed, reset required: {err}", self.step_count + 1);
            self.phase = Phase::Uninitialized;
        }
        result
    }

    fn advance(&mut self, targets: &[f32]) -> Result<Step, EnvError> {
        for (joint, (&target, spec)) in targets.iter().zip(self.descriptor.joints()).enumerate() {
            self.backend.set_joint_position_target(
                self.body,
                joint,
                target,
                spec.max_force,
                spec.max_velocity,
            )?;
        }
        self.backend.step_integration()?;
        let state = self.read_state()?;

        self.step_count += 1;
        let distance = self.goal.distance_from(state.pose.position);
        let reward = self.shaper.reward(distance);
        let reached = distance <= self.config.goal_achieved_distance;
        let done = self.step_count >= self.config.max_episode_steps || reached;
        trace!(
            "Step {}: distance {:.3}, reward {:.4}",
            self.step_count,
            distance,
            reward
        );
        if done {
            self.phase = Phase::Done;
            debug!(
                "Episode done after {} steps, distance {:.3}, goal reached: {}",
                self.step_count, distance, reached
            );
        }

        Ok(Step {
            observation: self.encode(&state),
            reward,
            done,
            info: StepInfo::default(),
        })
    }

    /// Fixes the goal-sampling stream. Returns the applied seed.
    pub fn seed(&mut self, seed: u64) -> u64 {
        self.rng = fastrand::Rng::with_seed(seed);
        seed
    }

    /// Pacing hook for human observers: sleeps one fixed time step. Never
    /// touches simulation state.
    pub fn render(&self) {
        std::thread::sleep(Duration::from_secs_f32(self.config.fixed_time_step()));
    }

    /// Releases the backend connection. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.phase != Phase::Closed {
            debug!("Closing walker environment after {} steps", self.step_count);
        }
        self.backend.disconnect();
        self.phase = Phase::Closed;
    }

    /// Current horizontal distance between the base and the goal.
    ///
    /// # Errors
    ///
    /// Fails after [`close`](Self::close) or on backend failure.
    pub fn goal_distance(&self) -> Result<f32, EnvError> {
        self.ensure_open()?;
        let pose = self.backend.pose(self.body)?;
        Ok(self.goal.distance_from(pose.position))
    }

    #[must_use]
    pub const fn goal(&self) -> Goal {
        self.goal
    }

    #[must_use]
    pub const fn step_count(&self) -> u32 {
        self.step_count
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn descriptor(&self) -> &BodyDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub const fn config(&self) -> &EnvConfig {
        &self.config
    }

    #[must_use]
    pub const fn body(&self) -> BodyHandle {
        self.body
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct backend access, e.g. to place the body in tests. Changes made
    /// here bypass the episode bookkeeping.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub fn action_space(&self) -> BoxSpace {
        BoxSpace::new(-1.0, 1.0, self.descriptor.num_joints())
    }

    #[must_use]
    pub fn observation_space(&self) -> BoxSpace {
        BoxSpace::unbounded(observation_len(self.descriptor.num_joints()))
    }

    fn ensure_open(&self) -> Result<(), EnvError> {
        if self.phase == Phase::Closed {
            Err(EnvError::Closed)
        } else {
            Ok(())
        }
    }

    /// Validates `action` and maps it to one motor target per joint.
    fn joint_targets(&self, action: &[f32]) -> Result<Vec<f32>, EnvError> {
        let expected = self.descriptor.num_joints();
        if action.len() != expected {
            return Err(EnvError::ActionLength {
                expected,
                actual: action.len(),
            });
        }
        if let Some((index, &value)) = action.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(EnvError::NonFiniteAction { index, value });
        }
        action
            .iter()
            .zip(self.descriptor.joints())
            .enumerate()
            .map(|(index, (&value, spec))| {
                let target = spec.target(value);
                if target.is_finite() {
                    Ok(target)
                } else {
                    Err(EnvError::TargetOverflow { index, value })
                }
            })
            .collect()
    }

    fn read_state(&self) -> Result<BodyState, EnvError> {
        Ok(BodyState::read(
            &self.backend,
            self.body,
            self.descriptor.num_joints(),
        )?)
    }

    fn encode(&self, state: &BodyState) -> Vec<f32> {
        encode(state, &self.goal, &self.descriptor, self.scales)
    }
}

impl<B: PhysicsBackend> Env for WalkerEnv<B> {
    fn step(&mut self, action: &[f32]) -> Result<Step, EnvError> {
        WalkerEnv::step(self, action)
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        WalkerEnv::reset(self)
    }

    fn seed(&mut self, seed: u64) -> u64 {
        WalkerEnv::seed(self, seed)
    }

    fn action_space(&self) -> BoxSpace {
        WalkerEnv::action_space(self)
    }

    fn observation_space(&self) -> BoxSpace {
        WalkerEnv::observation_space(self)
    }
}
