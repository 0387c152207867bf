#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Twisty Walker Environment
//!
//! A goal-seeking locomotion environment for reinforcement learning. An
//! articulated creature is loaded into a [`physics::PhysicsBackend`] and has
//! to walk towards a goal placed at a random angle on a circle around its
//! start position.
//!
//! ## Key Components
//!
//! -   **[`WalkerEnv`]:** the episode controller. Owns the backend connection,
//!     samples goals, drives joint motors, and decides when an episode ends.
//! -   **[`BodyDescriptor`]:** joint ranges and motor limits read once from
//!     the backend; the basis for both observation normalization and action
//!     scaling.
//! -   **[`observation`]:** the pure encoder from backend state to feature
//!     vector.
//! -   **[`reward`]:** potential-based shaping on the goal distance.
//! -   **[`EnvConfig`]:** every physics and task constant, loadable from JSON.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rl::{EnvConfig, WalkerEnv};
//! use physics::ConnectionMode;
//!
//! let mut env: WalkerEnv = WalkerEnv::new(Path::new("models/quadruped.json"),
//!     EnvConfig::default(), ConnectionMode::Headless)?;
//! env.seed(7);
//! let mut obs = env.reset()?;
//! loop {
//!     let step = env.step(&vec![0.0; env.action_space().dim])?;
//!     obs = step.observation;
//!     if step.done { break; }
//! }
//! ```

pub mod body;
pub mod config;
pub mod env;
pub mod error;
pub mod goal;
pub mod observation;
pub mod reward;
pub mod walker;

pub use body::{BodyDescriptor, JointSpec};
pub use config::EnvConfig;
pub use env::{BoxSpace, Env, Step, StepInfo};
pub use error::EnvError;
pub use goal::Goal;
pub use reward::{potential, RewardShaper};
pub use walker::{Phase, WalkerEnv};
