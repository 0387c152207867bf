#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Twisty Physics Layer
//!
//! The boundary between the walker environment and whatever rigid-body engine
//! simulates the creature.
//!
//! ## Key Components
//!
//! -   **Backend contract:** [`PhysicsBackend`] in the [`backend`] module is
//!     the complete set of operations the environment may perform: configure
//!     fixed-step integration, load a body, query body and joint state, drive
//!     joint position motors, reset state and advance time.
//! -   **Value types:** poses, velocities, joint limits and materials live in
//!     [`types`]. The world is Z-up; Euler angles follow the extrinsic X-Y-Z
//!     convention (see [`types::euler_from_quat`]).
//! -   **Kinematic backend:** [`KinematicBackend`] is a deterministic
//!     in-process implementation of the contract. It loads JSON creature
//!     models ([`model::BodyModel`]) and is used by the tests, the benches and
//!     the `twisty` driver.
//! -   **Rigid-body backend:** [`RapierBackend`] (feature `rapier`, on by
//!     default) simulates the same models as boxes joined by motorized hinges
//!     on the rapier engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use physics::{ConnectionMode, KinematicBackend, PhysicsBackend};
//!
//! let mut backend = KinematicBackend::connect(ConnectionMode::Headless)?;
//! let body = backend.load_body(Path::new("models/crawler.json"))?;
//! backend.set_joint_position_target(body, 0, 0.5, 20.0, 4.0)?;
//! backend.step_integration()?;
//! ```

pub mod backend;
pub mod error;
pub mod kinematic;
pub mod model;
#[cfg(feature = "rapier")]
pub mod rapier;
pub mod types;

pub use backend::{BackendResult, PhysicsBackend};
pub use error::BackendError;
pub use kinematic::KinematicBackend;
pub use model::BodyModel;
#[cfg(feature = "rapier")]
pub use rapier::RapierBackend;
pub use types::{
    euler_from_quat, quat_from_euler, BodyHandle, ConnectionMode, IntegrationParams,
    JointLimits, JointState, Link, Material, Pose, Quat, Vec3, Velocity,
};
