#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Twisty
//!
//! Driver for the goal-seeking walker environment. A creature model is loaded
//! into a physics backend, dropped into a [`rl::WalkerEnv`], and rolled out
//! for a number of episodes with a fixed policy.
//!
//! ## The Crates
//!
//! -   **`twisty`:** this crate. CLI, logging setup and rollout loops.
//! -   **[`physics`]:** the backend contract every simulator has to satisfy,
//!     plus a deterministic kinematic backend and a rapier rigid-body backend.
//! -   **[`rl`]:** observation encoding, reward shaping and the episode
//!     controller.
//!
//! ## Getting Started
//!
//! ```text
//! cargo run -p twisty -- --episodes 4 --policy random --workers 2
//! cargo run -p twisty -- --backend rapier --episodes 2
//! RUST_LOG=debug cargo run -p twisty -- --render
//! ```

pub mod rollout;

pub use physics;
pub use rl;
pub use rollout::{rollout, run_episode, Backend, EpisodeStats, Policy, RolloutOptions, Summary};
