use crate::error::EnvError;

/// Reinforcement learning environment trait.
///
/// Inspired by classic frameworks like OpenAI Gym, this trait defines the core
/// interface an environment must provide. Each call to [`step`] advances the
/// simulation by one action and returns the new observation vector, a reward
/// signal, and whether the episode has terminated. Environments never reset
/// themselves: after a terminal step the caller must call [`reset`].
///
/// [`step`]: Env::step
/// [`reset`]: Env::reset
pub trait Env {
    /// Advance the environment by one action.
    ///
    /// # Errors
    ///
    /// Returns an error if the action violates the action space contract or
    /// the underlying simulation fails.
    fn step(&mut self, action: &[f32]) -> Result<Step, EnvError>;

    /// Reset the environment to its starting state and return the initial
    /// observation vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying simulation fails.
    fn reset(&mut self) -> Result<Vec<f32>, EnvError>;

    /// Fixes the random stream used by future resets. Returns the seed.
    fn seed(&mut self, seed: u64) -> u64;

    fn action_space(&self) -> BoxSpace;

    fn observation_space(&self) -> BoxSpace;

    /// Size of the observation vector.
    fn obs_size(&self) -> usize {
        self.observation_space().dim
    }

    /// Size of the action space.
    fn action_size(&self) -> usize {
        self.action_space().dim
    }
}

/// Result of a single [`Env::step`].
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub observation: Vec<f32>,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// Auxiliary per-step diagnostics. Currently carries nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct StepInfo {}

/// A box-shaped space: `dim` components, each within `[low, high]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoxSpace {
    pub low: f32,
    pub high: f32,
    pub dim: usize,
}

impl BoxSpace {
    #[must_use]
    pub const fn new(low: f32, high: f32, dim: usize) -> Self {
        Self { low, high, dim }
    }

    #[must_use]
    pub const fn unbounded(dim: usize) -> Self {
        Self::new(f32::NEG_INFINITY, f32::INFINITY, dim)
    }

    #[must_use]
    pub fn contains(&self, values: &[f32]) -> bool {
        values.len() == self.dim && values.iter().all(|v| (self.low..=self.high).contains(v))
    }
}
