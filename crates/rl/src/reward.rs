//! Potential-based reward shaping.
//!
//! The potential of a state is its negated goal distance divided by the
//! fixed step duration, so a step's reward is the distance gained per second
//! of simulated time. Because each reward is a difference of potentials, the
//! rewards of an episode always sum to `potential(final) - potential(start)`.

/// Potential of being `distance` away from the goal.
#[must_use]
pub fn potential(distance: f32, fixed_time_step: f32) -> f32 {
    -distance / fixed_time_step
}

#[derive(Clone, Debug)]
pub struct RewardShaper {
    fixed_time_step: f32,
    prev_potential: f32,
}

impl RewardShaper {
    #[must_use]
    pub const fn new(fixed_time_step: f32) -> Self {
        Self {
            fixed_time_step,
            prev_potential: 0.0,
        }
    }

    #[must_use]
    pub fn potential(&self, distance: f32) -> f32 {
        potential(distance, self.fixed_time_step)
    }

    /// Starts a new episode at `distance` from the goal.
    pub fn seed(&mut self, distance: f32) {
        self.prev_potential = self.potential(distance);
    }

    /// Reward for arriving at `distance`. Always advances the stored
    /// potential, terminal steps included.
    pub fn reward(&mut self, distance: f32) -> f32 {
        let potential = self.potential(distance);
        let reward = potential - self.prev_potential;
        self.prev_potential = potential;
        reward
    }

    #[must_use]
    pub const fn prev_potential(&self) -> f32 {
        self.prev_potential
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approaching_the_goal_is_rewarded() {
        let mut shaper = RewardShaper::new(0.04);
        shaper.seed(20.0);
        let reward = shaper.reward(19.9);
        // 0.1 m in 0.04 s
        assert!((reward - 2.5).abs() < 1e-3);
        assert!((shaper.prev_potential() - potential(19.9, 0.04)).abs() < 1e-4);
    }

    #[test]
    fn retreating_is_penalised() {
        let mut shaper = RewardShaper::new(0.04);
        shaper.seed(10.0);
        assert!(shaper.reward(10.5) < 0.0);
    }

    #[test]
    fn rewards_telescope() {
        let mut shaper = RewardShaper::new(0.04);
        let distances = [20.0_f32, 19.5, 19.8, 18.0, 18.0, 12.25, 15.0, 3.0];
        shaper.seed(distances[0]);
        let total: f64 = distances[1..]
            .iter()
            .map(|&d| f64::from(shaper.reward(d)))
            .sum();
        let expected = f64::from(potential(3.0, 0.04) - potential(20.0, 0.04));
        assert!((total - expected).abs() < 1e-2, "{total} vs {expected}");
    }

    #[test]
    fn halving_the_step_doubles_the_reward() {
        let mut coarse = RewardShaper::new(0.04);
        let mut fine = RewardShaper::new(0.02);
        coarse.seed(5.0);
        fine.seed(5.0);
        let r_coarse = coarse.reward(4.0);
        let r_fine = fine.reward(4.0);
        assert!((r_fine - 2.0 * r_coarse).abs() < 1e-3);
    }
}
