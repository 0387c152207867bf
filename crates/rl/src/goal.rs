//! Goal placement on the ground plane.
//!
//! The ground plane is spanned by world `x` and `y`. Goals, the angle towards
//! a goal and the distance to it all use this same pair of axes.

use std::f32::consts::TAU;

use physics::Vec3;

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Goal {
    pub x: f32,
    pub y: f32,
}

impl Goal {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Goal on a circle of radius `distance` around the origin. Angle `0`
    /// lies on `+y` and positive angles turn towards `+x`.
    #[must_use]
    pub fn at_angle(angle: f32, distance: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(distance * sin, distance * cos)
    }

    /// Draws a goal at a uniformly distributed angle in `[0, 2π)`.
    pub fn sample(rng: &mut fastrand::Rng, distance: f32) -> Self {
        Self::at_angle(rng.f32() * TAU, distance)
    }

    /// Horizontal distance from `position`; height is ignored.
    #[must_use]
    pub fn distance_from(&self, position: Vec3) -> f32 {
        (self.y - position.y).hypot(self.x - position.x)
    }

    /// World-frame heading from `position` towards the goal.
    #[must_use]
    pub fn angle_from(&self, position: Vec3) -> f32 {
        (self.y - position.y).atan2(self.x - position.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_zero_points_along_y() {
        let goal = Goal::at_angle(0.0, 20.0);
        assert!(goal.x.abs() < 1e-6);
        assert!((goal.y - 20.0).abs() < 1e-6);
    }

    #[test]
    fn sampled_goals_lie_on_the_circle() {
        for seed in 0..1000 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let goal = Goal::sample(&mut rng, 20.0);
            let radius = goal.distance_from(Vec3::ZERO);
            assert!((radius - 20.0).abs() < 1e-4, "seed {seed}: radius {radius}");
        }
    }

    #[test]
    fn same_seed_same_goal() {
        let a = Goal::sample(&mut fastrand::Rng::with_seed(9), 20.0);
        let b = Goal::sample(&mut fastrand::Rng::with_seed(9), 20.0);
        assert_eq!(a, b);
    }

    #[test]
    fn distance_ignores_height() {
        let goal = Goal::new(3.0, 4.0);
        assert!((goal.distance_from(Vec3::new(0.0, 0.0, 100.0)) - 5.0).abs() < 1e-6);
    }
}
