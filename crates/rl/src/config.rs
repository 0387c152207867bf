//! Environment configuration.
//!
//! All physics constants are explicit here rather than process-wide engine
//! defaults. Every field has a default, so a JSON file only needs the values
//! it overrides:
//!
//! ```json
//! { "goal_distance": 10.0, "max_episode_steps": 500 }
//! ```
//!
//! The reward scale is coupled to the integration step: potentials are
//! divided by [`EnvConfig::fixed_time_step`], so halving `time_step` doubles
//! the magnitude of every reward.

use std::path::Path;

use physics::{IntegrationParams, Material, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::EnvError;

const fn default_time_step() -> f32 {
    0.01
}
const fn default_sub_steps() -> u32 {
    4
}
const fn default_solver_iterations() -> u32 {
    5
}
const fn default_gravity() -> f32 {
    9.81
}
const fn default_ground_friction() -> f32 {
    3.0
}
const fn default_ground_restitution() -> f32 {
    0.1
}
const fn default_body_friction() -> f32 {
    0.2
}
const fn default_body_restitution() -> f32 {
    0.3
}
const fn default_max_episode_steps() -> u32 {
    300
}
const fn default_goal_distance() -> f32 {
    20.0
}
const fn default_goal_achieved_distance() -> f32 {
    1.0
}
const fn default_joint_velocity_scale() -> f32 {
    0.1
}
const fn default_local_velocity_scale() -> f32 {
    0.3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvConfig {
    /// Solver sub-step length in seconds.
    #[serde(default = "default_time_step")]
    pub time_step: f32,
    /// Solver sub-steps per environment step.
    #[serde(default = "default_sub_steps")]
    pub sub_steps: u32,
    #[serde(default = "default_solver_iterations")]
    pub solver_iterations: u32,
    /// Magnitude of gravity, applied along `-z`.
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    #[serde(default = "default_ground_friction")]
    pub ground_friction: f32,
    #[serde(default = "default_ground_restitution")]
    pub ground_restitution: f32,
    /// Friction of the base and every link of the creature.
    #[serde(default = "default_body_friction")]
    pub body_friction: f32,
    #[serde(default = "default_body_restitution")]
    pub body_restitution: f32,
    #[serde(default = "default_max_episode_steps")]
    pub max_episode_steps: u32,
    /// Radius of the circle goals are sampled on.
    #[serde(default = "default_goal_distance")]
    pub goal_distance: f32,
    #[serde(default = "default_goal_achieved_distance")]
    pub goal_achieved_distance: f32,
    #[serde(default = "default_joint_velocity_scale")]
    pub joint_velocity_scale: f32,
    #[serde(default = "default_local_velocity_scale")]
    pub local_velocity_scale: f32,
    /// Seed of the goal-sampling stream. `None` draws a random seed.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            time_step: default_time_step(),
            sub_steps: default_sub_steps(),
            solver_iterations: default_solver_iterations(),
            gravity: default_gravity(),
            ground_friction: default_ground_friction(),
            ground_restitution: default_ground_restitution(),
            body_friction: default_body_friction(),
            body_restitution: default_body_restitution(),
            max_episode_steps: default_max_episode_steps(),
            goal_distance: default_goal_distance(),
            goal_achieved_distance: default_goal_achieved_distance(),
            joint_velocity_scale: default_joint_velocity_scale(),
            local_velocity_scale: default_local_velocity_scale(),
            seed: None,
        }
    }
}

impl EnvConfig {
    /// # Errors
    ///
    /// Returns an error if the JSON does not parse or the values do not
    /// validate.
    pub fn from_json_str(json: &str) -> Result<Self, EnvError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or the
    /// values do not validate.
    pub fn from_json_file(path: &Path) -> Result<Self, EnvError> {
        let json = std::fs::read_to_string(path).map_err(|source| EnvError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Simulated seconds covered by one environment step.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fixed_time_step(&self) -> f32 {
        self.time_step * self.sub_steps as f32
    }

    #[must_use]
    pub fn integration_params(&self) -> IntegrationParams {
        IntegrationParams {
            fixed_time_step: self.fixed_time_step(),
            solver_iterations: self.solver_iterations,
            sub_steps: self.sub_steps,
        }
    }

    #[must_use]
    pub fn gravity_vector(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, -self.gravity)
    }

    #[must_use]
    pub const fn ground_material(&self) -> Material {
        Material::new(self.ground_friction, self.ground_restitution)
    }

    #[must_use]
    pub const fn body_material(&self) -> Material {
        Material::new(self.body_friction, self.body_restitution)
    }

    /// # Errors
    ///
    /// Returns [`EnvError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), EnvError> {
        let positive = [
            ("time_step", self.time_step),
            ("goal_distance", self.goal_distance),
            ("goal_achieved_distance", self.goal_achieved_distance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EnvError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        let non_negative = [
            ("gravity", self.gravity),
            ("ground_friction", self.ground_friction),
            ("ground_restitution", self.ground_restitution),
            ("body_friction", self.body_friction),
            ("body_restitution", self.body_restitution),
            ("joint_velocity_scale", self.joint_velocity_scale),
            ("local_velocity_scale", self.local_velocity_scale),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EnvError::Config(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.sub_steps == 0 || self.solver_iterations == 0 || self.max_episode_steps == 0 {
            return Err(EnvError::Config(
                "sub_steps, solver_iterations and max_episode_steps must be positive".to_string(),
            ));
        }
        if self.goal_achieved_distance >= self.goal_distance {
            return Err(EnvError::Config(format!(
                "goal_achieved_distance ({}) must be below goal_distance ({})",
                self.goal_achieved_distance, self.goal_distance
            )));
        }
        Ok(())
    }
}
