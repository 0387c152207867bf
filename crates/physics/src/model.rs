//! JSON creature models understood by the in-process backends.
//!
//! A model names the base pose and lists the actuated joints in index order:
//!
//! ```json
//! {
//!   "name": "crawler",
//!   "base": { "position": [0.0, 0.0, 0.3], "orientation": [0.0, 0.0, 0.0, 1.0] },
//!   "joints": [
//!     { "name": "hip", "lower": -0.8, "upper": 0.8, "max_force": 20.0, "max_velocity": 4.0 }
//!   ]
//! }
//! ```
//!
//! The geometry fields (`half_extents`, `density`, and per joint `parent`,
//! `anchor`, `axis` and `link`) are only read by the rigid-body backend. Each
//! joint is a hinge that hangs a box link below its anchor point; `parent`
//! picks the link it is attached to (the base when absent) and `anchor` is
//! given in that link's frame.

use std::path::Path;

use glam::{Quat, Vec3};
use serde::Deserialize;

use crate::error::BackendError;
use crate::types::JointLimits;

#[derive(Debug, Clone, Deserialize)]
pub struct BodyModel {
    #[serde(default = "default_name")]
    pub name: String,
    pub base: BaseDef,
    /// Base height the body settles to when resting on the ground. Defaults
    /// to the initial base height.
    #[serde(default)]
    pub rest_height: Option<f32>,
    #[serde(default)]
    pub gait: GaitDef,
    #[serde(default)]
    pub joints: Vec<JointDef>,
    /// Mass density of every link, in kg/m^3.
    #[serde(default = "default_density")]
    pub density: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseDef {
    pub position: Vec3,
    #[serde(default = "identity")]
    pub orientation: Quat,
    #[serde(default = "default_base_extents")]
    pub half_extents: Vec3,
}

/// Gains of the kinematic locomotion model.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GaitDef {
    /// Forward speed per unit of mean absolute joint speed.
    #[serde(default = "default_stride")]
    pub stride: f32,
    /// Yaw rate per unit of mean signed joint speed.
    #[serde(default = "default_turn")]
    pub turn: f32,
}

impl Default for GaitDef {
    fn default() -> Self {
        Self {
            stride: default_stride(),
            turn: default_turn(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JointDef {
    pub name: String,
    pub lower: f32,
    pub upper: f32,
    pub max_force: f32,
    pub max_velocity: f32,
    /// Index of the joint whose link carries this one.
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub anchor: Vec3,
    #[serde(default = "default_axis")]
    pub axis: Vec3,
    /// Half extents of the child link box.
    #[serde(default = "default_link_extents")]
    pub link: Vec3,
}

impl JointDef {
    #[must_use]
    pub fn limits(&self) -> JointLimits {
        JointLimits {
            lower: self.lower,
            upper: self.upper,
            max_force: self.max_force,
            max_velocity: self.max_velocity,
        }
    }
}

fn default_name() -> String {
    "body".to_string()
}

fn identity() -> Quat {
    Quat::IDENTITY
}

const INLINE: &str = "<inline>";

const fn default_density() -> f32 {
    1000.0
}

const fn default_base_extents() -> Vec3 {
    Vec3::new(0.15, 0.1, 0.05)
}

const fn default_axis() -> Vec3 {
    Vec3::Y
}

const fn default_link_extents() -> Vec3 {
    Vec3::new(0.025, 0.025, 0.1)
}

const fn default_stride() -> f32 {
    0.05
}

const fn default_turn() -> f32 {
    0.02
}

impl BodyModel {
    /// Parses and validates a model held in memory. Parse errors report the
    /// path `<inline>`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ModelParse`] if the JSON is not a model and
    /// [`BackendError::InvalidModel`] if it breaks a structural rule (see
    /// [`BodyModel::validate`]).
    pub fn from_json(json: &str) -> Result<Self, BackendError> {
        Self::parse(json, Path::new(INLINE))
    }

    /// Reads, parses and validates a model file.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ModelIo`] if the file cannot be read,
    /// [`BackendError::ModelParse`] if it is not a model, and
    /// [`BackendError::InvalidModel`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, BackendError> {
        let json = std::fs::read_to_string(path).map_err(|source| BackendError::ModelIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&json, path)
    }

    fn parse(json: &str, origin: &Path) -> Result<Self, BackendError> {
        let model: Self = serde_json::from_str(json).map_err(|source| BackendError::ModelParse {
            path: origin.to_path_buf(),
            source,
        })?;
        model.validate()?;
        Ok(model)
    }

    /// Checks that every number is finite, joint limits are ordered and
    /// motor limits are positive. A zero-width joint range is allowed here;
    /// whether it is usable is up to the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidModel`] describing the first violation.
    pub fn validate(&self) -> Result<(), BackendError> {
        if !self.base.position.is_finite() || !self.base.orientation.is_finite() {
            return Err(BackendError::InvalidModel(format!(
                "{}: base pose must be finite",
                self.name
            )));
        }
        if !self.base.orientation.is_normalized() {
            return Err(BackendError::InvalidModel(format!(
                "{}: base orientation must be a unit quaternion",
                self.name
            )));
        }
        if let Some(height) = self.rest_height {
            if !height.is_finite() || height < 0.0 {
                return Err(BackendError::InvalidModel(format!(
                    "{}: rest_height must be finite and non-negative",
                    self.name
                )));
            }
        }
        if !self.gait.stride.is_finite() || !self.gait.turn.is_finite() {
            return Err(BackendError::InvalidModel(format!(
                "{}: gait gains must be finite",
                self.name
            )));
        }
        if !(self.density.is_finite() && self.density > 0.0) || !positive(self.base.half_extents) {
            return Err(BackendError::InvalidModel(format!(
                "{}: density and base extents must be positive",
                self.name
            )));
        }
        for (index, joint) in self.joints.iter().enumerate() {
            let numbers = [joint.lower, joint.upper, joint.max_force, joint.max_velocity];
            if numbers.iter().any(|v| !v.is_finite()) {
                return Err(BackendError::InvalidModel(format!(
                    "joint {} has non-finite limits",
                    joint.name
                )));
            }
            if joint.lower > joint.upper {
                return Err(BackendError::InvalidModel(format!(
                    "joint {} has lower limit {} above upper limit {}",
                    joint.name, joint.lower, joint.upper
                )));
            }
            if joint.max_force <= 0.0 || joint.max_velocity <= 0.0 {
                return Err(BackendError::InvalidModel(format!(
                    "joint {} needs positive force and velocity limits",
                    joint.name
                )));
            }
            if joint.parent.is_some_and(|parent| parent >= index) {
                return Err(BackendError::InvalidModel(format!(
                    "joint {} must hang from an earlier joint",
                    joint.name
                )));
            }
            if !joint.anchor.is_finite() || !positive(joint.link) {
                return Err(BackendError::InvalidModel(format!(
                    "joint {} has a non-finite anchor or an empty link",
                    joint.name
                )));
            }
            if !joint.axis.is_finite() || joint.axis.length_squared() < 1e-6 {
                return Err(BackendError::InvalidModel(format!(
                    "joint {} needs a non-zero axis",
                    joint.name
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn rest_height(&self) -> f32 {
        self.rest_height.unwrap_or(self.base.position.z)
    }
}

fn positive(extents: Vec3) -> bool {
    extents.is_finite() && extents.min_element() > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_JOINTS: &str = r#"{
        "name": "pair",
        "base": { "position": [0.0, 0.0, 0.5] },
        "joints": [
            { "name": "a", "lower": -1.0, "upper": 1.0, "max_force": 5.0, "max_velocity": 2.0 },
            { "name": "b", "lower": 0.0, "upper": 0.5, "max_force": 5.0, "max_velocity": 2.0 }
        ]
    }"#;

    #[test]
    fn defaults_fill_optional_fields() {
        let model = BodyModel::from_json(TWO_JOINTS).unwrap();
        assert_eq!(model.joints.len(), 2);
        assert_eq!(model.base.orientation, Quat::IDENTITY);
        assert!((model.rest_height() - 0.5).abs() < f32::EPSILON);
        assert!((model.gait.stride - 0.05).abs() < f32::EPSILON);
        let b = &model.joints[1];
        assert_eq!(b.parent, None);
        assert_eq!(b.axis, Vec3::Y);
        assert_eq!(b.anchor, Vec3::ZERO);
        assert!(model.base.half_extents.min_element() > 0.0);
    }

    #[test]
    fn joints_may_only_hang_from_earlier_joints() {
        let chained = TWO_JOINTS.replace(r#""name": "b","#, r#""name": "b", "parent": 0,"#);
        assert_eq!(BodyModel::from_json(&chained).unwrap().joints[1].parent, Some(0));

        let looped = TWO_JOINTS.replace(r#""name": "b","#, r#""name": "b", "parent": 1,"#);
        assert!(matches!(
            BodyModel::from_json(&looped),
            Err(BackendError::InvalidModel(_))
        ));
    }

    #[test]
    fn zero_axis_is_rejected() {
        let json = TWO_JOINTS.replace(
            r#""name": "a","#,
            r#""name": "a", "axis": [0.0, 0.0, 0.0],"#,
        );
        assert!(matches!(
            BodyModel::from_json(&json),
            Err(BackendError::InvalidModel(_))
        ));
    }

    #[test]
    fn reversed_limits_are_rejected() {
        let json = TWO_JOINTS.replace(
            r#""lower": 0.0, "upper": 0.5"#,
            r#""lower": 0.5, "upper": 0.0"#,
        );
        assert!(matches!(
            BodyModel::from_json(&json),
            Err(BackendError::InvalidModel(_))
        ));
    }

    #[test]
    fn zero_width_range_is_left_to_the_consumer() {
        let json = TWO_JOINTS.replace(
            r#""lower": 0.0, "upper": 0.5"#,
            r#""lower": 0.25, "upper": 0.25"#,
        );
        assert!(BodyModel::from_json(&json).is_ok());
    }

    #[test]
    fn non_unit_orientation_is_rejected() {
        let json = TWO_JOINTS.replace(
            r#""position": [0.0, 0.0, 0.5]"#,
            r#""position": [0.0, 0.0, 0.5], "orientation": [0.0, 0.0, 0.0, 2.0]"#,
        );
        assert!(BodyModel::from_json(&json).is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error_wherever_it_comes_from() {
        match BodyModel::from_json(r#"{ "name": "pair", "joints": [ }"#) {
            Err(BackendError::ModelParse { path, .. }) => assert_eq!(path, Path::new("<inline>")),
            other => panic!("expected a parse error, got {other:?}"),
        }
        // well-formed JSON that is not a model is a parse error too
        assert!(matches!(
            BodyModel::from_json(r#"{ "name": "pair" }"#),
            Err(BackendError::ModelParse { .. })
        ));
    }
}
