//! Rig pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RigResult;
use crate::math::Axis;

fn default_bone_scale() -> f64 {
    0.5
}

fn default_min_bone_length() -> f64 {
    0.2
}

fn default_hinge_free_axis() -> Axis {
    Axis::Y
}

fn default_left_suffix() -> String {
    "_L".to_string()
}

fn default_right_suffix() -> String {
    "_R".to_string()
}

fn default_widget_scale() -> f64 {
    1.0
}

fn default_ik_control_widget_scale() -> f64 {
    1.5
}

fn default_ik_iterations() -> u32 {
    16
}

fn default_ik_tolerance() -> f64 {
    1e-4
}

fn default_skeleton_name() -> String {
    "MechRig".to_string()
}

fn default_combined_mesh_name() -> String {
    "Rigged_Mesh".to_string()
}

/// Settings shared by every pipeline stage.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RigConfig {
    /// Bone length as a fraction of the group's dominant extent.
    #[serde(default = "default_bone_scale")]
    pub bone_scale: f64,
    /// Lower bound for generated bone length.
    #[serde(default = "default_min_bone_length")]
    pub min_bone_length: f64,
    /// Mirror plane normal, in the symmetric origin's local frame.
    #[serde(default)]
    pub mirror_axis: Axis,
    /// Bone-local axis a hinge may rotate about; the other two are locked.
    #[serde(default = "default_hinge_free_axis")]
    pub hinge_free_axis: Axis,
    #[serde(default = "default_left_suffix")]
    pub left_suffix: String,
    #[serde(default = "default_right_suffix")]
    pub right_suffix: String,
    /// Global widget scale used when a caller gives none.
    #[serde(default = "default_widget_scale")]
    pub widget_scale: f64,
    /// Widget scale for IK control bones.
    #[serde(default = "default_ik_control_widget_scale")]
    pub ik_control_widget_scale: f64,
    /// Maximum solver sweeps per IK chain per sample.
    #[serde(default = "default_ik_iterations")]
    pub ik_iterations: u32,
    /// Distance at which the IK solver stops early.
    #[serde(default = "default_ik_tolerance")]
    pub ik_tolerance: f64,
    #[serde(default = "default_skeleton_name")]
    pub skeleton_name: String,
    #[serde(default = "default_combined_mesh_name")]
    pub combined_mesh_name: String,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            bone_scale: default_bone_scale(),
            min_bone_length: default_min_bone_length(),
            mirror_axis: Axis::X,
            hinge_free_axis: default_hinge_free_axis(),
            left_suffix: default_left_suffix(),
            right_suffix: default_right_suffix(),
            widget_scale: default_widget_scale(),
            ik_control_widget_scale: default_ik_control_widget_scale(),
            ik_iterations: default_ik_iterations(),
            ik_tolerance: default_ik_tolerance(),
            skeleton_name: default_skeleton_name(),
            combined_mesh_name: default_combined_mesh_name(),
        }
    }
}

impl RigConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> RigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration file.
    pub fn load(path: &Path) -> RigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Sets the bone-size factor.
    pub fn with_bone_scale(mut self, bone_scale: f64) -> Self {
        self.bone_scale = bone_scale;
        self
    }

    /// Sets the hinge's free rotation axis.
    pub fn with_hinge_free_axis(mut self, axis: Axis) -> Self {
        self.hinge_free_axis = axis;
        self
    }

    /// Bone name for one side of a mirrored group.
    pub fn side_name(&self, base: &str, side: Side) -> String {
        match side {
            Side::Left => format!("{}{}", base, self.left_suffix),
            Side::Right => format!("{}{}", base, self.right_suffix),
        }
    }
}

/// Side of a mirrored pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = RigConfig::from_json("{}").unwrap();
        assert_eq!(config, RigConfig::default());
        assert_eq!(config.hinge_free_axis, Axis::Y);
        assert_eq!(config.min_bone_length, 0.2);
    }

    #[test]
    fn test_overrides() {
        let config =
            RigConfig::from_json(r#"{"bone_scale": 0.25, "hinge_free_axis": "Z", "right_suffix": ".R"}"#)
                .unwrap();
        assert_eq!(config.bone_scale, 0.25);
        assert_eq!(config.hinge_free_axis, Axis::Z);
        assert_eq!(config.side_name("Arm", Side::Right), "Arm.R");
        assert_eq!(config.side_name("Arm", Side::Left), "Arm_L");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = RigConfig::from_json(r#"{"bone_size": 1.0}"#).unwrap_err();
        assert_eq!(err.code(), "RIG_011");
    }
}
