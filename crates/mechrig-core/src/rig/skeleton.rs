//! Bones and skeletons.

use glam::{DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::config::Side;
use crate::constraints::{Constraint, IkChainSpec};
use crate::controls::{BoneCollection, WidgetConfig};
use crate::error::{RigError, RigResult};
use crate::math::{basis_from_y_z, Transform, EPSILON};
use crate::naming::SemanticTag;
use crate::scene::ObjectId;

/// What a bone is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoneRole {
    /// Built from a group; binds geometry.
    #[default]
    Deform,
    /// Visible IK control created by constraint synthesis.
    IkControl,
    /// Hidden IK solver target, parented to its control.
    IkTarget,
}

/// A node of the generated skeleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    pub head: DVec3,
    pub tail: DVec3,
    /// Rotation about the bone axis, radians.
    #[serde(default)]
    pub roll: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Source group (deform bones only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(default)]
    pub role: BoneRole,
    /// Bone a helper was generated for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub tag: SemanticTag,
    /// Instance ids (host objects or linked duplicates) bound to this bone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ObjectId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ik: Option<IkChainSpec>,
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<BoneCollection>,
    /// Current pose relative to rest.
    #[serde(default)]
    pub pose: Transform,
}

impl Bone {
    /// Creates a root deform bone.
    pub fn new(name: impl Into<String>, head: DVec3, tail: DVec3) -> Self {
        Self {
            name: name.into(),
            head,
            tail,
            roll: 0.0,
            parent: None,
            group: None,
            side: None,
            role: BoneRole::Deform,
            owner: None,
            hidden: false,
            tag: SemanticTag::Plain,
            members: Vec::new(),
            constraints: Vec::new(),
            ik: None,
            widget: WidgetConfig::default(),
            collection: None,
            pose: Transform::IDENTITY,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_role(mut self, role: BoneRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_tag(mut self, tag: SemanticTag) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_roll(mut self, roll: f64) -> Self {
        self.roll = roll;
        self
    }

    /// Only deform bones bind geometry and reach the export skeleton.
    pub fn is_deform(&self) -> bool {
        self.role == BoneRole::Deform
    }

    pub fn length(&self) -> f64 {
        (self.tail - self.head).length()
    }

    /// Unit vector from head to tail (world +Y for degenerate bones).
    pub fn axis(&self) -> DVec3 {
        let d = self.tail - self.head;
        if d.length_squared() < EPSILON * EPSILON {
            DVec3::Y
        } else {
            d.normalize()
        }
    }

    pub fn midpoint(&self) -> DVec3 {
        (self.head + self.tail) * 0.5
    }

    /// Rest orientation: local Y along the bone, Z from the roll.
    pub fn rest_rotation(&self) -> DQuat {
        let y = self.axis();
        let z = DQuat::from_axis_angle(y, self.roll) * zero_roll_z(y);
        basis_from_y_z(y, z)
    }

    /// Rest frame in world space, origin at the head.
    pub fn rest_matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rest_rotation(), self.head)
    }

    /// Rest frame with origin at the bone midpoint.
    pub fn midpoint_matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rest_rotation(), self.midpoint())
    }

    /// Generated constraints are removed and re-created on every synthesis.
    pub fn artist_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| !c.is_generated())
    }
}

/// Z axis of a bone with zero roll: world Z made orthogonal to the bone, or
/// world Y when the bone is (anti)parallel to Z.
pub fn zero_roll_z(axis: DVec3) -> DVec3 {
    let reference = if axis.dot(DVec3::Z).abs() > 1.0 - 1e-6 {
        DVec3::Y
    } else {
        DVec3::Z
    };
    (reference - axis * reference.dot(axis)).normalize()
}

/// Bones in parent-first order, unique by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    pub name: String,
    #[serde(default)]
    bones: Vec<Bone>,
}

impl Skeleton {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bones: Vec::new(),
        }
    }

    /// Appends a bone or replaces the bone with the same name in place.
    ///
    /// # Errors
    /// [`RigError::UnknownBone`] when a new bone's parent is not yet present.
    pub fn insert(&mut self, bone: Bone) -> RigResult<()> {
        if let Some(index) = self.index_of(&bone.name) {
            self.bones[index] = bone;
            return Ok(());
        }
        if let Some(parent) = &bone.parent {
            if !self.contains(parent) {
                return Err(RigError::unknown_bone(parent.clone()));
            }
        }
        self.bones.push(bone);
        Ok(())
    }

    /// Removes a bone; children are re-parented to its parent.
    pub fn remove(&mut self, name: &str) -> Option<Bone> {
        let index = self.index_of(name)?;
        let removed = self.bones.remove(index);
        for bone in &mut self.bones {
            if bone.parent.as_deref() == Some(name) {
                bone.parent = removed.parent.clone();
            }
        }
        Some(removed)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bones_mut(&mut self) -> impl Iterator<Item = &mut Bone> {
        self.bones.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Bone> {
        self.bones.iter_mut().find(|b| b.name == name)
    }

    /// Looks up a bone, failing with [`RigError::UnknownBone`].
    pub fn require(&self, name: &str) -> RigResult<&Bone> {
        self.get(name).ok_or_else(|| RigError::unknown_bone(name))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Ancestor names, nearest first.
    pub fn ancestors(&self, name: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.get(name).and_then(|b| b.parent.as_deref());
        while let Some(parent) = current {
            if out.contains(&parent) || out.len() > self.bones.len() {
                break;
            }
            out.push(parent);
            current = self.get(parent).and_then(|b| b.parent.as_deref());
        }
        out
    }

    /// Number of ancestors.
    pub fn depth(&self, name: &str) -> usize {
        self.ancestors(name).len()
    }

    pub fn children(&self, name: &str) -> Vec<&Bone> {
        self.bones
            .iter()
            .filter(|b| b.parent.as_deref() == Some(name))
            .collect()
    }

    pub fn deform_bones(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter().filter(|b| b.is_deform())
    }

    /// Keeps only bones matching `keep`, re-parenting orphans upward.
    pub fn retain(&mut self, mut keep: impl FnMut(&Bone) -> bool) {
        let dropped: Vec<String> = self
            .bones
            .iter()
            .filter(|b| !keep(b))
            .map(|b| b.name.clone())
            .collect();
        for name in dropped {
            self.remove(&name);
        }
    }

    /// Resets every bone to its rest pose.
    pub fn reset_pose(&mut self) {
        for bone in &mut self.bones {
            bone.pose = Transform::IDENTITY;
        }
    }
}
