//! Control widgets: per-bone proxy shapes and their edit sessions.
//!
//! Widgets are cosmetic. Nothing here changes bone geometry, skinning or
//! constraints.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{RigConfig, Side};
use crate::error::{RigError, RigResult};
use crate::math::Transform;
use crate::rig::{Bone, Skeleton};

fn default_widget_scale() -> f64 {
    1.0
}

/// Proxy primitive drawn for a bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetShape {
    #[default]
    Circle,
    Box,
    Sphere,
    /// No proxy.
    None,
}

/// Per-bone widget settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WidgetConfig {
    #[serde(default)]
    pub shape: WidgetShape,
    #[serde(default = "default_widget_scale")]
    pub scale: f64,
    /// Offset from the bone's midpoint rest frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_transform: Option<Transform>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            shape: WidgetShape::default(),
            scale: default_widget_scale(),
            custom_transform: None,
        }
    }
}

impl WidgetConfig {
    pub fn with_shape(mut self, shape: WidgetShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

/// Bone collection by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoneCollection {
    Left,
    Right,
    Center,
}

/// Colour theme of a bone collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTheme {
    Red,
    Blue,
    Yellow,
}

impl BoneCollection {
    /// Collection for a bone name, from its side suffix.
    pub fn for_name(name: &str, config: &RigConfig) -> Self {
        let has = |suffixes: [&str; 3]| suffixes.iter().any(|s| !s.is_empty() && name.ends_with(s));
        if has([config.left_suffix.as_str(), "_L", ".L"]) {
            BoneCollection::Left
        } else if has([config.right_suffix.as_str(), "_R", ".R"]) {
            BoneCollection::Right
        } else {
            BoneCollection::Center
        }
    }

    /// Collection for a bone: its side, else its owner's side, else its name.
    pub fn for_bone(bone: &Bone, skeleton: &Skeleton, config: &RigConfig) -> Self {
        let side = bone.side.or_else(|| {
            bone.owner
                .as_deref()
                .and_then(|owner| skeleton.get(owner))
                .and_then(|owner| owner.side)
        });
        match side {
            Some(Side::Left) => BoneCollection::Left,
            Some(Side::Right) => BoneCollection::Right,
            None => BoneCollection::for_name(&bone.name, config),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BoneCollection::Left => "Left",
            BoneCollection::Right => "Right",
            BoneCollection::Center => "Center",
        }
    }

    pub fn theme(&self) -> ColorTheme {
        match self {
            BoneCollection::Left => ColorTheme::Red,
            BoneCollection::Right => ColorTheme::Blue,
            BoneCollection::Center => ColorTheme::Yellow,
        }
    }
}

/// Instantiated widget for one bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetProxy {
    pub bone: String,
    pub shape: WidgetShape,
    /// World transform of the proxy.
    pub transform: Transform,
    /// Uniform display size.
    pub size: f64,
}

/// Handle to an open widget edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProxyHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
struct EditSession {
    bone: String,
    transform: Transform,
}

/// Counts from one [`ControlRig::apply_widgets`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlsSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Widget proxies keyed by bone name, plus open edit sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlRig {
    #[serde(default)]
    proxies: BTreeMap<String, WidgetProxy>,
    #[serde(skip)]
    sessions: BTreeMap<ProxyHandle, EditSession>,
    #[serde(skip)]
    next_handle: u64,
}

impl ControlRig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proxy_for(&self, bone: &str) -> Option<&WidgetProxy> {
        self.proxies.get(bone)
    }

    pub fn proxies(&self) -> impl Iterator<Item = &WidgetProxy> {
        self.proxies.values()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Creates or updates a proxy per visible bone and assigns side
    /// collections. Proxies of removed, hidden or `none`-shaped bones go away.
    pub fn apply_widgets(
        &mut self,
        skeleton: &mut Skeleton,
        global_scale: f64,
        config: &RigConfig,
    ) -> ControlsSummary {
        let mut summary = ControlsSummary::default();
        let mut wanted = BTreeSet::new();

        let collections: BTreeMap<String, BoneCollection> = skeleton
            .bones()
            .iter()
            .map(|b| (b.name.clone(), BoneCollection::for_bone(b, skeleton, config)))
            .collect();

        for bone in skeleton.bones_mut() {
            bone.collection = collections.get(&bone.name).copied();
            if bone.hidden || bone.widget.shape == WidgetShape::None {
                continue;
            }
            wanted.insert(bone.name.clone());
            let proxy = proxy_for_bone(bone, global_scale);
            match self.proxies.insert(bone.name.clone(), proxy) {
                Some(_) => summary.updated += 1,
                None => summary.created += 1,
            }
        }

        let before = self.proxies.len();
        self.proxies.retain(|name, _| wanted.contains(name));
        summary.removed = before - self.proxies.len();

        info!(
            "controls: {} proxy(ies) ({} created, {} updated, {} removed)",
            self.proxies.len(),
            summary.created,
            summary.updated,
            summary.removed
        );
        summary
    }

    /// Opens an edit session with a temporary proxy at the widget's current
    /// placement.
    pub fn enter_widget_edit_mode(
        &mut self,
        skeleton: &Skeleton,
        bone: &str,
    ) -> RigResult<ProxyHandle> {
        let bone = skeleton.require(bone)?;
        let transform = Transform::from_matrix(&widget_matrix(bone));
        self.next_handle += 1;
        let handle = ProxyHandle(self.next_handle);
        self.sessions.insert(
            handle,
            EditSession {
                bone: bone.name.clone(),
                transform,
            },
        );
        debug!("controls: edit session {} opened on '{}'", handle.0, bone.name);
        Ok(handle)
    }

    /// The temporary proxy's world transform.
    pub fn proxy(&self, handle: ProxyHandle) -> RigResult<&Transform> {
        self.sessions
            .get(&handle)
            .map(|s| &s.transform)
            .ok_or(RigError::UnknownProxy { handle: handle.0 })
    }

    /// Bone an open edit session belongs to.
    pub fn session_bone(&self, handle: ProxyHandle) -> RigResult<&str> {
        self.sessions
            .get(&handle)
            .map(|s| s.bone.as_str())
            .ok_or(RigError::UnknownProxy { handle: handle.0 })
    }

    /// Mutable access for the artist's manipulation.
    pub fn proxy_mut(&mut self, handle: ProxyHandle) -> RigResult<&mut Transform> {
        self.sessions
            .get_mut(&handle)
            .map(|s| &mut s.transform)
            .ok_or(RigError::UnknownProxy { handle: handle.0 })
    }

    /// Commits the temporary proxy into the bone's custom transform (relative
    /// to the bone's midpoint rest frame) and closes the session.
    pub fn apply_custom_transform(
        &mut self,
        skeleton: &mut Skeleton,
        handle: ProxyHandle,
        global_scale: f64,
    ) -> RigResult<Transform> {
        let session = self
            .sessions
            .remove(&handle)
            .ok_or(RigError::UnknownProxy { handle: handle.0 })?;
        let bone = skeleton
            .get_mut(&session.bone)
            .ok_or_else(|| RigError::unknown_bone(session.bone.clone()))?;

        let local = bone.midpoint_matrix().inverse() * session.transform.to_matrix();
        let custom = Transform::from_matrix(&local);
        bone.widget.custom_transform = Some(custom);
        if let Some(proxy) = self.proxies.get_mut(&bone.name) {
            *proxy = proxy_for_bone(bone, global_scale);
        }
        debug!("controls: edit session {} committed to '{}'", handle.0, bone.name);
        Ok(custom)
    }

    /// Closes a session without committing.
    pub fn cancel_widget_edit(&mut self, handle: ProxyHandle) -> RigResult<()> {
        self.sessions
            .remove(&handle)
            .map(|_| ())
            .ok_or(RigError::UnknownProxy { handle: handle.0 })
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }
}

fn widget_matrix(bone: &Bone) -> glam::DMat4 {
    let custom = bone.widget.custom_transform.unwrap_or_default();
    bone.midpoint_matrix() * custom.to_matrix()
}

fn proxy_for_bone(bone: &Bone, global_scale: f64) -> WidgetProxy {
    WidgetProxy {
        bone: bone.name.clone(),
        shape: bone.widget.shape,
        transform: Transform::from_matrix(&widget_matrix(bone)),
        size: global_scale * bone.widget.scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::BoneRole;
    use glam::DVec3;

    fn skeleton() -> Skeleton {
        let mut s = Skeleton::new("Rig");
        s.insert(Bone::new("Body", DVec3::ZERO, DVec3::Z * 2.0)).unwrap();
        s.insert(Bone::new("Arm_L", DVec3::X, DVec3::X * 2.0).with_parent("Body"))
            .unwrap();
        s.insert(Bone::new("Arm_R", -DVec3::X, -DVec3::X * 2.0).with_parent("Body"))
            .unwrap();
        s
    }

    #[test]
    fn test_proxies_at_midpoint() {
        let mut s = skeleton();
        let mut controls = ControlRig::new();
        let summary = controls.apply_widgets(&mut s, 2.0, &RigConfig::default());
        assert_eq!(summary.created, 3);

        let body = controls.proxy_for("Body").unwrap();
        assert!(body.transform.translation.abs_diff_eq(DVec3::Z, 1e-12));
        assert_eq!(body.size, 2.0);
        assert_eq!(body.shape, WidgetShape::Circle);
    }

    #[test]
    fn test_reapply_updates_in_place() {
        let mut s = skeleton();
        let mut controls = ControlRig::new();
        controls.apply_widgets(&mut s, 1.0, &RigConfig::default());
        let summary = controls.apply_widgets(&mut s, 1.0, &RigConfig::default());
        assert_eq!(summary, ControlsSummary { created: 0, updated: 3, removed: 0 });
        assert_eq!(controls.len(), 3);
    }

    #[test]
    fn test_shape_none_removes_proxy() {
        let mut s = skeleton();
        let mut controls = ControlRig::new();
        controls.apply_widgets(&mut s, 1.0, &RigConfig::default());
        s.get_mut("Arm_L").unwrap().widget.shape = WidgetShape::None;
        let summary = controls.apply_widgets(&mut s, 1.0, &RigConfig::default());
        assert_eq!(summary.removed, 1);
        assert!(controls.proxy_for("Arm_L").is_none());
    }

    #[test]
    fn test_side_collections() {
        let mut s = skeleton();
        ControlRig::new().apply_widgets(&mut s, 1.0, &RigConfig::default());
        assert_eq!(s.get("Arm_L").unwrap().collection, Some(BoneCollection::Left));
        assert_eq!(s.get("Arm_R").unwrap().collection, Some(BoneCollection::Right));
        assert_eq!(s.get("Body").unwrap().collection, Some(BoneCollection::Center));
        assert_eq!(BoneCollection::Right.theme(), ColorTheme::Blue);
        assert_eq!(
            BoneCollection::for_name("Wing.L", &RigConfig::default()),
            BoneCollection::Left
        );
    }

    #[test]
    fn test_ik_helpers_join_owner_collection() {
        let mut s = Skeleton::new("Rig");
        let mut lower = Bone::new("Lower_L", DVec3::X, DVec3::X * 2.0);
        lower.side = Some(Side::Left);
        s.insert(lower).unwrap();
        let mut control = Bone::new("Lower_L_IK", DVec3::X * 2.0, DVec3::X * 2.5)
            .with_role(BoneRole::IkControl);
        control.owner = Some("Lower_L".into());
        s.insert(control).unwrap();
        let mut target = Bone::new("Wrist_R_IK_target", DVec3::X * 2.0, DVec3::X * 2.5)
            .with_parent("Lower_L_IK")
            .with_role(BoneRole::IkTarget);
        target.side = Some(Side::Left);
        s.insert(target).unwrap();

        ControlRig::new().apply_widgets(&mut s, 1.0, &RigConfig::default());
        for name in ["Lower_L", "Lower_L_IK", "Wrist_R_IK_target"] {
            let bone = s.get(name).unwrap();
            assert_eq!(bone.collection, Some(BoneCollection::Left), "{}", name);
            assert_eq!(bone.collection.unwrap().theme(), ColorTheme::Red);
        }
    }

    #[test]
    fn test_widget_does_not_touch_bone_geometry() {
        let mut s = skeleton();
        let before: Vec<(DVec3, DVec3)> = s.bones().iter().map(|b| (b.head, b.tail)).collect();
        ControlRig::new().apply_widgets(&mut s, 3.0, &RigConfig::default());
        let after: Vec<(DVec3, DVec3)> = s.bones().iter().map(|b| (b.head, b.tail)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_edit_session_commits_relative_transform() {
        let mut s = skeleton();
        let mut controls = ControlRig::new();
        controls.apply_widgets(&mut s, 1.0, &RigConfig::default());

        let handle = controls.enter_widget_edit_mode(&s, "Body").unwrap();
        let start = *controls.proxy(handle).unwrap();
        assert!(start.translation.abs_diff_eq(DVec3::Z, 1e-12));
        controls.proxy_mut(handle).unwrap().translation += DVec3::X * 0.5;

        let custom = controls
            .apply_custom_transform(&mut s, handle, 1.0)
            .unwrap();
        assert!((custom.translation.length() - 0.5).abs() < 1e-9);
        assert_eq!(controls.open_sessions(), 0);

        let proxy = controls.proxy_for("Body").unwrap();
        assert!(proxy
            .transform
            .translation
            .abs_diff_eq(DVec3::new(0.5, 0.0, 1.0), 1e-9));

        // Handle is spent.
        let err = controls.proxy(handle).unwrap_err();
        assert_eq!(err.code(), "RIG_007");
    }

    #[test]
    fn test_cancel_discards() {
        let mut s = skeleton();
        let mut controls = ControlRig::new();
        let handle = controls.enter_widget_edit_mode(&s, "Arm_L").unwrap();
        controls.proxy_mut(handle).unwrap().translation = DVec3::splat(9.0);
        controls.cancel_widget_edit(handle).unwrap();
        assert!(s.get_mut("Arm_L").unwrap().widget.custom_transform.is_none());
        assert!(controls.cancel_widget_edit(handle).is_err());
    }

    #[test]
    fn test_edit_unknown_bone() {
        let s = skeleton();
        let err = ControlRig::new().enter_widget_edit_mode(&s, "Tail").unwrap_err();
        assert_eq!(err.code(), "RIG_006");
    }
}
