//! The rig document: scene, per-bone settings and every generated artifact.
//!
//! [`RigDocument`] is the write side of the host boundary. It owns the
//! generated skeleton, linked duplicates, control proxies and the last bake,
//! and exposes the user-facing pipeline actions. All of it serializes to
//! JSON, so a document reopened later rebuilds to the same rig.

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::animation::Action;
use crate::bake::{self, BakeResult, MeshInstance};
use crate::config::RigConfig;
use crate::constraints::{self, IkChainSpec, SynthesisReport};
use crate::controls::{ControlRig, ControlsSummary, ProxyHandle, WidgetConfig};
use crate::error::{Issue, RigError, RigResult};
use crate::math::Transform;
use crate::mirror::{MirrorOrigin, MirrorResolver};
use crate::rig::{self, RebuildStats, Skeleton};
use crate::scene::{ObjectId, Scene, SceneGraph};

/// Per-bone configuration kept independently of the generated skeleton and
/// merged back by name on every build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoneSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<WidgetConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ik: Option<IkChainSpec>,
}

/// Outcome of [`RigDocument::build_rig`].
#[derive(Debug)]
pub struct BuildSummary {
    pub stats: RebuildStats,
    pub synthesis: SynthesisReport,
    /// Non-blocking validation findings.
    pub issues: Vec<Issue>,
    pub bones: usize,
    pub duplicates: usize,
}

/// Scene plus everything the pipeline generated from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigDocument {
    #[serde(default)]
    pub scene: Scene,
    #[serde(default)]
    pub config: RigConfig,
    #[serde(default)]
    pub bone_settings: BTreeMap<String, BoneSettings>,
    /// Roots used by the last build.
    #[serde(default)]
    pub roots: Vec<ObjectId>,
    /// Symmetric origin used by the last build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Skeleton>,
    #[serde(default)]
    pub mirror: MirrorResolver,
    #[serde(default)]
    pub controls: ControlRig,
    /// Global widget scale of the last `apply_controls`.
    #[serde(default = "default_global_scale")]
    pub global_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_bake: Option<BakeResult>,
}

fn default_global_scale() -> f64 {
    1.0
}

impl RigDocument {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            global_scale: default_global_scale(),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: RigConfig) -> Self {
        self.config = config;
        self
    }

    pub fn from_json(json: &str) -> RigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> RigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> RigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: &Path) -> RigResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn skeleton(&self) -> RigResult<&Skeleton> {
        self.skeleton.as_ref().ok_or(RigError::NoSkeleton)
    }

    /// Stores an IK setting for `bone` and applies it to the live skeleton.
    /// Takes effect on the next build.
    pub fn set_ik(&mut self, bone: &str, ik: Option<IkChainSpec>) {
        self.bone_settings.entry(bone.to_string()).or_default().ik = ik.clone();
        if let Some(b) = self.skeleton.as_mut().and_then(|s| s.get_mut(bone)) {
            b.ik = ik;
        }
    }

    /// Stores a widget setting for `bone` and applies it to the live skeleton.
    pub fn set_widget(&mut self, bone: &str, widget: WidgetConfig) {
        self.bone_settings.entry(bone.to_string()).or_default().widget = Some(widget.clone());
        if let Some(b) = self.skeleton.as_mut().and_then(|s| s.get_mut(bone)) {
            b.widget = widget;
        }
    }

    /// Enumerates every hierarchy issue without touching the document.
    pub fn validate_hierarchy(&self, roots: &[ObjectId], origin: Option<&ObjectId>) -> Vec<Issue> {
        rig::validate_hierarchy(&self.scene, roots, origin, &self.config)
    }

    /// Builds or rebuilds the rig.
    ///
    /// `bone_scale`, when given, replaces the configured bone-size factor.
    /// Structural failures leave the document unchanged; per-bone IK failures
    /// are reported in the summary.
    ///
    /// # Errors
    /// * [`RigError::Cycle`] if the hierarchy loops.
    /// * [`RigError::UnknownObject`] for an unknown root or origin.
    /// * [`RigError::MissingOrigin`] if a mirrored group has no origin.
    /// * [`RigError::ValidationFailed`] for any other blocking issue.
    /// * [`RigError::DuplicateBoneName`] if two groups produce one bone name.
    pub fn build_rig(
        &mut self,
        roots: &[ObjectId],
        origin: Option<ObjectId>,
        bone_scale: Option<f64>,
    ) -> RigResult<BuildSummary> {
        let mut config = self.config.clone();
        if let Some(scale) = bone_scale {
            config.bone_scale = scale;
        }

        let origin_matrix = match &origin {
            Some(id) => Some(self.scene.require(id)?.transform.to_matrix()),
            None => None,
        };
        let exclude: Vec<ObjectId> = origin.iter().cloned().collect();
        let graph = SceneGraph::from_source(&self.scene, roots, &exclude)?;

        let mirrored: Vec<String> = graph
            .groups()
            .filter(|g| g.is_mirrored())
            .map(|g| g.name.clone())
            .collect();
        if origin.is_none() && !mirrored.is_empty() {
            return Err(RigError::MissingOrigin { groups: mirrored });
        }

        let issues = rig::validate_graph(&graph, None, &config);
        if issues.iter().any(Issue::is_blocking) {
            return Err(RigError::ValidationFailed {
                issues: issues.into_iter().filter(Issue::is_blocking).collect(),
            });
        }
        for issue in &issues {
            warn!("{}", issue);
        }

        let origin_frame = origin_matrix.map(|m| MirrorOrigin::new(m, config.mirror_axis));
        let mut mirror = self.mirror.clone();
        let resolved = mirror.resolve_all(&graph, origin_frame.as_ref(), &config)?;

        let mut skeleton = self
            .skeleton
            .clone()
            .unwrap_or_else(|| Skeleton::new(config.skeleton_name.clone()));
        let stats = rig::rebuild(&mut skeleton, &graph, &resolved, &config)?;

        for (name, settings) in &self.bone_settings {
            if let (Some(bone), Some(ik)) = (skeleton.get_mut(name), &settings.ik) {
                bone.ik = Some(ik.clone());
            }
        }
        let synthesis = constraints::synthesize(&mut skeleton, &config);
        for (name, settings) in &self.bone_settings {
            if let (Some(bone), Some(widget)) = (skeleton.get_mut(name), &settings.widget) {
                bone.widget = widget.clone();
            }
        }

        let summary = BuildSummary {
            stats,
            synthesis,
            issues,
            bones: skeleton.len(),
            duplicates: mirror.len(),
        };
        self.config = config;
        self.mirror = mirror;
        self.skeleton = Some(skeleton);
        self.roots = roots.to_vec();
        self.origin = origin;
        info!(
            "document: rig built with {} bone(s), {} linked duplicate(s)",
            summary.bones, summary.duplicates
        );
        Ok(summary)
    }

    /// Rebuilds with the roots and origin of the last build.
    pub fn rebuild(&mut self) -> RigResult<BuildSummary> {
        let roots = self.roots.clone();
        let origin = self.origin.clone();
        self.build_rig(&roots, origin, None)
    }

    /// Creates or updates widget proxies for every bone.
    pub fn apply_controls(&mut self, global_scale: f64) -> RigResult<ControlsSummary> {
        let skeleton = self.skeleton.as_mut().ok_or(RigError::NoSkeleton)?;
        self.global_scale = global_scale;
        Ok(self
            .controls
            .apply_widgets(skeleton, global_scale, &self.config))
    }

    pub fn enter_widget_edit_mode(&mut self, bone: &str) -> RigResult<ProxyHandle> {
        let skeleton = self.skeleton.as_ref().ok_or(RigError::NoSkeleton)?;
        self.controls.enter_widget_edit_mode(skeleton, bone)
    }

    /// The temporary proxy of an open edit session.
    pub fn proxy_mut(&mut self, handle: ProxyHandle) -> RigResult<&mut Transform> {
        self.controls.proxy_mut(handle)
    }

    /// Commits an edit session into the bone's widget settings.
    pub fn apply_custom_transform(&mut self, handle: ProxyHandle) -> RigResult<Transform> {
        let skeleton = self.skeleton.as_mut().ok_or(RigError::NoSkeleton)?;
        let bone = self.controls.session_bone(handle)?.to_string();
        let custom = self
            .controls
            .apply_custom_transform(skeleton, handle, self.global_scale)?;
        let widget = skeleton.require(&bone)?.widget.clone();
        self.bone_settings.entry(bone).or_default().widget = Some(widget);
        Ok(custom)
    }

    pub fn cancel_widget_edit(&mut self, handle: ProxyHandle) -> RigResult<()> {
        self.controls.cancel_widget_edit(handle)
    }

    /// Bakes the rig into a combined mesh and export skeleton.
    ///
    /// The previous bake output is replaced only on success.
    pub fn bake(&mut self) -> RigResult<&BakeResult> {
        let skeleton = self.skeleton.as_ref().ok_or(RigError::NoSkeleton)?;
        let instances = self.mesh_instances();
        debug!("document: baking {} instance(s)", instances.len());
        let result = bake::bake(skeleton, &instances, &self.config)?;
        Ok(self.last_bake.insert(result))
    }

    /// Re-samples actions into constraint-free keyframes on the export
    /// skeleton.
    pub fn bake_animations(&self, actions: &[Action]) -> RigResult<Vec<Action>> {
        bake::bake_animations(self.skeleton()?, actions, &self.config)
    }

    /// Host objects plus linked duplicates, by id.
    fn mesh_instances(&self) -> BTreeMap<ObjectId, MeshInstance> {
        let mut instances: BTreeMap<ObjectId, MeshInstance> = self
            .scene
            .objects()
            .map(|o| {
                (
                    o.id.clone(),
                    MeshInstance {
                        transform: o.transform,
                        mesh: o.mesh.clone(),
                    },
                )
            })
            .collect();
        for dup in self.mirror.duplicates() {
            instances.insert(
                dup.id.clone(),
                MeshInstance {
                    transform: dup.transform,
                    mesh: dup.mesh.clone(),
                },
            );
        }
        instances
    }
}
