//! Constraint synthesis from semantic tags.
//!
//! Synthesis is re-entrant: every constraint it creates carries
//! [`GENERATOR_MARKER`], and each run first strips those (and only those)
//! before re-applying. Artist constraints have no generator and are never
//! touched.
//!
//! | Source                      | Result                                        |
//! |-----------------------------|-----------------------------------------------|
//! | hinge bone                  | `LimitRotation` locking two local axes        |
//! | piston cylinder + rod       | a `DampedTrack` on each, aimed at the other   |
//! | bone with enabled IK        | control + hidden target bones, `Ik` on bone   |

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{RigConfig, Side};
use crate::controls::{WidgetConfig, WidgetShape};
use crate::error::{RigError, RigResult};
use crate::math::Axis;
use crate::naming::SemanticTag;
use crate::rig::{Bone, BoneRole, Skeleton};

/// Generator tag carried by every synthesized constraint.
pub const GENERATOR_MARKER: &str = "mechrig";

/// Suffix of the visible IK control bone.
pub const IK_CONTROL_SUFFIX: &str = "_IK";
/// Suffix of the hidden IK target bone.
pub const IK_TARGET_SUFFIX: &str = "_IK_target";

fn default_chain_length() -> u32 {
    2
}

fn default_ik_fk() -> f64 {
    1.0
}

fn default_influence() -> f64 {
    1.0
}

/// Per-bone IK configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IkChainSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Number of ancestor bones rotated by the solve.
    #[serde(default = "default_chain_length")]
    pub chain_length: u32,
    /// Blend between FK (0.0) and IK (1.0).
    #[serde(default = "default_ik_fk")]
    pub ik_fk: f64,
}

impl Default for IkChainSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            chain_length: default_chain_length(),
            ik_fk: default_ik_fk(),
        }
    }
}

impl IkChainSpec {
    /// Enabled chain of the given length.
    pub fn enabled(chain_length: u32) -> Self {
        Self {
            enabled: true,
            chain_length,
            ..Self::default()
        }
    }
}

/// Constraint payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Zeroes rest-relative rotation about every locked local axis.
    LimitRotation {
        lock_x: bool,
        lock_y: bool,
        lock_z: bool,
    },
    /// Turns the bone so `track_axis` points at the target bone's head.
    DampedTrack { target: String, track_axis: Axis },
    /// Solves `chain` (nearest ancestor first) so the bone's tail reaches the
    /// target bone's head.
    Ik { target: String, chain: Vec<String> },
}

/// A constraint on a bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub kind: ConstraintKind,
    #[serde(default = "default_influence")]
    pub influence: f64,
    /// `Some(GENERATOR_MARKER)` for synthesized constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

impl Constraint {
    /// A synthesized constraint.
    pub fn generated(name: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            name: name.into(),
            kind,
            influence: 1.0,
            generator: Some(GENERATOR_MARKER.to_string()),
        }
    }

    /// An artist-authored constraint; synthesis never removes these.
    pub fn artist(name: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            generator: None,
            ..Self::generated(name, kind)
        }
    }

    pub fn with_influence(mut self, influence: f64) -> Self {
        self.influence = influence.clamp(0.0, 1.0);
        self
    }

    pub fn is_generated(&self) -> bool {
        self.generator.as_deref() == Some(GENERATOR_MARKER)
    }

    /// Locked rotation axes, for `LimitRotation`.
    pub fn locked_axes(&self) -> Vec<Axis> {
        match &self.kind {
            ConstraintKind::LimitRotation {
                lock_x,
                lock_y,
                lock_z,
            } => Axis::ALL
                .into_iter()
                .zip([*lock_x, *lock_y, *lock_z])
                .filter_map(|(axis, locked)| locked.then_some(axis))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Rotational degrees of freedom left by a `LimitRotation`.
    pub fn free_axes(&self) -> Vec<Axis> {
        let locked = self.locked_axes();
        Axis::ALL
            .into_iter()
            .filter(|a| !locked.contains(a))
            .collect()
    }
}

/// Limit leaving `free` as the only rotational degree of freedom.
pub fn hinge_limit(free: Axis) -> ConstraintKind {
    ConstraintKind::LimitRotation {
        lock_x: free != Axis::X,
        lock_y: free != Axis::Y,
        lock_z: free != Axis::Z,
    }
}

/// A cylinder/rod bone pair sharing a piston id on the same side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PistonLink {
    pub id: String,
    pub side: Option<Side>,
    pub cylinder: String,
    pub rod: String,
}

/// Outcome of one synthesis run.
#[derive(Debug, Default)]
pub struct SynthesisReport {
    /// Bones that received a hinge limit.
    pub hinges: Vec<String>,
    pub piston_links: Vec<PistonLink>,
    /// Bones with a working IK chain.
    pub ik_chains: Vec<String>,
    /// Piston ids that could not be paired.
    pub unpaired_pistons: Vec<String>,
    /// Per-bone failures; the rest of the skeleton was still synthesized.
    pub failures: Vec<RigError>,
}

impl SynthesisReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.unpaired_pistons.is_empty()
    }
}

/// Name of a bone's IK control.
pub fn ik_control_name(bone: &str) -> String {
    format!("{}{}", bone, IK_CONTROL_SUFFIX)
}

/// Name of a bone's hidden IK target.
pub fn ik_target_name(bone: &str) -> String {
    format!("{}{}", bone, IK_TARGET_SUFFIX)
}

/// Pairs piston bones by `(id, side)`; ids without exactly one cylinder and
/// one rod on a side are returned separately.
pub fn piston_links(skeleton: &Skeleton) -> (Vec<PistonLink>, Vec<String>) {
    type Parts<'a> = (Vec<&'a str>, Vec<&'a str>);
    let mut parts: BTreeMap<(String, Option<Side>), Parts<'_>> = BTreeMap::new();
    for bone in skeleton.deform_bones() {
        match &bone.tag {
            SemanticTag::PistonCylinder { id } => parts
                .entry((id.clone(), bone.side))
                .or_default()
                .0
                .push(&bone.name),
            SemanticTag::PistonRod { id } => parts
                .entry((id.clone(), bone.side))
                .or_default()
                .1
                .push(&bone.name),
            _ => {}
        }
    }

    let mut links = Vec::new();
    let mut unpaired = BTreeSet::new();
    for ((id, side), (cylinders, rods)) in parts {
        if let ([cylinder], [rod]) = (cylinders.as_slice(), rods.as_slice()) {
            links.push(PistonLink {
                id,
                side,
                cylinder: cylinder.to_string(),
                rod: rod.to_string(),
            });
        } else {
            unpaired.insert(id);
        }
    }
    (links, unpaired.into_iter().collect())
}

/// Re-applies every generated constraint and IK helper bone.
pub fn synthesize(skeleton: &mut Skeleton, config: &RigConfig) -> SynthesisReport {
    let mut report = SynthesisReport::default();

    for bone in skeleton.bones_mut() {
        bone.constraints.retain(|c| !c.is_generated());
    }

    let hinge_bones: Vec<String> = skeleton
        .deform_bones()
        .filter(|b| b.tag.is_hinge())
        .map(|b| b.name.clone())
        .collect();
    for name in hinge_bones {
        if let Some(bone) = skeleton.get_mut(&name) {
            bone.constraints.push(Constraint::generated(
                "Hinge Limit",
                hinge_limit(config.hinge_free_axis),
            ));
            report.hinges.push(name);
        }
    }

    let (links, unpaired) = piston_links(skeleton);
    for id in &unpaired {
        warn!("constraints: piston '{}' is not a single cylinder/rod pair; skipped", id);
    }
    for link in &links {
        for (owner, target) in [(&link.cylinder, &link.rod), (&link.rod, &link.cylinder)] {
            if let Some(bone) = skeleton.get_mut(owner) {
                bone.constraints.push(Constraint::generated(
                    "Piston Track",
                    ConstraintKind::DampedTrack {
                        target: target.clone(),
                        track_axis: Axis::Y,
                    },
                ));
            }
        }
    }
    report.piston_links = links;
    report.unpaired_pistons = unpaired;

    let ik_bones: Vec<(String, IkChainSpec)> = skeleton
        .deform_bones()
        .filter_map(|b| b.ik.clone().filter(|ik| ik.enabled).map(|ik| (b.name.clone(), ik)))
        .collect();
    let mut live_owners = BTreeSet::new();
    for (name, spec) in ik_bones {
        match apply_ik(skeleton, &name, &spec, config) {
            Ok(()) => {
                live_owners.insert(name.clone());
                report.ik_chains.push(name);
            }
            Err(err) => {
                warn!("constraints: IK on '{}' skipped: {}", name, err);
                report.failures.push(err);
            }
        }
    }

    let before = skeleton.len();
    skeleton.retain(|b| {
        b.is_deform() || b.owner.as_deref().is_some_and(|o| live_owners.contains(o))
    });
    if skeleton.len() != before {
        debug!("constraints: removed {} stale IK helper bone(s)", before - skeleton.len());
    }

    info!(
        "constraints: {} hinge(s), {} piston link(s), {} IK chain(s), {} failure(s)",
        report.hinges.len(),
        report.piston_links.len(),
        report.ik_chains.len(),
        report.failures.len()
    );
    report
}

/// Creates or updates the helper bones and IK constraint for one bone.
fn apply_ik(
    skeleton: &mut Skeleton,
    name: &str,
    spec: &IkChainSpec,
    config: &RigConfig,
) -> RigResult<()> {
    let owner = skeleton.require(name)?.clone();
    let ancestors: Vec<String> = skeleton
        .ancestors(name)
        .into_iter()
        .map(str::to_string)
        .collect();
    let available = ancestors.len() as u32;
    if spec.chain_length == 0 || spec.chain_length > available {
        return Err(RigError::InvalidChainLength {
            bone: name.to_string(),
            requested: spec.chain_length,
            available,
        });
    }

    let control_name = ik_control_name(name);
    let target_name = ik_target_name(name);
    for (helper, role) in [(&control_name, BoneRole::IkControl), (&target_name, BoneRole::IkTarget)] {
        if let Some(existing) = skeleton.get(helper) {
            if existing.role != role || existing.owner.as_deref() != Some(name) {
                return Err(RigError::DuplicateBoneName {
                    name: helper.clone(),
                });
            }
        }
    }

    let axis = owner.axis();
    let length = owner.length();
    let head = owner.tail;

    let mut control = Bone::new(control_name.clone(), head, head + axis * (length * 0.5))
        .with_role(BoneRole::IkControl)
        .with_roll(owner.roll);
    control.owner = Some(name.to_string());
    control.side = owner.side;
    control.widget = WidgetConfig {
        shape: WidgetShape::Box,
        scale: config.ik_control_widget_scale,
        custom_transform: None,
    };

    let mut target = Bone::new(target_name.clone(), head, head + axis * (length * 0.25))
        .with_role(BoneRole::IkTarget)
        .with_parent(control_name.clone())
        .with_roll(owner.roll);
    target.owner = Some(name.to_string());
    target.side = owner.side;
    target.hidden = true;
    target.widget = WidgetConfig {
        shape: WidgetShape::None,
        ..WidgetConfig::default()
    };

    for mut helper in [control, target] {
        if let Some(existing) = skeleton.get(&helper.name) {
            helper.pose = existing.pose;
            helper.constraints = existing.artist_constraints().cloned().collect();
            if helper.role == BoneRole::IkControl {
                helper.widget = existing.widget.clone();
            }
        }
        skeleton.insert(helper)?;
    }

    let chain: Vec<String> = ancestors
        .into_iter()
        .take(spec.chain_length as usize)
        .collect();
    let bone = skeleton
        .get_mut(name)
        .ok_or_else(|| RigError::unknown_bone(name))?;
    bone.constraints.push(
        Constraint::generated(
            "IK",
            ConstraintKind::Ik {
                target: target_name,
                chain,
            },
        )
        .with_influence(spec.ik_fk),
    );
    Ok(())
}
