//! Bone placement and re-entrant skeleton rebuilds.

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec3;
use log::{debug, info};

use crate::config::{RigConfig, Side};
use crate::error::{RigError, RigResult};
use crate::math::{signed_angle, EPSILON};
use crate::mirror::{MemberInstance, ResolvedGroup};
use crate::naming::SemanticTag;
use crate::scene::SceneGraph;

use super::skeleton::{zero_roll_z, Bone, Skeleton};

/// Counts from one rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Builds a fresh skeleton from resolved groups.
///
/// `resolved` must be parent-first, as produced by
/// [`MirrorResolver::resolve_all`](crate::mirror::MirrorResolver::resolve_all).
pub fn build(
    graph: &SceneGraph,
    resolved: &[ResolvedGroup],
    config: &RigConfig,
) -> RigResult<Skeleton> {
    let mut skeleton = Skeleton::new(config.skeleton_name.clone());
    rebuild(&mut skeleton, graph, resolved, config)?;
    Ok(skeleton)
}

/// Updates `skeleton` in place.
///
/// Bones keep their identity by name: constraints, IK settings, widgets and
/// pose of surviving bones carry over, and IK helper bones survive as long as
/// their owner does. Bones of groups that disappeared are removed. On error the
/// skeleton is left untouched.
pub fn rebuild(
    skeleton: &mut Skeleton,
    graph: &SceneGraph,
    resolved: &[ResolvedGroup],
    config: &RigConfig,
) -> RigResult<RebuildStats> {
    let names = bone_names(resolved)?;

    let mut fresh = Skeleton::new(skeleton.name.clone());
    let mut stats = RebuildStats::default();
    for group in resolved {
        if group.members.is_empty() {
            debug!("builder: skipping empty group '{}'", group.group);
            continue;
        }
        let parent = parent_bone(graph, group, &names);
        let parent_axis = parent
            .as_deref()
            .and_then(|p| fresh.get(p))
            .map(Bone::axis);
        let placed = place_bone(group, parent, parent_axis, config);

        let bone = match skeleton.get(&group.bone_name) {
            Some(old) => {
                stats.updated += 1;
                Bone {
                    constraints: old.constraints.clone(),
                    ik: old.ik.clone(),
                    widget: old.widget.clone(),
                    collection: old.collection,
                    pose: old.pose,
                    ..placed
                }
            }
            None => {
                stats.created += 1;
                placed
            }
        };
        fresh.insert(bone)?;
    }

    // Helpers follow their owner; synthesis repositions them.
    for helper in skeleton.bones().iter().filter(|b| !b.is_deform()) {
        let owner_alive = helper.owner.as_deref().is_some_and(|o| fresh.contains(o));
        let parent_alive = helper.parent.as_deref().map_or(true, |p| fresh.contains(p));
        if owner_alive && parent_alive && !fresh.contains(&helper.name) {
            fresh.insert(helper.clone())?;
        }
    }

    stats.removed = skeleton
        .deform_bones()
        .filter(|b| !fresh.contains(&b.name))
        .count();

    *skeleton = fresh;
    info!(
        "builder: {} bone(s) ({} created, {} updated, {} removed)",
        skeleton.len(),
        stats.created,
        stats.updated,
        stats.removed
    );
    Ok(stats)
}

/// Bone name per (group, side); fails on collisions.
fn bone_names(
    resolved: &[ResolvedGroup],
) -> RigResult<BTreeMap<(String, Option<Side>), String>> {
    let mut seen = BTreeSet::new();
    let mut names = BTreeMap::new();
    for group in resolved {
        if !seen.insert(group.bone_name.clone()) {
            return Err(RigError::DuplicateBoneName {
                name: group.bone_name.clone(),
            });
        }
        names.insert((group.group.clone(), group.side), group.bone_name.clone());
    }
    Ok(names)
}

/// Parent bone for a resolved group.
///
/// A sided child attaches to the same side of a mirrored parent; an unsided
/// child of a mirrored parent attaches to its left side.
fn parent_bone(
    graph: &SceneGraph,
    group: &ResolvedGroup,
    names: &BTreeMap<(String, Option<Side>), String>,
) -> Option<String> {
    let parent_group = graph.group_parent(&group.group)?.parent.clone()?;
    [group.side, None, Some(Side::Left)]
        .into_iter()
        .find_map(|side| names.get(&(parent_group.clone(), side)))
        .cloned()
}

/// Places one bone: head, tail and roll.
fn place_bone(
    group: &ResolvedGroup,
    parent: Option<String>,
    parent_axis: Option<DVec3>,
    config: &RigConfig,
) -> Bone {
    let pivot = group
        .members
        .iter()
        .filter(|m| m.tag.is_hinge())
        .min_by(|a, b| a.id.cmp(&b.id));

    let head = match pivot {
        Some(member) => member.transform.translation,
        None => {
            let sum: DVec3 = group
                .members
                .iter()
                .map(|m| m.matrix().transform_point3(m.bounds.center()))
                .sum();
            sum / group.members.len() as f64
        }
    };

    let (direction, extent) = largest_member(&group.members)
        .map(dominant_direction)
        .unwrap_or((DVec3::Y, 0.0));
    let length = (extent * config.bone_scale).max(config.min_bone_length);
    let tail = head + direction * length;

    let mut bone = Bone::new(group.bone_name.clone(), head, tail);
    bone.roll = parent_axis.map_or(0.0, |p| roll_towards(bone.axis(), p));
    bone.parent = parent;
    bone.group = Some(group.group.clone());
    bone.side = group.side;
    bone.tag = bone_tag(group, pivot);
    bone.members = group.members.iter().map(|m| m.id.clone()).collect();
    bone
}

fn bone_tag(group: &ResolvedGroup, pivot: Option<&MemberInstance>) -> SemanticTag {
    if group.is_hinge() {
        return SemanticTag::Hinge {
            pivot: pivot.map_or_else(|| group.group.clone(), |m| m.id.to_string()),
        };
    }
    group
        .piston_tag()
        .cloned()
        .unwrap_or_else(|| group.kind.clone())
}

/// Member with the largest world-space bounding diagonal; ties by id.
fn largest_member(members: &[MemberInstance]) -> Option<&MemberInstance> {
    members.iter().min_by(|a, b| {
        let da = a.world_bounds().size().length_squared();
        let db = b.world_bounds().size().length_squared();
        db.total_cmp(&da).then_with(|| a.id.cmp(&b.id))
    })
}

/// World direction of a member's dominant local axis and its world extent.
fn dominant_direction(member: &MemberInstance) -> (DVec3, f64) {
    let axis = member.bounds.dominant_axis();
    let local = axis.unit() * member.bounds.size()[axis.index()];
    let world = member.matrix().transform_vector3(local);
    let extent = world.length();
    if extent < EPSILON {
        (DVec3::Y, 0.0)
    } else {
        (world / extent, extent)
    }
}

/// Roll that turns the bone's Z axis towards the parent axis, projected onto
/// the bone's normal plane. Zero when the two are collinear.
fn roll_towards(axis: DVec3, parent_axis: DVec3) -> f64 {
    let projected = parent_axis - axis * parent_axis.dot(axis);
    if projected.length() < 1e-6 {
        return 0.0;
    }
    signed_angle(zero_roll_z(axis), projected.normalize(), axis)
}
