//! Mirror resolution: expands `_Mirrored` groups into left and right sides.
//!
//! The left side is canonical. Members without a mirror flag, and flagged
//! members on the positive side of the origin plane, are used as-is. Flagged
//! members on the negative side were authored on the right; they are reflected
//! onto the left first. The right side is always synthesized: one linked
//! duplicate per canonical member, reflected through the origin plane, sharing
//! the source mesh buffers.
//!
//! The resolver keeps a map from duplicate id to duplicate so a rerun updates
//! existing duplicates in place instead of creating new ones.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use glam::DMat4;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{RigConfig, Side};
use crate::error::{RigError, RigResult};
use crate::math::{mirror_matrix, signed_offset, Aabb, Axis, Transform};
use crate::naming::SemanticTag;
use crate::scene::{Group, MeshData, ObjectId, SceneGraph, SceneNode};

/// Suffix of duplicate ids for the synthesized right side.
const MIRROR_ID_SUFFIX: &str = "@mirror";
/// Suffix of duplicate ids for right-authored members reflected to the left.
const CANONICAL_ID_SUFFIX: &str = "@canonical";

/// Mirror plane: the origin's world matrix and the plane normal axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorOrigin {
    pub matrix: DMat4,
    pub axis: Axis,
}

impl MirrorOrigin {
    pub fn new(matrix: DMat4, axis: Axis) -> Self {
        Self { matrix, axis }
    }

    /// Reflects a world transform through the plane.
    pub fn reflect(&self, transform: &Transform) -> Transform {
        Transform::from_matrix(&(self.reflection() * transform.to_matrix()))
    }

    /// World-space reflection matrix.
    pub fn reflection(&self) -> DMat4 {
        mirror_matrix(&self.matrix, self.axis)
    }

    /// Signed distance of a world point from the plane.
    pub fn offset(&self, point: glam::DVec3) -> f64 {
        signed_offset(point, &self.matrix, self.axis)
    }
}

/// A copy sharing geometry with its source but carrying its own transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedDuplicate {
    pub id: ObjectId,
    /// Host object the duplicate was made from.
    pub source: ObjectId,
    pub name: String,
    pub side: Side,
    /// World transform (reflected, so usually with negative determinant).
    pub transform: Transform,
    /// Shared with the source object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<Arc<MeshData>>,
}

/// One member of a resolved group: a host object or a linked duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInstance {
    /// Instance id: the host id, or the duplicate id.
    pub id: ObjectId,
    /// Host object this instance derives from.
    pub source: ObjectId,
    pub name: String,
    pub transform: Transform,
    pub bounds: Aabb,
    pub mesh: Option<Arc<MeshData>>,
    pub tag: SemanticTag,
    /// True for synthesized duplicates.
    pub linked: bool,
}

impl MemberInstance {
    fn from_node(node: &SceneNode) -> Self {
        Self {
            id: node.object.id.clone(),
            source: node.object.id.clone(),
            name: node.object.name.clone(),
            transform: node.object.transform,
            bounds: node.object.bounds,
            mesh: node.object.mesh.clone(),
            tag: node.tag.clone(),
            linked: false,
        }
    }

    fn from_duplicate(dup: &LinkedDuplicate, bounds: Aabb, tag: &SemanticTag) -> Self {
        let tag = match tag {
            SemanticTag::Hinge { .. } => SemanticTag::Hinge {
                pivot: dup.id.to_string(),
            },
            other => other.clone(),
        };
        Self {
            id: dup.id.clone(),
            source: dup.source.clone(),
            name: dup.name.clone(),
            transform: dup.transform,
            bounds,
            mesh: dup.mesh.clone(),
            tag,
            linked: true,
        }
    }

    /// World matrix of the instance.
    pub fn matrix(&self) -> DMat4 {
        self.transform.to_matrix()
    }

    /// World-space bounding box.
    pub fn world_bounds(&self) -> Aabb {
        self.bounds.transformed(&self.matrix())
    }
}

/// A group after mirror resolution: exactly what one bone is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGroup {
    /// Name of the bone this group becomes.
    pub bone_name: String,
    /// Source group name.
    pub group: String,
    pub side: Option<Side>,
    /// Semantic kind of the group's base name.
    pub kind: SemanticTag,
    pub members: Vec<MemberInstance>,
}

impl ResolvedGroup {
    /// Hinge pivot: the first hinge-tagged member.
    pub fn hinge_pivot(&self) -> Option<&MemberInstance> {
        self.members.iter().find(|m| m.tag.is_hinge())
    }

    /// Whether the group or any member is a hinge.
    pub fn is_hinge(&self) -> bool {
        self.kind.is_hinge() || self.hinge_pivot().is_some()
    }

    /// Piston tag of the group, falling back to the first piston member.
    pub fn piston_tag(&self) -> Option<&SemanticTag> {
        if self.kind.is_piston() {
            return Some(&self.kind);
        }
        self.members.iter().map(|m| &m.tag).find(|t| t.is_piston())
    }
}

/// Stateful resolver; its duplicate map is document-embedded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorResolver {
    #[serde(default)]
    duplicates: BTreeMap<ObjectId, LinkedDuplicate>,
}

impl MirrorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every linked duplicate currently tracked.
    pub fn duplicates(&self) -> impl Iterator<Item = &LinkedDuplicate> {
        self.duplicates.values()
    }

    pub fn duplicate(&self, id: &ObjectId) -> Option<&LinkedDuplicate> {
        self.duplicates.get(id)
    }

    pub fn len(&self) -> usize {
        self.duplicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.duplicates.is_empty()
    }

    /// Resolves one group.
    ///
    /// Plain groups pass through as a single side. Mirrored groups yield
    /// `(left, Some(right))`.
    ///
    /// # Errors
    /// [`RigError::MissingOrigin`] for a mirrored group when `origin` is `None`.
    pub fn resolve(
        &mut self,
        graph: &SceneGraph,
        group: &Group,
        origin: Option<&MirrorOrigin>,
        config: &RigConfig,
    ) -> RigResult<(ResolvedGroup, Option<ResolvedGroup>)> {
        let mut touched = BTreeSet::new();
        self.resolve_tracked(graph, group, origin, config, &mut touched)
    }

    /// Resolves every group in parent-first order and drops duplicates whose
    /// source is gone.
    pub fn resolve_all(
        &mut self,
        graph: &SceneGraph,
        origin: Option<&MirrorOrigin>,
        config: &RigConfig,
    ) -> RigResult<Vec<ResolvedGroup>> {
        let missing: Vec<String> = graph
            .groups()
            .filter(|g| g.is_mirrored())
            .map(|g| g.name.clone())
            .collect();
        if origin.is_none() && !missing.is_empty() {
            return Err(RigError::MissingOrigin { groups: missing });
        }

        let mut touched = BTreeSet::new();
        let mut resolved = Vec::new();
        for group in graph.groups_topological() {
            let (first, second) = self.resolve_tracked(graph, group, origin, config, &mut touched)?;
            resolved.push(first);
            resolved.extend(second);
        }

        let before = self.duplicates.len();
        self.duplicates.retain(|id, _| touched.contains(id));
        let pruned = before - self.duplicates.len();
        if pruned > 0 {
            debug!("mirror: pruned {} stale duplicate(s)", pruned);
        }
        info!(
            "mirror: {} resolved group(s), {} linked duplicate(s)",
            resolved.len(),
            self.duplicates.len()
        );
        Ok(resolved)
    }

    fn resolve_tracked(
        &mut self,
        graph: &SceneGraph,
        group: &Group,
        origin: Option<&MirrorOrigin>,
        config: &RigConfig,
        touched: &mut BTreeSet<ObjectId>,
    ) -> RigResult<(ResolvedGroup, Option<ResolvedGroup>)> {
        let nodes: Vec<&SceneNode> = group
            .members
            .iter()
            .filter_map(|id| graph.node(id))
            .filter(|n| n.object.linked_from.is_none())
            .collect();

        if !group.is_mirrored() {
            let plain = ResolvedGroup {
                bone_name: group.class.base_name.clone(),
                group: group.name.clone(),
                side: None,
                kind: group.class.kind.clone(),
                members: nodes.iter().map(|n| MemberInstance::from_node(n)).collect(),
            };
            return Ok((plain, None));
        }

        let origin = origin.ok_or_else(|| RigError::MissingOrigin {
            groups: vec![group.name.clone()],
        })?;

        let mut left = Vec::new();
        let mut right = Vec::new();
        for node in nodes {
            let object = &node.object;
            let authored_right =
                object.mirror && origin.offset(object.transform.translation) < 0.0;

            let canonical = if authored_right {
                let id = ObjectId::new(format!("{}{}", object.id, CANONICAL_ID_SUFFIX));
                let dup = self.upsert(LinkedDuplicate {
                    id: id.clone(),
                    source: object.id.clone(),
                    name: config.side_name(&object.name, Side::Left),
                    side: Side::Left,
                    transform: origin.reflect(&object.transform),
                    mesh: object.mesh.clone(),
                });
                touched.insert(id);
                MemberInstance::from_duplicate(dup, object.bounds, &node.tag)
            } else {
                MemberInstance::from_node(node)
            };

            let id = ObjectId::new(format!("{}{}", object.id, MIRROR_ID_SUFFIX));
            let dup = self.upsert(LinkedDuplicate {
                id: id.clone(),
                source: object.id.clone(),
                name: config.side_name(&object.name, Side::Right),
                side: Side::Right,
                transform: origin.reflect(&canonical.transform),
                mesh: object.mesh.clone(),
            });
            touched.insert(id);
            right.push(MemberInstance::from_duplicate(dup, object.bounds, &node.tag));
            left.push(canonical);
        }

        let base = &group.class.base_name;
        let make = |side: Side, members: Vec<MemberInstance>| ResolvedGroup {
            bone_name: config.side_name(base, side),
            group: group.name.clone(),
            side: Some(side),
            kind: group.class.kind.clone(),
            members,
        };
        Ok((make(Side::Left, left), Some(make(Side::Right, right))))
    }

    /// Inserts a duplicate or updates the existing one with the same id.
    fn upsert(&mut self, dup: LinkedDuplicate) -> &LinkedDuplicate {
        let id = dup.id.clone();
        match self.duplicates.get_mut(&id) {
            Some(existing) => {
                existing.name = dup.name;
                existing.side = dup.side;
                existing.transform = dup.transform;
                existing.source = dup.source;
                let stale = match (&existing.mesh, &dup.mesh) {
                    (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
                    (None, None) => false,
                    _ => true,
                };
                if stale {
                    existing.mesh = dup.mesh;
                }
            }
            None => {
                debug!("mirror: new linked duplicate {}", id);
                self.duplicates.insert(id.clone(), dup);
            }
        }
        &self.duplicates[&id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Scene, SceneObject};
    use glam::DVec3;

    fn world_origin() -> MirrorOrigin {
        MirrorOrigin::new(DMat4::IDENTITY, Axis::X)
    }

    fn arm_scene() -> Scene {
        Scene::new()
            .with(SceneObject::mesh("body", "BodyMesh").in_collection("Body"))
            .with(
                SceneObject::mesh("arm", "ArmMesh")
                    .at(DVec3::new(2.0, 0.0, 0.0))
                    .with_parent("body")
                    .in_collection("Arm_Mirrored")
                    .mirrored(),
            )
    }

    #[test]
    fn test_plain_group_passes_through() {
        let scene = arm_scene();
        let graph = SceneGraph::from_source(&scene, &[], &[]).unwrap();
        let mut resolver = MirrorResolver::new();
        let (body, right) = resolver
            .resolve(&graph, graph.group("Body").unwrap(), None, &RigConfig::default())
            .unwrap();
        assert!(right.is_none());
        assert_eq!(body.bone_name, "Body");
        assert_eq!(body.members.len(), 1);
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_mirrored_group_yields_two_sides() {
        let scene = arm_scene();
        let graph = SceneGraph::from_source(&scene, &[], &[]).unwrap();
        let mut resolver = MirrorResolver::new();
        let (left, right) = resolver
            .resolve(
                &graph,
                graph.group("Arm_Mirrored").unwrap(),
                Some(&world_origin()),
                &RigConfig::default(),
            )
            .unwrap();
        let right = right.unwrap();
        assert_eq!(left.bone_name, "Arm_L");
        assert_eq!(right.bone_name, "Arm_R");
        assert!(!left.members[0].linked);
        assert!(right.members[0].linked);
        assert_eq!(right.members[0].name, "ArmMesh_R");
        assert!(right.members[0]
            .transform
            .translation
            .abs_diff_eq(DVec3::new(-2.0, 0.0, 0.0), 1e-12));
        // Linked duplicate shares the mesh buffers.
        let src = scene.get(&ObjectId::from("arm")).unwrap().mesh.clone().unwrap();
        assert!(Arc::ptr_eq(&src, right.members[0].mesh.as_ref().unwrap()));
    }

    #[test]
    fn test_resolve_twice_keeps_two_sides() {
        let scene = arm_scene();
        let graph = SceneGraph::from_source(&scene, &[], &[]).unwrap();
        let mut resolver = MirrorResolver::new();
        let config = RigConfig::default();
        let first = resolver.resolve_all(&graph, Some(&world_origin()), &config).unwrap();
        let second = resolver.resolve_all(&graph, Some(&world_origin()), &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.len(), 1);
        let arm_sides = second.iter().filter(|g| g.group == "Arm_Mirrored").count();
        assert_eq!(arm_sides, 2);
    }

    #[test]
    fn test_rerun_updates_duplicate_in_place() {
        let mut scene = arm_scene();
        let config = RigConfig::default();
        let mut resolver = MirrorResolver::new();
        let graph = SceneGraph::from_source(&scene, &[], &[]).unwrap();
        resolver.resolve_all(&graph, Some(&world_origin()), &config).unwrap();

        scene.get_mut(&ObjectId::from("arm")).unwrap().transform.translation =
            DVec3::new(3.0, 1.0, 0.0);
        let graph = SceneGraph::from_source(&scene, &[], &[]).unwrap();
        resolver.resolve_all(&graph, Some(&world_origin()), &config).unwrap();

        assert_eq!(resolver.len(), 1);
        let dup = resolver.duplicate(&ObjectId::from("arm@mirror")).unwrap();
        assert!(dup.transform.translation.abs_diff_eq(DVec3::new(-3.0, 1.0, 0.0), 1e-12));
    }

    #[test]
    fn test_right_authored_member_is_canonicalised() {
        let scene = Scene::new().with(
            SceneObject::mesh("arm", "ArmMesh")
                .at(DVec3::new(-2.0, 0.0, 0.0))
                .in_collection("Arm_Mirrored")
                .mirrored(),
        );
        let graph = SceneGraph::from_source(&scene, &[], &[]).unwrap();
        let mut resolver = MirrorResolver::new();
        let (left, right) = resolver
            .resolve(
                &graph,
                graph.group("Arm_Mirrored").unwrap(),
                Some(&world_origin()),
                &RigConfig::default(),
            )
            .unwrap();
        assert!(left.members[0].linked);
        assert!(left.members[0].transform.translation.x > 0.0);
        let right = right.unwrap();
        assert!(right.members[0]
            .transform
            .translation
            .abs_diff_eq(DVec3::new(-2.0, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn test_unflagged_member_is_left_source() {
        let scene = Scene::new().with(
            SceneObject::mesh("bolt", "Bolt")
                .at(DVec3::new(-1.0, 0.0, 0.0))
                .in_collection("Arm_Mirrored"),
        );
        let graph = SceneGraph::from_source(&scene, &[], &[]).unwrap();
        let mut resolver = MirrorResolver::new();
        let (left, right) = resolver
            .resolve(
                &graph,
                graph.group("Arm_Mirrored").unwrap(),
                Some(&world_origin()),
                &RigConfig::default(),
            )
            .unwrap();
        assert!(!left.members[0].linked);
        assert_eq!(left.members[0].transform.translation.x, -1.0);
        assert_eq!(right.unwrap().members[0].transform.translation.x, 1.0);
    }

    #[test]
    fn test_missing_origin() {
        let scene = arm_scene();
        let graph = SceneGraph::from_source(&scene, &[], &[]).unwrap();
        let mut resolver = MirrorResolver::new();
        let err = resolver
            .resolve_all(&graph, None, &RigConfig::default())
            .unwrap_err();
        match err {
            RigError::MissingOrigin { groups } => assert_eq!(groups, vec!["Arm_Mirrored"]),
            other => panic!("expected missing origin, got {other}"),
        }
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_stale_duplicates_pruned() {
        let config = RigConfig::default();
        let mut resolver = MirrorResolver::new();
        let scene = arm_scene();
        let graph = SceneGraph::from_source(&scene, &[], &[]).unwrap();
        resolver.resolve_all(&graph, Some(&world_origin()), &config).unwrap();
        assert_eq!(resolver.len(), 1);

        let mut scene = scene;
        scene.remove(&ObjectId::from("arm"));
        let graph = SceneGraph::from_source(&scene, &[], &[]).unwrap();
        resolver.resolve_all(&graph, None, &config).unwrap();
        assert!(resolver.is_empty());
    }
}
