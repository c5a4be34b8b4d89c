//! Bake and export: one rigid-skinned mesh plus a clean deform skeleton.
//!
//! Everything here works on copies. The live skeleton, scene and duplicates
//! are only read, and a failed bake produces no partial output.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{DMat4, DVec3};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::animation::{Action, Channel, Keyframe, PoseEvaluator};
use crate::config::RigConfig;
use crate::error::{RigError, RigResult};
use crate::math::Transform;
use crate::rig::Skeleton;
use crate::scene::{MeshData, ObjectId};

/// Geometry and placement of one bound instance (host object or duplicate).
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    pub transform: Transform,
    pub mesh: Option<Arc<MeshData>>,
}

/// One binding of a vertex to a bone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexWeight {
    /// Index into [`ExportSkeleton::bones`].
    pub bone: u32,
    pub weight: f64,
}

/// Independent world-space mesh with per-vertex bone weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedMesh {
    pub name: String,
    pub positions: Vec<DVec3>,
    pub triangles: Vec<[u32; 3]>,
    /// One list per vertex.
    pub weights: Vec<Vec<VertexWeight>>,
    /// Vertex group names, indexed by bone index.
    pub vertex_groups: Vec<String>,
}

impl CombinedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Vertex indices bound to a vertex group.
    pub fn group_vertices(&self, group: &str) -> Vec<usize> {
        let Some(bone) = self.vertex_groups.iter().position(|g| g == group) else {
            return Vec::new();
        };
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, w)| w.iter().any(|e| e.bone as usize == bone && e.weight > 0.0))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Bone of the export skeleton: geometry and hierarchy only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBone {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub head: DVec3,
    pub tail: DVec3,
    pub roll: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSkeleton {
    pub name: String,
    pub bones: Vec<ExportBone>,
}

impl ExportSkeleton {
    pub fn get(&self, name: &str) -> Option<&ExportBone> {
        self.bones.iter().find(|b| b.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }
}

/// Output of [`bake`]. Shares nothing with the live rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakeResult {
    pub mesh: CombinedMesh,
    pub skeleton: ExportSkeleton,
}

/// Deform bones with parents re-mapped to the nearest deforming ancestor.
///
/// Returns the export skeleton and, per export bone, `(skeleton index,
/// export parent's skeleton index)`.
fn export_skeleton(skeleton: &Skeleton) -> (ExportSkeleton, Vec<(usize, Option<usize>)>) {
    let mut bones = Vec::new();
    let mut mapping = Vec::new();
    for (i, bone) in skeleton.bones().iter().enumerate() {
        if !bone.is_deform() {
            continue;
        }
        let parent = skeleton
            .ancestors(&bone.name)
            .into_iter()
            .find(|a| skeleton.get(a).is_some_and(|b| b.is_deform()))
            .map(str::to_string);
        mapping.push((i, parent.as_deref().and_then(|p| skeleton.index_of(p))));
        bones.push(ExportBone {
            name: bone.name.clone(),
            parent,
            head: bone.head,
            tail: bone.tail,
            roll: bone.roll,
        });
    }
    (
        ExportSkeleton {
            name: skeleton.name.clone(),
            bones,
        },
        mapping,
    )
}

/// Combines every bound instance into one rigidly skinned mesh.
///
/// Each vertex gets exactly one weight of 1.0, for the bone whose group owns
/// its source object. Reflected instances have their winding flipped.
///
/// # Errors
/// * [`RigError::NoSkeleton`] when there are no deform bones.
/// * [`RigError::UnknownObject`] when a bone member has no instance.
/// * [`RigError::MalformedMesh`] when a source mesh fails validation.
pub fn bake(
    skeleton: &Skeleton,
    instances: &BTreeMap<ObjectId, MeshInstance>,
    config: &RigConfig,
) -> RigResult<BakeResult> {
    let mut rest = skeleton.clone();
    rest.reset_pose();

    let (export, _) = export_skeleton(&rest);
    if export.bones.is_empty() {
        return Err(RigError::NoSkeleton);
    }

    let mut mesh = CombinedMesh {
        name: config.combined_mesh_name.clone(),
        positions: Vec::new(),
        triangles: Vec::new(),
        weights: Vec::new(),
        vertex_groups: export.bones.iter().map(|b| b.name.clone()).collect(),
    };

    for (bone_index, bone) in rest.deform_bones().enumerate() {
        let bone_index = bone_index as u32;
        for member in &bone.members {
            let instance = instances.get(member).ok_or_else(|| RigError::UnknownObject {
                id: member.to_string(),
            })?;
            let Some(source) = &instance.mesh else {
                debug!("bake: '{}' has no geometry", member);
                continue;
            };
            source
                .validate()
                .map_err(|reason| RigError::malformed_mesh(member.as_str(), reason))?;

            let offset = u32::try_from(mesh.positions.len())
                .map_err(|_| RigError::malformed_mesh(member.as_str(), "combined mesh exceeds u32 indices"))?;
            let world = source.transformed(&instance.transform.to_matrix());
            mesh.positions.extend(world.positions);
            mesh.triangles.extend(
                world
                    .triangles
                    .iter()
                    .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
            );
            let rigid = vec![VertexWeight {
                bone: bone_index,
                weight: 1.0,
            }];
            mesh.weights
                .extend(std::iter::repeat(rigid).take(source.vertex_count()));
        }
    }

    info!(
        "bake: {} vertices, {} triangles, {} bone(s)",
        mesh.vertex_count(),
        mesh.triangle_count(),
        export.bones.len()
    );
    Ok(BakeResult {
        mesh,
        skeleton: export,
    })
}

/// Re-samples actions with every constraint evaluated, producing plain
/// keyframes for the deform bones of the export skeleton.
///
/// Samples are taken at the union of each action's key times. Keys hold the
/// rest-relative local transform of each export bone under its export parent.
pub fn bake_animations(
    skeleton: &Skeleton,
    actions: &[Action],
    config: &RigConfig,
) -> RigResult<Vec<Action>> {
    let (export, mapping) = export_skeleton(skeleton);
    if export.bones.is_empty() {
        return Err(RigError::NoSkeleton);
    }
    let evaluator = PoseEvaluator::new(skeleton, config);
    let bones = skeleton.bones();
    let rest_local: Vec<DMat4> = mapping
        .iter()
        .map(|&(i, parent)| match parent {
            Some(p) => bones[p].rest_matrix().inverse() * bones[i].rest_matrix(),
            None => bones[i].rest_matrix(),
        })
        .collect();

    let mut baked = Vec::with_capacity(actions.len());
    for action in actions {
        for channel in &action.channels {
            if !skeleton.contains(&channel.bone) {
                warn!(
                    "bake: action '{}' animates unknown bone '{}'; ignored",
                    action.name, channel.bone
                );
            }
        }

        let times = action.key_times();
        let mut keys: Vec<Vec<Keyframe>> = vec![Vec::with_capacity(times.len()); export.bones.len()];
        for &time in &times {
            let pose: BTreeMap<String, Transform> = action
                .channels
                .iter()
                .filter(|c| skeleton.contains(&c.bone))
                .map(|c| (c.bone.clone(), c.sample(time)))
                .collect();
            let world = evaluator.evaluate(&pose);
            for (e, &(i, parent)) in mapping.iter().enumerate() {
                let parent_world = parent.map_or(DMat4::IDENTITY, |p| world[p]);
                let local = rest_local[e].inverse() * parent_world.inverse() * world[i];
                keys[e].push(Keyframe::from_transform(time, &Transform::from_matrix(&local)));
            }
        }

        let channels = export
            .bones
            .iter()
            .zip(keys)
            .map(|(bone, keyframes)| Channel::new(bone.name.clone(), keyframes))
            .collect();
        debug!("bake: action '{}' sampled at {} time(s)", action.name, times.len());
        baked.push(Action {
            name: action.name.clone(),
            channels,
        });
    }
    info!("bake: {} action(s) baked", baked.len());
    Ok(baked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{synthesize, IkChainSpec};
    use crate::rig::Bone;
    use glam::DQuat;

    fn rig() -> (Skeleton, BTreeMap<ObjectId, MeshInstance>) {
        let mut s = Skeleton::new("Rig");
        let mut body = Bone::new("Body", DVec3::ZERO, DVec3::Z);
        body.members = vec![ObjectId::from("body")];
        let mut arm = Bone::new("Arm", DVec3::Z, DVec3::Z * 2.0).with_parent("Body");
        arm.members = vec![ObjectId::from("arm"), ObjectId::from("arm_pin")];
        s.insert(body).unwrap();
        s.insert(arm).unwrap();

        let cube = Arc::new(MeshData::cuboid(DVec3::splat(0.5)));
        let mut instances = BTreeMap::new();
        instances.insert(
            ObjectId::from("body"),
            MeshInstance {
                transform: Transform::IDENTITY,
                mesh: Some(cube.clone()),
            },
        );
        instances.insert(
            ObjectId::from("arm"),
            MeshInstance {
                transform: Transform::from_translation(DVec3::Z * 1.5),
                mesh: Some(cube),
            },
        );
        instances.insert(
            ObjectId::from("arm_pin"),
            MeshInstance {
                transform: Transform::from_translation(DVec3::Z),
                mesh: None,
            },
        );
        (s, instances)
    }

    #[test]
    fn test_rigid_skin() {
        let (s, instances) = rig();
        let result = bake(&s, &instances, &RigConfig::default()).unwrap();
        assert_eq!(result.mesh.vertex_count(), 16);
        assert_eq!(result.mesh.triangle_count(), 24);
        assert_eq!(result.mesh.weights.len(), 16);
        for weights in &result.mesh.weights {
            assert_eq!(weights.len(), 1);
            assert_eq!(weights[0].weight, 1.0);
        }
        assert_eq!(result.mesh.group_vertices("Arm"), (8..16).collect::<Vec<_>>());
        assert_eq!(result.mesh.name, "Rigged_Mesh");
        // Second copy's indices are offset past the first copy's vertices.
        assert!(result.mesh.triangles[12..].iter().flatten().all(|&i| i >= 8));
    }

    #[test]
    fn test_export_skeleton_strips_helpers() {
        let (mut s, instances) = rig();
        s.get_mut("Arm").unwrap().ik = Some(IkChainSpec::enabled(1));
        synthesize(&mut s, &RigConfig::default());
        assert_eq!(s.len(), 4);

        let result = bake(&s, &instances, &RigConfig::default()).unwrap();
        let names: Vec<&str> = result.skeleton.bones.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Body", "Arm"]);
        assert_eq!(result.skeleton.get("Arm").unwrap().parent.as_deref(), Some("Body"));
    }

    #[test]
    fn test_bake_resets_pose_on_copy_only() {
        let (mut s, instances) = rig();
        s.get_mut("Arm").unwrap().pose = Transform::from_translation(DVec3::X);
        let result = bake(&s, &instances, &RigConfig::default()).unwrap();
        assert_eq!(result.skeleton.get("Arm").unwrap().head, DVec3::Z);
        assert_eq!(s.get("Arm").unwrap().pose.translation, DVec3::X);
    }

    #[test]
    fn test_malformed_mesh_fails_whole_bake() {
        let (s, mut instances) = rig();
        instances.get_mut(&ObjectId::from("arm")).unwrap().mesh =
            Some(Arc::new(MeshData::new(vec![DVec3::ZERO], vec![[0, 0, 5]])));
        let err = bake(&s, &instances, &RigConfig::default()).unwrap_err();
        assert!(matches!(err, RigError::MalformedMesh { ref object, .. } if object == "arm"));
    }

    #[test]
    fn test_mirrored_instance_flips_winding() {
        let (s, mut instances) = rig();
        instances.get_mut(&ObjectId::from("arm")).unwrap().transform =
            Transform::IDENTITY.with_scale(DVec3::new(-1.0, 1.0, 1.0));
        let result = bake(&s, &instances, &RigConfig::default()).unwrap();
        let cube = MeshData::cuboid(DVec3::splat(0.5));
        let [a, b, c] = cube.triangles[0];
        assert_eq!(result.mesh.triangles[12], [a + 8, c + 8, b + 8]);
    }

    #[test]
    fn test_empty_skeleton() {
        let err = bake(&Skeleton::new("Rig"), &BTreeMap::new(), &RigConfig::default()).unwrap_err();
        assert_eq!(err.code(), "RIG_010");
    }

    #[test]
    fn test_bake_animation_writes_deform_keys() {
        let (s, _) = rig();
        let action = Action::new("Wave").with_channel(Channel::new(
            "Arm",
            vec![
                Keyframe::new(0.0),
                Keyframe::new(1.0).with_rotation(DQuat::from_rotation_x(0.5)),
            ],
        ));
        let baked = bake_animations(&s, &[action], &RigConfig::default()).unwrap();
        assert_eq!(baked.len(), 1);
        let arm = baked[0].channel("Arm").unwrap();
        assert_eq!(arm.keyframes.len(), 2);
        assert!(arm.keyframes[1].rotation.angle_between(DQuat::from_rotation_x(0.5)) < 1e-6);
        let body = baked[0].channel("Body").unwrap();
        assert!(body
            .keyframes
            .iter()
            .all(|k| k.rotation.angle_between(DQuat::IDENTITY) < 1e-6));
    }

    #[test]
    fn test_bake_animation_resolves_ik() {
        let mut s = Skeleton::new("Rig");
        s.insert(Bone::new("Upper", DVec3::ZERO, DVec3::Z)).unwrap();
        s.insert(Bone::new("Lower", DVec3::Z, DVec3::Z * 2.0).with_parent("Upper"))
            .unwrap();
        s.get_mut("Lower").unwrap().ik = Some(IkChainSpec::enabled(1));
        synthesize(&mut s, &RigConfig::default());

        let control = s.get("Lower_IK").unwrap();
        let goal = DVec3::new(2.0, 0.0, 0.0);
        let offset = control.rest_matrix().inverse().transform_vector3(goal - control.head);
        let action = Action::new("Reach").with_channel(Channel::new(
            "Lower_IK",
            vec![Keyframe::new(0.0), Keyframe::new(1.0).with_location(offset)],
        ));
        let baked = bake_animations(&s, &[action], &RigConfig::default()).unwrap();
        assert!(baked[0].channel("Lower_IK").is_none());

        let upper = &baked[0].channel("Upper").unwrap().keyframes;
        assert!(upper[0].rotation.angle_between(DQuat::IDENTITY) < 1e-6);
        // The chain swings a quarter turn to lay the arm along +X.
        let angle = upper[1].rotation.angle_between(DQuat::IDENTITY);
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-3, "angle {angle}");
    }
}
