//! End-to-end rig scenarios driven through the document API.

use glam::DVec3;
use pretty_assertions::assert_eq;

use mechrig_core::constraints::{ik_control_name, ik_target_name};
use mechrig_core::controls::BoneCollection;
use mechrig_core::{
    skeleton_fingerprint, BoneRole, ConstraintKind, IkChainSpec, IssueCode, ObjectId,
    RigDocument, RigError, Scene, SceneObject,
};

// ============================================================================
// Fixtures
// ============================================================================

fn arm_chain() -> Scene {
    Scene::new()
        .with(SceneObject::mesh("upper", "UpperArm"))
        .with(
            SceneObject::mesh("lower", "LowerArm")
                .at(DVec3::new(0.0, 1.0, 0.0))
                .with_parent("upper"),
        )
        .with(
            SceneObject::mesh("hand", "Hand")
                .at(DVec3::new(0.0, 2.0, 0.0))
                .with_parent("lower"),
        )
}

fn mirrored_arm() -> Scene {
    Scene::new()
        .with(SceneObject::empty("origin", "Origin"))
        .with(
            SceneObject::mesh("arm", "Arm")
                .at(DVec3::new(1.5, 0.25, -0.5))
                .in_collection("Arm_Mirrored")
                .mirrored(),
        )
}

fn piston_rig() -> Scene {
    Scene::new()
        .with(SceneObject::mesh("base", "Base"))
        .with(
            SceneObject::mesh("cyl", "Piston_01_Cyl")
                .at(DVec3::new(0.0, 1.0, 0.0))
                .with_parent("base"),
        )
        .with(
            SceneObject::mesh("rod", "Piston_01_Rod")
                .at(DVec3::new(0.0, 2.0, 1.0))
                .with_parent("cyl"),
        )
}

fn four_bone_chain() -> Scene {
    let mut scene = Scene::new();
    let names = ["A", "B", "C", "D"];
    for (i, name) in names.iter().enumerate() {
        let mut object = SceneObject::mesh(name.to_lowercase(), *name).at(DVec3::new(0.0, i as f64, 0.0));
        if i > 0 {
            object = object.with_parent(names[i - 1].to_lowercase());
        }
        scene.insert(object);
    }
    scene
}

// ============================================================================
// Hierarchy and idempotence
// ============================================================================

#[test]
fn test_linear_chain_yields_three_bones() {
    let mut doc = RigDocument::new(arm_chain());
    doc.build_rig(&[], None, None).unwrap();
    let skeleton = doc.skeleton().unwrap();

    assert_eq!(skeleton.len(), 3);
    assert_eq!(skeleton.get("UpperArm").unwrap().parent, None);
    assert_eq!(
        skeleton.get("LowerArm").unwrap().parent.as_deref(),
        Some("UpperArm")
    );
    assert_eq!(skeleton.get("Hand").unwrap().parent.as_deref(), Some("LowerArm"));
}

#[test]
fn test_build_twice_is_identical() {
    let mut doc = RigDocument::new(arm_chain());
    doc.build_rig(&[], None, None).unwrap();
    let first = doc.skeleton().unwrap().clone();

    let summary = doc.build_rig(&[], None, None).unwrap();
    assert_eq!(summary.stats.created, 0);
    assert_eq!(summary.stats.removed, 0);
    assert_eq!(summary.stats.updated, 3);
    assert_eq!(doc.skeleton().unwrap(), &first);
    assert_eq!(
        skeleton_fingerprint(doc.skeleton().unwrap()).unwrap(),
        skeleton_fingerprint(&first).unwrap()
    );
}

#[test]
fn test_cycle_aborts_without_mutation() {
    let mut scene = arm_chain();
    scene.get_mut(&ObjectId::new("upper")).unwrap().parent = Some(ObjectId::new("hand"));
    let mut doc = RigDocument::new(scene);

    let issues = doc.validate_hierarchy(&[], None);
    assert!(issues.iter().any(|i| i.code == IssueCode::Cycle));

    let err = doc.build_rig(&[], None, None).unwrap_err();
    assert!(matches!(err, RigError::Cycle { .. }));
    assert!(err.is_structural());
    assert!(doc.skeleton.is_none());
}

#[test]
fn test_roots_limit_the_selection() {
    let mut doc = RigDocument::new(arm_chain());
    doc.build_rig(&[ObjectId::new("lower")], None, None).unwrap();
    let skeleton = doc.skeleton().unwrap();
    assert_eq!(skeleton.len(), 2);
    assert!(!skeleton.contains("UpperArm"));
    assert_eq!(skeleton.get("LowerArm").unwrap().parent, None);
}

// ============================================================================
// Mirroring
// ============================================================================

#[test]
fn test_mirrored_group_yields_both_sides() {
    let mut doc = RigDocument::new(mirrored_arm());
    doc.build_rig(&[], Some(ObjectId::new("origin")), None).unwrap();
    let skeleton = doc.skeleton().unwrap();

    let left = skeleton.get("Arm_L").unwrap();
    let right = skeleton.get("Arm_R").unwrap();
    let reflected = DVec3::new(-left.head.x, left.head.y, left.head.z);
    assert!(right.head.abs_diff_eq(reflected, 1e-9), "{:?}", right.head);
    assert!((left.length() - right.length()).abs() < 1e-9);
}

#[test]
fn test_mirror_resolution_is_stable() {
    let mut doc = RigDocument::new(mirrored_arm());
    let origin = Some(ObjectId::new("origin"));
    doc.build_rig(&[], origin.clone(), None).unwrap();
    doc.build_rig(&[], origin.clone(), None).unwrap();
    doc.build_rig(&[], origin, None).unwrap();

    let arms = doc
        .skeleton()
        .unwrap()
        .bones()
        .iter()
        .filter(|b| b.name.starts_with("Arm"))
        .count();
    assert_eq!(arms, 2);
    assert_eq!(doc.mirror.len(), 1);
}

#[test]
fn test_mirror_follows_source_edits() {
    let mut doc = RigDocument::new(mirrored_arm());
    let origin = Some(ObjectId::new("origin"));
    doc.build_rig(&[], origin.clone(), None).unwrap();

    doc.scene
        .get_mut(&ObjectId::new("arm"))
        .unwrap()
        .transform
        .translation = DVec3::new(3.0, 0.0, 0.0);
    doc.build_rig(&[], origin, None).unwrap();

    let right = doc.skeleton().unwrap().get("Arm_R").unwrap();
    assert!((right.head.x + 3.0).abs() < 1e-9);
    assert_eq!(doc.mirror.len(), 1);
}

#[test]
fn test_mirrored_without_origin() {
    let mut doc = RigDocument::new(mirrored_arm());
    let issues = doc.validate_hierarchy(&[], None);
    assert!(issues
        .iter()
        .any(|i| i.code == IssueCode::MissingOrigin && i.subject == "Arm_Mirrored"));

    let err = doc.build_rig(&[], None, None).unwrap_err();
    assert_eq!(err.code(), "RIG_002");
}

// ============================================================================
// Pistons and hinges
// ============================================================================

#[test]
fn test_piston_pair_validates_clean() {
    let doc = RigDocument::new(piston_rig());
    let issues = doc.validate_hierarchy(&[], None);
    assert!(issues.iter().all(|i| i.subject != "01"), "{:?}", issues);
}

#[test]
fn test_missing_piston_half_is_one_issue() {
    let mut scene = piston_rig();
    scene.remove(&ObjectId::new("rod"));
    let doc = RigDocument::new(scene);

    let issues: Vec<_> = doc
        .validate_hierarchy(&[], None)
        .into_iter()
        .filter(|i| i.subject == "01")
        .collect();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].code, IssueCode::MissingPistonPartner);
}

#[test]
fn test_mirrored_piston_with_plain_partner_is_reported() {
    let scene = Scene::new()
        .with(SceneObject::empty("origin", "Origin"))
        .with(SceneObject::mesh("base", "Base"))
        .with(
            SceneObject::mesh("cyl", "CylMesh")
                .at(DVec3::new(1.0, 1.0, 0.0))
                .with_parent("base")
                .in_collection("Piston_01_Cyl_Mirrored")
                .mirrored(),
        )
        .with(
            SceneObject::mesh("rod", "RodMesh")
                .at(DVec3::new(0.0, 2.0, 0.0))
                .with_parent("base")
                .in_collection("Piston_01_Rod"),
        );
    let mut doc = RigDocument::new(scene);

    let summary = doc.build_rig(&[], Some(ObjectId::new("origin")), None).unwrap();
    let reported: Vec<_> = summary
        .issues
        .iter()
        .filter(|i| i.subject == "01")
        .collect();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].code, IssueCode::MissingPistonPartner);
    assert!(summary.synthesis.piston_links.is_empty());
    assert_eq!(summary.synthesis.unpaired_pistons, vec!["01".to_string()]);
}

#[test]
fn test_piston_tracks_reference_each_other() {
    let mut doc = RigDocument::new(piston_rig());
    let summary = doc.build_rig(&[], None, None).unwrap();
    assert_eq!(summary.synthesis.piston_links.len(), 1);

    let skeleton = doc.skeleton().unwrap();
    let target_of = |bone: &str| -> Vec<String> {
        skeleton
            .get(bone)
            .unwrap()
            .constraints
            .iter()
            .filter_map(|c| match &c.kind {
                ConstraintKind::DampedTrack { target, .. } => Some(target.clone()),
                _ => None,
            })
            .collect()
    };
    assert_eq!(target_of("Piston_01_Cyl"), vec!["Piston_01_Rod".to_string()]);
    assert_eq!(target_of("Piston_01_Rod"), vec!["Piston_01_Cyl".to_string()]);
    assert!(target_of("Base").is_empty());
}

#[test]
fn test_hinge_leaves_one_degree_of_freedom() {
    let scene = arm_chain().with(
        SceneObject::mesh("door", "Hinge_Door")
            .at(DVec3::new(1.0, 1.0, 0.0))
            .with_parent("lower"),
    );
    let mut doc = RigDocument::new(scene);
    doc.build_rig(&[], None, None).unwrap();
    let skeleton = doc.skeleton().unwrap();

    for bone in skeleton.bones() {
        let limits: Vec<_> = bone
            .constraints
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::LimitRotation { .. }))
            .collect();
        if bone.name == "Hinge_Door" {
            assert_eq!(limits.len(), 1);
            assert_eq!(limits[0].free_axes().len(), 1);
            assert_eq!(limits[0].locked_axes().len(), 2);
            assert!(bone.head.abs_diff_eq(DVec3::new(1.0, 1.0, 0.0), 1e-9));
        } else {
            assert!(limits.is_empty(), "unexpected limit on {}", bone.name);
        }
    }
}

// ============================================================================
// IK
// ============================================================================

#[test]
fn test_ik_chain_of_two_on_four_bones() {
    let mut doc = RigDocument::new(four_bone_chain());
    doc.set_ik("D", Some(IkChainSpec::enabled(2)));
    let summary = doc.build_rig(&[], None, None).unwrap();
    assert!(summary.synthesis.failures.is_empty());

    let skeleton = doc.skeleton().unwrap();
    assert_eq!(skeleton.len(), 6);
    let control = skeleton.get(&ik_control_name("D")).unwrap();
    let target = skeleton.get(&ik_target_name("D")).unwrap();
    assert_eq!(control.role, BoneRole::IkControl);
    assert!(!control.hidden);
    assert!(target.hidden);

    let chain: Vec<String> = skeleton
        .get("D")
        .unwrap()
        .constraints
        .iter()
        .find_map(|c| match &c.kind {
            ConstraintKind::Ik { chain, .. } => Some(chain.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(chain, vec!["C".to_string(), "B".to_string()]);
}

#[test]
fn test_invalid_chain_length_spares_other_bones() {
    let mut doc = RigDocument::new(four_bone_chain());
    doc.set_ik("B", Some(IkChainSpec::enabled(5)));
    doc.set_ik("D", Some(IkChainSpec::enabled(1)));
    let summary = doc.build_rig(&[], None, None).unwrap();

    assert_eq!(summary.synthesis.failures.len(), 1);
    assert_eq!(summary.synthesis.failures[0].code(), "RIG_003");
    assert_eq!(summary.synthesis.ik_chains, vec!["D".to_string()]);
    assert_eq!(doc.skeleton().unwrap().len(), 6);
}

// ============================================================================
// Bake
// ============================================================================

#[test]
fn test_mirrored_ik_controls_follow_owner_side() {
    let mut doc = RigDocument::new(mirrored_arm().with(SceneObject::mesh("body", "Body")));
    doc.scene.get_mut(&ObjectId::new("arm")).unwrap().parent = Some(ObjectId::new("body"));
    doc.set_ik("Arm_L", Some(IkChainSpec::enabled(1)));
    doc.build_rig(&[], Some(ObjectId::new("origin")), None).unwrap();
    doc.apply_controls(1.0).unwrap();

    let skeleton = doc.skeleton().unwrap();
    for name in [ik_control_name("Arm_L"), ik_target_name("Arm_L")] {
        assert_eq!(
            skeleton.get(&name).unwrap().collection,
            Some(BoneCollection::Left),
            "{}",
            name
        );
    }
    assert_eq!(
        skeleton.get("Body").unwrap().collection,
        Some(BoneCollection::Center)
    );
}

#[test]
fn test_bake_rigid_skin() {
    let mut doc = RigDocument::new(mirrored_arm().with(SceneObject::mesh("body", "Body")));
    doc.set_ik("Arm_L", Some(IkChainSpec::enabled(1)));
    doc.scene.get_mut(&ObjectId::new("arm")).unwrap().parent = Some(ObjectId::new("body"));
    doc.build_rig(&[], Some(ObjectId::new("origin")), None).unwrap();
    let baked = doc.bake().unwrap();

    assert_eq!(baked.skeleton.bones.len(), 3);
    assert_eq!(baked.mesh.vertex_count(), 24);
    for weights in &baked.mesh.weights {
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].weight, 1.0);
    }
    for name in ["Body", "Arm_L", "Arm_R"] {
        assert_eq!(baked.mesh.group_vertices(name).len(), 8, "{}", name);
    }
}
