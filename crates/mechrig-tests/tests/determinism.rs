//! Fingerprint determinism across fresh documents and in-place rebuilds.

use glam::DVec3;
use pretty_assertions::assert_eq;

use mechrig_core::{skeleton_fingerprint, RigDocument};
use mechrig_tests::determinism::verify_build_determinism;
use mechrig_tests::fixtures;

#[test]
fn test_tree_build_is_deterministic() {
    let scene = fixtures::tree(&[None, Some(0), Some(0), Some(1), Some(3), Some(2)]);
    verify_build_determinism(&scene, None, 3)
        .unwrap()
        .assert_deterministic();
}

#[test]
fn test_mirrored_build_is_deterministic() {
    let scene = fixtures::mirrored_limbs(&[DVec3::new(1.0, 0.5, 0.0), DVec3::new(2.0, -1.0, 0.25)]);
    verify_build_determinism(&scene, Some(fixtures::ORIGIN_ID), 3)
        .unwrap()
        .assert_deterministic();
}

#[test]
fn test_reloaded_document_rebuilds_to_same_fingerprint() {
    let doc = fixtures::built(fixtures::chain(4), None).unwrap();
    let before = skeleton_fingerprint(doc.skeleton().unwrap()).unwrap();

    let mut reloaded = RigDocument::from_json(&doc.to_json().unwrap()).unwrap();
    reloaded.rebuild().unwrap();
    assert_eq!(
        skeleton_fingerprint(reloaded.skeleton().unwrap()).unwrap(),
        before
    );
}

#[test]
fn test_scene_edit_changes_fingerprint() {
    let mut doc = fixtures::built(fixtures::chain(3), None).unwrap();
    let before = skeleton_fingerprint(doc.skeleton().unwrap()).unwrap();

    doc.scene
        .get_mut(&mechrig_core::ObjectId::new(fixtures::part_id(2)))
        .unwrap()
        .transform
        .translation += DVec3::new(0.0, 0.0, 3.0);
    doc.rebuild().unwrap();
    assert_ne!(skeleton_fingerprint(doc.skeleton().unwrap()).unwrap(), before);
}
