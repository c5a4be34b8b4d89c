//! Scene generators.
//!
//! Every generated object is a plain mesh with the default cube geometry, so
//! each one becomes exactly one bone.

use glam::DVec3;
use mechrig_core::{ObjectId, RigDocument, RigResult, Scene, SceneObject};

/// Id of the origin empty added by [`mirrored_limbs`].
pub const ORIGIN_ID: &str = "origin";

/// Object id of part `index`.
pub fn part_id(index: usize) -> String {
    format!("part_{:02}", index)
}

/// Object (and bone) name of part `index`.
pub fn part_name(index: usize) -> String {
    format!("Part_{:02}", index)
}

/// Linear chain of `len` parts stacked along +Y.
pub fn chain(len: usize) -> Scene {
    let parents: Vec<Option<usize>> = (0..len).map(|i| i.checked_sub(1)).collect();
    tree(&parents)
}

/// Tree of parts where `parents[i]` picks the parent of part `i`.
///
/// Picks are reduced modulo `i`, so any input yields an acyclic hierarchy.
/// Part 0 is always a root.
pub fn tree(parents: &[Option<usize>]) -> Scene {
    let mut scene = Scene::new();
    for (i, pick) in parents.iter().enumerate() {
        let position = DVec3::new((i % 3) as f64 * 1.5, i as f64, (i % 2) as f64 * 0.5);
        let mut object = SceneObject::mesh(part_id(i), part_name(i)).at(position);
        if let Some(pick) = pick.filter(|_| i > 0) {
            object = object.with_parent(part_id(pick % i));
        }
        scene.insert(object);
    }
    scene
}

/// Name of the mirrored collection holding limb `index`.
pub fn limb_group(index: usize) -> String {
    format!("Limb{}_Mirrored", index)
}

/// Origin empty plus `offsets.len()` single-part mirrored limbs, each placed
/// at its offset and parented to a shared body.
pub fn mirrored_limbs(offsets: &[DVec3]) -> Scene {
    let mut scene = Scene::new()
        .with(SceneObject::empty(ORIGIN_ID, "Origin"))
        .with(SceneObject::mesh("body", "Body"));
    for (i, offset) in offsets.iter().enumerate() {
        scene.insert(
            SceneObject::mesh(format!("limb_{}", i), format!("Limb{}", i))
                .at(*offset)
                .with_parent("body")
                .in_collection(limb_group(i))
                .mirrored(),
        );
    }
    scene
}

/// Builds a document over the whole scene.
pub fn built(scene: Scene, origin: Option<&str>) -> RigResult<RigDocument> {
    let mut doc = RigDocument::new(scene);
    doc.build_rig(&[], origin.map(ObjectId::new), None)?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_is_acyclic() {
        let scene = tree(&[Some(5), Some(9), Some(1), None]);
        assert!(scene.get(&ObjectId::new("part_00")).unwrap().parent.is_none());
        assert_eq!(
            scene.get(&ObjectId::new("part_02")).unwrap().parent,
            Some(ObjectId::new("part_01"))
        );
        assert!(scene.get(&ObjectId::new("part_03")).unwrap().parent.is_none());
    }

    #[test]
    fn test_chain_builds() {
        let doc = built(chain(4), None).unwrap();
        assert_eq!(doc.skeleton().unwrap().len(), 4);
    }
}
