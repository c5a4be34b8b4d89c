//! Pose evaluation: forward kinematics plus constraint solving.
//!
//! Evaluation order for one sample: rotation limits on the local pose, forward
//! kinematics, IK chains (CCD), then damped tracks. Constraints are evaluated
//! in skeleton order.

use std::collections::BTreeMap;

use glam::{DMat4, DQuat, DVec3, EulerRot};

use crate::config::RigConfig;
use crate::constraints::{Constraint, ConstraintKind};
use crate::math::Transform;
use crate::rig::Skeleton;

/// Evaluates world-space bone matrices for a skeleton.
pub struct PoseEvaluator<'a> {
    skeleton: &'a Skeleton,
    iterations: u32,
    tolerance: f64,
    parents: Vec<Option<usize>>,
    rest_local: Vec<DMat4>,
}

impl<'a> PoseEvaluator<'a> {
    pub fn new(skeleton: &'a Skeleton, config: &RigConfig) -> Self {
        let bones = skeleton.bones();
        let parents: Vec<Option<usize>> = bones
            .iter()
            .map(|b| b.parent.as_deref().and_then(|p| skeleton.index_of(p)))
            .collect();
        let rest_local = bones
            .iter()
            .zip(&parents)
            .map(|(bone, parent)| match parent {
                Some(p) => bones[*p].rest_matrix().inverse() * bone.rest_matrix(),
                None => bone.rest_matrix(),
            })
            .collect();
        Self {
            skeleton,
            iterations: config.ik_iterations,
            tolerance: config.ik_tolerance,
            parents,
            rest_local,
        }
    }

    /// World matrices, indexed like [`Skeleton::bones`].
    ///
    /// `pose` maps bone names to rest-relative local transforms; bones not in
    /// the map stay at rest.
    pub fn evaluate(&self, pose: &BTreeMap<String, Transform>) -> Vec<DMat4> {
        let bones = self.skeleton.bones();
        let mut local: Vec<Transform> = bones
            .iter()
            .map(|b| pose.get(&b.name).copied().unwrap_or(Transform::IDENTITY))
            .collect();

        for (i, bone) in bones.iter().enumerate() {
            for constraint in &bone.constraints {
                if let ConstraintKind::LimitRotation { .. } = constraint.kind {
                    local[i] = limit_rotation(&local[i], constraint);
                }
            }
        }

        let mut world = self.forward(&local);

        for (i, bone) in bones.iter().enumerate() {
            for constraint in &bone.constraints {
                if let ConstraintKind::Ik { target, chain } = &constraint.kind {
                    self.solve_ik(i, target, chain, constraint.influence, &mut local, &mut world);
                }
            }
        }

        for (i, bone) in bones.iter().enumerate() {
            for constraint in &bone.constraints {
                if let ConstraintKind::DampedTrack { target, track_axis } = &constraint.kind {
                    let Some(t) = self.skeleton.index_of(target) else {
                        continue;
                    };
                    let head = world[i].w_axis.truncate();
                    let current = world[i].transform_vector3(track_axis.unit()).normalize_or_zero();
                    let wanted = (world[t].w_axis.truncate() - head).normalize_or_zero();
                    if current == DVec3::ZERO || wanted == DVec3::ZERO {
                        continue;
                    }
                    let delta = DQuat::IDENTITY
                        .slerp(DQuat::from_rotation_arc(current, wanted), constraint.influence);
                    local[i] = self.local_from_world(i, &rotate_about(&world[i], head, delta), &world);
                    world = self.forward(&local);
                }
            }
        }

        world
    }

    /// Rest-relative local transform of bone `i` given its world matrix.
    pub fn local_from_world(&self, i: usize, bone_world: &DMat4, world: &[DMat4]) -> Transform {
        let parent_world = self.parents[i].map_or(DMat4::IDENTITY, |p| world[p]);
        Transform::from_matrix(&(self.rest_local[i].inverse() * parent_world.inverse() * *bone_world))
    }

    fn forward(&self, local: &[Transform]) -> Vec<DMat4> {
        let mut world: Vec<DMat4> = Vec::with_capacity(local.len());
        for (i, pose) in local.iter().enumerate() {
            let parent_world = self.parents[i].map_or(DMat4::IDENTITY, |p| world[p]);
            world.push(parent_world * self.rest_local[i] * pose.to_matrix());
        }
        world
    }

    /// Cyclic coordinate descent over `chain`, reaching for the target's head
    /// with the owner's tail.
    fn solve_ik(
        &self,
        owner: usize,
        target: &str,
        chain: &[String],
        influence: f64,
        local: &mut Vec<Transform>,
        world: &mut Vec<DMat4>,
    ) {
        let Some(t) = self.skeleton.index_of(target) else {
            return;
        };
        let joints: Vec<usize> = chain
            .iter()
            .filter_map(|name| self.skeleton.index_of(name))
            .collect();
        if joints.is_empty() {
            return;
        }
        let length = self.skeleton.bones()[owner].length();
        let goal = world[t].w_axis.truncate();
        let original: Vec<Transform> = joints.iter().map(|&j| local[j]).collect();

        for _ in 0..self.iterations {
            let effector = world[owner].transform_point3(DVec3::Y * length);
            if effector.distance(goal) < self.tolerance {
                break;
            }
            for &j in &joints {
                let effector = world[owner].transform_point3(DVec3::Y * length);
                let pivot = world[j].w_axis.truncate();
                let from = (effector - pivot).normalize_or_zero();
                let to = (goal - pivot).normalize_or_zero();
                if from == DVec3::ZERO || to == DVec3::ZERO {
                    continue;
                }
                let delta = DQuat::from_rotation_arc(from, to);
                local[j] = self.local_from_world(j, &rotate_about(&world[j], pivot, delta), world);
                *world = self.forward(local);
            }
        }

        if influence < 1.0 {
            for (&j, before) in joints.iter().zip(&original) {
                local[j] = before.interpolate(&local[j], influence.clamp(0.0, 1.0));
            }
            *world = self.forward(local);
        }
    }
}

/// Zeroes the locked Euler components of a local rotation.
fn limit_rotation(pose: &Transform, constraint: &Constraint) -> Transform {
    let ConstraintKind::LimitRotation {
        lock_x,
        lock_y,
        lock_z,
    } = constraint.kind
    else {
        return *pose;
    };
    let (mut x, mut y, mut z) = pose.rotation.to_euler(EulerRot::XYZ);
    if lock_x {
        x = 0.0;
    }
    if lock_y {
        y = 0.0;
    }
    if lock_z {
        z = 0.0;
    }
    let limited = DQuat::from_euler(EulerRot::XYZ, x, y, z);
    Transform {
        rotation: pose.rotation.slerp(limited, constraint.influence),
        ..*pose
    }
}

/// Applies a world rotation about `pivot` to a world matrix.
fn rotate_about(matrix: &DMat4, pivot: DVec3, rotation: DQuat) -> DMat4 {
    DMat4::from_translation(pivot)
        * DMat4::from_quat(rotation)
        * DMat4::from_translation(-pivot)
        * *matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{hinge_limit, IkChainSpec};
    use crate::math::Axis;
    use crate::rig::Bone;

    fn matrices_close(a: &DMat4, b: &DMat4, tolerance: f64) -> bool {
        a.abs_diff_eq(*b, tolerance)
    }

    fn chain() -> Skeleton {
        let mut s = Skeleton::new("Rig");
        s.insert(Bone::new("Upper", DVec3::ZERO, DVec3::Z)).unwrap();
        s.insert(Bone::new("Lower", DVec3::Z, DVec3::Z * 2.0).with_parent("Upper"))
            .unwrap();
        s
    }

    #[test]
    fn test_rest_pose_reproduces_rest_matrices() {
        let s = chain();
        let world = PoseEvaluator::new(&s, &RigConfig::default()).evaluate(&BTreeMap::new());
        for (bone, m) in s.bones().iter().zip(&world) {
            assert!(matrices_close(m, &bone.rest_matrix(), 1e-9));
        }
    }

    #[test]
    fn test_fk_propagates_to_children() {
        let s = chain();
        let mut pose = BTreeMap::new();
        // Rotate the upper bone a quarter turn about its local X.
        pose.insert(
            "Upper".to_string(),
            Transform::IDENTITY.with_rotation(DQuat::from_rotation_x(std::f64::consts::FRAC_PI_2)),
        );
        let world = PoseEvaluator::new(&s, &RigConfig::default()).evaluate(&pose);
        let lower_head = world[1].w_axis.truncate();
        assert!((lower_head.length() - 1.0).abs() < 1e-9);
        assert!(lower_head.z.abs() < 1e-9);
    }

    #[test]
    fn test_limit_rotation_keeps_free_axis() {
        let mut s = chain();
        s.get_mut("Upper")
            .unwrap()
            .constraints
            .push(Constraint::generated("Hinge Limit", hinge_limit(Axis::Y)));
        let mut pose = BTreeMap::new();
        pose.insert(
            "Upper".to_string(),
            Transform::IDENTITY.with_rotation(DQuat::from_rotation_x(0.7)),
        );
        let world = PoseEvaluator::new(&s, &RigConfig::default()).evaluate(&pose);
        assert!(matrices_close(&world[0], &s.bones()[0].rest_matrix(), 1e-9));

        pose.insert(
            "Upper".to_string(),
            Transform::IDENTITY.with_rotation(DQuat::from_rotation_y(0.7)),
        );
        let world = PoseEvaluator::new(&s, &RigConfig::default()).evaluate(&pose);
        assert!(!matrices_close(&world[0], &s.bones()[0].rest_matrix(), 1e-6));
    }

    #[test]
    fn test_ik_reaches_target() {
        let mut s = chain();
        s.get_mut("Lower").unwrap().ik = Some(IkChainSpec::enabled(1));
        crate::constraints::synthesize(&mut s, &RigConfig::default());

        // Move the control sideways within reach of the chain.
        let control = s.get("Lower_IK").unwrap();
        let goal = DVec3::new(1.0, 0.0, 1.0).normalize() * 2.0;
        let offset = control.rest_matrix().inverse().transform_vector3(goal - control.head);
        let mut pose = BTreeMap::new();
        pose.insert("Lower_IK".to_string(), Transform::from_translation(offset));

        let config = RigConfig::default();
        let evaluator = PoseEvaluator::new(&s, &config);
        let world = evaluator.evaluate(&pose);
        let lower = s.index_of("Lower").unwrap();
        let tail = world[lower].transform_point3(DVec3::Y * s.bones()[lower].length());
        let target = world[s.index_of("Lower_IK_target").unwrap()].w_axis.truncate();
        assert!(target.abs_diff_eq(goal, 1e-9));
        // Only "Upper" rotates, so the goal sits on the sphere the tail sweeps.
        assert!(tail.distance(goal) < 1e-3, "tail {tail:?} goal {goal:?}");
    }

    #[test]
    fn test_damped_track_aims_at_target() {
        let mut s = Skeleton::new("Rig");
        s.insert(Bone::new("Cyl", DVec3::ZERO, DVec3::Y)).unwrap();
        s.insert(Bone::new("Rod", DVec3::new(2.0, 2.0, 0.0), DVec3::new(2.0, 3.0, 0.0)))
            .unwrap();
        s.get_mut("Cyl").unwrap().constraints.push(Constraint::generated(
            "Piston Track",
            ConstraintKind::DampedTrack {
                target: "Rod".into(),
                track_axis: Axis::Y,
            },
        ));
        let world = PoseEvaluator::new(&s, &RigConfig::default()).evaluate(&BTreeMap::new());
        let axis = world[0].transform_vector3(DVec3::Y).normalize();
        assert!(axis.abs_diff_eq(DVec3::new(1.0, 1.0, 0.0).normalize(), 1e-9));
    }
}
