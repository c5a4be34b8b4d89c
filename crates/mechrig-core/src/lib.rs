//! MechRig Rig Synthesis Library
//!
//! Turns an artist-organized hierarchy of rigid mesh parts into a bone-driven
//! rig: a skeleton mirroring the object hierarchy, constraints inferred from
//! naming conventions, optional left/right symmetry, control widgets, and a
//! bake producing one rigidly skinned mesh plus an export skeleton.
//!
//! # Overview
//!
//! The pipeline runs leaf-first and is re-entrant:
//!
//! 1. [`naming`] classifies object and collection names.
//! 2. [`scene`] builds the object/group graph from a [`SceneSource`].
//! 3. [`mirror`] expands `_Mirrored` groups into left and right sides.
//! 4. [`rig`] places bones and validates the hierarchy.
//! 5. [`constraints`] adds hinge limits, piston tracks and IK chains.
//! 6. [`controls`] maintains widget proxies.
//! 7. [`bake`] produces the combined mesh and bakes actions.
//!
//! [`RigDocument`] ties the stages together and holds everything that must
//! persist between runs.
//!
//! # Example
//!
//! ```
//! use glam::DVec3;
//! use mechrig_core::{RigDocument, Scene, SceneObject};
//!
//! let scene = Scene::new()
//!     .with(SceneObject::empty("origin", "Origin"))
//!     .with(SceneObject::mesh("body", "Body"))
//!     .with(
//!         SceneObject::mesh("arm", "Arm")
//!             .at(DVec3::new(1.0, 0.0, 0.0))
//!             .with_parent("body")
//!             .in_collection("Arm_Mirrored")
//!             .mirrored(),
//!     );
//!
//! let mut doc = RigDocument::new(scene);
//! doc.build_rig(&[], Some("origin".into()), None).unwrap();
//!
//! let skeleton = doc.skeleton().unwrap();
//! assert!(skeleton.contains("Arm_L"));
//! assert!(skeleton.contains("Arm_R"));
//!
//! let baked = doc.bake().unwrap();
//! assert_eq!(baked.skeleton.bones.len(), 3);
//! ```
//!
//! # Modules
//!
//! - [`animation`]: Actions and pose evaluation
//! - [`bake`]: Rigid-skin bake and animation baking
//! - [`config`]: Pipeline configuration
//! - [`constraints`]: Constraint synthesis
//! - [`controls`]: Widgets, bone collections and widget edit sessions
//! - [`document`]: The persistent rig document
//! - [`error`]: Fatal errors and validation issues
//! - [`hash`]: Canonical skeleton fingerprints
//! - [`math`]: Transforms, bounds and mirror math
//! - [`mirror`]: Mirror resolution and linked duplicates
//! - [`naming`]: Naming convention parser
//! - [`rig`]: Skeleton, rig builder and hierarchy validation
//! - [`scene`]: Host scene boundary and scene graph

pub mod animation;
pub mod bake;
pub mod config;
pub mod constraints;
pub mod controls;
pub mod document;
pub mod error;
pub mod hash;
pub mod math;
pub mod mirror;
pub mod naming;
pub mod rig;
pub mod scene;

// Re-export commonly used types at the crate root
pub use animation::{Action, Channel, Keyframe, PoseEvaluator};
pub use bake::{bake, bake_animations, BakeResult, CombinedMesh, ExportSkeleton, VertexWeight};
pub use config::{RigConfig, Side};
pub use constraints::{
    synthesize, Constraint, ConstraintKind, IkChainSpec, PistonLink, SynthesisReport,
};
pub use controls::{ControlRig, ProxyHandle, WidgetConfig, WidgetShape};
pub use document::{BoneSettings, BuildSummary, RigDocument};
pub use error::{Issue, IssueCode, RigError, RigResult, Severity};
pub use hash::skeleton_fingerprint;
pub use math::{Aabb, Axis, Transform};
pub use mirror::{MirrorOrigin, MirrorResolver};
pub use naming::{classify, SemanticTag};
pub use rig::{validate_hierarchy, Bone, BoneRole, Skeleton};
pub use scene::{MeshData, ObjectId, Scene, SceneGraph, SceneObject, SceneSource};
