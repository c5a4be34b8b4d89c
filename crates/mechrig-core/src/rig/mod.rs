//! Skeleton generation: validation, bone placement and the bone model.

mod builder;
mod skeleton;
mod validate;

pub use builder::{build, rebuild, RebuildStats};
pub use skeleton::{zero_roll_z, Bone, BoneRole, Skeleton};
pub use validate::{validate_graph, validate_hierarchy};
