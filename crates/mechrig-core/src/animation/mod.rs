//! Actions and pose evaluation.

mod action;
mod pose;

pub use action::{Action, Channel, Keyframe};
pub use pose::PoseEvaluator;
