//! CLI command implementations

pub mod bake;
pub mod build;
pub mod controls;
pub mod validate;

mod json_output;
mod reporting;
