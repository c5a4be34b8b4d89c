//! Bake command implementation
//!
//! Bakes the rig into a combined mesh and export skeleton, optionally
//! re-sampling actions, and writes the export to a JSON file.

use anyhow::{Context, Result};
use colored::Colorize;
use mechrig_core::{Action, BakeResult, RigDocument, RigError};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

use super::json_output::{error_codes, BakeSummary, JsonError, JsonOutput};
use super::reporting;

/// Contents of the export file.
#[derive(Debug, Serialize)]
struct Export<'a> {
    #[serde(flatten)]
    bake: &'a BakeResult,
    actions: &'a [Action],
}

/// Run the bake command
///
/// # Arguments
/// * `doc_path` - Path to the rig document; it is updated with the bake
/// * `actions_path` - JSON file holding an array of actions to bake
/// * `out` - Export file path for the combined mesh, skeleton and actions
/// * `json_output` - Whether to output machine-readable JSON
pub fn run(
    doc_path: &str,
    actions_path: Option<&str>,
    out: Option<&str>,
    json_output: bool,
) -> Result<ExitCode> {
    let fail = |errors: Vec<JsonError>| -> Result<ExitCode> {
        if json_output {
            JsonOutput::<BakeSummary>::failure("bake", errors).print()?;
        } else {
            for error in &errors {
                println!("  {} {}: {}", "x".red(), error.code.dimmed(), error.message);
            }
            println!("\n{} Bake failed", "FAILED".red().bold());
        }
        Ok(ExitCode::from(1))
    };

    let mut doc = match reporting::load_document(doc_path) {
        Ok(doc) => doc,
        Err(e) if json_output => {
            return fail(vec![JsonError::new(
                error_codes::DOCUMENT_READ,
                format!("{:#}", e),
            )]);
        }
        Err(e) => return Err(e),
    };

    let actions = match actions_path.map(load_actions).transpose() {
        Ok(actions) => actions.unwrap_or_default(),
        Err(e) => {
            return fail(vec![JsonError::new(
                error_codes::ACTIONS_READ,
                format!("{:#}", e),
            )])
        }
    };

    if !json_output {
        println!("{} {}", "Baking:".cyan().bold(), doc_path);
    }

    let baked_actions = match bake_all(&mut doc, &actions) {
        Ok(baked) => baked,
        Err(err) => return fail(vec![JsonError::from(&err)]),
    };
    let Some(result) = doc.last_bake.as_ref() else {
        return fail(vec![JsonError::from(&RigError::NoSkeleton)]);
    };

    if let Some(path) = out {
        let export = Export {
            bake: result,
            actions: &baked_actions,
        };
        let written = serde_json::to_string_pretty(&export)
            .map_err(anyhow::Error::from)
            .and_then(|json| {
                fs::write(path, json).with_context(|| format!("Failed to write export: {}", path))
            });
        if let Err(e) = written {
            return fail(vec![JsonError::new(
                error_codes::EXPORT_WRITE,
                format!("{:#}", e),
            )]);
        }
    }

    let summary = BakeSummary {
        vertices: result.mesh.vertex_count(),
        triangles: result.mesh.triangle_count(),
        bones: result.skeleton.bones.len(),
        actions: baked_actions.len(),
        export: out.map(str::to_string),
    };
    let target = reporting::save_document(&doc, doc_path, None)?;

    if json_output {
        JsonOutput::success("bake", summary).print()?;
    } else {
        println!(
            "{} {} vertices, {} triangles, {} bone(s)",
            "Mesh:".dimmed(),
            summary.vertices,
            summary.triangles,
            summary.bones
        );
        if !actions.is_empty() {
            println!("{} {} action(s) baked", "Actions:".dimmed(), summary.actions);
        }
        if let Some(export) = &summary.export {
            println!("{} {}", "Export:".dimmed(), export);
        }
        println!("\n{} Updated {}", "SUCCESS".green().bold(), target);
    }
    Ok(ExitCode::SUCCESS)
}

/// Mesh bake, then animation bake. The previous bake output is restored if
/// the animation bake fails.
fn bake_all(doc: &mut RigDocument, actions: &[Action]) -> Result<Vec<Action>, RigError> {
    let previous = doc.last_bake.clone();
    doc.bake()?;
    match doc.bake_animations(actions) {
        Ok(baked) => Ok(baked),
        Err(err) => {
            doc.last_bake = previous;
            Err(err)
        }
    }
}

fn load_actions(path: &str) -> Result<Vec<Action>> {
    let text = fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read actions file: {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse actions file: {}", path))
}
