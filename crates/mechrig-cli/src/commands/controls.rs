//! Controls command implementation
//!
//! Creates or updates widget proxies for every bone of a built rig.

use anyhow::Result;
use colored::Colorize;
use std::process::ExitCode;

use super::json_output::{error_codes, ControlsResult, JsonError, JsonOutput};
use super::reporting;

/// Run the controls command
///
/// # Arguments
/// * `doc_path` - Path to the rig document
/// * `global_scale` - Widget size multiplier (default: the configured widget scale)
/// * `out` - Output document path (default: overwrite `doc_path`)
/// * `json_output` - Whether to output machine-readable JSON
pub fn run(
    doc_path: &str,
    global_scale: Option<f64>,
    out: Option<&str>,
    json_output: bool,
) -> Result<ExitCode> {
    let mut doc = match reporting::load_document(doc_path) {
        Ok(doc) => doc,
        Err(e) if json_output => {
            JsonOutput::<ControlsResult>::failure(
                "controls",
                vec![JsonError::new(error_codes::DOCUMENT_READ, format!("{:#}", e))],
            )
            .print()?;
            return Ok(ExitCode::from(1));
        }
        Err(e) => return Err(e),
    };

    let scale = global_scale.unwrap_or(doc.config.widget_scale);
    let summary = match doc.apply_controls(scale) {
        Ok(summary) => summary,
        Err(err) => {
            if json_output {
                JsonOutput::<ControlsResult>::failure("controls", vec![JsonError::from(&err)])
                    .print()?;
            } else {
                reporting::print_rig_error(&err);
            }
            return Ok(ExitCode::from(1));
        }
    };
    let target = reporting::save_document(&doc, doc_path, out)?;

    let result = ControlsResult {
        proxies: doc.controls.len(),
        created: summary.created,
        updated: summary.updated,
        removed: summary.removed,
    };
    if json_output {
        JsonOutput::success("controls", result).print()?;
    } else {
        println!(
            "{} {} proxy(ies) at scale {}: {} created, {} updated, {} removed",
            "Controls:".cyan().bold(),
            result.proxies,
            scale,
            result.created,
            result.updated,
            result.removed
        );
        println!("{} Wrote {}", "SUCCESS".green().bold(), target);
    }
    Ok(ExitCode::SUCCESS)
}
