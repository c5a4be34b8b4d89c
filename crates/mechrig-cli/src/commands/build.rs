//! Build command implementation
//!
//! Builds or rebuilds the rig in a document and writes the document back.

use anyhow::Result;
use colored::Colorize;
use mechrig_core::{skeleton_fingerprint, BuildSummary, RigDocument};
use std::process::ExitCode;
use std::time::Instant;

use super::json_output::{error_codes, BuildResult, JsonError, JsonOutput};
use super::reporting;

/// Run the build command
///
/// # Arguments
/// * `doc_path` - Path to the rig document
/// * `roots` - Root object ids (empty: the document's last selection)
/// * `origin` - Symmetric origin object id
/// * `bone_scale` - Overrides the configured bone-size factor
/// * `out` - Output document path (default: overwrite `doc_path`)
/// * `json_output` - Whether to output machine-readable JSON
///
/// # Returns
/// Exit code: 0 if the rig was built, 1 otherwise
pub fn run(
    doc_path: &str,
    roots: &[String],
    origin: Option<&str>,
    bone_scale: Option<f64>,
    out: Option<&str>,
    json_output: bool,
) -> Result<ExitCode> {
    let start = Instant::now();
    let mut doc = match reporting::load_document(doc_path) {
        Ok(doc) => doc,
        Err(e) if json_output => {
            JsonOutput::<BuildResult>::failure(
                "build",
                vec![JsonError::new(error_codes::DOCUMENT_READ, format!("{:#}", e))],
            )
            .print()?;
            return Ok(ExitCode::from(1));
        }
        Err(e) => return Err(e),
    };

    if !json_output {
        println!("{} {}", "Building:".cyan().bold(), doc_path);
    }

    let (roots, origin) = reporting::selection(&doc, roots, origin);
    let summary = match doc.build_rig(&roots, origin, bone_scale) {
        Ok(summary) => summary,
        Err(err) => {
            if json_output {
                JsonOutput::<BuildResult>::failure("build", vec![JsonError::from(&err)]).print()?;
            } else {
                reporting::print_rig_error(&err);
                println!("\n{} Rig was not built", "FAILED".red().bold());
            }
            return Ok(ExitCode::from(1));
        }
    };

    let target = reporting::save_document(&doc, doc_path, out)?;
    let result = build_result(&doc, &summary)?;

    if json_output {
        JsonOutput::success("build", result)
            .with_issues(summary.issues)
            .print()?;
    } else {
        reporting::print_issues(&summary.issues);
        for failure in &summary.synthesis.failures {
            reporting::print_rig_error(failure);
        }
        for id in &summary.synthesis.unpaired_pistons {
            println!("  {} piston '{}' skipped", "!".yellow(), id);
        }
        println!(
            "{} {} bone(s): {} created, {} updated, {} removed",
            "Skeleton:".dimmed(),
            result.bones,
            result.created,
            result.updated,
            result.removed
        );
        println!(
            "{} {} hinge(s), {} piston link(s), {} IK chain(s)",
            "Constraints:".dimmed(),
            result.hinges.len(),
            result.piston_links.len(),
            result.ik_chains.len()
        );
        println!("{} {}", "Fingerprint:".dimmed(), &result.fingerprint[..16]);
        println!(
            "\n{} Wrote {} ({}ms)",
            "SUCCESS".green().bold(),
            target,
            start.elapsed().as_millis()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn build_result(doc: &RigDocument, summary: &BuildSummary) -> Result<BuildResult> {
    let skeleton = doc.skeleton()?;
    Ok(BuildResult {
        bones: summary.bones,
        created: summary.stats.created,
        updated: summary.stats.updated,
        removed: summary.stats.removed,
        duplicates: summary.duplicates,
        hinges: summary.synthesis.hinges.clone(),
        piston_links: summary
            .synthesis
            .piston_links
            .iter()
            .map(|l| format!("{} <-> {}", l.cylinder, l.rod))
            .collect(),
        ik_chains: summary.synthesis.ik_chains.clone(),
        failures: summary.synthesis.failures.iter().map(JsonError::from).collect(),
        fingerprint: skeleton_fingerprint(skeleton)?,
    })
}
