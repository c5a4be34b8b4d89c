//! Validate command implementation
//!
//! Enumerates hierarchy issues without modifying the document.

use anyhow::Result;
use colored::Colorize;
use mechrig_core::Issue;
use std::process::ExitCode;

use super::json_output::{error_codes, JsonError, JsonOutput, ValidateResult};
use super::reporting;

/// Run the validate command
///
/// # Arguments
/// * `doc_path` - Path to the rig document
/// * `roots` - Root object ids (empty: the document's last selection)
/// * `origin` - Symmetric origin object id
/// * `json_output` - Whether to output machine-readable JSON
///
/// # Returns
/// Exit code: 0 if nothing blocks a build, 1 otherwise
pub fn run(doc_path: &str, roots: &[String], origin: Option<&str>, json_output: bool) -> Result<ExitCode> {
    let doc = match reporting::load_document(doc_path) {
        Ok(doc) => doc,
        Err(e) if json_output => {
            JsonOutput::<ValidateResult>::failure(
                "validate",
                vec![JsonError::new(error_codes::DOCUMENT_READ, format!("{:#}", e))],
            )
            .print()?;
            return Ok(ExitCode::from(1));
        }
        Err(e) => return Err(e),
    };

    let (roots, origin) = reporting::selection(&doc, roots, origin);
    let issues = doc.validate_hierarchy(&roots, origin.as_ref());
    let blocking = issues.iter().filter(|i| i.is_blocking()).count();

    if json_output {
        let result = ValidateResult {
            blocking,
            total: issues.len(),
        };
        let output = JsonOutput::success("validate", result).with_issues(issues);
        JsonOutput {
            success: blocking == 0,
            ..output
        }
        .print()?;
    } else {
        println!("{} {}", "Validating:".cyan().bold(), doc_path);
        print_summary(&issues, blocking);
    }

    Ok(if blocking == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_summary(issues: &[Issue], blocking: usize) {
    if issues.is_empty() {
        println!("\n{} No issues found", "SUCCESS".green().bold());
        return;
    }
    reporting::print_issues(issues);
    if blocking == 0 {
        println!(
            "\n{} {} issue(s), none blocking",
            "OK".yellow().bold(),
            issues.len()
        );
    } else {
        println!(
            "\n{} {} blocking issue(s) of {}",
            "FAILED".red().bold(),
            blocking,
            issues.len()
        );
    }
}
