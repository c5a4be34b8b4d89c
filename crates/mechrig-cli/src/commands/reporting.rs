use anyhow::{Context, Result};
use colored::Colorize;
use log::{debug, info};
use mechrig_core::{Issue, ObjectId, RigDocument, RigError, Severity};
use std::path::Path;

pub(crate) fn load_document(path: &str) -> Result<RigDocument> {
    let doc = RigDocument::load(Path::new(path))
        .with_context(|| format!("Failed to load rig document: {}", path))?;
    debug!("loaded {}: {} scene object(s)", path, doc.scene.len());
    Ok(doc)
}

/// Writes the document to `out`, or back to `doc_path` when no output is given.
pub(crate) fn save_document(doc: &RigDocument, doc_path: &str, out: Option<&str>) -> Result<String> {
    let target = out.unwrap_or(doc_path);
    doc.save(Path::new(target))
        .with_context(|| format!("Failed to write rig document: {}", target))?;
    info!("wrote {}", target);
    Ok(target.to_string())
}

/// Roots and origin for a run: explicit flags win over the document's last
/// selection.
pub(crate) fn selection(
    doc: &RigDocument,
    roots: &[String],
    origin: Option<&str>,
) -> (Vec<ObjectId>, Option<ObjectId>) {
    let roots = if roots.is_empty() {
        doc.roots.clone()
    } else {
        roots.iter().map(|r| ObjectId::new(r.as_str())).collect()
    };
    let origin = origin.map(ObjectId::new).or_else(|| doc.origin.clone());
    (roots, origin)
}

pub(crate) fn print_issues(issues: &[Issue]) {
    for issue in issues {
        let marker = match issue.severity {
            Severity::Blocking => "x".red().bold(),
            Severity::Error => "x".red(),
            Severity::Warning => "!".yellow(),
        };
        println!(
            "  {} {}: {} {}",
            marker,
            issue.code.to_string().dimmed(),
            issue.message,
            format!("({})", issue.subject).dimmed()
        );
    }
}

pub(crate) fn print_rig_error(err: &RigError) {
    println!("  {} {}: {}", "x".red(), err.code().dimmed(), err);
    if let RigError::ValidationFailed { issues } = err {
        print_issues(issues);
    }
}
