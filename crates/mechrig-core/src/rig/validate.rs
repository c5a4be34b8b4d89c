//! Pre-build hierarchy validation.
//!
//! Validation never mutates anything and never stops at the first problem:
//! every finding is returned as an [`Issue`].

use std::collections::BTreeMap;

use log::debug;

use crate::config::{RigConfig, Side};
use crate::error::{Issue, IssueCode, RigError};
use crate::naming::SemanticTag;
use crate::scene::{Group, ObjectId, SceneGraph, SceneSource};

/// Enumerates every hierarchy issue for the given selection.
///
/// `origin` is the symmetric origin object, if any; it is excluded from the
/// selection.
pub fn validate_hierarchy<S: SceneSource + ?Sized>(
    source: &S,
    roots: &[ObjectId],
    origin: Option<&ObjectId>,
    config: &RigConfig,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    let mut known_roots = Vec::new();
    for root in roots {
        if source.contains(root) {
            known_roots.push(root.clone());
        } else {
            issues.push(Issue::new(
                IssueCode::UnknownRoot,
                format!("root object '{}' does not exist", root),
                root.as_str(),
            ));
        }
    }
    if !roots.is_empty() && known_roots.is_empty() {
        return issues;
    }

    let exclude: Vec<ObjectId> = origin.into_iter().cloned().collect();
    let graph = match SceneGraph::from_source(source, &known_roots, &exclude) {
        Ok(graph) => graph,
        Err(RigError::Cycle { objects }) => {
            issues.push(Issue::new(
                IssueCode::Cycle,
                format!("parent cycle through {}", objects.join(" -> ")),
                objects.first().cloned().unwrap_or_default(),
            ));
            return issues;
        }
        Err(other) => {
            debug!("validate: scene graph failed: {}", other);
            return issues;
        }
    };

    let origin_missing = match origin {
        None => Some("no symmetric origin was supplied".to_string()),
        Some(id) if !source.contains(id) => {
            Some(format!("symmetric origin '{}' does not exist", id))
        }
        Some(_) => None,
    };
    issues.extend(validate_graph(&graph, origin_missing.as_deref(), config));
    issues
}

/// Checks an already built graph.
///
/// `origin_missing` carries the reason when no usable origin is available.
pub fn validate_graph(
    graph: &SceneGraph,
    origin_missing: Option<&str>,
    config: &RigConfig,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    if let Some(reason) = origin_missing {
        for group in graph.groups().filter(|g| g.is_mirrored()) {
            issues.push(Issue::new(
                IssueCode::MissingOrigin,
                format!("mirrored group '{}' needs an origin: {}", group.name, reason),
                group.name.as_str(),
            ));
        }
    }

    issues.extend(duplicate_names(graph, config));
    issues.extend(piston_pairs(graph));

    for group in graph.groups() {
        if group.class.kind.is_hinge() && !has_hinge_member(graph, group) {
            issues.push(Issue::new(
                IssueCode::OrphanHinge,
                format!(
                    "hinge group '{}' has no Hinge_ pivot object; its centroid is used",
                    group.name
                ),
                group.name.as_str(),
            ));
        }
        if let Some(parent) = graph.group_parent(&group.name) {
            if !parent.conflicts.is_empty() {
                let others: Vec<&str> = parent
                    .conflicts
                    .iter()
                    .map(|c| c.as_deref().unwrap_or("<root>"))
                    .collect();
                issues.push(Issue::new(
                    IssueCode::IncoherentGroup,
                    format!(
                        "members of '{}' sit under different groups; using '{}' over {}",
                        group.name,
                        parent.parent.as_deref().unwrap_or("<root>"),
                        others.join(", ")
                    ),
                    group.name.as_str(),
                ));
            }
        }
    }

    debug!("validate: {} issue(s)", issues.len());
    issues
}

fn has_hinge_member(graph: &SceneGraph, group: &Group) -> bool {
    group
        .members
        .iter()
        .filter_map(|m| graph.node(m))
        .any(|n| n.tag.is_hinge())
}

/// Bone names that two groups would both produce at the same depth.
fn duplicate_names(graph: &SceneGraph, config: &RigConfig) -> Vec<Issue> {
    let mut producers: BTreeMap<(String, usize), Vec<&str>> = BTreeMap::new();
    for group in graph.groups() {
        let depth = graph.group_depth(&group.name);
        let names = if group.is_mirrored() {
            vec![
                config.side_name(&group.class.base_name, Side::Left),
                config.side_name(&group.class.base_name, Side::Right),
            ]
        } else {
            vec![group.class.base_name.clone()]
        };
        for name in names {
            producers.entry((name, depth)).or_default().push(&group.name);
        }
    }

    producers
        .into_iter()
        .filter(|(_, groups)| groups.len() > 1)
        .map(|((name, depth), groups)| {
            Issue::new(
                IssueCode::DuplicateGroupName,
                format!(
                    "groups {} all produce bone '{}' at depth {}",
                    groups.join(", "),
                    name,
                    depth
                ),
                name,
            )
        })
        .collect()
}

/// Piston tag of a group: its own name first, then its members' names.
fn group_piston_tag(graph: &SceneGraph, group: &Group) -> Option<SemanticTag> {
    if group.class.kind.is_piston() {
        return Some(group.class.kind.clone());
    }
    group
        .members
        .iter()
        .filter_map(|m| graph.node(m))
        .map(|n| &n.tag)
        .find(|t| t.is_piston())
        .cloned()
}

/// Cylinder and rod group names on one side of a piston.
type PistonParts<'a> = (Vec<&'a str>, Vec<&'a str>);

/// Sides a group's bones will carry: both for a mirrored group, none otherwise.
fn group_sides(group: &Group) -> &'static [Option<Side>] {
    if group.is_mirrored() {
        &[Some(Side::Left), Some(Side::Right)]
    } else {
        &[None]
    }
}

fn side_label(side: Option<Side>) -> &'static str {
    match side {
        Some(Side::Left) => "left",
        Some(Side::Right) => "right",
        None => "unsided",
    }
}

/// Pistons pair per side, as constraint synthesis links them. A mirrored part
/// never pairs with a plain one.
fn piston_pairs(graph: &SceneGraph) -> Vec<Issue> {
    let mut parts: BTreeMap<String, BTreeMap<Option<Side>, PistonParts<'_>>> = BTreeMap::new();
    for group in graph.groups() {
        let (id, cylinder) = match group_piston_tag(graph, group) {
            Some(SemanticTag::PistonCylinder { id }) => (id, true),
            Some(SemanticTag::PistonRod { id }) => (id, false),
            _ => continue,
        };
        let per_side = parts.entry(id).or_default();
        for side in group_sides(group) {
            let slot = per_side.entry(*side).or_default();
            if cylinder {
                slot.0.push(&group.name);
            } else {
                slot.1.push(&group.name);
            }
        }
    }

    let mut issues = Vec::new();
    for (id, per_side) in parts {
        let crowded = per_side
            .values()
            .map(|(c, r)| (c.len(), r.len()))
            .find(|&(c, r)| c > 1 || r > 1);
        if let Some((c, r)) = crowded {
            issues.push(Issue::new(
                IssueCode::DuplicatePistonPart,
                format!(
                    "piston '{}' has {} cylinder(s) and {} rod(s) on one side; expected one of each",
                    id, c, r
                ),
                id,
            ));
            continue;
        }

        let unpaired: Vec<String> = per_side
            .iter()
            .filter_map(|(side, (cylinders, rods))| match (cylinders.first(), rods.first()) {
                (Some(c), None) => Some(format!("{} cylinder {} has no rod", side_label(*side), c)),
                (None, Some(r)) => Some(format!("{} rod {} has no cylinder", side_label(*side), r)),
                _ => None,
            })
            .collect();
        if !unpaired.is_empty() {
            issues.push(Issue::new(
                IssueCode::MissingPistonPartner,
                format!("piston '{}': {}", id, unpaired.join("; ")),
                id,
            ));
        }
    }
    issues
}
