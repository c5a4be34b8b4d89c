//! Analysed object hierarchy with group membership and semantic tags.
//!
//! Groups are defined by collection membership alone. The bone hierarchy is
//! derived by walking each object up to its nearest ancestor in a different
//! group; same-group ancestors collapse into the same bone.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::{RigError, RigResult};
use crate::naming::{classify, classify_group, classify_object, GroupClass, SemanticTag};

use super::{ObjectId, SceneObject, SceneSource};

/// One object in the analysed tree.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub object: SceneObject,
    pub tag: SemanticTag,
    /// Name of the owning group.
    pub group: String,
    pub children: Vec<ObjectId>,
    /// Distance from the selection root.
    pub depth: usize,
}

/// Named aggregation of objects that maps to one bone (or one per side).
#[derive(Debug, Clone)]
pub struct Group {
    pub name: String,
    /// Member object ids, sorted.
    pub members: Vec<ObjectId>,
    pub class: GroupClass,
    /// True when the group stands in for an object without a collection.
    pub implicit: bool,
}

impl Group {
    /// Whether the group expands into left/right sides.
    pub fn is_mirrored(&self) -> bool {
        self.class.mirrored
    }

    /// Tag of the group itself, as produced by the naming parser.
    pub fn tag(&self) -> SemanticTag {
        classify(&self.name)
    }
}

/// Parent-group resolution for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParent {
    /// Chosen parent group, `None` for root groups.
    pub parent: Option<String>,
    /// Other parent groups proposed by members in different branches.
    pub conflicts: Vec<Option<String>>,
}

/// In-memory tree built from a [`SceneSource`].
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: BTreeMap<ObjectId, SceneNode>,
    roots: Vec<ObjectId>,
    groups: BTreeMap<String, Group>,
    parents: BTreeMap<String, GroupParent>,
}

impl SceneGraph {
    /// Builds the graph for `roots` and their descendants.
    ///
    /// An empty `roots` slice selects every object. Objects listed in
    /// `exclude` (the symmetric origin) and linked duplicates are left out.
    ///
    /// # Errors
    /// * [`RigError::Cycle`] if any parent chain loops.
    /// * [`RigError::UnknownObject`] if a root does not exist.
    pub fn from_source<S: SceneSource + ?Sized>(
        source: &S,
        roots: &[ObjectId],
        exclude: &[ObjectId],
    ) -> RigResult<Self> {
        let all_ids = source.object_ids();
        detect_cycle(source, &all_ids)?;

        for root in roots {
            if !source.contains(root) {
                return Err(RigError::UnknownObject {
                    id: root.to_string(),
                });
            }
        }

        let excluded: BTreeSet<&ObjectId> = exclude.iter().collect();
        let mut children_of: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
        for id in &all_ids {
            if let Some(parent) = source.parent(id) {
                children_of.entry(parent).or_default().push(id.clone());
            }
        }

        // Selection: requested roots plus descendants.
        let mut selected: BTreeSet<ObjectId> = BTreeSet::new();
        let mut stack: Vec<ObjectId> = if roots.is_empty() {
            all_ids.clone()
        } else {
            roots.to_vec()
        };
        while let Some(id) = stack.pop() {
            if excluded.contains(&id) || source.linked_from(&id).is_some() {
                continue;
            }
            if selected.insert(id.clone()) {
                if let Some(kids) = children_of.get(&id) {
                    stack.extend(kids.iter().cloned());
                }
            }
        }

        let mut nodes = BTreeMap::new();
        for id in &selected {
            let Some(object) = source.snapshot(id) else {
                continue;
            };
            let tag = classify_object(object.id.as_str(), &object.name);
            let group = object
                .collection
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(object.name.trim())
                .to_string();
            nodes.insert(
                id.clone(),
                SceneNode {
                    object,
                    tag,
                    group,
                    children: Vec::new(),
                    depth: 0,
                },
            );
        }

        let mut graph_roots = Vec::new();
        let ids: Vec<ObjectId> = nodes.keys().cloned().collect();
        for id in &ids {
            let parent = nodes[id]
                .object
                .parent
                .clone()
                .filter(|p| nodes.contains_key(p));
            match parent {
                Some(p) => {
                    if let Some(node) = nodes.get_mut(&p) {
                        node.children.push(id.clone());
                    }
                }
                None => graph_roots.push(id.clone()),
            }
        }

        // Depths, breadth first from the roots.
        let mut queue: Vec<(ObjectId, usize)> =
            graph_roots.iter().map(|r| (r.clone(), 0)).collect();
        while let Some((id, depth)) = queue.pop() {
            if let Some(node) = nodes.get_mut(&id) {
                node.depth = depth;
                queue.extend(node.children.iter().map(|c| (c.clone(), depth + 1)));
            }
        }

        let mut groups: BTreeMap<String, Group> = BTreeMap::new();
        for (id, node) in &nodes {
            let group = groups.entry(node.group.clone()).or_insert_with(|| Group {
                name: node.group.clone(),
                members: Vec::new(),
                class: classify_group(&node.group),
                implicit: true,
            });
            group.members.push(id.clone());
            if node.object.collection.is_some() {
                group.implicit = false;
            }
        }

        let mut graph = Self {
            nodes,
            roots: graph_roots,
            groups,
            parents: BTreeMap::new(),
        };
        graph.parents = graph.resolve_group_parents();

        debug!(
            "scene graph: {} objects, {} roots, {} groups",
            graph.nodes.len(),
            graph.roots.len(),
            graph.groups.len()
        );
        Ok(graph)
    }

    /// Root objects of the selection.
    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    /// Direct children of an object.
    pub fn children(&self, of: &ObjectId) -> &[ObjectId] {
        self.nodes
            .get(of)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn node(&self, id: &ObjectId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn object(&self, id: &ObjectId) -> Option<&SceneObject> {
        self.nodes.get(id).map(|n| &n.object)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.values()
    }

    /// Group an object belongs to.
    pub fn group_of(&self, object: &ObjectId) -> Option<&Group> {
        self.nodes
            .get(object)
            .and_then(|n| self.groups.get(&n.group))
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Groups in name order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Tag for a group name or object id; other strings are classified as-is.
    pub fn tag(&self, name_or_group: &str) -> SemanticTag {
        if let Some(group) = self.groups.get(name_or_group) {
            return group.tag();
        }
        if let Some(node) = self.nodes.get(&ObjectId::from(name_or_group)) {
            return node.tag.clone();
        }
        classify(name_or_group)
    }

    /// Parent-group resolution for a group.
    pub fn group_parent(&self, group: &str) -> Option<&GroupParent> {
        self.parents.get(group)
    }

    /// Smallest member depth of a group.
    pub fn group_min_depth(&self, group: &str) -> usize {
        self.groups
            .get(group)
            .and_then(|g| g.members.iter().filter_map(|m| self.nodes.get(m)).map(|n| n.depth).min())
            .unwrap_or(0)
    }

    /// Bone depth of a group: number of parent-group edges to a root group.
    pub fn group_depth(&self, group: &str) -> usize {
        let mut depth = 0;
        let mut current = group.to_string();
        while let Some(parent) = self.parents.get(&current).and_then(|p| p.parent.clone()) {
            depth += 1;
            current = parent;
            if depth > self.groups.len() {
                break;
            }
        }
        depth
    }

    /// Group names ordered so every parent precedes its children.
    pub fn groups_topological(&self) -> Vec<&Group> {
        let mut ordered: Vec<&Group> = self.groups.values().collect();
        ordered.sort_by(|a, b| {
            self.group_min_depth(&a.name)
                .cmp(&self.group_min_depth(&b.name))
                .then_with(|| a.name.cmp(&b.name))
        });
        ordered
    }

    /// Nearest ancestor of `id` belonging to a different group.
    fn nearest_foreign_group(&self, id: &ObjectId) -> Option<String> {
        let own = &self.nodes.get(id)?.group;
        let mut current = self.nodes.get(id)?.object.parent.clone();
        while let Some(pid) = current {
            let node = self.nodes.get(&pid)?;
            if &node.group != own {
                return Some(node.group.clone());
            }
            current = node.object.parent.clone();
        }
        None
    }

    fn resolve_group_parents(&self) -> BTreeMap<String, GroupParent> {
        let mut parents = BTreeMap::new();
        for group in self.groups.values() {
            let mut members: Vec<&SceneNode> = group
                .members
                .iter()
                .filter_map(|m| self.nodes.get(m))
                .collect();
            // Shallowest member decides; ties by id.
            members.sort_by(|a, b| {
                a.depth
                    .cmp(&b.depth)
                    .then_with(|| a.object.id.cmp(&b.object.id))
            });
            let mut candidates: Vec<Option<String>> = Vec::new();
            for member in &members {
                let candidate = self.nearest_foreign_group(&member.object.id);
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
            let parent = candidates.first().cloned().flatten();
            let conflicts = candidates.into_iter().skip(1).collect();
            parents.insert(group.name.clone(), GroupParent { parent, conflicts });
        }
        parents
    }
}

/// Walks every parent chain; fails on the first loop found.
fn detect_cycle<S: SceneSource + ?Sized>(source: &S, ids: &[ObjectId]) -> RigResult<()> {
    let mut finished: BTreeSet<ObjectId> = BTreeSet::new();
    for start in ids {
        if finished.contains(start) {
            continue;
        }
        let mut path: Vec<ObjectId> = Vec::new();
        let mut on_path: BTreeSet<ObjectId> = BTreeSet::new();
        let mut current = Some(start.clone());
        while let Some(id) = current {
            if finished.contains(&id) || !source.contains(&id) {
                break;
            }
            if !on_path.insert(id.clone()) {
                let from = path.iter().position(|p| p == &id).unwrap_or(0);
                let mut objects: Vec<String> = path[from..].iter().map(ToString::to_string).collect();
                objects.push(id.to_string());
                return Err(RigError::Cycle { objects });
            }
            path.push(id.clone());
            current = source.parent(&id);
        }
        finished.extend(path);
    }
    Ok(())
}
