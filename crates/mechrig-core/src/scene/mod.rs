//! Scene model: the host boundary and the in-memory object hierarchy.
//!
//! The host editor owns the real scene. This module defines the read contract
//! the pipeline needs from it ([`SceneSource`]), a plain in-memory
//! implementation ([`Scene`]) used by documents and tests, and the analysed
//! tree the rest of the pipeline consumes ([`SceneGraph`]).

mod graph;
mod mesh;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::{RigError, RigResult};
use crate::math::{Aabb, Transform};

pub use graph::{Group, GroupParent, SceneGraph, SceneNode};
pub use mesh::MeshData;

/// Stable identifier of a scene object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What a scene object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Object with mesh geometry.
    #[default]
    Mesh,
    /// Transform-only object (pivots, the symmetric origin).
    Empty,
}

/// Snapshot of one host object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub kind: ObjectKind,
    /// World transform.
    #[serde(default)]
    pub transform: Transform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ObjectId>,
    /// Owning collection; objects without one form a group of their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Object-space bounding box.
    #[serde(default)]
    pub bounds: Aabb,
    /// Active mirror modifier.
    #[serde(default)]
    pub mirror: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<Arc<MeshData>>,
    /// Set on linked duplicates written back by the pipeline; never a source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_from: Option<ObjectId>,
}

impl SceneObject {
    /// Creates a mesh object with a unit cube for geometry.
    pub fn mesh(id: impl Into<String>, name: impl Into<String>) -> Self {
        let mesh = MeshData::cuboid(DVec3::splat(0.5));
        let bounds = mesh.bounds().unwrap_or_default();
        Self {
            id: ObjectId::new(id),
            name: name.into(),
            kind: ObjectKind::Mesh,
            transform: Transform::IDENTITY,
            parent: None,
            collection: None,
            bounds,
            mirror: false,
            mesh: Some(Arc::new(mesh)),
            linked_from: None,
        }
    }

    /// Creates a transform-only object.
    pub fn empty(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Empty,
            mesh: None,
            bounds: Aabb::from_half_extents(DVec3::splat(0.05)),
            ..Self::mesh(id, name)
        }
    }

    /// Places the object at a world position.
    pub fn at(mut self, position: DVec3) -> Self {
        self.transform.translation = position;
        self
    }

    pub fn with_rotation(mut self, rotation: DQuat) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(ObjectId::new(parent));
        self
    }

    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Marks the object as carrying an active mirror modifier.
    pub fn mirrored(mut self) -> Self {
        self.mirror = true;
        self
    }

    /// Replaces geometry; bounds follow the new mesh.
    pub fn with_mesh(mut self, mesh: Arc<MeshData>) -> Self {
        if let Some(bounds) = mesh.bounds() {
            self.bounds = bounds;
        }
        self.mesh = Some(mesh);
        self
    }

    pub fn with_bounds(mut self, bounds: Aabb) -> Self {
        self.bounds = bounds;
        self
    }
}

/// Read access to the host scene.
///
/// Everything the pipeline reads from the host goes through this trait; the
/// pipeline never mutates the source scene.
pub trait SceneSource {
    /// Identifiers of every object, in a stable order.
    fn object_ids(&self) -> Vec<ObjectId>;

    fn name(&self, id: &ObjectId) -> Option<String>;

    fn kind(&self, id: &ObjectId) -> Option<ObjectKind>;

    fn parent(&self, id: &ObjectId) -> Option<ObjectId>;

    fn collection(&self, id: &ObjectId) -> Option<String>;

    fn world_transform(&self, id: &ObjectId) -> Option<Transform>;

    fn bounds(&self, id: &ObjectId) -> Option<Aabb>;

    /// Whether the object carries an active mirror modifier.
    fn mirror_flag(&self, id: &ObjectId) -> bool;

    fn mesh(&self, id: &ObjectId) -> Option<Arc<MeshData>>;

    /// Source of a linked duplicate, if the object is one.
    fn linked_from(&self, id: &ObjectId) -> Option<ObjectId> {
        let _ = id;
        None
    }

    fn contains(&self, id: &ObjectId) -> bool {
        self.name(id).is_some()
    }

    /// Assembles a full snapshot of one object.
    fn snapshot(&self, id: &ObjectId) -> Option<SceneObject> {
        Some(SceneObject {
            id: id.clone(),
            name: self.name(id)?,
            kind: self.kind(id).unwrap_or_default(),
            transform: self.world_transform(id).unwrap_or_default(),
            parent: self.parent(id),
            collection: self.collection(id),
            bounds: self.bounds(id).unwrap_or_default(),
            mirror: self.mirror_flag(id),
            mesh: self.mesh(id),
            linked_from: self.linked_from(id),
        })
    }
}

/// In-memory scene keyed by object id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    objects: BTreeMap<ObjectId, SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an object.
    pub fn insert(&mut self, object: SceneObject) {
        self.objects.insert(object.id.clone(), object);
    }

    /// Builder-style [`Scene::insert`].
    pub fn with(mut self, object: SceneObject) -> Self {
        self.insert(object);
        self
    }

    pub fn get(&self, id: &ObjectId) -> Option<&SceneObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id)
    }

    /// Looks up an object, failing with [`RigError::UnknownObject`].
    pub fn require(&self, id: &ObjectId) -> RigResult<&SceneObject> {
        self.get(id).ok_or_else(|| RigError::UnknownObject {
            id: id.to_string(),
        })
    }

    pub fn remove(&mut self, id: &ObjectId) -> Option<SceneObject> {
        self.objects.remove(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl SceneSource for Scene {
    fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.keys().cloned().collect()
    }

    fn name(&self, id: &ObjectId) -> Option<String> {
        self.get(id).map(|o| o.name.clone())
    }

    fn kind(&self, id: &ObjectId) -> Option<ObjectKind> {
        self.get(id).map(|o| o.kind)
    }

    fn parent(&self, id: &ObjectId) -> Option<ObjectId> {
        self.get(id).and_then(|o| o.parent.clone())
    }

    fn collection(&self, id: &ObjectId) -> Option<String> {
        self.get(id).and_then(|o| o.collection.clone())
    }

    fn world_transform(&self, id: &ObjectId) -> Option<Transform> {
        self.get(id).map(|o| o.transform)
    }

    fn bounds(&self, id: &ObjectId) -> Option<Aabb> {
        self.get(id).map(|o| o.bounds)
    }

    fn mirror_flag(&self, id: &ObjectId) -> bool {
        self.get(id).is_some_and(|o| o.mirror)
    }

    fn mesh(&self, id: &ObjectId) -> Option<Arc<MeshData>> {
        self.get(id).and_then(|o| o.mesh.clone())
    }

    fn linked_from(&self, id: &ObjectId) -> Option<ObjectId> {
        self.get(id).and_then(|o| o.linked_from.clone())
    }

    fn snapshot(&self, id: &ObjectId) -> Option<SceneObject> {
        self.get(id).cloned()
    }
}
