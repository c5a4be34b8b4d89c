//! Triangle mesh buffers.

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};

use crate::math::Aabb;

/// Immutable triangle geometry.
///
/// Objects hold meshes behind `Arc` so a linked duplicate can share buffers
/// with its source while keeping its own transform.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    /// Vertex positions in object space.
    pub positions: Vec<DVec3>,
    /// Triangles as vertex index triples.
    pub triangles: Vec<[u32; 3]>,
}

impl MeshData {
    pub fn new(positions: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            positions,
            triangles,
        }
    }

    /// Axis-aligned box mesh centred on the origin.
    pub fn cuboid(half_extents: DVec3) -> Self {
        let h = half_extents;
        let positions = Aabb::from_half_extents(h).corners().to_vec();
        // Corner order follows Aabb::corners (bit 0 = x, bit 1 = y, bit 2 = z).
        let triangles = vec![
            [0, 2, 1],
            [1, 2, 3],
            [4, 5, 6],
            [5, 7, 6],
            [0, 1, 4],
            [1, 5, 4],
            [2, 6, 3],
            [3, 6, 7],
            [0, 4, 2],
            [2, 4, 6],
            [1, 3, 5],
            [3, 7, 5],
        ];
        Self::new(positions, triangles)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Object-space bounds, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(&self.positions)
    }

    /// Checks that every index is in range and every position is finite.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(i) = self.positions.iter().position(|p| !p.is_finite()) {
            return Err(format!("vertex {} has a non-finite position", i));
        }
        let count = self.positions.len() as u64;
        for (t, tri) in self.triangles.iter().enumerate() {
            if let Some(index) = tri.iter().find(|&&i| u64::from(i) >= count) {
                return Err(format!(
                    "triangle {} references vertex {} but the mesh has {} vertices",
                    t, index, count
                ));
            }
        }
        Ok(())
    }

    /// Copies the geometry into world space.
    ///
    /// Reflecting matrices reverse triangle winding so faces keep pointing
    /// outward.
    pub fn transformed(&self, matrix: &DMat4) -> MeshData {
        let positions = self
            .positions
            .iter()
            .map(|p| matrix.transform_point3(*p))
            .collect();
        let flip = matrix.determinant() < 0.0;
        let triangles = self
            .triangles
            .iter()
            .map(|&[a, b, c]| if flip { [a, c, b] } else { [a, b, c] })
            .collect();
        MeshData::new(positions, triangles)
    }
}
