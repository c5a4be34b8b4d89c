//! Transform, bounding-box and axis helpers shared by every stage.

use glam::{DMat3, DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Tolerance used for degenerate-vector checks.
pub const EPSILON: f64 = 1e-9;

/// Cartesian axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index (0, 1, 2).
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Unit vector along this axis.
    pub fn unit(&self) -> DVec3 {
        match self {
            Axis::X => DVec3::X,
            Axis::Y => DVec3::Y,
            Axis::Z => DVec3::Z,
        }
    }
}

/// Decomposed affine transform.
///
/// Mirrored transforms keep a negative scale component instead of being
/// renormalised, so `to_matrix` round-trips reflections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    /// Creates a pure translation.
    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Sets the rotation.
    pub fn with_rotation(mut self, rotation: DQuat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets the scale.
    pub fn with_scale(mut self, scale: DVec3) -> Self {
        self.scale = scale;
        self
    }

    /// Converts to a 4x4 matrix.
    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Decomposes a matrix. Negative determinants put the sign on X scale.
    pub fn from_matrix(matrix: &DMat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }

    /// True when the transform contains a reflection.
    pub fn is_mirrored(&self) -> bool {
        self.scale.x * self.scale.y * self.scale.z < 0.0
    }

    /// Interpolates translation and scale linearly and rotation spherically.
    pub fn interpolate(&self, other: &Transform, t: f64) -> Transform {
        Transform {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }

    /// Approximate equality for tests and idempotence checks.
    pub fn abs_diff_eq(&self, other: &Transform, max_abs_diff: f64) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
            && (self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
                || self.rotation.abs_diff_eq(-other.rotation, max_abs_diff))
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::from_half_extents(DVec3::splat(0.5))
    }
}

impl Aabb {
    /// Creates a box from corners.
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Creates a box centred on the origin.
    pub fn from_half_extents(half: DVec3) -> Self {
        Self::new(-half, half)
    }

    /// Smallest box containing all points, or `None` for an empty slice.
    pub fn from_points(points: &[DVec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths along each axis.
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of this box after transformation.
    pub fn transformed(&self, matrix: &DMat4) -> Aabb {
        let corners = self.corners().map(|c| matrix.transform_point3(c));
        Aabb::from_points(&corners).unwrap_or(*self)
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Axis with the largest extent. Ties resolve to the earlier axis.
    pub fn dominant_axis(&self) -> Axis {
        let size = self.size();
        let mut best = Axis::X;
        for axis in [Axis::Y, Axis::Z] {
            if size[axis.index()] > size[best.index()] + EPSILON {
                best = axis;
            }
        }
        best
    }
}

/// Reflection through the plane of `origin` perpendicular to its local `axis`.
///
/// Returns the world-space matrix `O * S * O^-1` where `S` negates `axis`.
pub fn mirror_matrix(origin: &DMat4, axis: Axis) -> DMat4 {
    let mut flip = DVec3::ONE;
    flip[axis.index()] = -1.0;
    *origin * DMat4::from_scale(flip) * origin.inverse()
}

/// Reflects a world transform through the origin plane.
pub fn mirror_transform(transform: &Transform, origin: &DMat4, axis: Axis) -> Transform {
    Transform::from_matrix(&(mirror_matrix(origin, axis) * transform.to_matrix()))
}

/// Signed distance of `point` from the origin plane, measured along `axis`.
pub fn signed_offset(point: DVec3, origin: &DMat4, axis: Axis) -> f64 {
    origin.inverse().transform_point3(point)[axis.index()]
}

/// Rotation whose Y axis points along `y` and whose Z axis is `z`
/// (orthogonalised against `y`).
pub fn basis_from_y_z(y: DVec3, z: DVec3) -> DQuat {
    let y = y.normalize_or_zero();
    let mut z = (z - y * z.dot(y)).normalize_or_zero();
    if z == DVec3::ZERO {
        z = any_orthogonal(y);
    }
    let x = y.cross(z);
    DQuat::from_mat3(&DMat3::from_cols(x, y, z)).normalize()
}

/// A unit vector orthogonal to `v`.
pub fn any_orthogonal(v: DVec3) -> DVec3 {
    let reference = if v.z.abs() < 0.9 { DVec3::Z } else { DVec3::Y };
    (reference - v * reference.dot(v)).normalize_or_zero()
}

/// Signed angle from `a` to `b` about `axis` (all assumed unit length).
pub fn signed_angle(a: DVec3, b: DVec3, axis: DVec3) -> f64 {
    axis.dot(a.cross(b)).atan2(a.dot(b))
}

/// Rounds to a fixed grid so floating noise does not leak into hashes.
pub fn quantize(value: f64) -> f64 {
    const GRID: f64 = 1e9;
    let rounded = (value * GRID).round() / GRID;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
