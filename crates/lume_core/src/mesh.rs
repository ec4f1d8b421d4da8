//! Mesh geometry representation.
//!
//! A renderer-agnostic indexed triangle list. Scene setup code populates
//! it (procedurally or from an external loader) and the renderer turns it
//! into intersectable triangles.
//!
//! Winding is counter-clockwise: the face normal of `[v0, v1, v2]` is
//! `(v1 - v0) x (v2 - v0)`.

use lume_math::{Bounds3, Vec3};

/// A mesh consisting of vertex positions and triangle indices.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box
    pub bounds: Bounds3,
}

impl Mesh {
    /// Create a new mesh from positions and indices.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            indices,
            bounds,
        }
    }

    /// Build a planar quad `a, b, c, d` (given in order around its edge) as
    /// two triangles whose normals point into the hemisphere of `facing`.
    ///
    /// Winding of the input corners does not matter; it is flipped when the
    /// geometric normal disagrees with `facing`.
    pub fn quad(corners: [Vec3; 4], facing: Vec3) -> Self {
        let [a, b, c, d] = corners;
        let normal = (b - a).cross(c - a);
        let indices = if normal.dot(facing) >= 0.0 {
            vec![0, 1, 2, 0, 2, 3]
        } else {
            vec![0, 2, 1, 0, 3, 2]
        };
        Self::new(vec![a, b, c, d], indices)
    }

    /// Append the triangles of another mesh, re-basing its indices.
    pub fn append(&mut self, other: &Mesh) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.indices.extend(other.indices.iter().map(|i| i + base));
        self.bounds = self.bounds.union(&other.bounds);
    }

    fn compute_bounds(positions: &[Vec3]) -> Bounds3 {
        positions
            .iter()
            .fold(Bounds3::EMPTY, |bounds, p| bounds.union_point(*p))
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Total surface area of all triangles.
    pub fn area(&self) -> f32 {
        self.extract_triangle_vertices()
            .iter()
            .map(|[v0, v1, v2]| 0.5 * (*v1 - *v0).cross(*v2 - *v0).length())
            .sum()
    }

    /// Resolve the index list into `[v0, v1, v2]` corner triplets.
    ///
    /// A trailing partial triple is ignored; triangles referencing vertices
    /// past the end of `positions` are skipped with a warning.
    pub fn extract_triangle_vertices(&self) -> Vec<[Vec3; 3]> {
        self.indices
            .chunks_exact(3)
            .filter_map(|tri| {
                let corner = |i: u32| self.positions.get(i as usize).copied();
                match (corner(tri[0]), corner(tri[1]), corner(tri[2])) {
                    (Some(v0), Some(v1), Some(v2)) => Some([v0, v1, v2]),
                    _ => {
                        log::warn!(
                            "Skipping triangle {:?}: mesh has only {} vertices",
                            tri,
                            self.positions.len()
                        );
                        None
                    }
                }
            })
            .collect()
    }
}
