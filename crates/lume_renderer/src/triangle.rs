//! Triangle primitives for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.
//! Triangles are single-sided: a ray travelling along the face normal
//! passes through without a hit.

use std::sync::Arc;

use crate::{
    gen_f32,
    object::{Intersection, Object},
    Bvh, Material,
};
use lume_core::{AccelSettings, Mesh};
use lume_math::{Bounds3, Ray, Vec3};
use rand::RngCore;

/// Determinant threshold below which a ray counts as parallel to the plane.
const PARALLEL_EPSILON: f32 = 1e-8;

/// A triangle primitive.
pub struct Triangle {
    /// Vertices
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Edges from v0
    e1: Vec3,
    e2: Vec3,
    /// Pre-computed face normal (unit length, counter-clockwise winding)
    normal: Vec3,
    area: f32,
    material: Arc<Material>,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: Arc<Material>) -> Self {
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let cross = e1.cross(e2);

        Self {
            v0,
            v1,
            v2,
            e1,
            e2,
            normal: cross.normalize_or_zero(),
            area: 0.5 * cross.length(),
            material,
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }
}

impl Object for Triangle {
    fn bounds(&self) -> Bounds3 {
        Bounds3::from_points(self.v0, self.v1).union_point(self.v2)
    }

    fn hit(&self, ray: &Ray) -> Option<(f32, usize)> {
        if ray.direction().dot(self.normal) > 0.0 {
            return None;
        }

        let pvec = ray.direction().cross(self.e2);
        let det = self.e1.dot(pvec);

        // Ray is parallel to triangle
        if det.abs() < PARALLEL_EPSILON {
            return None;
        }

        let det_inv = 1.0 / det;
        let tvec = ray.origin() - self.v0;
        let u = tvec.dot(pvec) * det_inv;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(self.e1);
        let v = ray.direction().dot(qvec) * det_inv;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = self.e2.dot(qvec) * det_inv;
        if !ray.range.surrounds(t) {
            return None;
        }
        Some((t, 0))
    }

    fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        let Some((t, index)) = self.hit(ray) else {
            return Intersection::miss();
        };

        Intersection {
            happened: true,
            coords: ray.at(t),
            normal: self.normal,
            distance: t,
            emit: self.material.emission,
            material: Some(&self.material),
            primitive: Some(index),
        }
    }

    fn area(&self) -> f32 {
        self.area
    }

    fn has_emit(&self) -> bool {
        self.material.has_emission()
    }

    /// Uniform point on the triangle, `pdf = 1 / area`.
    fn sample(&self, rng: &mut dyn RngCore) -> (Intersection<'_>, f32) {
        let x = gen_f32(rng).sqrt();
        let y = gen_f32(rng);
        let coords = self.v0 * (1.0 - x) + self.v1 * (x * (1.0 - y)) + self.v2 * (x * y);

        let sample = Intersection {
            happened: true,
            coords,
            normal: self.normal,
            distance: 0.0,
            emit: self.material.emission,
            material: Some(&self.material),
            primitive: Some(0),
        };
        let pdf = if self.area > 0.0 { 1.0 / self.area } else { 0.0 };
        (sample, pdf)
    }
}

/// A triangle mesh object with its own BVH over its triangles.
///
/// All triangles share one material. Surface sampling picks a triangle
/// proportionally to its area, so the whole mesh is sampled uniformly.
pub struct MeshTriangle {
    bvh: Bvh<Triangle>,
    bounds: Bounds3,
    area: f32,
    material: Arc<Material>,
}

impl MeshTriangle {
    /// Build a mesh object with the default BVH settings.
    pub fn new(mesh: &Mesh, material: Arc<Material>) -> Self {
        Self::with_accel(mesh, material, AccelSettings::default())
    }

    /// Build a mesh object, choosing how its internal BVH is built.
    ///
    /// Zero-area triangles are dropped.
    pub fn with_accel(mesh: &Mesh, material: Arc<Material>, accel: AccelSettings) -> Self {
        let triangles: Vec<Triangle> = mesh
            .extract_triangle_vertices()
            .into_iter()
            .map(|[v0, v1, v2]| Triangle::new(v0, v1, v2, material.clone()))
            .filter(|tri| tri.area() > 0.0)
            .collect();

        let dropped = mesh.triangle_count() - triangles.len();
        if dropped > 0 {
            log::debug!("MeshTriangle: dropped {} degenerate triangles", dropped);
        }

        let area = triangles.iter().map(Object::area).sum();
        let bounds = triangles
            .iter()
            .fold(Bounds3::EMPTY, |acc, tri| acc.union(&tri.bounds()));
        let bvh = Bvh::build(triangles, accel.max_prims_in_node, accel.split_method);

        Self {
            bvh,
            bounds,
            area,
            material,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.bvh.primitives().len()
    }
}

impl Object for MeshTriangle {
    fn bounds(&self) -> Bounds3 {
        self.bounds
    }

    fn hit(&self, ray: &Ray) -> Option<(f32, usize)> {
        self.bvh.hit(ray)
    }

    fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        self.bvh.intersect(ray)
    }

    fn area(&self) -> f32 {
        self.area
    }

    fn has_emit(&self) -> bool {
        self.material.has_emission()
    }

    fn sample(&self, rng: &mut dyn RngCore) -> (Intersection<'_>, f32) {
        self.bvh
            .sample(rng)
            .unwrap_or((Intersection::miss(), 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn grey() -> Arc<Material> {
        Arc::new(Material::diffuse(Color::splat(0.5)))
    }

    /// Triangle in the z = -1 plane facing +Z (towards the origin).
    fn facing_origin() -> Triangle {
        Triangle::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(0.0, 1.0, -1.0),
            grey(),
        )
    }

    #[test]
    fn test_triangle_hit() {
        let tri = facing_origin();

        // Ray pointing at triangle center
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let hit = tri.intersect(&ray);

        assert!(hit.happened);
        assert!((hit.distance - 1.0).abs() < 0.001);
        assert_eq!(hit.normal, Vec3::Z);
        assert_eq!(hit.coords, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_triangle_miss() {
        let tri = facing_origin();

        // Ray pointing away
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        assert!(!tri.intersect(&ray).happened);

        // Ray passing beside it
        let ray = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(tri.hit(&ray).is_none());
    }

    #[test]
    fn test_triangle_is_single_sided() {
        let tri = facing_origin();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        assert!(tri.hit(&ray).is_none());
    }

    #[test]
    fn test_triangle_area_and_bounds() {
        let tri = facing_origin();
        assert!((tri.area() - 2.0).abs() < 1e-6);
        assert_eq!(tri.bounds().p_min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(tri.bounds().p_max, Vec3::new(1.0, 1.0, -1.0));
    }

    #[test]
    fn test_triangle_samples_lie_inside() {
        let tri = facing_origin();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let (s, pdf) = tri.sample(&mut rng);
            assert!((s.coords.z + 1.0).abs() < 1e-6);
            assert!((pdf - 0.5).abs() < 1e-6);

            // The point lies inside iff a ray fired at it from the front hits it
            let ray = Ray::new(Vec3::new(s.coords.x, s.coords.y, 1.0), Vec3::NEG_Z);
            let grown = Triangle::new(
                Vec3::new(-1.01, -1.01, -1.0),
                Vec3::new(1.01, -1.01, -1.0),
                Vec3::new(0.0, 1.02, -1.0),
                grey(),
            );
            assert!(grown.hit(&ray).is_some());
        }
    }

    fn unit_box_floor() -> Mesh {
        let mut mesh = Mesh::quad(
            [
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
            ],
            Vec3::Y,
        );
        mesh.append(&Mesh::quad(
            [
                Vec3::new(-1.0, 2.0, -1.0),
                Vec3::new(1.0, 2.0, -1.0),
                Vec3::new(1.0, 2.0, 1.0),
                Vec3::new(-1.0, 2.0, 1.0),
            ],
            Vec3::NEG_Y,
        ));
        mesh
    }

    #[test]
    fn test_mesh_triangle_intersect() {
        let mesh = MeshTriangle::new(&unit_box_floor(), grey());
        assert_eq!(mesh.triangle_count(), 4);
        assert!((mesh.area() - 8.0).abs() < 1e-5);

        // From between the plates, looking down, hits the floor
        let ray = Ray::new(Vec3::new(0.3, 1.0, 0.2), Vec3::NEG_Y);
        let hit = mesh.intersect(&ray);
        assert!(hit.happened);
        assert!((hit.distance - 1.0).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::Y);

        // Looking up hits the ceiling
        let ray = Ray::new(Vec3::new(0.3, 1.0, 0.2), Vec3::Y);
        let (t, _) = mesh.hit(&ray).unwrap();
        assert!((t - 1.0).abs() < 1e-5);

        // From above, the ceiling's back face is invisible and the floor is hit
        let ray = Ray::new(Vec3::new(0.3, 5.0, 0.2), Vec3::NEG_Y);
        let (t, _) = mesh.hit(&ray).unwrap();
        assert!((t - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_mesh_triangle_sampling_covers_all_faces() {
        let light = Arc::new(Material::diffuse(Color::ZERO).with_emission(Color::splat(4.0)));
        let mesh = MeshTriangle::new(&unit_box_floor(), light);
        assert!(mesh.has_emit());

        let mut rng = StdRng::seed_from_u64(5);
        let mut upper = 0;
        let n = 2000;
        for _ in 0..n {
            let (s, pdf) = mesh.sample(&mut rng);
            assert!(s.happened);
            assert_eq!(s.emit, Color::splat(4.0));
            assert!((pdf - 1.0 / 8.0).abs() < 1e-5);
            if s.coords.y > 1.0 {
                upper += 1;
            }
        }
        // Both plates have equal area
        let fraction = upper as f32 / n as f32;
        assert!((fraction - 0.5).abs() < 0.05, "fraction = {fraction}");
    }

    #[test]
    fn test_mesh_triangle_drops_degenerate_faces() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(2.0, 0.0, 0.0)];
        // Second triangle is collinear
        let mesh = Mesh::new(positions, vec![0, 1, 2, 0, 1, 3]);
        let object = MeshTriangle::new(&mesh, grey());
        assert_eq!(object.triangle_count(), 1);
    }

    #[test]
    fn test_empty_mesh_never_hits() {
        let object = MeshTriangle::new(&Mesh::default(), grey());
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(!object.intersect(&ray).happened);
        assert_eq!(object.sample(&mut StdRng::seed_from_u64(0)).1, 0.0);
    }
}
