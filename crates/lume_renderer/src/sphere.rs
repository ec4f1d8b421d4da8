//! Sphere primitive for ray tracing.

use std::f32::consts::PI;
use std::sync::Arc;

use crate::{
    gen_f32,
    object::{Intersection, Object},
    Material,
};
use lume_math::{Bounds3, Ray, Vec3};
use rand::RngCore;

/// A sphere primitive.
pub struct Sphere {
    center: Vec3,
    radius: f32,
    radius2: f32,
    area: f32,
    material: Arc<Material>,
    bounds: Bounds3,
}

impl Sphere {
    /// Create a new sphere.
    pub fn new(center: Vec3, radius: f32, material: Arc<Material>) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);

        Self {
            center,
            radius,
            radius2: radius * radius,
            area: 4.0 * PI * radius * radius,
            material,
            bounds: Bounds3::from_points(center - rvec, center + rvec),
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }
}

impl Object for Sphere {
    fn bounds(&self) -> Bounds3 {
        self.bounds
    }

    fn hit(&self, ray: &Ray) -> Option<(f32, usize)> {
        let oc = self.center - ray.origin();
        let a = ray.direction().length_squared();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius2;

        let discriminant = h * h - a * c;
        if a == 0.0 || discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Find the nearest root in the acceptable range
        let mut root = (h - sqrtd) / a;
        if !ray.range.surrounds(root) {
            root = (h + sqrtd) / a;
            if !ray.range.surrounds(root) {
                return None;
            }
        }
        Some((root, 0))
    }

    fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        let Some((t, index)) = self.hit(ray) else {
            return Intersection::miss();
        };

        let coords = ray.at(t);
        Intersection {
            happened: true,
            coords,
            normal: (coords - self.center).normalize_or_zero(),
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

    /// Uniform point on the sphere surface, `pdf = 1 / area`.
    fn sample(&self, rng: &mut dyn RngCore) -> (Intersection<'_>, f32) {
        let z = 1.0 - 2.0 * gen_f32(rng);
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = 2.0 * PI * gen_f32(rng);
        let dir = Vec3::new(r * phi.cos(), r * phi.sin(), z);

        let sample = Intersection {
            happened: true,
            coords: self.center + self.radius * dir,
            normal: dir,
            distance: 0.0,
            emit: self.material.emission,
            material: Some(&self.material),
            primitive: Some(0),
        };
        let pdf = if self.area > 0.0 { 1.0 / self.area } else { 0.0 };
        (sample, pdf)
    }
}
