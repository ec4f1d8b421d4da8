//! Object trait and Intersection record for ray-primitive queries.

use std::sync::Arc;

use crate::Material;
use lume_math::{Bounds3, Ray, Vec3};
use rand::RngCore;

/// Record of a ray-object intersection.
///
/// A miss has `happened == false` and an infinite `distance`, so comparing
/// distances alone always prefers a real hit.
#[derive(Debug, Clone, Copy)]
pub struct Intersection<'a> {
    /// Whether anything was hit
    pub happened: bool,
    /// Point of intersection
    pub coords: Vec3,
    /// Geometric surface normal at the hit point (unit length)
    pub normal: Vec3,
    /// Ray parameter of the hit
    pub distance: f32,
    /// Radiance emitted by the hit surface
    pub emit: Vec3,
    /// Material at the intersection point
    pub material: Option<&'a Material>,
    /// Index of the hit primitive inside the structure that answered the query
    pub primitive: Option<usize>,
}

impl<'a> Intersection<'a> {
    /// The "no hit" record.
    pub const fn miss() -> Self {
        Self {
            happened: false,
            coords: Vec3::ZERO,
            normal: Vec3::ZERO,
            distance: f32::INFINITY,
            emit: Vec3::ZERO,
            material: None,
            primitive: None,
        }
    }

    /// True if the hit surface emits light.
    pub fn is_emissive(&self) -> bool {
        self.happened && self.material.is_some_and(Material::has_emission)
    }

    /// Keep whichever of the two records is closer; ties keep `self`.
    pub fn nearer(self, other: Intersection<'a>) -> Intersection<'a> {
        if self.distance <= other.distance {
            self
        } else {
            other
        }
    }
}

impl Default for Intersection<'_> {
    fn default() -> Self {
        Self::miss()
    }
}

/// Geometric primitive capability consumed by the BVH and the integrator.
pub trait Object: Send + Sync {
    /// Axis-aligned bounds of the object.
    fn bounds(&self) -> Bounds3;

    /// Cheap hit query: ray parameter and primitive index of the nearest hit
    /// inside the ray's window.
    fn hit(&self, ray: &Ray) -> Option<(f32, usize)>;

    /// Full intersection record for the nearest hit, or a miss.
    fn intersect(&self, ray: &Ray) -> Intersection<'_>;

    /// Total surface area.
    fn area(&self) -> f32;

    /// True if the surface emits light.
    fn has_emit(&self) -> bool;

    /// Sample a point uniformly by area on the surface.
    ///
    /// Returns the point (with normal and emission) and its area-measure pdf.
    fn sample(&self, rng: &mut dyn RngCore) -> (Intersection<'_>, f32);
}

impl<T: Object + ?Sized> Object for Arc<T> {
    fn bounds(&self) -> Bounds3 {
        (**self).bounds()
    }

    fn hit(&self, ray: &Ray) -> Option<(f32, usize)> {
        (**self).hit(ray)
    }

    fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        (**self).intersect(ray)
    }

    fn area(&self) -> f32 {
        (**self).area()
    }

    fn has_emit(&self) -> bool {
        (**self).has_emit()
    }

    fn sample(&self, rng: &mut dyn RngCore) -> (Intersection<'_>, f32) {
        (**self).sample(rng)
    }
}
