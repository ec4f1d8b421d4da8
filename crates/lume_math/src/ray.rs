use crate::{Interval, Vec3};

/// A ray in 3D space with origin, direction and a valid parametric window.
///
/// The reciprocal of the direction is computed once at construction so the
/// slab test in [`crate::Bounds3::intersect_p`] only multiplies.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub direction_inv: Vec3,
    pub range: Interval,
}

impl Ray {
    /// Create a new ray valid on `[0, +inf)`.
    ///
    /// The direction is used as given; callers normalize it when distances
    /// along the ray must be metric.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            direction_inv: direction.recip(),
            range: Interval::FORWARD,
        }
    }

    /// Restrict the parametric window of the ray.
    pub fn with_range(mut self, range: Interval) -> Self {
        self.range = range;
        self
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Per-axis flags, true where the direction component is negative.
    ///
    /// Read from the reciprocal so that `-0.0` counts as negative.
    #[inline]
    pub fn dir_is_neg(&self) -> [bool; 3] {
        [
            self.direction_inv.x < 0.0,
            self.direction_inv.y < 0.0,
            self.direction_inv.z < 0.0,
        ]
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
