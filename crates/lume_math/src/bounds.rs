use crate::{Ray, Vec3};

/// Axis-aligned bounding box used by the BVH.
///
/// A box is defined by its two extreme corners. [`Bounds3::EMPTY`] has
/// `p_min = +inf` and `p_max = -inf`, which makes it the identity of
/// [`Bounds3::union`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bounds3 {
    pub p_min: Vec3,
    pub p_max: Vec3,
}

impl Bounds3 {
    /// The empty box (contains nothing).
    pub const EMPTY: Bounds3 = Bounds3 {
        p_min: Vec3::splat(f32::INFINITY),
        p_max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a box spanning two corner points given in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            p_min: a.min(b),
            p_max: a.max(b),
        }
    }

    /// Create a degenerate box containing a single point.
    pub fn from_point(p: Vec3) -> Self {
        Self { p_min: p, p_max: p }
    }

    /// Componentwise min/max of two boxes.
    pub fn union(&self, other: &Bounds3) -> Self {
        Self {
            p_min: self.p_min.min(other.p_min),
            p_max: self.p_max.max(other.p_max),
        }
    }

    /// Grow the box to contain a point.
    pub fn union_point(&self, p: Vec3) -> Self {
        Self {
            p_min: self.p_min.min(p),
            p_max: self.p_max.max(p),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.p_min.x > self.p_max.x || self.p_min.y > self.p_max.y || self.p_min.z > self.p_max.z
    }

    /// Vector from `p_min` to `p_max`.
    pub fn diagonal(&self) -> Vec3 {
        self.p_max - self.p_min
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        0.5 * self.p_min + 0.5 * self.p_max
    }

    /// Total area of the six faces; zero for an empty box.
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.diagonal();
        2.0 * (d.x * d.y + d.y * d.z + d.x * d.z)
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn max_extent(&self) -> usize {
        let d = self.diagonal();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Lower bound on one axis.
    #[inline]
    pub fn axis_min(&self, axis: usize) -> f32 {
        self.p_min[axis]
    }

    /// Upper bound on one axis.
    #[inline]
    pub fn axis_max(&self, axis: usize) -> f32 {
        self.p_max[axis]
    }

    /// Returns true if `p` lies inside the box (boundary included).
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.p_min).all() && p.cmple(self.p_max).all()
    }

    /// Slab test.
    ///
    /// `inv_dir` is the componentwise reciprocal of the ray direction and
    /// `dir_is_neg` flags the axes along which the ray travels towards
    /// negative coordinates, so the near plane of each slab is picked without
    /// branching on the sign. The hit is accepted when the entry/exit interval
    /// is non-empty, lies at or in front of the origin, and overlaps the
    /// ray's valid window.
    pub fn intersect_p(&self, ray: &Ray, inv_dir: Vec3, dir_is_neg: [bool; 3]) -> bool {
        if self.is_empty() {
            return false;
        }

        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        for axis in 0..3 {
            let (near, far) = if dir_is_neg[axis] {
                (self.p_max[axis], self.p_min[axis])
            } else {
                (self.p_min[axis], self.p_max[axis])
            };
            // f32::max/min drop the NaN produced by 0 * inf, so an axis the ray
            // runs parallel to and lies on the boundary of does not constrain.
            t_enter = t_enter.max((near - ray.origin[axis]) * inv_dir[axis]);
            t_exit = t_exit.min((far - ray.origin[axis]) * inv_dir[axis]);
        }

        t_enter <= t_exit && t_exit >= 0.0 && ray.range.overlaps(t_enter, t_exit)
    }
}

impl Default for Bounds3 {
    fn default() -> Self {
        Self::EMPTY
    }
}
