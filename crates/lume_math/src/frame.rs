//! Local shading frames.
//!
//! Directions sampled around a normal are generated in a local frame where
//! the normal is `+Z` and then rotated into world space.

use crate::Vec3;

/// Build two unit tangents `(b, c)` such that `(b, c, n)` is orthonormal.
///
/// The construction drops whichever of `n.x`/`n.y` is smaller in magnitude,
/// which keeps the normalization away from zero for any unit `n`.
pub fn tangents(n: Vec3) -> (Vec3, Vec3) {
    let c = if n.x.abs() > n.y.abs() {
        let inv_len = 1.0 / (n.x * n.x + n.z * n.z).sqrt();
        Vec3::new(n.z * inv_len, 0.0, -n.x * inv_len)
    } else {
        let inv_len = 1.0 / (n.y * n.y + n.z * n.z).sqrt();
        Vec3::new(0.0, n.z * inv_len, -n.y * inv_len)
    };
    let b = c.cross(n);
    (b, c)
}

/// Rotate a direction expressed in the local frame of `n` into world space.
pub fn to_world(local: Vec3, n: Vec3) -> Vec3 {
    let (b, c) = tangents(n);
    local.x * b + local.y * c + local.z * n
}
