/// Valid parametric window `[min, max]` of a ray.
///
/// Hits are accepted strictly inside the window; shadow rays shorten `max`
/// so the surface they aim at cannot occlude itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// The forward half-line `[0, +inf)`, the default window of a ray.
    pub const FORWARD: Interval = Interval {
        min: 0.0,
        max: f32::INFINITY,
    };

    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// True if `t` lies strictly inside the window.
    pub fn surrounds(&self, t: f32) -> bool {
        self.min < t && t < self.max
    }

    /// True if the closed span `[t0, t1]` shares a point with the window.
    pub fn overlaps(&self, t0: f32, t1: f32) -> bool {
        t0 <= self.max && self.min <= t1
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::FORWARD
    }
}
