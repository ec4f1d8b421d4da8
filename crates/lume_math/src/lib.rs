// Re-export glam for convenience
pub use glam::*;

// Lume math types
mod bounds;
pub mod frame;
mod interval;
mod ray;

pub use bounds::Bounds3;
pub use interval::Interval;
pub use ray::Ray;
