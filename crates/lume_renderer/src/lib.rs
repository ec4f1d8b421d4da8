//! Lume Renderer - CPU Path Tracing
//!
//! A Monte Carlo path tracer with next-event light sampling and
//! Russian-roulette termination over a BVH-accelerated scene.
//!
//! Randomness is always passed in explicitly as `&mut dyn RngCore`, so a
//! render is reproducible from its seed no matter how it is scheduled.

mod bucket;
mod bvh;
mod camera;
mod material;
mod object;
mod renderer;
mod scene;
mod sphere;
mod triangle;

pub use bucket::{
    generate_buckets, render_bucket, render_parallel, Bucket, BucketResult, DEFAULT_BUCKET_SIZE,
};
pub use bvh::Bvh;
pub use camera::Camera;
pub use material::{fresnel, reflect, refract, Color, Material, MaterialKind};
pub use object::{Intersection, Object};
pub use renderer::{
    clamp_01, color_to_rgba, linear_to_gamma, pixel_rng, render, render_pixel, ImageBuffer,
};
pub use scene::{LightSample, Scene, SceneError};
pub use sphere::Sphere;
pub use triangle::{MeshTriangle, Triangle};

/// Re-export Vec3 and common math types from lume_math
pub use lume_math::{Bounds3, Interval, Ray, Vec3};

use rand::{Rng, RngCore};

/// Uniform random float in `[0, 1)`.
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}
