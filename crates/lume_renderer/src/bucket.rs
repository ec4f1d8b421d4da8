//! Bucket-based tile rendering.
//!
//! Divides the image into tiles (buckets) that are rendered independently
//! and in parallel using rayon.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::renderer::{pixel_rng, render_pixel};
use crate::{Camera, Color, ImageBuffer, Scene, SceneError};
use lume_core::RenderSettings;

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// X coordinate of bucket's top-left corner
    pub x: u32,
    /// Y coordinate of bucket's top-left corner
    pub y: u32,
    /// Width of the bucket in pixels
    pub width: u32,
    /// Height of the bucket in pixels
    pub height: u32,
    /// Index of this bucket in the render order
    pub index: usize,
}

impl Bucket {
    /// Create a new bucket.
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    /// Get the total number of pixels in this bucket.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

/// Default bucket size in pixels.
pub const DEFAULT_BUCKET_SIZE: u32 = 64;

/// Generate buckets for an image, sorted in spiral order from center.
///
/// Buckets are rendered from the center outward, so the middle of the
/// frame finishes first.
pub fn generate_buckets(width: u32, height: u32, bucket_size: u32) -> Vec<Bucket> {
    let bucket_size = bucket_size.max(1);
    let mut buckets = Vec::new();

    // Generate grid of buckets
    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let bw = bucket_size.min(width - x);
            let bh = bucket_size.min(height - y);
            buckets.push(Bucket::new(x, y, bw, bh, buckets.len()));
            x += bucket_size;
        }
        y += bucket_size;
    }

    sort_spiral(&mut buckets, width, height);

    // Update indices after sorting
    for (i, bucket) in buckets.iter_mut().enumerate() {
        bucket.index = i;
    }

    buckets
}

/// Sort buckets by distance from image center. The sort is stable, so
/// equidistant buckets keep row-major order.
fn sort_spiral(buckets: &mut [Bucket], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let distance = |b: &Bucket| {
        let dx = b.x as f32 + b.width as f32 / 2.0 - center_x;
        let dy = b.y as f32 + b.height as f32 / 2.0 - center_y;
        dx * dx + dy * dy
    };

    buckets.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}

/// Result of rendering a bucket.
#[derive(Debug, Clone)]
pub struct BucketResult {
    /// The bucket that was rendered
    pub bucket: Bucket,
    /// Pixel colors in row-major order
    pub pixels: Vec<Color>,
}

impl BucketResult {
    /// Create a new bucket result.
    pub fn new(bucket: Bucket, pixels: Vec<Color>) -> Self {
        Self { bucket, pixels }
    }

    /// Copy the pixels into their place in `image`.
    pub fn write_into(&self, image: &mut ImageBuffer) {
        let b = &self.bucket;
        for local_y in 0..b.height {
            for local_x in 0..b.width {
                let color = self.pixels[(local_y * b.width + local_x) as usize];
                image.set(b.x + local_x, b.y + local_y, color);
            }
        }
    }
}

/// Render a single bucket.
///
/// Every pixel draws from its own [`pixel_rng`] stream.
pub fn render_bucket(
    bucket: &Bucket,
    scene: &Scene,
    camera: &Camera,
    settings: &RenderSettings,
) -> BucketResult {
    let mut pixels = Vec::with_capacity(bucket.pixel_count() as usize);

    for local_y in 0..bucket.height {
        for local_x in 0..bucket.width {
            let x = bucket.x + local_x;
            let y = bucket.y + local_y;
            let mut rng = pixel_rng(settings.seed, x, y, camera.image_width);
            pixels.push(render_pixel(
                scene,
                camera,
                x,
                y,
                settings.samples_per_pixel,
                &mut rng,
            ));
        }
    }

    BucketResult::new(*bucket, pixels)
}

/// Render the image with buckets spread over the rayon thread pool.
pub fn render_parallel(
    scene: &Scene,
    camera: &Camera,
    settings: &RenderSettings,
) -> Result<ImageBuffer, SceneError> {
    scene.check_ready()?;

    let start = Instant::now();
    let buckets = generate_buckets(camera.image_width, camera.image_height, settings.bucket_size);
    let total = buckets.len();
    let done = AtomicUsize::new(0);
    log::info!(
        "Rendering {}x{} at {} spp in {} buckets on {} threads",
        camera.image_width,
        camera.image_height,
        settings.samples_per_pixel,
        total,
        rayon::current_num_threads()
    );

    let results: Vec<BucketResult> = buckets
        .par_iter()
        .map(|bucket| {
            let result = render_bucket(bucket, scene, camera, settings);
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            log::debug!(
                "Bucket {} done ({}/{}, {:.1}%)",
                bucket.index,
                finished,
                total,
                100.0 * finished as f32 / total as f32
            );
            result
        })
        .collect();

    let mut image = ImageBuffer::new(camera.image_width, camera.image_height);
    for result in &results {
        result.write_into(&mut image);
    }

    log::info!("Render finished in {:.2?}", start.elapsed());
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{render, Material, Sphere, Vec3};
    use std::sync::Arc;

    #[test]
    fn test_generate_buckets_exact_fit() {
        let buckets = generate_buckets(128, 128, 64);
        assert_eq!(buckets.len(), 4); // 2x2 grid

        // Total pixels should equal image size
        let total_pixels: u32 = buckets.iter().map(|b| b.pixel_count()).sum();
        assert_eq!(total_pixels, 128 * 128);
    }

    #[test]
    fn test_generate_buckets_partial_fit() {
        let buckets = generate_buckets(100, 70, 64);
        assert_eq!(buckets.len(), 4); // 2x2 grid with partial buckets

        let total_pixels: u32 = buckets.iter().map(|b| b.pixel_count()).sum();
        assert_eq!(total_pixels, 100 * 70);
        assert!(buckets.iter().all(|b| b.x + b.width <= 100 && b.y + b.height <= 70));
    }

    #[test]
    fn test_spiral_order() {
        let buckets = generate_buckets(192, 192, 64);
        assert_eq!(buckets.len(), 9); // 3x3 grid

        // First bucket should be the center one
        let first = &buckets[0];
        assert_eq!(first.x, 64);
        assert_eq!(first.y, 64);
        assert!(buckets.iter().enumerate().all(|(i, b)| b.index == i));
    }

    #[test]
    fn test_write_into_places_pixels() {
        let bucket = Bucket::new(1, 2, 2, 1, 0);
        let result = BucketResult::new(bucket, vec![Color::X, Color::Y]);
        let mut image = ImageBuffer::new(4, 4);
        result.write_into(&mut image);
        assert_eq!(image.get(1, 2), Color::X);
        assert_eq!(image.get(2, 2), Color::Y);
        assert_eq!(image.get(0, 0), Color::ZERO);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let settings = RenderSettings {
            width: 20,
            height: 14,
            samples_per_pixel: 2,
            bucket_size: 6,
            seed: 99,
            ..Default::default()
        };
        let mut scene = Scene::new(&settings);
        let grey = Arc::new(Material::diffuse(Color::splat(0.6)));
        scene.add(Sphere::new(Vec3::new(0.0, -101.0, -3.0), 100.0, grey.clone()));
        scene.add(Sphere::new(Vec3::new(0.3, 0.0, -3.0), 0.5, grey));
        let light = Material::diffuse(Color::ZERO).with_emission(Color::splat(8.0));
        scene.add(Sphere::new(Vec3::new(-1.0, 1.5, -2.5), 0.4, Arc::new(light)));
        scene.build_bvh();

        let mut camera = Camera::from_settings(&settings).with_position(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::Y,
        );
        camera.initialize();

        let serial = render(&scene, &camera, &settings).unwrap();
        let parallel = render_parallel(&scene, &camera, &settings).unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_parallel_refuses_scene_without_lights() {
        let settings = RenderSettings::default();
        let mut scene = Scene::new(&settings);
        scene.add(Sphere::new(
            Vec3::ZERO,
            1.0,
            Arc::new(Material::diffuse(Color::ONE)),
        ));
        scene.build_bvh();
        let camera = Camera::from_settings(&settings);
        assert_eq!(
            render_parallel(&scene, &camera, &settings).unwrap_err(),
            SceneError::NoEmitters
        );
    }
}
