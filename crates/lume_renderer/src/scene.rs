//! Scene container and the path-tracing integrator.
//!
//! A [`Scene`] owns its objects and the BVH built over them. Each call to
//! [`Scene::cast_ray`] returns one unbiased radiance estimate: light is
//! sampled explicitly at every bounce and paths are terminated by Russian
//! roulette, with `max_depth` as a hard cap on path length.

use std::sync::Arc;
use std::time::Instant;

use crate::{
    gen_f32,
    object::{Intersection, Object},
    Bvh, Color, Material,
};
use lume_core::{AccelSettings, RenderSettings};
use lume_math::{Interval, Ray, Vec3};
use rand::RngCore;
use thiserror::Error;

/// Relative shortening of shadow rays so the light itself never occludes.
const SHADOW_EPSILON: f32 = 1e-3;

/// Spawned rays start this far off the surface, scaled by the magnitude of
/// the hit point.
const SPAWN_EPSILON: f32 = 1e-4;

/// Densities below this are treated as zero.
const PDF_EPSILON: f32 = 1e-8;

/// Reasons a scene cannot be rendered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("Scene has no objects")]
    EmptyScene,

    #[error("BVH not built: call Scene::build_bvh after adding objects")]
    AccelNotBuilt,

    #[error("Scene has no emissive objects to sample")]
    NoEmitters,
}

/// A point sampled on an emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    pub coords: Vec3,
    pub normal: Vec3,
    pub emit: Color,
    /// Area-measure density over the union of all emitters
    pub pdf: f32,
}

/// Scene: the objects, their acceleration structure, and render parameters.
pub struct Scene {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Probability of continuing a path at each bounce
    pub russian_roulette: f32,
    /// Hard cap on path length
    pub max_depth: u32,
    accel: AccelSettings,
    objects: Vec<Arc<dyn Object>>,
    bvh: Option<Bvh<Arc<dyn Object>>>,
}

impl Scene {
    /// Create an empty scene using the image and integrator parameters of
    /// `settings`.
    ///
    /// The continuation probability is clamped into `[0, 1]`; zero (or NaN)
    /// disables indirect light.
    pub fn new(settings: &RenderSettings) -> Self {
        let rr = settings.russian_roulette;
        let russian_roulette = if rr > 0.0 && rr <= 1.0 {
            rr
        } else {
            let clamped = if rr > 1.0 { 1.0 } else { 0.0 };
            log::warn!("Russian roulette probability {rr} outside (0, 1]; using {clamped}");
            clamped
        };

        Self {
            width: settings.width,
            height: settings.height,
            fov: settings.fov,
            russian_roulette,
            max_depth: settings.max_depth,
            accel: settings.accel,
            objects: Vec::new(),
            bvh: None,
        }
    }

    /// Add an object. Invalidates a previously built BVH.
    pub fn add(&mut self, object: impl Object + 'static) {
        self.add_shared(Arc::new(object));
    }

    /// Add an object shared with other owners.
    pub fn add_shared(&mut self, object: Arc<dyn Object>) {
        if self.bvh.take().is_some() {
            log::warn!("Object added after BVH build; call build_bvh again before rendering");
        }
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[Arc<dyn Object>] {
        &self.objects
    }

    /// Build the acceleration structure over the current objects.
    pub fn build_bvh(&mut self) {
        let start = Instant::now();
        let bvh = Bvh::build(
            self.objects.clone(),
            self.accel.max_prims_in_node,
            self.accel.split_method,
        );
        log::info!(
            "Generated BVH over {} objects ({} nodes) in {:.2?}",
            bvh.len(),
            bvh.node_count(),
            start.elapsed()
        );
        if bvh.is_empty() {
            log::warn!("BVH built over an empty scene");
        } else if !(self.emissive_area() > 0.0) {
            log::warn!("Scene has no emitters; every path will be black");
        }
        self.bvh = Some(bvh);
    }

    pub fn bvh(&self) -> Option<&Bvh<Arc<dyn Object>>> {
        self.bvh.as_ref()
    }

    /// Check that the scene can be rendered.
    pub fn check_ready(&self) -> Result<(), SceneError> {
        if self.objects.is_empty() {
            return Err(SceneError::EmptyScene);
        }
        if self.bvh.is_none() {
            return Err(SceneError::AccelNotBuilt);
        }
        if !(self.emissive_area() > 0.0) {
            return Err(SceneError::NoEmitters);
        }
        Ok(())
    }

    /// Nearest hit through the BVH. Misses if the BVH has not been built.
    pub fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        self.bvh
            .as_ref()
            .map_or(Intersection::miss(), |bvh| bvh.intersect(ray))
    }

    /// Nearest hit by testing every object in turn.
    ///
    /// Returns `(object index, ray parameter, primitive index)`.
    pub fn trace(&self, ray: &Ray) -> Option<(usize, f32, usize)> {
        let mut nearest: Option<(usize, f32, usize)> = None;
        for (index, object) in self.objects.iter().enumerate() {
            if let Some((t, prim)) = object.hit(ray) {
                if nearest.map_or(true, |(_, best, _)| t < best) {
                    nearest = Some((index, t, prim));
                }
            }
        }
        nearest
    }

    /// Total surface area of all emitters.
    pub fn emissive_area(&self) -> f32 {
        self.objects
            .iter()
            .filter(|object| object.has_emit())
            .map(|object| object.area())
            .sum()
    }

    /// Pick a point on the emitters, uniformly by area.
    ///
    /// Returns `None` when the scene has no emissive area.
    pub fn sample_light(&self, rng: &mut dyn RngCore) -> Option<LightSample> {
        let total = self.emissive_area();
        if !(total > 0.0) {
            return None;
        }

        let p = gen_f32(rng) * total;
        let mut accumulated = 0.0;
        let mut chosen = None;
        for object in self.objects.iter().filter(|object| object.has_emit()) {
            chosen = Some(object);
            accumulated += object.area();
            if p <= accumulated {
                break;
            }
        }

        let (point, _) = chosen?.sample(rng);
        Some(LightSample {
            coords: point.coords,
            normal: point.normal,
            emit: point.emit,
            pdf: 1.0 / total,
        })
    }

    /// One radiance estimate along `ray`.
    ///
    /// `depth` is the number of bounces already taken; camera rays start at 0.
    pub fn cast_ray(&self, ray: &Ray, depth: u32, rng: &mut dyn RngCore) -> Color {
        let hit = self.intersect(ray);
        if !hit.happened {
            return Color::ZERO;
        }
        if hit.is_emissive() {
            return hit.emit;
        }
        self.shade(&hit, -ray.direction().normalize_or_zero(), depth, rng)
    }

    /// Outgoing radiance at a non-emissive hit towards `wo`.
    fn shade(&self, hit: &Intersection<'_>, wo: Vec3, depth: u32, rng: &mut dyn RngCore) -> Color {
        let Some(material) = hit.material else {
            return Color::ZERO;
        };
        let l_dir = self.direct_light(hit, material, wo, rng);

        let mut l_indir = Color::ZERO;
        if depth + 1 < self.max_depth && gen_f32(rng) < self.russian_roulette {
            let (p, n) = (hit.coords, hit.normal);
            let wi = material.sample(wo, n, rng).normalize_or_zero();
            let pdf = material.pdf(wo, wi, n);

            if pdf > PDF_EPSILON {
                let bounce = Ray::new(spawn_origin(p, n, wi), wi);
                let next = self.intersect(&bounce);
                if next.happened && !next.is_emissive() {
                    l_indir = self.shade(&next, -wi, depth + 1, rng)
                        * material.eval(wo, wi, n)
                        * wi.dot(n)
                        / pdf
                        / self.russian_roulette;
                }
            }
        }

        sanitize(l_dir) + sanitize(l_indir)
    }

    /// Next-event estimate of direct light at `hit`.
    fn direct_light(
        &self,
        hit: &Intersection<'_>,
        material: &Material,
        wo: Vec3,
        rng: &mut dyn RngCore,
    ) -> Color {
        let Some(light) = self.sample_light(rng) else {
            return Color::ZERO;
        };
        if !(light.pdf > PDF_EPSILON) {
            return Color::ZERO;
        }

        let (p, n) = (hit.coords, hit.normal);
        let to_light = light.coords - p;
        let dist2 = to_light.length_squared();
        if !(dist2 > 0.0) {
            return Color::ZERO;
        }
        let ws = to_light / dist2.sqrt();

        let cos_surface = ws.dot(n);
        let cos_light = (-ws).dot(light.normal);
        if cos_surface <= 0.0 || cos_light <= 0.0 {
            return Color::ZERO;
        }

        let origin = spawn_origin(p, n, ws);
        let max_t = (light.coords - origin).length() * (1.0 - SHADOW_EPSILON);
        let shadow = Ray::new(origin, ws).with_range(Interval::new(0.0, max_t));
        if self.is_occluded(&shadow) {
            return Color::ZERO;
        }

        light.emit * material.eval(wo, ws, n) * cos_surface * cos_light / dist2 / light.pdf
    }

    /// True if anything is hit inside the ray's window.
    fn is_occluded(&self, ray: &Ray) -> bool {
        self.bvh.as_ref().is_some_and(|bvh| bvh.hit(ray).is_some())
    }
}

/// Offset `p` off the surface, to the side `dir` leaves towards.
fn spawn_origin(p: Vec3, n: Vec3, dir: Vec3) -> Vec3 {
    let offset = SPAWN_EPSILON * (1.0 + p.abs().max_element());
    if dir.dot(n) >= 0.0 {
        p + n * offset
    } else {
        p - n * offset
    }
}

/// Clamp negative components to zero and drop non-finite estimates.
fn sanitize(c: Color) -> Color {
    if c.is_finite() {
        c.max(Color::ZERO)
    } else {
        Color::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MeshTriangle, Sphere};
    use lume_core::{Mesh, SplitMethod};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn settings() -> RenderSettings {
        RenderSettings::default()
    }

    fn floor(half: f32, material: Arc<Material>) -> MeshTriangle {
        let mesh = Mesh::quad(
            [
                Vec3::new(-half, 0.0, -half),
                Vec3::new(half, 0.0, -half),
                Vec3::new(half, 0.0, half),
                Vec3::new(-half, 0.0, half),
            ],
            Vec3::Y,
        );
        MeshTriangle::new(&mesh, material)
    }

    fn ceiling_light(y: f32, half: f32, emission: Color) -> MeshTriangle {
        let mesh = Mesh::quad(
            [
                Vec3::new(-half, y, -half),
                Vec3::new(half, y, -half),
                Vec3::new(half, y, half),
                Vec3::new(-half, y, half),
            ],
            Vec3::NEG_Y,
        );
        let material = Material::diffuse(Color::splat(0.65)).with_emission(emission);
        MeshTriangle::new(&mesh, Arc::new(material))
    }

    fn grey(kd: f32) -> Arc<Material> {
        Arc::new(Material::diffuse(Color::splat(kd)))
    }

    #[test]
    fn test_check_ready() {
        let mut scene = Scene::new(&settings());
        assert_eq!(scene.check_ready(), Err(SceneError::EmptyScene));

        scene.add(floor(1.0, grey(0.5)));
        assert_eq!(scene.check_ready(), Err(SceneError::AccelNotBuilt));

        scene.build_bvh();
        assert_eq!(scene.check_ready(), Err(SceneError::NoEmitters));

        scene.add(ceiling_light(2.0, 0.5, Color::ONE));
        assert_eq!(scene.check_ready(), Err(SceneError::AccelNotBuilt));

        scene.build_bvh();
        assert_eq!(scene.check_ready(), Ok(()));
        assert!((scene.emissive_area() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_intersect_before_build_misses() {
        let mut scene = Scene::new(&settings());
        scene.add(floor(1.0, grey(0.5)));
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Y);
        assert!(!scene.intersect(&ray).happened);
        assert!(scene.trace(&ray).is_some());
    }

    #[test]
    fn test_trace_matches_intersect() {
        let mut scene = Scene::new(&settings());
        let material = grey(0.5);
        for i in 0..20 {
            let center = Vec3::new((i % 5) as f32 * 2.5, (i / 5) as f32 * 2.5, -(i as f32));
            scene.add(Sphere::new(center, 1.0, material.clone()));
        }
        scene.add(floor(30.0, material));
        scene.build_bvh();

        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..500 {
            let origin = Vec3::new(5.0, 15.0, 10.0);
            let target = Vec3::new(gen_f32(&mut rng) * 12.0, gen_f32(&mut rng) * 10.0, -10.0);
            let ray = Ray::new(origin, (target - origin).normalize());

            let hit = scene.intersect(&ray);
            match scene.trace(&ray) {
                Some((index, t, _)) => {
                    assert!(hit.happened);
                    assert_eq!(hit.distance, t);
                    assert_eq!(hit.primitive, Some(index));
                }
                None => assert!(!hit.happened),
            }
        }
    }

    #[test]
    fn test_miss_returns_zero() {
        let mut scene = Scene::new(&settings());
        scene.add(floor(1.0, grey(0.5)));
        scene.add(ceiling_light(2.0, 0.5, Color::splat(10.0)));
        scene.build_bvh();

        let mut rng = StdRng::seed_from_u64(1);
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::X);
        for depth in [0, 3] {
            assert_eq!(scene.cast_ray(&ray, depth, &mut rng), Color::ZERO);
        }
    }

    #[test]
    fn test_emissive_hit_returns_emission() {
        let emission = Color::new(17.0, 12.0, 4.0);
        let mut scene = Scene::new(&settings());
        scene.add(floor(1.0, grey(0.5)));
        scene.add(ceiling_light(2.0, 0.5, emission));
        scene.build_bvh();

        let mut rng = StdRng::seed_from_u64(2);
        let ray = Ray::new(Vec3::new(0.1, 1.0, 0.1), Vec3::Y);
        for depth in [0, 1, 7, 100] {
            assert_eq!(scene.cast_ray(&ray, depth, &mut rng), emission);
        }
    }

    #[test]
    fn test_no_light_renders_black() {
        let mut scene = Scene::new(&settings());
        scene.add(floor(1.0, grey(0.5)));
        scene.add(Sphere::new(Vec3::new(0.0, 2.0, 0.0), 0.5, grey(0.8)));
        scene.build_bvh();

        let mut rng = StdRng::seed_from_u64(3);
        assert!(scene.sample_light(&mut rng).is_none());

        let ray = Ray::new(Vec3::new(0.3, 1.0, 0.0), Vec3::NEG_Y);
        for _ in 0..100 {
            assert_eq!(scene.cast_ray(&ray, 0, &mut rng), Color::ZERO);
        }
    }

    #[test]
    fn test_sample_light_is_area_weighted() {
        let mut scene = Scene::new(&settings());
        scene.add(floor(5.0, grey(0.5)));
        // Areas 1 and 4
        scene.add(ceiling_light(3.0, 0.5, Color::ONE));
        scene.add(ceiling_light(6.0, 1.0, Color::splat(2.0)));
        scene.build_bvh();

        let mut rng = StdRng::seed_from_u64(4);
        let n = 5000;
        let mut on_large = 0;
        for _ in 0..n {
            let light = scene.sample_light(&mut rng).unwrap();
            assert!((light.pdf - 0.2).abs() < 1e-6);
            assert_eq!(light.normal, Vec3::NEG_Y);
            if light.coords.y > 4.0 {
                assert_eq!(light.emit, Color::splat(2.0));
                on_large += 1;
            } else {
                assert_eq!(light.emit, Color::ONE);
            }
        }
        let fraction = on_large as f32 / n as f32;
        assert!((fraction - 0.8).abs() < 0.03, "fraction = {fraction}");
    }

    #[test]
    fn test_occluded_point_is_dark() {
        let mut scene = Scene::new(&settings());
        scene.add(floor(5.0, grey(0.5)));
        scene.add(ceiling_light(4.0, 0.5, Color::splat(20.0)));
        // Blocker between floor and light, facing the floor
        let blocker = Mesh::quad(
            [
                Vec3::new(-20.0, 2.0, -20.0),
                Vec3::new(20.0, 2.0, -20.0),
                Vec3::new(20.0, 2.0, 20.0),
                Vec3::new(-20.0, 2.0, 20.0),
            ],
            Vec3::NEG_Y,
        );
        scene.add(MeshTriangle::new(&blocker, grey(0.9)));
        scene.build_bvh();

        let mut rng = StdRng::seed_from_u64(5);
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.5), Vec3::new(0.0, -1.0, -0.5).normalize());
        for _ in 0..200 {
            assert_eq!(scene.cast_ray(&ray, 0, &mut rng), Color::ZERO);
        }
    }

    fn bounce_scene(max_depth: u32, russian_roulette: f32) -> Scene {
        let mut settings = settings();
        settings.max_depth = max_depth;
        settings.russian_roulette = russian_roulette;
        let mut scene = Scene::new(&settings);
        scene.add(floor(5.0, grey(0.5)));
        scene.add(ceiling_light(4.0, 0.5, Color::splat(20.0)));
        // Small panel facing the floor, away from the light's footprint
        let panel = Mesh::quad(
            [
                Vec3::new(2.0, 2.0, -0.5),
                Vec3::new(3.0, 2.0, -0.5),
                Vec3::new(3.0, 2.0, 0.5),
                Vec3::new(2.0, 2.0, 0.5),
            ],
            Vec3::NEG_Y,
        );
        scene.add(MeshTriangle::new(&panel, grey(0.9)));
        scene.build_bvh();
        scene
    }

    #[test]
    fn test_depth_cap_stops_indirect_light() {
        // The panel only receives light bounced off the floor
        let ray = Ray::new(Vec3::new(2.5, 1.0, 0.0), Vec3::Y);

        let capped = bounce_scene(1, 1.0);
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..50 {
            assert_eq!(capped.cast_ray(&ray, 0, &mut rng), Color::ZERO);
        }

        let open = bounce_scene(4, 1.0);
        let mut rng = StdRng::seed_from_u64(6);
        let mut sum = Color::ZERO;
        for _ in 0..2000 {
            sum += open.cast_ray(&ray, 0, &mut rng);
        }
        assert!(sum.min_element() > 0.0);
    }

    #[test]
    fn test_russian_roulette_probability_is_clamped() {
        let mut settings = settings();
        settings.russian_roulette = 1.5;
        assert_eq!(Scene::new(&settings).russian_roulette, 1.0);
        settings.russian_roulette = -0.2;
        assert_eq!(Scene::new(&settings).russian_roulette, 0.0);
        settings.russian_roulette = f32::NAN;
        assert_eq!(Scene::new(&settings).russian_roulette, 0.0);
        settings.russian_roulette = 0.8;
        assert_eq!(Scene::new(&settings).russian_roulette, 0.8);

        // Out-of-range input still gives the unclamped estimate
        let ray = Ray::new(Vec3::new(2.5, 1.0, 0.0), Vec3::Y);
        let over = bounce_scene(2, 1.5);
        assert_eq!(over.russian_roulette, 1.0);
        let reference = bounce_scene(2, 1.0);
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(over.cast_ray(&ray, 0, &mut a), reference.cast_ray(&ray, 0, &mut b));
        }
    }

    #[test]
    fn test_russian_roulette_keeps_indirect_mean() {
        // One floor bounce reaches the panel; deeper paths are cut off
        let ray = Ray::new(Vec3::new(2.5, 1.0, 0.0), Vec3::Y);
        let samples = 200_000;
        let mean = |russian_roulette: f32, seed: u64| {
            let scene = bounce_scene(2, russian_roulette);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut sum = Color::ZERO;
            for _ in 0..samples {
                sum += scene.cast_ray(&ray, 0, &mut rng);
            }
            sum / samples as f32
        };

        let always = mean(1.0, 11);
        let half = mean(0.5, 12);
        assert!(always.min_element() > 0.0);
        for (a, b) in always.to_array().into_iter().zip(half.to_array()) {
            assert!((a - b).abs() < 0.03 * a, "rr 1.0: {a}, rr 0.5: {b}");
        }
    }

    /// Floor point directly below a spherical light of radius `r` at height
    /// `h`: irradiance is `pi * Le * (r/h)^2`, so outgoing radiance from a
    /// Lambertian floor is `kd * Le * (r/h)^2`.
    #[test]
    fn test_sphere_light_converges_to_analytic_radiance() {
        let _ = env_logger::builder().is_test(true).try_init();

        let (kd, le, r, h) = (0.5, 10.0, 1.0, 4.0);
        let expected = kd * le * (r / h) * (r / h);

        for method in [SplitMethod::Naive, SplitMethod::Sah] {
            let mut settings = settings();
            settings.accel.split_method = method;
            let mut scene = Scene::new(&settings);
            scene.add(floor(50.0, grey(kd)));
            let light = Material::diffuse(Color::ZERO).with_emission(Color::splat(le));
            scene.add(Sphere::new(Vec3::new(0.0, h, 0.0), r, Arc::new(light)));
            scene.build_bvh();

            let origin = Vec3::new(0.0, 1.0, 3.0);
            let ray = Ray::new(origin, (Vec3::ZERO - origin).normalize());

            let mut rng = StdRng::seed_from_u64(7);
            let samples = 60_000;
            let mut sum = Color::ZERO;
            for _ in 0..samples {
                sum += scene.cast_ray(&ray, 0, &mut rng);
            }
            let mean = sum / samples as f32;
            for channel in mean.to_array() {
                assert!(
                    (channel - expected).abs() < 0.03 * expected,
                    "{method:?}: got {channel}, expected {expected}"
                );
            }
        }
    }

    #[test]
    fn test_spawn_origin_moves_to_exit_side() {
        let p = Vec3::new(10.0, 0.0, 0.0);
        assert!(spawn_origin(p, Vec3::Y, Vec3::Y).y > 0.0);
        assert!(spawn_origin(p, Vec3::Y, Vec3::NEG_Y).y < 0.0);
    }

    #[test]
    fn test_sanitize_clamps_negative_and_nan() {
        assert_eq!(sanitize(Color::new(-1.0, 0.5, 2.0)), Color::new(0.0, 0.5, 2.0));
        assert_eq!(sanitize(Color::new(f32::NAN, 1.0, 1.0)), Color::ZERO);
    }
}
