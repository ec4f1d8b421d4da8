//! Surface reflectance models.
//!
//! Every material samples the hemisphere uniformly and evaluates one of
//! three BRDFs: Lambertian, Cook-Torrance (GGX) over a Lambertian base, or a
//! Blinn-Phong style lobe over a Lambertian base.
//!
//! Direction convention: `wi` and `wo` both point away from the surface.
//! `eval` and `pdf` are zero unless `wo` lies in the hemisphere of `n`.

use std::f32::consts::PI;

use crate::gen_f32;
use lume_math::{frame, Vec3};
use rand::RngCore;

/// Color type alias (linear RGB radiance or reflectance)
pub type Color = Vec3;

/// Emission below this magnitude counts as black.
const EMISSION_EPSILON: f32 = 1e-5;

/// Lower bound on GGX roughness; zero would make `D` a delta.
const MIN_ROUGHNESS: f32 = 1e-3;

/// Which BRDF a material evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialKind {
    /// Lambertian: `kd / pi`
    #[default]
    Diffuse,
    /// `ks * cook_torrance + kd / pi`
    MicrofacetDiffuse,
    /// `ks * max(n.h, 0)^p + kd / pi`
    MicrofacetGlossy,
}

/// BRDF parameters for a surface.
///
/// Materials are built once during scene setup and then shared through
/// `Arc`; nothing mutates them while rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    /// Emitted radiance (zero for non-emitters)
    pub emission: Color,
    /// Diffuse reflectance
    pub kd: Color,
    /// Specular weight
    pub ks: Color,
    /// Reflectance at normal incidence for Schlick's approximation
    pub f0: Color,
    /// Index of refraction, passed to [`refract`] and [`fresnel`] by callers
    pub ior: f32,
    /// GGX roughness
    pub smoothness: f32,
    /// Exponent of the glossy lobe
    pub specular_exponent: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            kind: MaterialKind::Diffuse,
            emission: Color::ZERO,
            kd: Color::ZERO,
            ks: Color::ZERO,
            f0: Color::splat(0.04),
            ior: 1.5,
            smoothness: 0.5,
            specular_exponent: 25.0,
        }
    }
}

impl Material {
    /// Create a Lambertian material.
    pub fn diffuse(kd: Color) -> Self {
        Self {
            kd,
            ..Default::default()
        }
    }

    /// Create a Cook-Torrance material over a Lambertian base.
    pub fn microfacet_diffuse(kd: Color, ks: Color, f0: Color, smoothness: f32) -> Self {
        Self {
            kind: MaterialKind::MicrofacetDiffuse,
            kd,
            ks,
            f0,
            smoothness,
            ..Default::default()
        }
    }

    /// Create a glossy material over a Lambertian base.
    pub fn microfacet_glossy(kd: Color, ks: Color) -> Self {
        Self {
            kind: MaterialKind::MicrofacetGlossy,
            kd,
            ks,
            ..Default::default()
        }
    }

    pub fn with_emission(mut self, emission: Color) -> Self {
        self.emission = emission;
        self
    }

    pub fn has_emission(&self) -> bool {
        self.emission.length() > EMISSION_EPSILON
    }

    /// Sample an outgoing direction uniformly over the hemisphere of `n`.
    ///
    /// The density is [`Material::pdf`]; it is not cosine weighted.
    pub fn sample(&self, _wi: Vec3, n: Vec3, rng: &mut dyn RngCore) -> Vec3 {
        let z = (1.0 - 2.0 * gen_f32(rng)).abs();
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = 2.0 * PI * gen_f32(rng);
        let local = Vec3::new(r * phi.cos(), r * phi.sin(), z);
        frame::to_world(local, n)
    }

    /// Solid-angle density of [`Material::sample`] producing `wo`.
    pub fn pdf(&self, _wi: Vec3, wo: Vec3, n: Vec3) -> f32 {
        if wo.dot(n) > 0.0 {
            0.5 / PI
        } else {
            0.0
        }
    }

    /// BRDF value for the pair of directions.
    pub fn eval(&self, wi: Vec3, wo: Vec3, n: Vec3) -> Color {
        if wo.dot(n) <= 0.0 {
            return Color::ZERO;
        }

        let diffuse = self.kd / PI;
        match self.kind {
            MaterialKind::Diffuse => diffuse,
            MaterialKind::MicrofacetDiffuse => self.ks * self.cook_torrance(wi, wo, n) + diffuse,
            MaterialKind::MicrofacetGlossy => {
                let h = (wi + wo).normalize_or_zero();
                let spec = n.dot(h).max(0.0).powf(self.specular_exponent);
                self.ks * spec + diffuse
            }
        }
    }

    /// Cook-Torrance specular term `D * G * F / (4 (n.l) (n.v))`.
    ///
    /// Zero when either direction is at or below the surface.
    pub fn cook_torrance(&self, wi: Vec3, wo: Vec3, n: Vec3) -> Color {
        let v = wo;
        let l = wi;
        let n_dot_v = n.dot(v);
        let n_dot_l = n.dot(l);
        if n_dot_v <= 0.0 || n_dot_l <= 0.0 {
            return Color::ZERO;
        }
        let h = (v + l).normalize_or_zero();

        let d = distribution_ggx(n, h, self.smoothness);
        let k = self.smoothness * self.smoothness * 0.5;
        let g = geometry_smith(n_dot_v, n_dot_l, k);
        let f = fresnel_schlick(h.dot(v).max(0.0), self.f0);

        f * (d * g / (4.0 * n_dot_l * n_dot_v))
    }
}

/// GGX / Trowbridge-Reitz normal distribution.
#[inline]
fn distribution_ggx(n: Vec3, h: Vec3, roughness: f32) -> f32 {
    let a = roughness.max(MIN_ROUGHNESS);
    let a2 = a * a;
    let n_dot_h = n.dot(h).max(0.0);
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * denom * denom)
}

#[inline]
fn geometry_schlick_ggx(n_dot_v: f32, k: f32) -> f32 {
    let denom = n_dot_v * (1.0 - k) + k;
    if denom > 0.0 {
        n_dot_v / denom
    } else {
        0.0
    }
}

/// Smith masking-shadowing with Schlick-GGX per direction.
#[inline]
fn geometry_smith(n_dot_v: f32, n_dot_l: f32, k: f32) -> f32 {
    geometry_schlick_ggx(n_dot_v.max(0.0), k) * geometry_schlick_ggx(n_dot_l.max(0.0), k)
}

#[inline]
fn fresnel_schlick(cos_theta: f32, f0: Color) -> Color {
    f0 + (Color::ONE - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

/// Mirror `i` about `n`.
#[inline]
pub fn reflect(i: Vec3, n: Vec3) -> Vec3 {
    i - 2.0 * i.dot(n) * n
}

/// Refract the incident direction `i` through a surface with normal `n`.
///
/// `i` points towards the surface. The side is picked from the sign of
/// `i.n`, so `n` may face either way. Returns `None` on total internal
/// reflection.
pub fn refract(i: Vec3, n: Vec3, ior: f32) -> Option<Vec3> {
    let mut cosi = i.dot(n).clamp(-1.0, 1.0);
    let (mut etai, mut etat) = (1.0, ior);
    let mut n = n;
    if cosi < 0.0 {
        cosi = -cosi;
    } else {
        std::mem::swap(&mut etai, &mut etat);
        n = -n;
    }

    let eta = etai / etat;
    let k = 1.0 - eta * eta * (1.0 - cosi * cosi);
    if k < 0.0 {
        return None;
    }
    Some(eta * i + (eta * cosi - k.sqrt()) * n)
}

/// Fraction of light reflected at a dielectric boundary (exact Fresnel).
///
/// `i` points towards the surface. Returns 1 under total internal
/// reflection; the transmitted fraction is `1 - fresnel`.
pub fn fresnel(i: Vec3, n: Vec3, ior: f32) -> f32 {
    let cosi = i.dot(n).clamp(-1.0, 1.0);
    let (etai, etat) = if cosi > 0.0 { (ior, 1.0) } else { (1.0, ior) };

    let sint = etai / etat * (1.0 - cosi * cosi).max(0.0).sqrt();
    if sint >= 1.0 {
        return 1.0;
    }

    let cost = (1.0 - sint * sint).max(0.0).sqrt();
    let cosi = cosi.abs();
    let rs = (etat * cosi - etai * cost) / (etat * cosi + etai * cost);
    let rp = (etai * cosi - etat * cost) / (etai * cosi + etat * cost);
    (rs * rs + rp * rp) / 2.0
}
