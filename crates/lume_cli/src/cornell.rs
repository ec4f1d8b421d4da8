//! The Cornell box test scene.
//!
//! Coordinates follow the measured Cornell data: x runs from the right
//! wall (0) to the left wall (~552), y from floor (0) to ceiling (548.8),
//! z from the open front (0) to the back wall (559.2).

use std::sync::Arc;

use lume_core::{Mesh, RenderSettings};
use lume_math::Vec3;
use lume_renderer::{Camera, Color, Material, MeshTriangle, Scene, Sphere};

/// Build the scene: white floor, ceiling and back wall, red left wall,
/// green right wall, an area light under the ceiling, and two microfacet
/// spheres.
pub fn scene(settings: &RenderSettings) -> Scene {
    let red = Arc::new(Material::diffuse(Color::new(0.63, 0.065, 0.05)));
    let green = Arc::new(Material::diffuse(Color::new(0.14, 0.45, 0.091)));
    let white = Arc::new(Material::diffuse(Color::new(0.725, 0.71, 0.68)));
    let light = Arc::new(Material::diffuse(Color::splat(0.65)).with_emission(light_emission()));

    let gold = Arc::new(Material::microfacet_diffuse(
        Color::new(0.2, 0.2, 0.05),
        Color::splat(0.4),
        Color::new(1.0, 0.71, 0.29),
        0.3,
    ));
    let silver = Arc::new(Material::microfacet_diffuse(
        Color::new(0.3, 0.3, 0.05),
        Color::splat(0.4),
        Color::new(0.95, 0.93, 0.88),
        0.3,
    ));

    let mut scene = Scene::new(settings);
    let accel = settings.accel;
    scene.add(MeshTriangle::with_accel(&shell(), white, accel));
    scene.add(MeshTriangle::with_accel(&left_wall(), red, accel));
    scene.add(MeshTriangle::with_accel(&right_wall(), green, accel));
    scene.add(MeshTriangle::with_accel(&light_quad(), light, accel));
    scene.add(Sphere::new(Vec3::new(150.0, 100.0, 400.0), 100.0, gold));
    scene.add(Sphere::new(Vec3::new(400.0, 100.0, 300.0), 100.0, silver));
    scene.build_bvh();
    scene
}

/// Camera looking into the box through its open side.
pub fn camera(settings: &RenderSettings) -> Camera {
    let mut camera = Camera::from_settings(settings).with_position(
        Vec3::new(278.0, 273.0, -800.0),
        Vec3::new(278.0, 273.0, 0.0),
        Vec3::Y,
    );
    camera.initialize();
    camera
}

/// Area light emission: three weighted spectral samples folded into RGB.
fn light_emission() -> Color {
    8.0 * Color::new(0.747 + 0.058, 0.747 + 0.258, 0.747)
        + 15.6 * Color::new(0.740 + 0.287, 0.740 + 0.160, 0.740)
        + 18.4 * Color::new(0.737 + 0.642, 0.737 + 0.159, 0.737)
}

/// Floor, ceiling and back wall.
fn shell() -> Mesh {
    let mut mesh = Mesh::quad(
        [
            Vec3::new(552.8, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 559.2),
            Vec3::new(549.6, 0.0, 559.2),
        ],
        Vec3::Y,
    );
    mesh.append(&Mesh::quad(
        [
            Vec3::new(556.0, 548.8, 0.0),
            Vec3::new(556.0, 548.8, 559.2),
            Vec3::new(0.0, 548.8, 559.2),
            Vec3::new(0.0, 548.8, 0.0),
        ],
        Vec3::NEG_Y,
    ));
    mesh.append(&Mesh::quad(
        [
            Vec3::new(549.6, 0.0, 559.2),
            Vec3::new(0.0, 0.0, 559.2),
            Vec3::new(0.0, 548.8, 559.2),
            Vec3::new(556.0, 548.8, 559.2),
        ],
        Vec3::NEG_Z,
    ));
    mesh
}

fn left_wall() -> Mesh {
    Mesh::quad(
        [
            Vec3::new(552.8, 0.0, 0.0),
            Vec3::new(549.6, 0.0, 559.2),
            Vec3::new(556.0, 548.8, 559.2),
            Vec3::new(556.0, 548.8, 0.0),
        ],
        Vec3::NEG_X,
    )
}

fn right_wall() -> Mesh {
    Mesh::quad(
        [
            Vec3::new(0.0, 0.0, 559.2),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 548.8, 0.0),
            Vec3::new(0.0, 548.8, 559.2),
        ],
        Vec3::X,
    )
}

fn light_quad() -> Mesh {
    Mesh::quad(
        [
            Vec3::new(343.0, 548.7, 227.0),
            Vec3::new(343.0, 548.7, 332.0),
            Vec3::new(213.0, 548.7, 332.0),
            Vec3::new(213.0, 548.7, 227.0),
        ],
        Vec3::NEG_Y,
    )
}
