//! Lume - render the Cornell box to an image file.
//!
//! Usage: `lume [settings.json] [output.png]`

mod cornell;

use std::time::Instant;

use anyhow::{Context, Result};
use lume_core::RenderSettings;
use lume_renderer::render_parallel;

const DEFAULT_OUTPUT: &str = "lume.png";

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Lume");

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => RenderSettings::load(&path)
            .with_context(|| format!("Failed to load settings from {path}"))?,
        None => RenderSettings::default(),
    };
    let output = args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    let start = Instant::now();
    let scene = cornell::scene(&settings);
    let camera = cornell::camera(&settings);
    log::info!("Scene ready in {:.2?}", start.elapsed());

    let image = render_parallel(&scene, &camera, &settings).context("Failed to render scene")?;
    image
        .save(&output)
        .with_context(|| format!("Failed to write {output}"))?;

    log::info!("Done in {:.2?}", start.elapsed());
    Ok(())
}
