//! Lume Core - renderer-agnostic scene data.
//!
//! This crate provides:
//!
//! - **Geometry**: `Mesh`, an indexed triangle list with helpers to build
//!   quads facing a chosen direction
//! - **Configuration**: `RenderSettings`, loaded from JSON and validated
//!   before a render starts
//!
//! # Example
//!
//! ```ignore
//! use lume_core::RenderSettings;
//!
//! let settings = RenderSettings::load("render.json")?;
//! println!("{}x{} @ {} spp", settings.width, settings.height, settings.samples_per_pixel);
//! ```

pub mod mesh;
pub mod settings;

// Re-export commonly used types
pub use mesh::Mesh;
pub use settings::{AccelSettings, RenderSettings, SettingsError, SplitMethod};
