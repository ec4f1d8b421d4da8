//! Render configuration.
//!
//! Settings are plain serde structs so they can be read from a JSON file.
//! Every field has a default, which lets a file override only what it
//! cares about:
//!
//! ```json
//! { "samples_per_pixel": 64, "accel": { "split_method": "sah" } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How the BVH partitions primitives at each interior node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMethod {
    /// Median split on the axis of largest centroid spread.
    #[default]
    Naive,
    /// Bucketed surface-area heuristic.
    Sah,
}

/// Acceleration structure settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelSettings {
    pub split_method: SplitMethod,

    /// Largest number of primitives stored in one leaf (clamped to 1..=255).
    pub max_prims_in_node: usize,
}

impl Default for AccelSettings {
    fn default() -> Self {
        Self {
            split_method: SplitMethod::Naive,
            max_prims_in_node: 1,
        }
    }
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Path-tracing samples averaged per pixel
    pub samples_per_pixel: u32,
    /// Probability of continuing a path at each bounce
    pub russian_roulette: f32,
    /// Hard cap on path length, applied on top of Russian roulette
    pub max_depth: u32,
    /// Base seed for the per-pixel random streams
    pub seed: u64,
    /// Edge length of a parallel render tile in pixels
    pub bucket_size: u32,
    /// BVH construction
    pub accel: AccelSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 784,
            height: 784,
            fov: 40.0,
            samples_per_pixel: 16,
            russian_roulette: 0.8,
            max_depth: 32,
            seed: 0,
            bucket_size: 64,
            accel: AccelSettings::default(),
        }
    }
}

impl RenderSettings {
    /// Parse settings from a JSON string and validate them.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: RenderSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&json)?;
        log::info!("Loaded render settings from {}", path.display());
        Ok(settings)
    }

    /// Check every field against its valid range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
            SettingsError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.width == 0 || self.height == 0 {
            return Err(invalid(
                "width/height",
                format!("image must be non-empty, got {}x{}", self.width, self.height),
            ));
        }
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(invalid("fov", format!("{} is outside (0, 180)", self.fov)));
        }
        if self.samples_per_pixel == 0 {
            return Err(invalid("samples_per_pixel", "must be at least 1"));
        }
        if !(self.russian_roulette > 0.0 && self.russian_roulette <= 1.0) {
            return Err(invalid(
                "russian_roulette",
                format!("{} is outside (0, 1]", self.russian_roulette),
            ));
        }
        if self.max_depth == 0 {
            return Err(invalid("max_depth", "must be at least 1"));
        }
        if self.bucket_size == 0 {
            return Err(invalid("bucket_size", "must be at least 1"));
        }
        if self.accel.max_prims_in_node == 0 {
            return Err(invalid("accel.max_prims_in_node", "must be at least 1"));
        }
        if self.accel.max_prims_in_node > 255 {
            log::warn!(
                "accel.max_prims_in_node = {} will be clamped to 255",
                self.accel.max_prims_in_node
            );
        }
        Ok(())
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}
