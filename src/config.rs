//! Widget configuration.
//!
//! Defaults reproduce the values the pipeline widget has always sent to the
//! TripoSR space. A `WidgetConfig` is provided to the component tree through
//! Leptos context; components fall back to `WidgetConfig::default()` when no
//! provider exists.

use thiserror::Error;

/// Default Gradio space used for validation, preprocessing and generation.
pub const DEFAULT_SPACE: &str = "stabilityai/TripoSR";

/// Hub used to resolve a space id into the host serving it.
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";

/// Smallest marching-cubes grid the space accepts.
pub const MIN_RESOLUTION: u32 = 32;

/// Largest marching-cubes grid the space accepts.
pub const MAX_RESOLUTION: u32 = 320;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("foreground ratio must be within [0, 1], got {0}")]
    ForegroundRatio(f32),

    #[error("marching cubes resolution must be within {MIN_RESOLUTION}..={MAX_RESOLUTION}, got {0}")]
    Resolution(u32),

    #[error("rotation speed must be finite, got {0}")]
    RotationSpeed(f32),

    #[error("space must not be empty")]
    EmptySpace,
}

/// Fraction of the output frame the foreground object should occupy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForegroundRatio(f32);

impl ForegroundRatio {
    pub fn new(value: f32) -> Result<Self, ConfigError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::ForegroundRatio(value))
        }
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

/// Marching-cubes grid size used when extracting the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarchingCubesResolution(u32);

impl MarchingCubesResolution {
    pub fn new(value: u32) -> Result<Self, ConfigError> {
        if (MIN_RESOLUTION..=MAX_RESOLUTION).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::Resolution(value))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Options sent with the preprocess call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    pub remove_background: bool,
    pub foreground_ratio: ForegroundRatio,
}

/// Everything a pipeline run needs besides the image itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOptions {
    pub preprocess: PreprocessOptions,
    pub resolution: MarchingCubesResolution,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetConfig {
    /// Space id (`owner/name`) or a full `https://` root of a Gradio app.
    pub space: String,
    pub hub_url: String,
    pub remove_background: bool,
    pub foreground_ratio: f32,
    pub mc_resolution: u32,
    /// Model spin in radians per second.
    pub rotation_speed: f32,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            space: DEFAULT_SPACE.to_string(),
            hub_url: DEFAULT_HUB_URL.to_string(),
            remove_background: true,
            foreground_ratio: 0.5,
            mc_resolution: MIN_RESOLUTION,
            rotation_speed: 0.5,
        }
    }
}

impl WidgetConfig {
    /// Check every field and produce the typed options for a run.
    pub fn validate(&self) -> Result<RunOptions, ConfigError> {
        if self.space.trim().is_empty() {
            return Err(ConfigError::EmptySpace);
        }
        if !self.rotation_speed.is_finite() {
            return Err(ConfigError::RotationSpeed(self.rotation_speed));
        }

        Ok(RunOptions {
            preprocess: PreprocessOptions {
                remove_background: self.remove_background,
                foreground_ratio: ForegroundRatio::new(self.foreground_ratio)?,
            },
            resolution: MarchingCubesResolution::new(self.mc_resolution)?,
        })
    }
}
