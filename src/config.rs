// src/config.rs - Processing and batch configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{SproutError, Result};

/// Configuration for the sprout length pipeline
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_input_path")]
    pub input_path: String,

    #[serde(default = "default_calibration_path")]
    pub calibration_path: String,

    #[serde(default = "default_output_base_dir")]
    pub output_base_dir: String,

    // Mean shift smoothing
    #[serde(default = "default_mean_shift_spatial_radius")]
    pub mean_shift_spatial_radius: u32,

    #[serde(default = "default_mean_shift_color_radius")]
    pub mean_shift_color_radius: f64,

    #[serde(default = "default_mean_shift_max_iterations")]
    pub mean_shift_max_iterations: u32,

    /// Mean shift costs (2r+1)^2 colour comparisons per pixel and iteration.
    /// Images whose longer side exceeds this are smoothed at reduced size and
    /// scaled back up; 0 always filters at full resolution.
    #[serde(default = "default_mean_shift_max_dimension")]
    pub mean_shift_max_dimension: u32,

    // Gaussian blur (sigma 0 = derive from kernel size)
    #[serde(default = "default_gaussian_blur_kernel_size")]
    pub gaussian_blur_kernel_size: u32,

    #[serde(default)]
    pub gaussian_blur_sigma: f32,

    // Threshold polarity: false keeps pixels brighter than the Otsu level
    #[serde(default)]
    pub invert_threshold: bool,

    // Morphological cleanup
    #[serde(default = "default_morphology_kernel_size")]
    pub morphology_kernel_size: u32,

    #[serde(default)]
    pub morphology_shape: MorphologyShape,

    // Region filtering and numbering
    #[serde(default = "default_min_contour_area")]
    pub min_contour_area: f64,

    #[serde(default = "default_row_tolerance_ratio")]
    pub row_tolerance_ratio: f64,

    // Path handling
    #[serde(default = "default_path_simplification_tolerance")]
    pub path_simplification_tolerance: f64,

    #[serde(default = "default_extend_path_to_boundary")]
    pub extend_path_to_boundary: bool,

    #[serde(default = "default_boundary_extension_lookback")]
    pub boundary_extension_lookback: usize,

    // Batch behaviour
    #[serde(default)]
    pub use_parallel: bool,

    #[serde(default = "default_save_masks")]
    pub save_masks: bool,
}

/// Structuring element shape used for mask cleanup
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MorphologyShape {
    #[default]
    Ellipse,
    Rect,
    Cross,
}

fn default_input_path() -> String {
    "./input".to_string()
}

fn default_calibration_path() -> String {
    "./calibration.csv".to_string()
}

fn default_output_base_dir() -> String {
    "./output".to_string()
}

fn default_mean_shift_spatial_radius() -> u32 {
    20
}

fn default_mean_shift_color_radius() -> f64 {
    40.0
}

fn default_mean_shift_max_iterations() -> u32 {
    5
}

fn default_mean_shift_max_dimension() -> u32 {
    1024
}

fn default_gaussian_blur_kernel_size() -> u32 {
    5
}

fn default_morphology_kernel_size() -> u32 {
    3
}

fn default_min_contour_area() -> f64 {
    300.0
}

fn default_row_tolerance_ratio() -> f64 {
    0.08
}

fn default_path_simplification_tolerance() -> f64 {
    2.0
}

fn default_extend_path_to_boundary() -> bool {
    true
}

fn default_boundary_extension_lookback() -> usize {
    8
}

fn default_save_masks() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            calibration_path: default_calibration_path(),
            output_base_dir: default_output_base_dir(),
            mean_shift_spatial_radius: default_mean_shift_spatial_radius(),
            mean_shift_color_radius: default_mean_shift_color_radius(),
            mean_shift_max_iterations: default_mean_shift_max_iterations(),
            mean_shift_max_dimension: default_mean_shift_max_dimension(),
            gaussian_blur_kernel_size: default_gaussian_blur_kernel_size(),
            gaussian_blur_sigma: 0.0,
            invert_threshold: false,
            morphology_kernel_size: default_morphology_kernel_size(),
            morphology_shape: MorphologyShape::Ellipse,
            min_contour_area: default_min_contour_area(),
            row_tolerance_ratio: default_row_tolerance_ratio(),
            path_simplification_tolerance: default_path_simplification_tolerance(),
            extend_path_to_boundary: default_extend_path_to_boundary(),
            boundary_extension_lookback: default_boundary_extension_lookback(),
            use_parallel: false,
            save_masks: default_save_masks(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SproutError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| SproutError::ConfigLoad {
            source: e,
            path: path.to_path_buf(),
        })?;

        Ok(config)
    }

    /// Validate the processing parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.mean_shift_color_radius >= 0.0) {
            return Err(SproutError::Config(
                "mean_shift_color_radius must be >= 0.0".to_string(),
            ));
        }

        if self.mean_shift_spatial_radius > 0 && self.mean_shift_max_iterations == 0 {
            return Err(SproutError::Config(
                "mean_shift_max_iterations must be > 0 when mean shift is enabled".to_string(),
            ));
        }

        if self.gaussian_blur_kernel_size == 0 || self.gaussian_blur_kernel_size % 2 == 0 {
            return Err(SproutError::Config(
                "gaussian_blur_kernel_size must be a positive odd number".to_string(),
            ));
        }

        if self.gaussian_blur_sigma < 0.0 {
            return Err(SproutError::Config(
                "gaussian_blur_sigma must be >= 0.0".to_string(),
            ));
        }

        if self.morphology_kernel_size == 0 || self.morphology_kernel_size % 2 == 0 {
            return Err(SproutError::Config(
                "morphology_kernel_size must be a positive odd number".to_string(),
            ));
        }

        if !(self.min_contour_area >= 0.0) {
            return Err(SproutError::Config(
                "min_contour_area must be >= 0.0".to_string(),
            ));
        }

        if !(self.row_tolerance_ratio > 0.0 && self.row_tolerance_ratio <= 1.0) {
            return Err(SproutError::Config(
                "row_tolerance_ratio must be in (0.0, 1.0]".to_string(),
            ));
        }

        if !(self.path_simplification_tolerance >= 0.0) {
            return Err(SproutError::Config(
                "path_simplification_tolerance must be >= 0.0".to_string(),
            ));
        }

        if self.boundary_extension_lookback == 0 {
            return Err(SproutError::Config(
                "boundary_extension_lookback must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            SproutError::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content)?;

        Ok(())
    }
}
