// src/measurement.rs - Pixel and physical sprout lengths

use serde::Serialize;

use crate::path_algorithms::path_length;

/// Length of one sprout, in pixels and calibrated units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SproutMeasurement {
    /// 1-based index of the region in reading order
    pub index: usize,
    pub pixel_length: f64,
    /// `pixel_length` converted with the image's calibration factor
    pub physical_length: f64,
    /// False when no measurement path could be found for the region
    pub measurable: bool,
}

impl SproutMeasurement {
    /// Explicit zero-length record for a region without a usable path
    pub fn unmeasurable(index: usize) -> Self {
        Self {
            index,
            pixel_length: 0.0,
            physical_length: 0.0,
            measurable: false,
        }
    }
}

/// Measure a simplified path and convert it with `mm_per_pixel`
pub fn measure(index: usize, path: &[(u32, u32)], mm_per_pixel: f64) -> SproutMeasurement {
    if path.len() < 2 {
        return SproutMeasurement::unmeasurable(index);
    }

    let pixel_length = path_length(path);
    SproutMeasurement {
        index,
        pixel_length,
        physical_length: pixel_length * mm_per_pixel,
        measurable: true,
    }
}
