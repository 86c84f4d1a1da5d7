// src/preprocessing.rs - Colour image to clean binary foreground mask

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::config::Config;
use crate::errors::{SproutError, Result};
use crate::image_utils::{BACKGROUND, FOREGROUND};
use crate::morphology::{close_mask, open_mask};

/// Threshold used when Otsu's method has no two classes to separate
pub const FALLBACK_THRESHOLD: u8 = 127;

/// How the global threshold was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdOutcome {
    pub level: u8,
    /// True when the image had fewer than two intensity levels and the
    /// fixed midpoint was used instead of Otsu's level
    pub degenerate: bool,
}

/// Output of the preprocessing stage
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Smoothed grayscale image the threshold was computed on
    pub gray: GrayImage,
    /// Cleaned binary mask (0 / 255), same dimensions as the input
    pub mask: GrayImage,
    pub threshold: ThresholdOutcome,
}

/// Run the full preprocessing chain on a colour image
pub fn preprocess(image: &RgbImage, config: &Config) -> Result<Preprocessed> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SproutError::InvalidImage(format!(
            "image has zero area ({}x{})", width, height
        )));
    }

    let shifted = mean_shift_smooth(image, config);
    let gray = imageops::grayscale(&shifted);

    log::debug!("Applying Gaussian blur (kernel={})", config.gaussian_blur_kernel_size);
    let blurred = gaussian_blur(&gray, config.gaussian_blur_kernel_size, config.gaussian_blur_sigma);

    let (binary, threshold) = threshold_mask(&blurred, config.invert_threshold);
    if threshold.degenerate {
        log::warn!("Otsu threshold undefined for a near-uniform image, using fixed level {}", threshold.level);
    } else {
        log::debug!("Otsu threshold level: {}", threshold.level);
    }

    let closed = close_mask(&binary, config.morphology_shape, config.morphology_kernel_size);
    let mask = open_mask(&closed, config.morphology_shape, config.morphology_kernel_size);

    Ok(Preprocessed {
        gray: blurred,
        mask,
        threshold,
    })
}

/// Mean shift smoothing at a working resolution bounded by
/// `mean_shift_max_dimension`. The result always has the input's dimensions.
pub fn mean_shift_smooth(image: &RgbImage, config: &Config) -> RgbImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    let limit = config.mean_shift_max_dimension;

    if limit == 0 || longest <= limit || config.mean_shift_spatial_radius == 0 {
        log::debug!("Applying mean shift filtering (sp={}, sr={})",
            config.mean_shift_spatial_radius, config.mean_shift_color_radius);
        return mean_shift_filter(
            image,
            config.mean_shift_spatial_radius,
            config.mean_shift_color_radius,
            config.mean_shift_max_iterations,
        );
    }

    let scale = limit as f64 / longest as f64;
    let small_width = ((width as f64 * scale).round() as u32).max(1);
    let small_height = ((height as f64 * scale).round() as u32).max(1);
    let radius = ((config.mean_shift_spatial_radius as f64 * scale).round() as u32).max(1);
    log::debug!("Applying mean shift filtering at {}x{} (sp={}, sr={})",
        small_width, small_height, radius, config.mean_shift_color_radius);

    let small = imageops::resize(image, small_width, small_height, FilterType::Triangle);
    let shifted = mean_shift_filter(
        &small,
        radius,
        config.mean_shift_color_radius,
        config.mean_shift_max_iterations,
    );
    imageops::resize(&shifted, width, height, FilterType::Triangle)
}

/// Edge-preserving mean shift smoothing in the joint spatial/colour domain.
///
/// Each pixel repeatedly moves to the mean position and colour of the pixels
/// inside its square spatial window whose colour lies within `color_radius`
/// (Euclidean, RGB). Iteration stops when the shift drops to 1 or
/// `max_iterations` is reached; the pixel takes the converged colour.
pub fn mean_shift_filter(
    image: &RgbImage,
    spatial_radius: u32,
    color_radius: f64,
    max_iterations: u32,
) -> RgbImage {
    if spatial_radius == 0 || max_iterations == 0 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let sp = spatial_radius as i64;
    let sr_sq = color_radius * color_radius;
    let mut result = RgbImage::new(width, height);

    for y0 in 0..height {
        for x0 in 0..width {
            let start = image.get_pixel(x0, y0);
            let mut cx = x0 as i64;
            let mut cy = y0 as i64;
            let mut color = [start[0] as f64, start[1] as f64, start[2] as f64];

            for _ in 0..max_iterations {
                let x_min = (cx - sp).max(0);
                let x_max = (cx + sp).min(width as i64 - 1);
                let y_min = (cy - sp).max(0);
                let y_max = (cy + sp).min(height as i64 - 1);

                let mut count = 0.0;
                let mut sum_x = 0.0;
                let mut sum_y = 0.0;
                let mut sum_c = [0.0f64; 3];

                for wy in y_min..=y_max {
                    for wx in x_min..=x_max {
                        let p = image.get_pixel(wx as u32, wy as u32);
                        let d0 = p[0] as f64 - color[0];
                        let d1 = p[1] as f64 - color[1];
                        let d2 = p[2] as f64 - color[2];
                        if d0 * d0 + d1 * d1 + d2 * d2 <= sr_sq {
                            count += 1.0;
                            sum_x += wx as f64;
                            sum_y += wy as f64;
                            sum_c[0] += p[0] as f64;
                            sum_c[1] += p[1] as f64;
                            sum_c[2] += p[2] as f64;
                        }
                    }
                }

                if count == 0.0 {
                    break;
                }

                let nx = (sum_x / count).round() as i64;
                let ny = (sum_y / count).round() as i64;
                let new_color = [sum_c[0] / count, sum_c[1] / count, sum_c[2] / count];

                let shift = (nx - cx).abs() as f64
                    + (ny - cy).abs() as f64
                    + (new_color[0] - color[0]).abs()
                    + (new_color[1] - color[1]).abs()
                    + (new_color[2] - color[2]).abs();

                cx = nx;
                cy = ny;
                color = new_color;

                if shift <= 1.0 {
                    break;
                }
            }

            result.put_pixel(
                x0,
                y0,
                Rgb([
                    color[0].round().clamp(0.0, 255.0) as u8,
                    color[1].round().clamp(0.0, 255.0) as u8,
                    color[2].round().clamp(0.0, 255.0) as u8,
                ]),
            );
        }
    }

    result
}

/// Sigma matching an odd Gaussian kernel size when none is given
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian blur; a kernel size of 1 leaves the image untouched
pub fn gaussian_blur(gray: &GrayImage, kernel_size: u32, sigma: f32) -> GrayImage {
    if kernel_size <= 1 {
        return gray.clone();
    }

    let sigma = if sigma > 0.0 { sigma } else { sigma_for_kernel(kernel_size) };
    imageproc::filter::gaussian_blur_f32(gray, sigma)
}

/// Global Otsu threshold producing a 0/255 mask.
///
/// Pixels strictly above the level are foreground (at or below when
/// `invert`). Fewer than two distinct intensities make Otsu's between-class
/// variance undefined; the fixed midpoint is used and flagged instead.
pub fn threshold_mask(gray: &GrayImage, invert: bool) -> (GrayImage, ThresholdOutcome) {
    let mut histogram = [0usize; 256];
    for p in gray.pixels() {
        histogram[p[0] as usize] += 1;
    }
    let distinct_levels = histogram.iter().filter(|&&count| count > 0).count();

    let outcome = if distinct_levels < 2 {
        ThresholdOutcome {
            level: FALLBACK_THRESHOLD,
            degenerate: true,
        }
    } else {
        ThresholdOutcome {
            level: imageproc::contrast::otsu_level(gray),
            degenerate: false,
        }
    };

    let (width, height) = gray.dimensions();
    let mut mask = GrayImage::new(width, height);
    for (x, y, p) in gray.enumerate_pixels() {
        let above = p[0] > outcome.level;
        let value = if above != invert { FOREGROUND } else { BACKGROUND };
        mask.put_pixel(x, y, Luma([value]));
    }

    (mask, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_image(width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::from_pixel(width, height, Rgb([20, 30, 25]));
        for y in 10..50 {
            for x in 20..30 {
                image.put_pixel(x, y, Rgb([230, 225, 210]));
            }
        }
        image
    }

    #[test]
    fn threshold_is_idempotent_on_binary_masks() {
        let mut mask = GrayImage::new(40, 30);
        for y in 5..25 {
            for x in 8..14 {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        mask.put_pixel(30, 3, Luma([FOREGROUND]));

        let (once, outcome) = threshold_mask(&mask, false);
        assert!(!outcome.degenerate);
        assert_eq!(once, mask);

        let (twice, _) = threshold_mask(&once, false);
        assert_eq!(twice, once);
    }

    #[test]
    fn uniform_image_uses_fallback_threshold() {
        let gray = GrayImage::from_pixel(16, 16, Luma([200]));
        let (mask, outcome) = threshold_mask(&gray, false);
        assert!(outcome.degenerate);
        assert_eq!(outcome.level, FALLBACK_THRESHOLD);
        assert!(mask.pixels().all(|p| p[0] == FOREGROUND));

        let dark = GrayImage::new(16, 16);
        let (mask, outcome) = threshold_mask(&dark, false);
        assert!(outcome.degenerate);
        assert!(mask.pixels().all(|p| p[0] == BACKGROUND));
    }

    #[test]
    fn inverted_threshold_selects_dark_pixels() {
        let mut gray = GrayImage::from_pixel(10, 10, Luma([220]));
        gray.put_pixel(4, 4, Luma([10]));
        let (mask, _) = threshold_mask(&gray, true);
        assert_eq!(mask.get_pixel(4, 4)[0], FOREGROUND);
        assert_eq!(mask.get_pixel(0, 0)[0], BACKGROUND);
    }

    #[test]
    fn mean_shift_preserves_flat_regions() {
        let image = bar_image(60, 60);
        let shifted = mean_shift_filter(&image, 3, 20.0, 5);
        assert_eq!(shifted.get_pixel(25, 30), image.get_pixel(25, 30));
        assert_eq!(shifted.get_pixel(5, 5), image.get_pixel(5, 5));
    }

    #[test]
    fn zero_radius_disables_mean_shift() {
        let image = bar_image(40, 60);
        assert_eq!(mean_shift_filter(&image, 0, 40.0, 5), image);
    }

    #[test]
    fn large_images_are_smoothed_at_reduced_size() {
        let mut image = RgbImage::from_pixel(240, 180, Rgb([20, 30, 25]));
        for y in 30..150 {
            for x in 100..130 {
                image.put_pixel(x, y, Rgb([230, 225, 210]));
            }
        }
        let config = Config {
            mean_shift_spatial_radius: 8,
            mean_shift_max_dimension: 60,
            ..Config::default()
        };

        let shifted = mean_shift_smooth(&image, &config);
        assert_eq!(shifted.dimensions(), (240, 180));
        assert_eq!(shifted.get_pixel(5, 5), image.get_pixel(5, 5));

        let result = preprocess(&image, &config).unwrap();
        assert_eq!(result.mask.get_pixel(115, 90)[0], FOREGROUND);
        assert_eq!(result.mask.get_pixel(20, 90)[0], BACKGROUND);
    }

    #[test]
    fn sigma_follows_kernel_size() {
        assert!((sigma_for_kernel(3) - 0.8).abs() < 1e-6);
        assert!((sigma_for_kernel(5) - 1.1).abs() < 1e-6);
    }

    #[test]
    fn preprocess_separates_bright_bar() {
        let config = Config {
            mean_shift_spatial_radius: 2,
            ..Config::default()
        };
        let result = preprocess(&bar_image(60, 60), &config).unwrap();
        assert_eq!(result.mask.dimensions(), (60, 60));
        assert_eq!(result.mask.get_pixel(25, 30)[0], FOREGROUND);
        assert_eq!(result.mask.get_pixel(5, 5)[0], BACKGROUND);
        assert!(!result.threshold.degenerate);
    }

    #[test]
    fn zero_area_image_is_rejected() {
        let image = RgbImage::new(0, 10);
        assert!(matches!(
            preprocess(&image, &Config::default()),
            Err(SproutError::InvalidImage(_))
        ));
    }
}
