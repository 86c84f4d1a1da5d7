use image::{Rgb, RgbImage};
use sprout_length_rust_lib::Config;

pub const BACKGROUND_RGB: Rgb<u8> = Rgb([25, 30, 28]);
pub const SPROUT_RGB: Rgb<u8> = Rgb([225, 220, 205]);

/// Dark image with bright axis-aligned bars given as `(x, y, width, height)`.
pub fn bars_image(width: u32, height: u32, bars: &[(u32, u32, u32, u32)]) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, BACKGROUND_RGB);
    for &(x0, y0, w, h) in bars {
        for y in y0..(y0 + h).min(height) {
            for x in x0..(x0 + w).min(width) {
                image.put_pixel(x, y, SPROUT_RGB);
            }
        }
    }
    image
}

/// Default configuration with a small mean shift window to keep tests fast.
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        mean_shift_spatial_radius: 3,
        ..Config::default()
    }
}
