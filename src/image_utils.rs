use image::{GrayImage, Luma};

use crate::config::MorphologyShape;

/// Mask value for foreground pixels
pub const FOREGROUND: u8 = 255;

/// Mask value for background pixels
pub const BACKGROUND: u8 = 0;

/// 8-neighbourhood offsets, counter-clockwise starting east (y grows downward)
pub const NEIGHBORS_8: [(i32, i32); 8] = [
    (1, 0),   // east
    (1, -1),  // north-east
    (0, -1),  // north
    (-1, -1), // north-west
    (-1, 0),  // west
    (-1, 1),  // south-west
    (0, 1),   // south
    (1, 1),   // south-east
];

/// Check if a mask pixel is foreground
#[inline]
pub fn is_foreground(pixel: &Luma<u8>) -> bool {
    pixel[0] > BACKGROUND
}

/// Check if a point is inside the image bounds
#[inline]
pub fn in_bounds(x: i32, y: i32, width: u32, height: u32) -> bool {
    x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height
}

/// Foreground test that treats everything outside the mask as background
#[inline]
pub fn foreground_at(mask: &GrayImage, x: i32, y: i32) -> bool {
    let (width, height) = mask.dimensions();
    in_bounds(x, y, width, height) && is_foreground(mask.get_pixel(x as u32, y as u32))
}

/// Coordinates of all foreground pixels in raster order
pub fn foreground_points(mask: &GrayImage) -> Vec<(u32, u32)> {
    mask.enumerate_pixels()
        .filter(|(_, _, p)| is_foreground(p))
        .map(|(x, y, _)| (x, y))
        .collect()
}

/// Euclidean distance between two pixel coordinates
#[inline]
pub fn distance(a: (u32, u32), b: (u32, u32)) -> f64 {
    let dx = a.0 as f64 - b.0 as f64;
    let dy = a.1 as f64 - b.1 as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Offsets (relative to the centre) of a structuring element
///
/// Ellipse elements use the same disc rule as a circular kernel: a cell is set
/// when its centre lies within `((size - 1) / 2)^2` of the kernel centre, so a
/// 3x3 ellipse is a cross.
pub fn structuring_element(shape: MorphologyShape, size: u32) -> Vec<(i32, i32)> {
    if size == 0 {
        return Vec::new();
    }

    let radius = (size / 2) as i32;
    let radius_sq = ((size - 1) as f32 / 2.0).powi(2);
    let mut offsets = Vec::with_capacity((size * size) as usize);

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let keep = match shape {
                MorphologyShape::Rect => true,
                MorphologyShape::Cross => dx == 0 || dy == 0,
                MorphologyShape::Ellipse => {
                    // Add a small epsilon for points exactly on the circumference
                    ((dx * dx + dy * dy) as f32) <= radius_sq + 1e-6
                }
            };
            if keep {
                offsets.push((dx, dy));
            }
        }
    }

    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_by_three_ellipse_is_a_cross() {
        let mut element = structuring_element(MorphologyShape::Ellipse, 3);
        element.sort();
        let mut cross = structuring_element(MorphologyShape::Cross, 3);
        cross.sort();
        assert_eq!(element, cross);
        assert_eq!(element.len(), 5);
    }

    #[test]
    fn rect_element_is_full() {
        assert_eq!(structuring_element(MorphologyShape::Rect, 5).len(), 25);
    }

    #[test]
    fn out_of_bounds_is_background() {
        let mask = GrayImage::from_pixel(2, 2, Luma([FOREGROUND]));
        assert!(foreground_at(&mask, 1, 1));
        assert!(!foreground_at(&mask, -1, 0));
        assert!(!foreground_at(&mask, 2, 0));
    }
}
