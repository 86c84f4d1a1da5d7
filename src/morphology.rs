use image::{GrayImage, Luma};
use std::collections::VecDeque;

use crate::config::MorphologyShape;
use crate::image_utils::{
    foreground_at, in_bounds, is_foreground, structuring_element, FOREGROUND, NEIGHBORS_8,
};

/// Binary erosion: a pixel stays foreground only if every in-bounds
/// structuring element cell is foreground. Out-of-bounds cells are ignored.
pub fn erode_mask(mask: &GrayImage, element: &[(i32, i32)]) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut result = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            if !is_foreground(mask.get_pixel(x, y)) {
                continue;
            }

            let mut erode = false;
            for &(dx, dy) in element {
                let img_x = x as i32 + dx;
                let img_y = y as i32 + dy;

                if in_bounds(img_x, img_y, width, height)
                    && !is_foreground(mask.get_pixel(img_x as u32, img_y as u32))
                {
                    erode = true;
                    break;
                }
            }

            if !erode {
                result.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    result
}

/// Binary dilation: a pixel becomes foreground if any structuring element
/// cell covers a foreground pixel.
pub fn dilate_mask(mask: &GrayImage, element: &[(i32, i32)]) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut result = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let dilate = element
                .iter()
                .any(|&(dx, dy)| foreground_at(mask, x as i32 - dx, y as i32 - dy));

            if dilate {
                result.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    result
}

/// Apply morphological opening (erosion followed by dilation)
pub fn open_mask(mask: &GrayImage, shape: MorphologyShape, kernel_size: u32) -> GrayImage {
    let element = structuring_element(shape, kernel_size);
    let eroded = erode_mask(mask, &element);
    dilate_mask(&eroded, &element)
}

/// Apply morphological closing (dilation followed by erosion)
pub fn close_mask(mask: &GrayImage, shape: MorphologyShape, kernel_size: u32) -> GrayImage {
    let element = structuring_element(shape, kernel_size);
    let dilated = dilate_mask(mask, &element);
    erode_mask(&dilated, &element)
}

/// Fill background areas that are not 4-connected to the mask border
pub fn fill_holes(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut outside = vec![false; (width * height) as usize];
    let mut queue = VecDeque::new();

    let seed = |x: u32, y: u32, outside: &mut Vec<bool>, queue: &mut VecDeque<(u32, u32)>| {
        let idx = (y * width + x) as usize;
        if !outside[idx] && !is_foreground(mask.get_pixel(x, y)) {
            outside[idx] = true;
            queue.push_back((x, y));
        }
    };

    for x in 0..width {
        seed(x, 0, &mut outside, &mut queue);
        if height > 1 {
            seed(x, height - 1, &mut outside, &mut queue);
        }
    }
    for y in 0..height {
        seed(0, y, &mut outside, &mut queue);
        if width > 1 {
            seed(width - 1, y, &mut outside, &mut queue);
        }
    }

    // Background is 4-connected so that diagonal gaps in an 8-connected
    // foreground outline do not leak
    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if in_bounds(nx, ny, width, height) {
                seed(nx as u32, ny as u32, &mut outside, &mut queue);
            }
        }
    }

    let mut filled = mask.clone();
    for y in 0..height {
        for x in 0..width {
            if !outside[(y * width + x) as usize] {
                filled.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    filled
}

/// Trace the outer boundary of the 8-connected foreground object whose
/// first pixel in raster order is `start`, using Moore-neighbour tracing.
///
/// The returned points are in tracing order without closing the loop. A
/// thin part is visited once per side, so boundary points may repeat.
pub fn trace_boundary(mask: &GrayImage, start: (u32, u32)) -> Vec<(u32, u32)> {
    let mut contour = vec![start];

    // `start` is the raster-first pixel, so its west neighbour is background
    // and the search begins from there (index 4 in NEIGHBORS_8).
    let first = match next_boundary_pixel(mask, start, 4) {
        Some(step) => step,
        None => return contour, // isolated pixel
    };

    let max_contour_size = 8 * (mask.width() as usize) * (mask.height() as usize);
    let (mut pixel, mut backtrack) = first;

    loop {
        // Jacob's stopping criterion: stop once the start pixel would be left
        // the same way it was left the first time
        if pixel == start {
            match next_boundary_pixel(mask, start, backtrack) {
                Some(step) if step == first => break,
                Some(_) => {}
                None => break,
            }
        }

        contour.push(pixel);

        if contour.len() > max_contour_size {
            log::warn!("Boundary tracing from {:?} exceeded {} points, stopping early", start, max_contour_size);
            break;
        }

        match next_boundary_pixel(mask, pixel, backtrack) {
            Some((next, back)) => {
                pixel = next;
                backtrack = back;
            }
            None => break,
        }
    }

    contour
}

/// Scan the Moore neighbourhood of `pixel` clockwise starting after
/// `backtrack` (a background neighbour index). Returns the next boundary
/// pixel and the neighbour index of the background cell examined just before it,
/// expressed relative to the new pixel.
fn next_boundary_pixel(mask: &GrayImage, pixel: (u32, u32), backtrack: usize) -> Option<((u32, u32), usize)> {
    // NEIGHBORS_8 is counter-clockwise on screen (y down), so step backwards
    // through it to walk clockwise.
    let mut prev = backtrack;
    for i in 1..=8 {
        let idx = (backtrack + 8 - i) % 8;
        let (dx, dy) = NEIGHBORS_8[idx];
        let nx = pixel.0 as i32 + dx;
        let ny = pixel.1 as i32 + dy;

        if foreground_at(mask, nx, ny) {
            let next = (nx as u32, ny as u32);
            // Position of the previously examined (background) cell as seen from `next`
            let (pdx, pdy) = NEIGHBORS_8[prev];
            let bx = pixel.0 as i32 + pdx - nx;
            let by = pixel.1 as i32 + pdy - ny;
            let back = NEIGHBORS_8
                .iter()
                .position(|&d| d == (bx, by))
                .unwrap_or(0);
            return Some((next, back));
        }
        prev = idx;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::BACKGROUND;

    fn mask_from_rows(rows: &[&str]) -> GrayImage {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let mut mask = GrayImage::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if c == '#' {
                    mask.put_pixel(x as u32, y as u32, Luma([FOREGROUND]));
                }
            }
        }
        mask
    }

    #[test]
    fn opening_removes_isolated_pixel() {
        let mask = mask_from_rows(&[
            ".....",
            ".....",
            "..#..",
            ".....",
            ".....",
        ]);
        let opened = open_mask(&mask, MorphologyShape::Rect, 3);
        assert!(opened.pixels().all(|p| p[0] == BACKGROUND));
    }

    #[test]
    fn closing_fills_single_pixel_hole() {
        let mask = mask_from_rows(&[
            ".......",
            ".#####.",
            ".#####.",
            ".##.##.",
            ".#####.",
            ".#####.",
            ".......",
        ]);
        let closed = close_mask(&mask, MorphologyShape::Ellipse, 3);
        assert_eq!(closed.get_pixel(3, 3)[0], FOREGROUND);
        assert_eq!(closed.get_pixel(0, 0)[0], BACKGROUND);
    }

    #[test]
    fn opening_keeps_large_block() {
        let mask = mask_from_rows(&[
            "........",
            ".######.",
            ".######.",
            ".######.",
            ".######.",
            "........",
        ]);
        let opened = open_mask(&mask, MorphologyShape::Rect, 3);
        assert_eq!(opened, mask);
    }

    #[test]
    fn fill_holes_closes_ring() {
        let mask = mask_from_rows(&[
            ".....",
            ".###.",
            ".#.#.",
            ".###.",
            ".....",
        ]);
        let filled = fill_holes(&mask);
        assert_eq!(filled.get_pixel(2, 2)[0], FOREGROUND);
        assert_eq!(filled.get_pixel(0, 0)[0], BACKGROUND);
    }

    #[test]
    fn trace_square_boundary() {
        let mask = mask_from_rows(&[
            ".....",
            ".###.",
            ".###.",
            ".###.",
            ".....",
        ]);
        let contour = trace_boundary(&mask, (1, 1));
        assert_eq!(contour.len(), 8);
        assert_eq!(contour[0], (1, 1));
        assert!(!contour.contains(&(2, 2)));
        let mut unique = contour.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn trace_single_pixel() {
        let mask = mask_from_rows(&["...", ".#.", "..."]);
        assert_eq!(trace_boundary(&mask, (1, 1)), vec![(1, 1)]);
    }

    #[test]
    fn trace_thin_line_visits_both_sides() {
        let mask = mask_from_rows(&["#####"]);
        let contour = trace_boundary(&mask, (0, 0));
        // Out along the line and back again
        assert_eq!(contour.len(), 8);
        assert_eq!(contour[0], (0, 0));
        assert_eq!(contour[4], (4, 0));
    }
}
