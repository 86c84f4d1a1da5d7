// src/skeleton.rs - One-pixel-wide skeletons of filled region masks

use image::{GrayImage, Luma};

use crate::image_utils::{foreground_at, foreground_points, is_foreground, BACKGROUND, NEIGHBORS_8};
use crate::regions::SproutRegion;

/// Thinned region mask, local to the region's bounding extent
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonMask {
    /// Image coordinate of the local mask's top-left corner
    pub origin: (u32, u32),
    pub mask: GrayImage,
}

impl SkeletonMask {
    /// Skeleton pixels in image coordinates, raster order
    pub fn points(&self) -> Vec<(u32, u32)> {
        foreground_points(&self.mask)
            .into_iter()
            .map(|(x, y)| (x + self.origin.0, y + self.origin.1))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        !self.mask.pixels().any(is_foreground)
    }
}

/// Border directions visited by each thinning round, in order
const PASS_DIRECTIONS: [(i32, i32); 4] = [
    (0, -1), // north
    (0, 1),  // south
    (1, 0),  // east
    (-1, 0), // west
];

/// Skeletonize the filled mask of one region
pub fn skeletonize_region(region: &SproutRegion) -> SkeletonMask {
    skeletonize(&region.mask, region.origin())
}

/// Reduce a binary mask to a one-pixel-wide skeleton.
///
/// Directional sequential thinning: every round makes one pass per border
/// direction. A pass collects the foreground pixels whose neighbour in that
/// direction is background, then deletes them in raster order if they are
/// still simple and not end points. Rounds repeat until nothing changes.
/// Deleting only simple points keeps connectivity and holes intact, and the
/// fixed pass and raster order make the result deterministic.
pub fn skeletonize(mask: &GrayImage, origin: (u32, u32)) -> SkeletonMask {
    let mut work = mask.clone();
    let (width, height) = work.dimensions();

    loop {
        let mut changed = false;

        for &(dx, dy) in &PASS_DIRECTIONS {
            let mut candidates = Vec::new();
            for y in 0..height {
                for x in 0..width {
                    if is_foreground(work.get_pixel(x, y))
                        && !foreground_at(&work, x as i32 + dx, y as i32 + dy)
                    {
                        candidates.push((x, y));
                    }
                }
            }

            for (x, y) in candidates {
                if neighbor_count(&work, x, y) > 1 && is_simple(&work, x, y) {
                    work.put_pixel(x, y, Luma([BACKGROUND]));
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }

    SkeletonMask { origin, mask: work }
}

/// Number of foreground pixels among the 8 neighbours
pub fn neighbor_count(mask: &GrayImage, x: u32, y: u32) -> usize {
    NEIGHBORS_8
        .iter()
        .filter(|&&(dx, dy)| foreground_at(mask, x as i32 + dx, y as i32 + dy))
        .count()
}

/// A border pixel is simple when deleting it changes neither the
/// 8-connected foreground nor the 4-connected background topology, i.e. its
/// 8-connectivity number is exactly one.
fn is_simple(mask: &GrayImage, x: u32, y: u32) -> bool {
    let mut background = [false; 8];
    for (k, &(dx, dy)) in NEIGHBORS_8.iter().enumerate() {
        background[k] = !foreground_at(mask, x as i32 + dx, y as i32 + dy);
    }

    let connectivity: u32 = [0usize, 2, 4, 6]
        .iter()
        .map(|&k| {
            let a = background[k];
            let b = background[(k + 1) % 8];
            let c = background[(k + 2) % 8];
            (a && !(b && c)) as u32
        })
        .sum();

    connectivity == 1
}
