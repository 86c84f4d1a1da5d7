// src/regions.rs - Candidate sprout regions and their reading order

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::BTreeMap;

use crate::config::Config;
use crate::image_utils::{foreground_at, foreground_points, is_foreground, FOREGROUND};
use crate::morphology::{fill_holes, trace_boundary};

/// Axis-aligned pixel bounds of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One detected sprout candidate
#[derive(Debug, Clone)]
pub struct SproutRegion {
    /// 1-based position in row-major reading order
    pub index: usize,
    /// Outer boundary in image coordinates, in tracing order
    pub contour: Vec<(u32, u32)>,
    /// Polygon area enclosed by `contour`
    pub area: f64,
    pub centroid: (f64, f64),
    pub bounds: BoundingBox,
    /// Filled region mask, local to `bounds`
    pub mask: GrayImage,
}

impl SproutRegion {
    /// Top-left corner of the local mask in image coordinates
    pub fn origin(&self) -> (u32, u32) {
        (self.bounds.x, self.bounds.y)
    }

    /// Whether an image coordinate lies inside the filled region
    pub fn contains(&self, x: i64, y: i64) -> bool {
        let lx = x - self.bounds.x as i64;
        let ly = y - self.bounds.y as i64;
        if lx < 0 || ly < 0 || lx >= self.bounds.width as i64 || ly >= self.bounds.height as i64 {
            return false;
        }
        foreground_at(&self.mask, lx as i32, ly as i32)
    }
}

#[derive(Debug, Clone, Copy)]
struct ComponentStats {
    first: (u32, u32),
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

/// Find, filter and number the sprout regions of a binary mask.
///
/// Only outer boundaries count: holes are filled and anything inside a hole
/// of another component is ignored. Regions with a boundary polygon area
/// below `min_contour_area` are dropped. An empty result is not an error.
pub fn extract_regions(mask: &GrayImage, config: &Config) -> Vec<SproutRegion> {
    let (width, height) = mask.dimensions();
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut components: BTreeMap<u32, ComponentStats> = BTreeMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        components
            .entry(label)
            .and_modify(|c| {
                c.min_x = c.min_x.min(x);
                c.min_y = c.min_y.min(y);
                c.max_x = c.max_x.max(x);
                c.max_y = c.max_y.max(y);
            })
            .or_insert(ComponentStats {
                first: (x, y),
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            });
    }

    // Outer components always start before the ones nested in their holes
    let mut ordered: Vec<(u32, ComponentStats)> = components.into_iter().collect();
    ordered.sort_by_key(|(_, c)| (c.first.1, c.first.0));

    let mut claimed = vec![false; (width as usize) * (height as usize)];
    let mut regions = Vec::new();

    for (label, stats) in ordered {
        let first_idx = (stats.first.1 as usize) * (width as usize) + stats.first.0 as usize;
        if claimed[first_idx] {
            log::debug!("Skipping component nested inside another region at {:?}", stats.first);
            continue;
        }

        let bounds = BoundingBox {
            x: stats.min_x,
            y: stats.min_y,
            width: stats.max_x - stats.min_x + 1,
            height: stats.max_y - stats.min_y + 1,
        };

        let mut local = GrayImage::new(bounds.width, bounds.height);
        for ly in 0..bounds.height {
            for lx in 0..bounds.width {
                if labels.get_pixel(bounds.x + lx, bounds.y + ly)[0] == label {
                    local.put_pixel(lx, ly, Luma([FOREGROUND]));
                }
            }
        }
        let filled = fill_holes(&local);

        for (lx, ly, p) in filled.enumerate_pixels() {
            if is_foreground(p) {
                let gx = (bounds.x + lx) as usize;
                let gy = (bounds.y + ly) as usize;
                claimed[gy * width as usize + gx] = true;
            }
        }

        let start = (stats.first.0 - bounds.x, stats.first.1 - bounds.y);
        let contour: Vec<(u32, u32)> = trace_boundary(&filled, start)
            .into_iter()
            .map(|(x, y)| (x + bounds.x, y + bounds.y))
            .collect();

        let area = polygon_area(&contour);
        if area < config.min_contour_area {
            log::debug!("Discarding component at {:?}: area {:.1} < {:.1}",
                stats.first, area, config.min_contour_area);
            continue;
        }

        let centroid = polygon_centroid(&contour).unwrap_or_else(|| mask_centroid(&filled, bounds));

        regions.push(SproutRegion {
            index: 0,
            contour,
            area,
            centroid,
            bounds,
            mask: filled,
        });
    }

    order_regions(&mut regions, height as f64 * config.row_tolerance_ratio);
    regions
}

/// Absolute shoelace area of a closed polygon
pub fn polygon_area(points: &[(u32, u32)]) -> f64 {
    signed_area(points).abs()
}

fn signed_area(points: &[(u32, u32)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    for i in 0..points.len() {
        let (x0, y0) = (points[i].0 as f64, points[i].1 as f64);
        let next = points[(i + 1) % points.len()];
        let (x1, y1) = (next.0 as f64, next.1 as f64);
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

/// Centroid of a closed polygon from its first-order moments.
/// Returns `None` for polygons without area.
pub fn polygon_centroid(points: &[(u32, u32)]) -> Option<(f64, f64)> {
    let area = signed_area(points);
    if area.abs() < 1e-9 {
        return None;
    }

    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..points.len() {
        let (x0, y0) = (points[i].0 as f64, points[i].1 as f64);
        let next = points[(i + 1) % points.len()];
        let (x1, y1) = (next.0 as f64, next.1 as f64);
        let cross = x0 * y1 - x1 * y0;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }

    Some((cx / (6.0 * area), cy / (6.0 * area)))
}

fn mask_centroid(mask: &GrayImage, bounds: BoundingBox) -> (f64, f64) {
    let points = foreground_points(mask);
    if points.is_empty() {
        return (bounds.x as f64, bounds.y as f64);
    }
    let n = points.len() as f64;
    let sx: f64 = points.iter().map(|p| p.0 as f64).sum();
    let sy: f64 = points.iter().map(|p| p.1 as f64).sum();
    (bounds.x as f64 + sx / n, bounds.y as f64 + sy / n)
}

/// Disjoint-set forest over region indices
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Group regions into rows and assign 1-based indices in reading order.
///
/// Two regions share a row when their centroid rows differ by less than
/// `row_tolerance` pixels; the relation is closed transitively. Rows run
/// top to bottom by mean centroid y, regions within a row left to right.
pub fn order_regions(regions: &mut Vec<SproutRegion>, row_tolerance: f64) {
    let n = regions.len();
    let mut sets = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if (regions[i].centroid.1 - regions[j].centroid.1).abs() < row_tolerance {
                sets.union(i, j);
            }
        }
    }

    let mut rows: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        let root = sets.find(i);
        rows.entry(root).or_default().push(i);
    }

    let mut rows: Vec<(f64, f64, Vec<usize>)> = rows
        .into_values()
        .map(|mut members| {
            members.sort_by(|&a, &b| {
                let (ax, ay) = regions[a].centroid;
                let (bx, by) = regions[b].centroid;
                ax.total_cmp(&bx).then(ay.total_cmp(&by))
            });
            let mean_y = members.iter().map(|&i| regions[i].centroid.1).sum::<f64>()
                / members.len() as f64;
            let min_x = regions[members[0]].centroid.0;
            (mean_y, min_x, members)
        })
        .collect();
    rows.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let order: Vec<usize> = rows.into_iter().flat_map(|(_, _, members)| members).collect();

    let mut slots: Vec<Option<SproutRegion>> = regions.drain(..).map(Some).collect();
    for (position, &i) in order.iter().enumerate() {
        if let Some(mut region) = slots[i].take() {
            region.index = position + 1;
            regions.push(region);
        }
    }
}
