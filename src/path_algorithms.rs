// src/path_algorithms.rs - Skeleton graph, longest path and tip extension

use bresenham::Bresenham;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::image_utils::{distance, NEIGHBORS_8};
use crate::regions::SproutRegion;
use crate::skeleton::SkeletonMask;

/// Distances closer than this are treated as equal when comparing paths
const LENGTH_EPSILON: f64 = 1e-9;

/// Undirected graph over skeleton pixels.
///
/// Nodes are skeleton pixels in raster order (image coordinates). Two nodes
/// are joined when they are 8-neighbours, with weight 1 for axis steps and
/// sqrt(2) for diagonal steps.
#[derive(Debug, Clone)]
pub struct SkeletonGraph {
    nodes: Vec<(u32, u32)>,
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl SkeletonGraph {
    pub fn from_skeleton(skeleton: &SkeletonMask) -> Self {
        let (width, height) = skeleton.mask.dimensions();
        let (ox, oy) = skeleton.origin;
        let nodes = skeleton.points();

        let mut index = vec![None; (width as usize) * (height as usize)];
        for (i, &(x, y)) in nodes.iter().enumerate() {
            let (lx, ly) = ((x - ox) as usize, (y - oy) as usize);
            index[ly * width as usize + lx] = Some(i);
        }

        let adjacency = nodes
            .iter()
            .map(|&(x, y)| {
                let (lx, ly) = ((x - ox) as i32, (y - oy) as i32);
                NEIGHBORS_8
                    .iter()
                    .filter_map(|&(dx, dy)| {
                        let (nx, ny) = (lx + dx, ly + dy);
                        if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                            return None;
                        }
                        let weight = if dx != 0 && dy != 0 { std::f64::consts::SQRT_2 } else { 1.0 };
                        index[ny as usize * width as usize + nx as usize].map(|j| (j, weight))
                    })
                    .collect()
            })
            .collect();

        Self { nodes, adjacency }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, i: usize) -> (u32, u32) {
        self.nodes[i]
    }

    pub fn degree(&self, i: usize) -> usize {
        self.adjacency[i].len()
    }

    /// Nodes with exactly one neighbour
    pub fn endpoints(&self) -> Vec<usize> {
        (0..self.nodes.len()).filter(|&i| self.degree(i) == 1).collect()
    }

    /// Single-source Dijkstra.
    ///
    /// # Returns
    /// Distance to every node (infinite when unreachable) and the predecessor
    /// of each node on its shortest path from `source`
    pub fn shortest_paths(&self, source: usize) -> (Vec<f64>, Vec<Option<usize>>) {
        let mut dist = vec![f64::INFINITY; self.nodes.len()];
        let mut prev = vec![None; self.nodes.len()];
        let mut heap = BinaryHeap::new();

        dist[source] = 0.0;
        heap.push(State { cost: 0.0, node: source });

        while let Some(State { cost, node }) = heap.pop() {
            if cost > dist[node] {
                continue;
            }
            for &(next, weight) in &self.adjacency[node] {
                let candidate = cost + weight;
                if candidate < dist[next] {
                    dist[next] = candidate;
                    prev[next] = Some(node);
                    heap.push(State { cost: candidate, node: next });
                }
            }
        }

        (dist, prev)
    }
}

/// Min-heap entry for Dijkstra
#[derive(Debug, Clone, Copy)]
struct State {
    cost: f64,
    node: usize,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the longest shortest path between two endpoints of a skeleton.
///
/// Every pair of connected endpoints is considered. Equal lengths are broken
/// by the smaller `(first, second)` endpoint pair in `(x, y)` order, and the
/// path runs from the smaller endpoint to the larger one.
///
/// # Returns
/// Ordered image coordinates of the path, or an empty vector when the
/// skeleton has fewer than two endpoints or none of them are connected
pub fn longest_path(skeleton: &SkeletonMask) -> Vec<(u32, u32)> {
    let graph = SkeletonGraph::from_skeleton(skeleton);
    let mut endpoints = graph.endpoints();
    if endpoints.len() < 2 {
        log::debug!("Skeleton has {} endpoints, no path", endpoints.len());
        return Vec::new();
    }
    endpoints.sort_by_key(|&i| graph.node(i));

    // (length, source, target, predecessors from source)
    let mut best: Option<(f64, usize, usize, Vec<Option<usize>>)> = None;

    for (a, &source) in endpoints.iter().enumerate() {
        let (dist, prev) = graph.shortest_paths(source);
        let mut improved = false;

        // Later endpoints are larger, so among equal lengths the first seen wins
        for &target in &endpoints[a + 1..] {
            let length = dist[target];
            if !length.is_finite() {
                continue;
            }
            let better = match &best {
                None => true,
                Some((best_length, ..)) => length > best_length + LENGTH_EPSILON,
            };
            if better {
                best = Some((length, source, target, Vec::new()));
                improved = true;
            }
        }

        if improved {
            if let Some(entry) = best.as_mut() {
                entry.3 = prev;
            }
        }
    }

    let (length, source, target, prev) = match best {
        Some(best) => best,
        None => {
            log::debug!("No two skeleton endpoints are connected");
            return Vec::new();
        }
    };

    let mut path = vec![graph.node(target)];
    let mut current = target;
    while current != source {
        match prev[current] {
            Some(p) => {
                path.push(graph.node(p));
                current = p;
            }
            None => break,
        }
    }
    path.reverse();

    log::trace!("Longest skeleton path {:?} -> {:?}, {:.2} px", graph.node(source), graph.node(target), length);
    path
}

/// Trace a straight line path between two points using Bresenham's algorithm
///
/// # Returns
/// Pixel coordinates from `start` towards `end`, excluding `end`
pub fn trace_straight_line(start: (i64, i64), end: (i64, i64)) -> Vec<(i64, i64)> {
    Bresenham::new((start.0 as isize, start.1 as isize), (end.0 as isize, end.1 as isize))
        .map(|(x, y)| (x as i64, y as i64))
        .collect()
}

/// Extend both ends of a path straight out to the region boundary.
///
/// Thinning leaves each tip short of the outline by about half the local
/// width. Each end is continued along the direction from the point
/// `lookback` steps inside the path to the tip, for as long as the
/// continuation stays inside the filled region.
///
/// # Arguments
/// * `path` - Ordered path in image coordinates
/// * `region` - Region the path was computed for
/// * `lookback` - Number of path steps used to estimate each tip direction
///
/// # Returns
/// The extended path; paths with fewer than two points come back unchanged
pub fn extend_path_to_boundary(
    path: &[(u32, u32)],
    region: &SproutRegion,
    lookback: usize,
) -> Vec<(u32, u32)> {
    if path.len() < 2 || lookback == 0 {
        return path.to_vec();
    }

    let back = lookback.min(path.len() - 1);
    let last = path.len() - 1;

    let head = march_to_boundary(path[0], path[back], region);
    let tail = march_to_boundary(path[last], path[last - back], region);

    let mut extended = Vec::with_capacity(head.len() + path.len() + tail.len());
    extended.extend(head.into_iter().rev());
    extended.extend_from_slice(path);
    extended.extend(tail);
    extended
}

/// Pixels beyond `tip`, continuing the direction `anchor -> tip`, up to the
/// last one inside the region
fn march_to_boundary(tip: (u32, u32), anchor: (u32, u32), region: &SproutRegion) -> Vec<(u32, u32)> {
    let dx = tip.0 as i64 - anchor.0 as i64;
    let dy = tip.1 as i64 - anchor.1 as i64;
    let step = dx.abs().max(dy.abs());
    if step == 0 {
        return Vec::new();
    }

    // Far enough to cross the whole bounding box
    let reach = (region.bounds.width + region.bounds.height) as i64;
    let scale = (reach + step - 1) / step;
    let start = (tip.0 as i64, tip.1 as i64);
    let end = (start.0 + dx * scale, start.1 + dy * scale);

    trace_straight_line(start, end)
        .into_iter()
        .skip(1)
        .take_while(|&(x, y)| region.contains(x, y))
        .map(|(x, y)| (x as u32, y as u32))
        .collect()
}

/// Total Euclidean length of a polyline
pub fn path_length(path: &[(u32, u32)]) -> f64 {
    path.windows(2).map(|w| distance(w[0], w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::FOREGROUND;
    use crate::regions::BoundingBox;
    use image::{GrayImage, Luma};

    fn skeleton_from_points(width: u32, height: u32, points: &[(u32, u32)]) -> SkeletonMask {
        let mut mask = GrayImage::new(width, height);
        for &(x, y) in points {
            mask.put_pixel(x, y, Luma([FOREGROUND]));
        }
        SkeletonMask { origin: (0, 0), mask }
    }

    fn bar_region() -> SproutRegion {
        let bounds = BoundingBox { x: 95, y: 50, width: 10, height: 100 };
        SproutRegion {
            index: 1,
            contour: Vec::new(),
            area: 891.0,
            centroid: (99.5, 99.5),
            bounds,
            mask: GrayImage::from_pixel(10, 100, Luma([FOREGROUND])),
        }
    }

    #[test]
    fn straight_line_length() {
        let points: Vec<(u32, u32)> = (2..=12).map(|x| (x, 5)).collect();
        let path = longest_path(&skeleton_from_points(20, 10, &points));
        assert_eq!(path.first(), Some(&(2, 5)));
        assert_eq!(path.last(), Some(&(12, 5)));
        assert!((path_length(&path) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn spur_is_ignored() {
        let mut points: Vec<(u32, u32)> = (0..=30).map(|x| (x, 10)).collect();
        points.extend((11..=15).map(|y| (15, y)));
        let path = longest_path(&skeleton_from_points(40, 20, &points));

        assert_eq!(path.first(), Some(&(0, 10)));
        assert_eq!(path.last(), Some(&(30, 10)));
        assert!((path_length(&path) - 30.0).abs() < 1e-9);
        assert!(!path.contains(&(15, 15)));
    }

    #[test]
    fn path_is_not_shorter_than_any_endpoint_pair() {
        // Y shape: a long diagonal arm and two shorter ones
        let mut points = Vec::new();
        for i in 0..=12 {
            points.push((20 - i, 20 - i)); // north-west arm
        }
        for i in 1..=6 {
            points.push((20 + i, 20 - i)); // north-east arm
        }
        for y in 21..=30 {
            points.push((20, y)); // south arm
        }
        let skeleton = skeleton_from_points(40, 40, &points);
        let path = longest_path(&skeleton);
        let longest = path_length(&path);

        let graph = SkeletonGraph::from_skeleton(&skeleton);
        let endpoints = graph.endpoints();
        assert_eq!(endpoints.len(), 3);
        for &a in &endpoints {
            let (dist, _) = graph.shortest_paths(a);
            for &b in &endpoints {
                assert!(dist[b] <= longest + 1e-9);
            }
        }
        assert_eq!(path.first(), Some(&(8, 8)));
        assert_eq!(path.last(), Some(&(20, 30)));
    }

    #[test]
    fn equal_lengths_pick_smallest_endpoint_pair() {
        // Plus sign with equal arms: both straight pairs measure 10
        let mut points = Vec::new();
        for i in 5..=15 {
            points.push((i, 10));
            if i != 10 {
                points.push((10, i));
            }
        }
        let path = longest_path(&skeleton_from_points(21, 21, &points));
        assert_eq!(path.first(), Some(&(5, 10)));
        assert_eq!(path.last(), Some(&(15, 10)));
        assert!((path_length(&path) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn loop_without_endpoints_has_no_path() {
        let mut points = Vec::new();
        for i in 2..=8 {
            points.push((i, 2));
            points.push((i, 8));
            points.push((2, i));
            points.push((8, i));
        }
        assert!(longest_path(&skeleton_from_points(11, 11, &points)).is_empty());
    }

    #[test]
    fn single_pixel_has_no_path() {
        assert!(longest_path(&skeleton_from_points(3, 3, &[(1, 1)])).is_empty());
        assert!(longest_path(&skeleton_from_points(3, 3, &[])).is_empty());
    }

    #[test]
    fn two_pixels_form_a_path() {
        let path = longest_path(&skeleton_from_points(3, 3, &[(0, 0), (1, 1)]));
        assert_eq!(path, vec![(0, 0), (1, 1)]);
        assert!((path_length(&path) - std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn extension_reaches_region_ends() {
        let region = bar_region();
        let path: Vec<(u32, u32)> = (55..=144).map(|y| (99, y)).collect();
        let extended = extend_path_to_boundary(&path, &region, 8);

        assert_eq!(extended.first(), Some(&(99, 50)));
        assert_eq!(extended.last(), Some(&(99, 149)));
        assert!((path_length(&extended) - 99.0).abs() < 1e-9);
        assert!(extended.iter().all(|&(x, y)| region.contains(x as i64, y as i64)));
    }

    #[test]
    fn extension_leaves_short_paths_alone() {
        let region = bar_region();
        assert_eq!(extend_path_to_boundary(&[(99, 60)], &region, 8), vec![(99, 60)]);
        let path = vec![(99, 60), (99, 61)];
        assert_eq!(extend_path_to_boundary(&path, &region, 0), path);
    }

    #[test]
    fn path_length_of_degenerate_paths() {
        assert_eq!(path_length(&[]), 0.0);
        assert_eq!(path_length(&[(3, 4)]), 0.0);
        assert!((path_length(&[(0, 0), (3, 4)]) - 5.0).abs() < 1e-9);
    }
}
