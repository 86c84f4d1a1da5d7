// src/simplification.rs - Douglas-Peucker polyline simplification

/// Simplify an ordered path with the Douglas-Peucker algorithm.
///
/// The result is a subsequence of `path` that keeps both endpoints. A point
/// survives only if it lies strictly farther than `tolerance` from the chord
/// of the span it splits. A non-positive tolerance returns the path as is,
/// and paths with fewer than three points are never changed.
pub fn simplify(path: &[(u32, u32)], tolerance: f64) -> Vec<(u32, u32)> {
    if path.len() < 3 || tolerance.is_nan() || tolerance <= 0.0 {
        return path.to_vec();
    }

    let last = path.len() - 1;
    let mut keep = vec![false; path.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0usize, last)];
    while let Some((first, end)) = stack.pop() {
        if end <= first + 1 {
            continue;
        }

        let mut max_distance = 0.0;
        let mut split = first;
        for i in (first + 1)..end {
            let d = segment_distance(path[i], path[first], path[end]);
            if d > max_distance {
                max_distance = d;
                split = i;
            }
        }

        if max_distance > tolerance {
            keep[split] = true;
            stack.push((first, split));
            stack.push((split, end));
        }
    }

    let simplified: Vec<(u32, u32)> = path
        .iter()
        .enumerate()
        .filter(|(i, _)| keep[*i])
        .map(|(_, &p)| p)
        .collect();

    simplified
}

/// Distance from `p` to the segment `a`-`b`
fn segment_distance(p: (u32, u32), a: (u32, u32), b: (u32, u32)) -> f64 {
    let (px, py) = (p.0 as f64, p.1 as f64);
    let (ax, ay) = (a.0 as f64, a.1 as f64);
    let (bx, by) = (b.0 as f64, b.1 as f64);

    let (dx, dy) = (bx - ax, by - ay);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }

    let t = (((px - ax) * dx + (py - ay) * dy) / length_sq).clamp(0.0, 1.0);
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zigzag() -> Vec<(u32, u32)> {
        (0..40).map(|x| (x, if x % 10 < 5 { 10 + x % 5 } else { 15 - x % 5 })).collect()
    }

    fn is_subsequence(sub: &[(u32, u32)], full: &[(u32, u32)]) -> bool {
        let mut it = full.iter();
        sub.iter().all(|p| it.any(|q| q == p))
    }

    #[test]
    fn straight_line_keeps_only_endpoints() {
        let path: Vec<(u32, u32)> = (0..20).map(|i| (i, 2 * i)).collect();
        assert_eq!(simplify(&path, 0.5), vec![(0, 0), (19, 38)]);
    }

    #[test]
    fn result_is_ordered_subsequence() {
        let path = zigzag();
        for &tolerance in &[0.5, 1.0, 2.0, 4.0] {
            let simplified = simplify(&path, tolerance);
            assert!(is_subsequence(&simplified, &path));
            assert_eq!(simplified.first(), path.first());
            assert_eq!(simplified.last(), path.last());
        }
    }

    #[test]
    fn zero_tolerance_returns_input() {
        let path = zigzag();
        assert_eq!(simplify(&path, 0.0), path);
        assert_eq!(simplify(&path, -1.0), path);
    }

    #[test]
    fn infinite_tolerance_returns_endpoints() {
        let path = zigzag();
        assert_eq!(simplify(&path, f64::INFINITY), vec![path[0], path[path.len() - 1]]);
    }

    #[test]
    fn corner_survives() {
        let mut path: Vec<(u32, u32)> = (0..=10).map(|x| (x, 0)).collect();
        path.extend((1..=10).map(|y| (10, y)));
        assert_eq!(simplify(&path, 2.0), vec![(0, 0), (10, 0), (10, 10)]);
    }

    #[test]
    fn endpoints_survive_any_tolerance() {
        let path: Vec<(u32, u32)> = (0..40).map(|i| (i, if i % 2 == 0 { 0 } else { 3 })).collect();
        for tolerance in [0.5, 1.0, 2.9, 3.0, 50.0, f64::INFINITY] {
            let simplified = simplify(&path, tolerance);
            assert_eq!(simplified.first(), Some(&(0, 0)), "tolerance {}", tolerance);
            assert_eq!(simplified.last(), Some(&(39, 3)), "tolerance {}", tolerance);
        }
    }

    #[test]
    fn point_on_tolerance_is_dropped() {
        let path = vec![(0, 0), (5, 2), (10, 0)];
        assert_eq!(simplify(&path, 2.0), vec![(0, 0), (10, 0)]);
        assert_eq!(simplify(&path, 1.9), path);
    }

    #[test]
    fn short_paths_are_unchanged() {
        assert!(simplify(&[], 2.0).is_empty());
        assert_eq!(simplify(&[(1, 1), (5, 5)], 2.0), vec![(1, 1), (5, 5)]);
    }
}
