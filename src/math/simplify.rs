//! Douglas-Peucker polyline simplification.

use super::distance_2d::point_to_segment_dist;
use super::polygon_2d::rotate_to_canonical_start;
use super::Point2;

/// Simplifies a closed polygon, dropping vertices that deviate from the
/// simplified outline by no more than `tolerance`.
///
/// The ring is rotated to start at its leftmost vertex, split there and at
/// the vertex farthest from it, and each half is simplified as an open
/// polyline. Rings that would collapse below three vertices are returned
/// unchanged.
#[must_use]
pub fn simplify_closed(points: &[Point2], tolerance: f64) -> Vec<Point2> {
    let n = points.len();
    if n <= 3 || tolerance <= 0.0 {
        return points.to_vec();
    }

    let points = rotate_to_canonical_start(points);
    let anchor = points[0];
    let mut split = 0;
    let mut best = -1.0;
    for (i, pt) in points.iter().enumerate().skip(1) {
        let d = (pt - anchor).norm_squared();
        if d > best {
            best = d;
            split = i;
        }
    }

    let mut ring = points.clone();
    ring.push(anchor);

    let mut keep = vec![false; ring.len()];
    keep[0] = true;
    keep[split] = true;
    keep[n] = true;
    mark(&ring, 0, split, tolerance, &mut keep);
    mark(&ring, split, n, tolerance, &mut keep);

    let simplified: Vec<Point2> = ring[..n]
        .iter()
        .zip(&keep)
        .filter_map(|(pt, &k)| k.then_some(*pt))
        .collect();

    if simplified.len() < 3 {
        return points;
    }
    simplified
}

/// Marks the vertices strictly between `first` and `last` that must be kept.
///
/// Iterative to keep deep staircase outlines off the call stack.
fn mark(points: &[Point2], first: usize, last: usize, tolerance: f64, keep: &mut [bool]) {
    let mut stack = vec![(first, last)];
    while let Some((a, b)) = stack.pop() {
        if b <= a + 1 {
            continue;
        }
        let mut index = a;
        let mut max_dist = 0.0;
        for i in (a + 1)..b {
            let d = point_to_segment_dist(&points[i], &points[a], &points[b]);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }
        if max_dist > tolerance {
            keep[index] = true;
            stack.push((a, index));
            stack.push((index, b));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collinear_points_are_removed() {
        let mut ring: Vec<Point2> = (0..=10).map(|i| Point2::new(f64::from(i), 0.0)).collect();
        ring.push(Point2::new(0.0, 5.0));
        let out = simplify_closed(&ring, 0.1);
        assert_eq!(out.len(), 3);
        assert!(out.iter().any(|p| (p.x - 10.0).abs() < 1e-12));
    }

    #[test]
    fn significant_corner_is_kept() {
        let ring = vec![
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(5.0, 5.0),
            Point2::new(2.5, 2.6),
        ];
        // The last vertex sits about 0.07 off the diagonal.
        assert_eq!(simplify_closed(&ring, 0.25).len(), 3);
        assert_eq!(simplify_closed(&ring, 0.01).len(), 4);
    }

    #[test]
    fn staircase_square_reduces_to_corners() {
        // A 4x4 square sampled every 0.5 along each side.
        let mut ring = Vec::new();
        for i in 0..8 {
            ring.push(Point2::new(f64::from(i) * 0.5, 0.0));
        }
        for i in 0..8 {
            ring.push(Point2::new(4.0, f64::from(i) * 0.5));
        }
        for i in 0..8 {
            ring.push(Point2::new(4.0 - f64::from(i) * 0.5, 4.0));
        }
        for i in 0..8 {
            ring.push(Point2::new(0.0, 4.0 - f64::from(i) * 0.5));
        }
        let out = simplify_closed(&ring, 0.25);
        assert_eq!(out.len(), 4, "got {out:?}");
    }

    #[test]
    fn triangle_is_left_alone() {
        let tri = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        assert_eq!(simplify_closed(&tri, 10.0), tri);
    }
}
