//! Per-direction dilation built from one-sided distance transforms.
//!
//! The structuring element is the union, over the eight octants, of an
//! ellipsoid octant whose semi-axes are the requested reach toward that
//! octant's sides. Within one octant the metric is separable, so it is
//! computed exactly by one-sided passes with each axis' spacing divided by
//! its reach; a voxel is reached when the normalized distance is at most 1.

use tracing::debug;

use super::THRESHOLD_EPS;
use crate::grid::Mask3D;
use crate::operations::distance_transform::{AxisPass, DistanceTransform, Sweep};
use crate::operations::seed;

/// Grows `mask` by a per-side reach; the result lives on the same grid.
///
/// `negative[a]` is the reach in mm toward −a, `positive[a]` toward +a. A
/// zero reach stops growth toward that side. The caller pads the grid so the
/// grown shape fits.
pub(crate) fn dilate(mask: &Mask3D, negative: [f64; 3], positive: [f64; 3]) -> Mask3D {
    let grid = *mask.grid();
    let res = grid.resolution();

    let mut octants: Vec<[Option<AxisPass>; 3]> = Vec::with_capacity(8);
    for bits in 0..8_u8 {
        let mut passes = [None; 3];
        for (axis, pass) in passes.iter_mut().enumerate() {
            let toward_positive = bits & (1 << axis) != 0;
            let reach = if toward_positive {
                positive[axis]
            } else {
                negative[axis]
            };
            if reach > 0.0 {
                *pass = Some(AxisPass {
                    resolution: res[axis] / reach,
                    // Growth toward +a comes from sources at lower indices.
                    sweep: if toward_positive {
                        Sweep::Forward
                    } else {
                        Sweep::Backward
                    },
                });
            }
        }
        if !octants.contains(&passes) {
            octants.push(passes);
        }
    }
    debug!(octants = octants.len(), ?negative, ?positive, "directional dilation");

    let seeded = seed::inside_zero(mask);
    let limit = 1.0 + THRESHOLD_EPS;
    let mut result = mask.clone();
    for passes in octants {
        let mut field = seeded.clone();
        let transform = passes
            .iter()
            .enumerate()
            .fold(DistanceTransform::new(res), |t, (axis, pass)| {
                t.with_axis(axis, *pass)
            });
        transform.execute(&mut field);
        for (out, &d) in result.as_mut_slice().iter_mut().zip(field.as_slice()) {
            if f64::from(d) <= limit {
                *out = 1;
            }
        }
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ResourceLimits;
    use crate::grid::Grid;
    use crate::math::{Point3, Vector3};

    fn point_mask(dims: [usize; 3], at: [usize; 3]) -> Mask3D {
        let grid = Grid::new(
            dims,
            Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            &ResourceLimits::default(),
        )
        .unwrap();
        let mut m = Mask3D::filled(grid, 0);
        m.set(at[0], at[1], at[2], 1).unwrap();
        m
    }

    #[test]
    fn grows_only_toward_requested_sides() {
        let m = point_mask([11, 11, 1], [5, 5, 0]);
        let out = dilate(&m, [0.0, 0.0, 0.0], [3.0, 0.0, 0.0]);
        // Only +X grows, by three voxels.
        assert_eq!(out.count_inside(), 4);
        assert!(out.is_inside(8, 5, 0));
        assert!(!out.is_inside(9, 5, 0));
        assert!(!out.is_inside(4, 5, 0));
        assert!(!out.is_inside(5, 6, 0));
    }

    #[test]
    fn octant_uses_elliptic_reach() {
        let m = point_mask([21, 21, 1], [10, 10, 0]);
        let out = dilate(&m, [0.0, 0.0, 0.0], [4.0, 2.0, 0.0]);
        // (dx/4)² + (dy/2)² ≤ 1 in the +X/+Y quadrant only.
        assert!(out.is_inside(14, 10, 0));
        assert!(out.is_inside(10, 12, 0));
        assert!(out.is_inside(12, 11, 0));
        assert!(!out.is_inside(13, 12, 0));
        assert!(!out.is_inside(9, 10, 0));
        assert!(!out.is_inside(10, 9, 0));
    }

    #[test]
    fn equal_reach_is_a_ball() {
        let m = point_mask([11, 11, 11], [5, 5, 5]);
        let out = dilate(&m, [2.0; 3], [2.0; 3]);
        for (i, &v) in out.as_slice().iter().enumerate() {
            let (x, y, z) = out.grid().coords(i);
            let d2 = [x, y, z]
                .iter()
                .map(|&c| (c as f64 - 5.0).powi(2))
                .sum::<f64>();
            assert_eq!(v != 0, d2 <= 4.0, "voxel ({x}, {y}, {z})");
        }
    }
}
