//! Seed fields for the distance transform.
//!
//! Seeds are `0.0` at source voxels and `+∞` everywhere else.

use crate::grid::{Float3D, Mask3D};

/// Seed value for voxels that are not distance sources.
pub const FAR: f32 = f32::INFINITY;

/// Seeds every inside voxel as a source.
#[must_use]
pub fn inside_zero(mask: &Mask3D) -> Float3D {
    mask.map(|v| if v != 0 { 0.0 } else { FAR })
}

/// Seeds the outside voxels that are 6-connected to an inside voxel.
///
/// This is the ring of voxels immediately beyond the structure boundary.
/// Voxels off the grid are never seeded; callers that need the exterior
/// represented pad the mask first.
#[must_use]
pub fn outside_ring_zero(mask: &Mask3D) -> Float3D {
    let grid = *mask.grid();
    let [nx, ny, nz] = grid.dims();
    let src = mask.as_slice();
    let mut seed = Float3D::filled(grid, FAR);
    let out = seed.as_mut_slice();

    let sx = 1;
    let sy = nx;
    let sz = nx * ny;
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let i = grid.index(x, y, z);
                if src[i] != 0 {
                    continue;
                }
                let touches = (x > 0 && src[i - sx] != 0)
                    || (x + 1 < nx && src[i + sx] != 0)
                    || (y > 0 && src[i - sy] != 0)
                    || (y + 1 < ny && src[i + sy] != 0)
                    || (z > 0 && src[i - sz] != 0)
                    || (z + 1 < nz && src[i + sz] != 0);
                if touches {
                    out[i] = 0.0;
                }
            }
        }
    }
    seed
}

/// Negates the field at every inside voxel, giving a signed convention
/// (negative inside, positive outside).
pub fn negate_inside(field: &mut Float3D, mask: &Mask3D) {
    debug_assert_eq!(field.grid(), mask.grid());
    for (value, &m) in field.as_mut_slice().iter_mut().zip(mask.as_slice()) {
        if m != 0 {
            *value = -*value;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::ResourceLimits;
    use crate::grid::Grid;
    use crate::math::{Point3, Vector3};

    fn cube_mask() -> Mask3D {
        let grid = Grid::new(
            [5, 5, 5],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            &ResourceLimits::default(),
        )
        .unwrap();
        let mut mask = Mask3D::filled(grid, 0);
        for z in 1..4 {
            for y in 1..4 {
                for x in 1..4 {
                    mask.set(x, y, z, 1).unwrap();
                }
            }
        }
        mask
    }

    #[test]
    fn inside_seed_marks_sources() {
        let mask = cube_mask();
        let seed = inside_zero(&mask);
        assert_eq!(seed.get(2, 2, 2), Some(0.0));
        assert_eq!(seed.get(0, 0, 0), Some(FAR));
    }

    #[test]
    fn ring_is_face_adjacent_only() {
        let mask = cube_mask();
        let seed = outside_ring_zero(&mask);
        // Face neighbour of the cube.
        assert_eq!(seed.get(0, 2, 2), Some(0.0));
        // Edge and corner neighbours are not 6-connected.
        assert_eq!(seed.get(0, 0, 2), Some(FAR));
        assert_eq!(seed.get(0, 0, 0), Some(FAR));
        // Inside voxels are never seeded.
        assert_eq!(seed.get(2, 2, 2), Some(FAR));
        let ring = seed.as_slice().iter().filter(|&&v| v == 0.0).count();
        assert_eq!(ring, 6 * 9);
    }

    #[test]
    fn negation_only_touches_inside() {
        let mask = cube_mask();
        let mut field = mask.map(|_| 2.0_f32);
        negate_inside(&mut field, &mask);
        assert_eq!(field.get(2, 2, 2), Some(-2.0));
        assert_eq!(field.get(0, 0, 0), Some(2.0));
    }
}
