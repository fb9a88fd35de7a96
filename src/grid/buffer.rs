use super::Grid;
use crate::error::GridError;

/// A fixed-stride per-voxel buffer over a [`Grid`].
///
/// The buffer length always equals `grid.voxel_count()`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelBuffer<T> {
    grid: Grid,
    data: Vec<T>,
}

/// Binary occupancy, one byte per voxel (1 = inside).
pub type Mask3D = VoxelBuffer<u8>;

/// Scalar field used as distance transform seed and output.
pub type Float3D = VoxelBuffer<f32>;

impl<T: Copy> VoxelBuffer<T> {
    /// Creates a buffer with every voxel set to `value`.
    #[must_use]
    pub fn filled(grid: Grid, value: T) -> Self {
        Self {
            grid,
            data: vec![value; grid.voxel_count()],
        }
    }

    /// Wraps an existing vector.
    ///
    /// # Errors
    ///
    /// Returns `GridError::BufferLength` if `data` does not match the grid size.
    pub fn from_vec(grid: Grid, data: Vec<T>) -> Result<Self, GridError> {
        if data.len() != grid.voxel_count() {
            return Err(GridError::BufferLength {
                expected: grid.voxel_count(),
                actual: data.len(),
            });
        }
        Ok(Self { grid, data })
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Value at `(x, y, z)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<T> {
        self.grid.checked_index(x, y, z).map(|i| self.data[i])
    }

    /// Sets the value at `(x, y, z)`.
    ///
    /// # Errors
    ///
    /// Returns `GridError::OutOfBounds` if the voxel is outside the grid.
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: T) -> Result<(), GridError> {
        let i = self
            .grid
            .checked_index(x, y, z)
            .ok_or(GridError::OutOfBounds { x, y, z })?;
        self.data[i] = value;
        Ok(())
    }

    /// One Z-plane as a contiguous row-major slice.
    ///
    /// # Panics
    ///
    /// Panics if `z` is out of range.
    #[must_use]
    pub fn plane(&self, z: usize) -> &[T] {
        let len = self.grid.plane_len();
        &self.data[z * len..(z + 1) * len]
    }

    /// Builds a new buffer on the same grid by mapping every voxel.
    #[must_use]
    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> VoxelBuffer<U> {
        VoxelBuffer {
            grid: self.grid,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Copies this buffer into `target`, placing voxel `(0, 0, 0)` at `offset`.
    ///
    /// Voxels that would land outside `target` are dropped.
    pub(crate) fn blit_into(&self, target: &mut VoxelBuffer<T>, offset: [usize; 3]) {
        let [sx, sy, sz] = self.grid.dims();
        let [tx, ty, tz] = target.grid.dims();
        if offset[0] >= tx || offset[1] >= ty || offset[2] >= tz {
            return;
        }
        let w = sx.min(tx - offset[0]);
        for z in 0..sz.min(tz - offset[2]) {
            for y in 0..sy.min(ty - offset[1]) {
                let src = self.grid.index(0, y, z);
                let dst = target.grid.index(offset[0], offset[1] + y, offset[2] + z);
                target.data[dst..dst + w].copy_from_slice(&self.data[src..src + w]);
            }
        }
    }
}

impl Mask3D {
    /// Whether voxel `(x, y, z)` is inside; voxels off the grid are outside.
    #[must_use]
    pub fn is_inside(&self, x: usize, y: usize, z: usize) -> bool {
        self.get(x, y, z).is_some_and(|v| v != 0)
    }

    /// Number of inside voxels.
    #[must_use]
    pub fn count_inside(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Inclusive voxel index bounds `(min, max)` of the inside voxels.
    #[must_use]
    pub fn inside_bounds(&self) -> Option<([usize; 3], [usize; 3])> {
        let mut bounds: Option<([usize; 3], [usize; 3])> = None;
        for (i, &v) in self.data.iter().enumerate() {
            if v == 0 {
                continue;
            }
            let (x, y, z) = self.grid.coords(i);
            let c = [x, y, z];
            match &mut bounds {
                None => bounds = Some((c, c)),
                Some((lo, hi)) => {
                    for axis in 0..3 {
                        lo[axis] = lo[axis].min(c[axis]);
                        hi[axis] = hi[axis].max(c[axis]);
                    }
                }
            }
        }
        bounds
    }

    /// Per axis, whether any inside voxel sits on the low / high border plane.
    #[must_use]
    pub fn border_contact(&self) -> ([bool; 3], [bool; 3]) {
        let dims = self.grid.dims();
        let mut lo = [false; 3];
        let mut hi = [false; 3];
        if let Some((min, max)) = self.inside_bounds() {
            for axis in 0..3 {
                lo[axis] = min[axis] == 0;
                hi[axis] = max[axis] + 1 == dims[axis];
            }
        }
        (lo, hi)
    }

    /// Inverts the occupancy of every voxel.
    #[must_use]
    pub fn complement(&self) -> Self {
        self.map(|v| u8::from(v == 0))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ResourceLimits;
    use crate::math::{Point3, Vector3};

    fn grid(dims: [usize; 3]) -> Grid {
        Grid::new(
            dims,
            Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            &ResourceLimits::default(),
        )
        .unwrap()
    }

    #[test]
    fn from_vec_checks_length() {
        let g = grid([2, 2, 2]);
        assert!(Mask3D::from_vec(g, vec![0; 8]).is_ok());
        assert!(matches!(
            Mask3D::from_vec(g, vec![0; 7]),
            Err(GridError::BufferLength { expected: 8, actual: 7 })
        ));
    }

    #[test]
    fn set_rejects_out_of_bounds() {
        let mut m = Mask3D::filled(grid([2, 2, 2]), 0);
        assert!(m.set(1, 1, 1, 1).is_ok());
        assert!(m.set(2, 0, 0, 1).is_err());
        assert!(m.is_inside(1, 1, 1));
        assert!(!m.is_inside(5, 5, 5));
    }

    #[test]
    fn bounds_and_border_contact() {
        let mut m = Mask3D::filled(grid([4, 4, 3]), 0);
        m.set(1, 2, 0, 1).unwrap();
        m.set(3, 1, 1, 1).unwrap();
        assert_eq!(m.inside_bounds(), Some(([1, 1, 0], [3, 2, 1])));
        let (lo, hi) = m.border_contact();
        assert_eq!(lo, [false, false, true]);
        assert_eq!(hi, [true, false, false]);
        assert_eq!(m.count_inside(), 2);
    }

    #[test]
    fn blit_copies_with_offset() {
        let mut src = Mask3D::filled(grid([2, 2, 1]), 0);
        src.set(1, 1, 0, 1).unwrap();
        let mut dst = Mask3D::filled(grid([4, 4, 3]), 0);
        src.blit_into(&mut dst, [1, 2, 1]);
        assert!(dst.is_inside(2, 3, 1));
        assert_eq!(dst.count_inside(), 1);
    }

    #[test]
    fn empty_mask_has_no_bounds() {
        let m = Mask3D::filled(grid([3, 3, 3]), 0);
        assert!(m.inside_bounds().is_none());
        assert_eq!(m.complement().count_inside(), 27);
    }
}
