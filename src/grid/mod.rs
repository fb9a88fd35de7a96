//! Voxel-space data model shared by every pipeline stage.

mod buffer;
mod structure;

pub use buffer::{Float3D, Mask3D, VoxelBuffer};
pub use structure::Structure;

use crate::config::ResourceLimits;
use crate::error::GridError;
use crate::math::{Point3, Vector3};

const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

/// An axis-aligned anisotropic voxel grid.
///
/// Voxel `(i, j, k)` covers the box starting at `origin + (i, j, k)·res`;
/// its sample point is the box center. Sizes are at least one along every
/// axis and the total voxel count is checked against [`ResourceLimits`]
/// on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    dims: [usize; 3],
    resolution: Vector3,
    origin: Point3,
}

impl Grid {
    /// Creates a validated grid.
    ///
    /// # Errors
    ///
    /// Returns `GridError::InvalidResolution` for non-finite or non-positive
    /// spacing, `GridError::EmptyDimension` for a zero size, and
    /// `GridError::ResourceLimitExceeded` when the voxel count is over the limit.
    pub fn new(
        dims: [usize; 3],
        resolution: Vector3,
        origin: Point3,
        limits: &ResourceLimits,
    ) -> Result<Self, GridError> {
        for axis in 0..3 {
            let value = resolution[axis];
            if !value.is_finite() || value <= 0.0 {
                return Err(GridError::InvalidResolution {
                    axis: AXIS_NAMES[axis],
                    value,
                });
            }
            if dims[axis] == 0 {
                return Err(GridError::EmptyDimension(AXIS_NAMES[axis]));
            }
        }
        let voxels = dims
            .iter()
            .try_fold(1_u128, |acc, &d| acc.checked_mul(d as u128))
            .unwrap_or(u128::MAX);
        if voxels > limits.max_voxels as u128 {
            return Err(GridError::ResourceLimitExceeded {
                voxels,
                limit: limits.max_voxels,
            });
        }
        Ok(Self {
            dims,
            resolution,
            origin,
        })
    }

    /// Voxel counts `[x_size, y_size, z_size]`.
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    #[must_use]
    pub fn x_size(&self) -> usize {
        self.dims[0]
    }

    #[must_use]
    pub fn y_size(&self) -> usize {
        self.dims[1]
    }

    #[must_use]
    pub fn z_size(&self) -> usize {
        self.dims[2]
    }

    /// Total number of voxels.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Voxels in one Z-plane.
    #[must_use]
    pub fn plane_len(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    /// Per-axis spacing in millimeters.
    #[must_use]
    pub fn resolution(&self) -> Vector3 {
        self.resolution
    }

    /// World-mm corner of voxel `(0, 0, 0)`.
    #[must_use]
    pub fn origin(&self) -> Point3 {
        self.origin
    }

    /// Linear buffer index of voxel `(x, y, z)`; X varies fastest, Z slowest.
    ///
    /// Callers must pass in-range coordinates. Use [`Grid::checked_index`] at
    /// API boundaries.
    #[must_use]
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(self.contains(x, y, z));
        x + y * self.dims[0] + z * self.dims[0] * self.dims[1]
    }

    /// Bounds-checked variant of [`Grid::index`].
    #[must_use]
    pub fn checked_index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        self.contains(x, y, z).then(|| self.index(x, y, z))
    }

    /// Inverse of [`Grid::index`].
    #[must_use]
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let plane = self.plane_len();
        let z = index / plane;
        let rem = index % plane;
        (rem % self.dims[0], rem / self.dims[0], z)
    }

    /// Whether `(x, y, z)` lies inside the grid.
    #[must_use]
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.dims[0] && y < self.dims[1] && z < self.dims[2]
    }

    /// World-mm center of voxel `(x, y, z)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn voxel_center(&self, x: usize, y: usize, z: usize) -> Point3 {
        Point3::new(
            self.axis_center(0, x as f64),
            self.axis_center(1, y as f64),
            self.axis_center(2, z as f64),
        )
    }

    /// World-mm Z of the center of plane `z`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn plane_z(&self, z: usize) -> f64 {
        self.axis_center(2, z as f64)
    }

    /// Maps a world-mm point to continuous grid coordinates, in voxels,
    /// measured from the origin corner.
    #[must_use]
    pub fn to_local(&self, world: &Point3) -> Point3 {
        Point3::new(
            (world.x - self.origin.x) / self.resolution.x,
            (world.y - self.origin.y) / self.resolution.y,
            (world.z - self.origin.z) / self.resolution.z,
        )
    }

    /// Maps continuous grid coordinates back to world mm.
    #[must_use]
    pub fn to_world(&self, local: &Point3) -> Point3 {
        Point3::new(
            self.origin.x + local.x * self.resolution.x,
            self.origin.y + local.y * self.resolution.y,
            self.origin.z + local.z * self.resolution.z,
        )
    }

    /// Plane index whose center is nearest to world Z, if it is on the grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn nearest_plane(&self, world_z: f64) -> Option<usize> {
        let k = ((world_z - self.origin.z) / self.resolution.z - 0.5).round();
        if k.is_finite() && k >= 0.0 && (k as usize) < self.dims[2] {
            Some(k as usize)
        } else {
            None
        }
    }

    /// Returns a larger grid with `lo[axis]` voxels added below and `hi[axis]`
    /// above each axis. The world position of existing voxels is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `GridError::ResourceLimitExceeded` if the padded grid is too large.
    #[allow(clippy::cast_precision_loss)]
    pub fn padded(
        &self,
        lo: [usize; 3],
        hi: [usize; 3],
        limits: &ResourceLimits,
    ) -> Result<Self, GridError> {
        let mut dims = self.dims;
        let mut origin = self.origin;
        for axis in 0..3 {
            dims[axis] = dims[axis].saturating_add(lo[axis]).saturating_add(hi[axis]);
            origin[axis] -= lo[axis] as f64 * self.resolution[axis];
        }
        Self::new(dims, self.resolution, origin, limits)
    }

    fn axis_center(&self, axis: usize, i: f64) -> f64 {
        self.origin[axis] + (i + 0.5) * self.resolution[axis]
    }
}
