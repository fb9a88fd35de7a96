use super::{Grid, Mask3D};
use crate::config::ResourceLimits;
use crate::error::GridError;
use crate::math::Point3;

/// Voxel-space representation of one anatomical region.
///
/// `Clone` produces a fully independent copy of the mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    mask: Mask3D,
}

impl Structure {
    #[must_use]
    pub fn new(mask: Mask3D) -> Self {
        Self { mask }
    }

    /// An empty structure on `grid`.
    #[must_use]
    pub fn empty(grid: Grid) -> Self {
        Self::new(Mask3D::filled(grid, 0))
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        self.mask.grid()
    }

    #[must_use]
    pub fn mask(&self) -> &Mask3D {
        &self.mask
    }

    #[must_use]
    pub fn into_mask(self) -> Mask3D {
        self.mask
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mask.count_inside() == 0
    }

    /// World-mm box spanned by the inside voxels (voxel corners, not centers).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn world_bounds(&self) -> Option<(Point3, Point3)> {
        let (lo, hi) = self.mask.inside_bounds()?;
        let grid = self.grid();
        let min = grid.to_world(&Point3::new(lo[0] as f64, lo[1] as f64, lo[2] as f64));
        let max = grid.to_world(&Point3::new(
            (hi[0] + 1) as f64,
            (hi[1] + 1) as f64,
            (hi[2] + 1) as f64,
        ));
        Some((min, max))
    }

    /// Copies the structure onto a grid enlarged by `lo` / `hi` voxels per axis.
    ///
    /// # Errors
    ///
    /// Returns `GridError::ResourceLimitExceeded` if the padded grid is too large.
    pub fn padded(
        &self,
        lo: [usize; 3],
        hi: [usize; 3],
        limits: &ResourceLimits,
    ) -> Result<Self, GridError> {
        if lo == [0; 3] && hi == [0; 3] {
            return Ok(self.clone());
        }
        let grid = self.grid().padded(lo, hi, limits)?;
        let mut mask = Mask3D::filled(grid, 0);
        self.mask.blit_into(&mut mask, lo);
        Ok(Self::new(mask))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    #[test]
    fn padded_preserves_world_bounds() {
        let grid = Grid::new(
            [3, 3, 1],
            Vector3::new(1.0, 2.0, 3.0),
            Point3::new(10.0, 20.0, 30.0),
            &ResourceLimits::default(),
        )
        .unwrap();
        let mut mask = Mask3D::filled(grid, 0);
        mask.set(1, 1, 0, 1).unwrap();
        let s = Structure::new(mask);
        let p = s.padded([2, 1, 1], [0, 3, 2], &ResourceLimits::default()).unwrap();
        assert_eq!(p.grid().dims(), [5, 7, 4]);
        let (a0, a1) = s.world_bounds().unwrap();
        let (b0, b1) = p.world_bounds().unwrap();
        assert!((a0 - b0).norm() < 1e-12);
        assert!((a1 - b1).norm() < 1e-12);
    }

    #[test]
    fn clone_is_independent() {
        let grid = Grid::new(
            [2, 2, 2],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            &ResourceLimits::default(),
        )
        .unwrap();
        let s = Structure::empty(grid);
        let mut copy = s.clone().into_mask();
        copy.set(0, 0, 0, 1).unwrap();
        assert!(s.is_empty());
        assert_eq!(copy.count_inside(), 1);
    }
}
