//! Contours → voxel structure.

use tracing::{debug, warn};

use crate::config::ResourceLimits;
use crate::contour::Contour;
use crate::error::{GridError, OperationError, Result};
use crate::grid::{Grid, Mask3D, Structure};
use crate::math::{Point2, Point3, Vector3};

/// Slack when converting an extent to a voxel count, so that an extent of
/// exactly `n·res` is not rounded up to `n + 1` voxels.
const EXTENT_SLACK: f64 = 1e-9;

/// Rasterizes planar contours into a padded voxel [`Structure`].
///
/// The grid covers the contours' bounding box plus `padding` mm on every
/// side. In-plane, the box starts on a voxel corner; along Z, every slice
/// position lands on a plane center. Polygons are filled with a scanline
/// evaluated at voxel-row centers; overlapping polygons on one slice are
/// OR-ed together and holes are not subtracted.
#[derive(Debug)]
pub struct BuildStructure<'a> {
    contours: &'a [Contour],
    spacing: [f64; 3],
    padding: f64,
    limits: ResourceLimits,
}

impl<'a> BuildStructure<'a> {
    /// Creates a new build operation.
    #[must_use]
    pub fn new(contours: &'a [Contour], spacing: [f64; 3], padding: f64) -> Self {
        Self {
            contours,
            spacing,
            padding,
            limits: ResourceLimits::default(),
        }
    }

    /// Sets the voxel-count ceiling.
    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Executes the build.
    ///
    /// Contours with fewer than 3 vertices are skipped.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for bad spacing or padding,
    /// non-finite coordinates, or when no contour is usable, and
    /// `GridError::ResourceLimitExceeded` when the grid would be too large.
    pub fn execute(&self) -> Result<Structure> {
        let res = self.validated_spacing()?;
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(OperationError::InvalidInput(format!(
                "padding must be finite and non-negative, got {}",
                self.padding
            ))
            .into());
        }

        let usable: Vec<&Contour> = self.contours.iter().filter(|c| c.is_polygon()).collect();
        let dropped = self.contours.len() - usable.len();
        if dropped > 0 {
            warn!(dropped, "skipping contours with fewer than 3 vertices");
        }
        if let Some(bad) = usable.iter().find(|c| !c.is_finite()) {
            return Err(OperationError::InvalidInput(format!(
                "contour at slice {} has non-finite coordinates",
                bad.slice_position
            ))
            .into());
        }
        if usable.is_empty() {
            return Err(OperationError::InvalidInput(
                "no contour with at least 3 vertices".to_owned(),
            )
            .into());
        }

        let grid = self.size_grid(&usable, res)?;
        debug!(
            dims = ?grid.dims(),
            origin = ?grid.origin(),
            contours = usable.len(),
            "sized structure grid"
        );

        let mut mask = Mask3D::filled(grid, 0);
        let [nx, ny, _] = grid.dims();
        let plane_len = grid.plane_len();
        for contour in &usable {
            let Some(z) = grid.nearest_plane(contour.slice_position) else {
                continue;
            };
            let local: Vec<Point2> = contour
                .points
                .iter()
                .map(|p| grid.to_local(p).xy())
                .collect();
            let plane = &mut mask.as_mut_slice()[z * plane_len..(z + 1) * plane_len];
            fill_polygon(plane, nx, ny, &local);
        }

        Ok(Structure::new(mask))
    }

    fn validated_spacing(&self) -> Result<Vector3> {
        if self.spacing.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(OperationError::InvalidInput(format!(
                "spacing must be finite and positive, got {:?}",
                self.spacing
            ))
            .into());
        }
        Ok(Vector3::new(self.spacing[0], self.spacing[1], self.spacing[2]))
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn size_grid(&self, contours: &[&Contour], res: Vector3) -> Result<Grid> {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for contour in contours {
            min.z = min.z.min(contour.slice_position);
            max.z = max.z.max(contour.slice_position);
            for p in &contour.points {
                for axis in 0..3 {
                    min[axis] = min[axis].min(p[axis]);
                    max[axis] = max[axis].max(p[axis]);
                }
            }
        }

        let mut dims = [0_usize; 3];
        let mut origin = Point3::origin();
        for axis in 0..3 {
            let pad = (self.padding / res[axis]).ceil();
            let span = (max[axis] - min[axis]) / res[axis];
            let count = if axis == 2 {
                span.round() + 1.0
            } else {
                (span - EXTENT_SLACK).ceil().max(1.0)
            } + 2.0 * pad;
            if count > self.limits.max_voxels as f64 {
                return Err(GridError::ResourceLimitExceeded {
                    voxels: count as u128,
                    limit: self.limits.max_voxels,
                }
                .into());
            }
            dims[axis] = count as usize;
            let offset = if axis == 2 { pad + 0.5 } else { pad };
            origin[axis] = min[axis] - offset * res[axis];
        }

        Ok(Grid::new(dims, res, origin, &self.limits)?)
    }
}

/// Scanline fill of one polygon (grid-local coordinates) into a plane.
///
/// Rows are sampled at their centers. Edge crossings use a half-open test on
/// the edge's Y range so a vertex shared by two edges is counted once; voxels
/// whose centers lie between successive crossings, inclusive, are set.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn fill_polygon(plane: &mut [u8], nx: usize, ny: usize, pts: &[Point2]) {
    let (lo, hi) = pts
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    let first_row = (lo - 0.5).ceil().max(0.0);
    let last_row = (hi - 0.5).floor().min(ny as f64 - 1.0);
    if first_row > last_row {
        return;
    }

    let mut crossings = Vec::new();
    for row in (first_row as usize)..=(last_row as usize) {
        let yc = row as f64 + 0.5;
        crossings.clear();
        for (i, a) in pts.iter().enumerate() {
            let b = &pts[(i + 1) % pts.len()];
            if (a.y <= yc && b.y > yc) || (b.y <= yc && a.y > yc) {
                crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        crossings.sort_by(f64::total_cmp);

        let line = &mut plane[row * nx..(row + 1) * nx];
        for pair in crossings.chunks_exact(2) {
            let start = (pair[0] - 0.5).ceil().max(0.0);
            let end = (pair[1] - 0.5).floor().min(nx as f64 - 1.0);
            if start > end {
                continue;
            }
            line[start as usize..=end as usize].fill(1);
        }
    }
}
