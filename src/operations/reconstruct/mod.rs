//! Voxel structure → planar contours.

mod marching_squares;
mod stitch;

use tracing::debug;

use crate::config::ReconstructParams;
use crate::contour::Contour;
use crate::grid::Structure;
use crate::math::polygon_2d::{make_counter_clockwise, signed_area};
use crate::math::simplify::simplify_closed;
use crate::math::{Point2, Point3};

use marching_squares::LatticePoint;

/// Extracts one outline per Z-plane of a structure.
///
/// Each original slice claims the single plane it rasterizes into (its
/// nearest plane center, within the slice tolerance); when two slices claim
/// one plane the closer wins. Unclaimed planes are emitted at their own Z
/// only when new slices are requested, so no slice is reported twice. When a plane holds several
/// disjoint regions only the one with the largest area is returned; holes
/// are not represented.
#[derive(Debug)]
pub struct ReconstructContours<'a> {
    structure: &'a Structure,
    slice_positions: &'a [f64],
    params: ReconstructParams,
}

impl<'a> ReconstructContours<'a> {
    /// Creates a new reconstruction; `slice_positions` are the world Z values
    /// of the input slices.
    #[must_use]
    pub fn new(structure: &'a Structure, slice_positions: &'a [f64]) -> Self {
        Self {
            structure,
            slice_positions,
            params: ReconstructParams::default(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: ReconstructParams) -> Self {
        self.params = params;
        self
    }

    /// Executes the reconstruction, returning contours in ascending Z.
    #[must_use]
    pub fn execute(&self) -> Vec<Contour> {
        let grid = self.structure.grid();
        let [nx, ny, nz] = grid.dims();
        let res = grid.resolution();
        let tolerance = self.params.slice_tolerance.unwrap_or(0.5 * res.z);
        let simplify_tol = self.params.simplify_factor * res.x.min(res.y);

        let claims = self.claim_planes(tolerance);
        let mut contours = Vec::new();
        for z in 0..nz {
            let plane = self.structure.mask().plane(z);
            if plane.iter().all(|&v| v == 0) {
                continue;
            }
            let world_z = match claims[z] {
                Some(slice) => slice,
                None if self.params.include_new_slices => grid.plane_z(z),
                None => continue,
            };

            let loops = stitch::connect(&marching_squares::extract(plane, nx, ny));
            let Some(outline) = loops
                .iter()
                .max_by(|a, b| lattice_area(a).total_cmp(&lattice_area(b)))
            else {
                continue;
            };
            if loops.len() > 1 {
                debug!(plane = z, loops = loops.len(), "keeping largest outline");
            }

            let origin = grid.origin();
            let mut ring: Vec<Point2> = outline
                .iter()
                .map(|&(lx, ly)| {
                    Point2::new(
                        origin.x + half(lx) * res.x,
                        origin.y + half(ly) * res.y,
                    )
                })
                .collect();
            ring = simplify_closed(&ring, simplify_tol);
            make_counter_clockwise(&mut ring);
            if ring.len() < 3 {
                continue;
            }
            contours.push(Contour::new(
                ring.iter().map(|p| Point3::new(p.x, p.y, world_z)).collect(),
                world_z,
            ));
        }
        debug!(contours = contours.len(), "reconstructed contours");
        contours
    }

    /// Original slice owning each plane, if any.
    ///
    /// A slice maps to the same plane the grid builder fills for it.
    fn claim_planes(&self, tolerance: f64) -> Vec<Option<f64>> {
        let grid = self.structure.grid();
        let mut claims: Vec<Option<f64>> = vec![None; grid.z_size()];
        for &slice in self.slice_positions {
            let Some(z) = grid.nearest_plane(slice) else {
                continue;
            };
            let plane_z = grid.plane_z(z);
            if (slice - plane_z).abs() > tolerance {
                continue;
            }
            match claims[z] {
                Some(owner) if (owner - plane_z).abs() <= (slice - plane_z).abs() => {}
                _ => claims[z] = Some(slice),
            }
        }
        claims
    }
}

#[allow(clippy::cast_precision_loss)]
fn half(v: i64) -> f64 {
    v as f64 * 0.5
}

#[allow(clippy::cast_precision_loss)]
fn lattice_area(points: &[LatticePoint]) -> f64 {
    let pts: Vec<Point2> = points
        .iter()
        .map(|&(x, y)| Point2::new(x as f64, y as f64))
        .collect();
    signed_area(&pts).abs()
}
