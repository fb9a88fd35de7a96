//! Outer and inner margins on voxel structures.
//!
//! Every operation returns a new [`Structure`]; inputs are never modified.
//! Outer results live on a grid padded so the grown shape fits.

mod directional;

use tracing::debug;

use crate::config::ResourceLimits;
use crate::contour::{MarginRequest, PerSideMargins};
use crate::error::{OperationError, Result};
use crate::grid::{Mask3D, Structure};
use crate::math::Vector3;
use crate::operations::distance_transform::DistanceTransform;
use crate::operations::seed;

/// Relative slack on distance thresholds so that voxels exactly at the
/// margin distance are not lost to `f32` rounding.
pub(crate) const THRESHOLD_EPS: f64 = 1e-5;

/// Isotropic margin: positive grows the structure, negative shrinks it.
#[derive(Debug)]
pub struct MarginSymmetric<'a> {
    structure: &'a Structure,
    margin: f64,
    eclipse_fudge: bool,
    limits: ResourceLimits,
}

impl<'a> MarginSymmetric<'a> {
    /// Creates a new symmetric margin operation; `margin` is in mm.
    #[must_use]
    pub fn new(structure: &'a Structure, margin: f64) -> Self {
        Self {
            structure,
            margin,
            eclipse_fudge: false,
            limits: ResourceLimits::default(),
        }
    }

    /// Enables the compatibility rounding of a historical treatment planning
    /// system: outer margins use a per-axis radius of
    /// `max(res, margin + res / 2)`. Has no effect on inner margins.
    #[must_use]
    pub fn with_eclipse_fudge(mut self, enabled: bool) -> Self {
        self.eclipse_fudge = enabled;
        self
    }

    /// Sets the voxel-count ceiling for padded grids.
    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Executes the margin.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for a non-finite margin and
    /// `GridError::ResourceLimitExceeded` if the padded grid is too large.
    pub fn execute(&self) -> Result<Structure> {
        let m = self.margin;
        if !m.is_finite() {
            return Err(OperationError::InvalidInput(format!("margin must be finite, got {m}")).into());
        }
        if m == 0.0 {
            return Ok(self.structure.clone());
        }
        if m > 0.0 && self.eclipse_fudge {
            let res = self.structure.grid().resolution();
            let radius = eclipse_radius(m, res);
            let per_side = PerSideMargins::from_directions(radius, radius);
            return MarginAsymmetric::new(self.structure, true, per_side)
                .with_limits(self.limits)
                .execute();
        }
        if m > 0.0 {
            grow_isotropic(self.structure, m, &self.limits)
        } else {
            shrink_isotropic(self.structure, -m, &self.limits)
        }
    }
}

/// Six independently sized directional margins.
///
/// Growth (or shrinkage) toward each side is limited to that side's
/// distance; the combined shape is a union of ellipsoid octants.
#[derive(Debug)]
pub struct MarginAsymmetric<'a> {
    structure: &'a Structure,
    is_outer: bool,
    per_side: PerSideMargins,
    eclipse_fudge: bool,
    collapse: bool,
    limits: ResourceLimits,
}

impl<'a> MarginAsymmetric<'a> {
    /// Creates a new directional margin operation.
    #[must_use]
    pub fn new(structure: &'a Structure, is_outer: bool, per_side: PerSideMargins) -> Self {
        Self {
            structure,
            is_outer,
            per_side,
            eclipse_fudge: false,
            collapse: false,
            limits: ResourceLimits::default(),
        }
    }

    /// Inflates every non-zero outer side to `max(res, side + res / 2)`.
    #[must_use]
    pub fn with_eclipse_fudge(mut self, enabled: bool) -> Self {
        self.eclipse_fudge = enabled;
        self
    }

    /// Backward-compatibility mode: applies an isotropic margin equal to the
    /// largest of the six sides instead of true directional margins.
    #[must_use]
    pub fn collapse_to_isotropic(mut self) -> Self {
        self.collapse = true;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Executes the margin.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` if a side is negative or not
    /// finite, and `GridError::ResourceLimitExceeded` for oversized grids.
    pub fn execute(&self) -> Result<Structure> {
        if !self.per_side.is_valid() {
            return Err(OperationError::InvalidInput(format!(
                "side margins must be finite and non-negative, got {:?}",
                self.per_side
            ))
            .into());
        }
        if self.per_side.is_zero() {
            return Ok(self.structure.clone());
        }
        if self.collapse {
            let m = self.per_side.max();
            let signed = if self.is_outer { m } else { -m };
            return MarginSymmetric::new(self.structure, signed)
                .with_eclipse_fudge(self.eclipse_fudge)
                .with_limits(self.limits)
                .execute();
        }

        let res = self.structure.grid().resolution();
        let mut negative = self.per_side.negative();
        let mut positive = self.per_side.positive();
        if self.is_outer && self.eclipse_fudge {
            for axis in 0..3 {
                negative[axis] = fudge_side(negative[axis], res[axis]);
                positive[axis] = fudge_side(positive[axis], res[axis]);
            }
        }

        if self.is_outer {
            let lo = pad_voxels(negative, res);
            let hi = pad_voxels(positive, res);
            let padded = self.structure.padded(lo, hi, &self.limits)?;
            let mask = directional::dilate(padded.mask(), negative, positive);
            debug!(inside = mask.count_inside(), "directional outer margin");
            Ok(Structure::new(mask))
        } else {
            let padded = pad_exterior(self.structure, &self.limits)?;
            let outside = padded.mask().complement();
            let reflected = PerSideMargins::from_directions(negative, positive).reflected();
            let eroded_away = directional::dilate(&outside, reflected.negative(), reflected.positive());
            let mask = keep_unreached(padded.mask(), &eroded_away);
            debug!(inside = mask.count_inside(), "directional inner margin");
            Ok(Structure::new(mask))
        }
    }
}

/// Axis-symmetric anisotropic margin: each axis grows or shrinks by the
/// larger of its two side distances, giving an ellipsoidal margin.
#[derive(Debug)]
pub struct MarginAnisotropic<'a> {
    structure: &'a Structure,
    is_outer: bool,
    per_side: PerSideMargins,
    eclipse_fudge: bool,
    limits: ResourceLimits,
}

impl<'a> MarginAnisotropic<'a> {
    #[must_use]
    pub fn new(structure: &'a Structure, is_outer: bool, per_side: PerSideMargins) -> Self {
        Self {
            structure,
            is_outer,
            per_side,
            eclipse_fudge: false,
            limits: ResourceLimits::default(),
        }
    }

    #[must_use]
    pub fn with_eclipse_fudge(mut self, enabled: bool) -> Self {
        self.eclipse_fudge = enabled;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Executes the margin.
    ///
    /// # Errors
    ///
    /// Same as [`MarginAsymmetric::execute`].
    pub fn execute(&self) -> Result<Structure> {
        let neg = self.per_side.negative();
        let pos = self.per_side.positive();
        let radius = [neg[0].max(pos[0]), neg[1].max(pos[1]), neg[2].max(pos[2])];
        MarginAsymmetric::new(
            self.structure,
            self.is_outer,
            PerSideMargins::from_directions(radius, radius),
        )
        .with_eclipse_fudge(self.eclipse_fudge)
        .with_limits(self.limits)
        .execute()
    }
}

/// Applies any [`MarginRequest`] to a structure.
///
/// # Errors
///
/// Propagates the errors of the selected margin operation.
pub fn apply_margin(
    structure: &Structure,
    request: &MarginRequest,
    eclipse_fudge: bool,
    limits: ResourceLimits,
) -> Result<Structure> {
    match *request {
        MarginRequest::Uniform { margin } => MarginSymmetric::new(structure, margin)
            .with_eclipse_fudge(eclipse_fudge)
            .with_limits(limits)
            .execute(),
        MarginRequest::Directional { is_outer, per_side } => {
            MarginAsymmetric::new(structure, is_outer, per_side)
                .with_eclipse_fudge(eclipse_fudge)
                .with_limits(limits)
                .execute()
        }
        MarginRequest::Anisotropic { is_outer, per_side } => {
            MarginAnisotropic::new(structure, is_outer, per_side)
                .with_eclipse_fudge(eclipse_fudge)
                .with_limits(limits)
                .execute()
        }
    }
}

fn grow_isotropic(structure: &Structure, margin: f64, limits: &ResourceLimits) -> Result<Structure> {
    let res = structure.grid().resolution();
    let pad = pad_voxels([margin; 3], res);
    let padded = structure.padded(pad, pad, limits)?;

    let mut field = seed::inside_zero(padded.mask());
    DistanceTransform::new(res).execute(&mut field);

    let limit = margin * margin * (1.0 + THRESHOLD_EPS);
    let mask = field.map(|d| u8::from(f64::from(d) <= limit));
    debug!(margin, dims = ?mask.grid().dims(), inside = mask.count_inside(), "outer margin");
    Ok(Structure::new(mask))
}

fn shrink_isotropic(structure: &Structure, depth: f64, limits: &ResourceLimits) -> Result<Structure> {
    let padded = pad_exterior(structure, limits)?;
    let inside = padded.mask();
    let res = padded.grid().resolution();

    let mut field = seed::outside_ring_zero(inside);
    DistanceTransform::new(res).execute(&mut field);
    seed::negate_inside(&mut field, inside);

    let limit = -depth * depth * (1.0 + THRESHOLD_EPS);
    let mut mask = Mask3D::filled(*inside.grid(), 0);
    for ((out, &d), &m) in mask
        .as_mut_slice()
        .iter_mut()
        .zip(field.as_slice())
        .zip(inside.as_slice())
    {
        *out = u8::from(m != 0 && f64::from(d) < limit);
    }
    debug!(depth, inside = mask.count_inside(), "inner margin");
    Ok(Structure::new(mask))
}

/// Pads one voxel on every side the structure touches so that the exterior
/// is represented on the grid.
fn pad_exterior(structure: &Structure, limits: &ResourceLimits) -> Result<Structure> {
    let (lo, hi) = structure.mask().border_contact();
    Ok(structure.padded(lo.map(usize::from), hi.map(usize::from), limits)?)
}

fn keep_unreached(inside: &Mask3D, reached: &Mask3D) -> Mask3D {
    let mut mask = inside.clone();
    for (out, &r) in mask.as_mut_slice().iter_mut().zip(reached.as_slice()) {
        if r != 0 {
            *out = 0;
        }
    }
    mask
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pad_voxels(distance: [f64; 3], res: Vector3) -> [usize; 3] {
    [0, 1, 2].map(|axis| (distance[axis] / res[axis]).ceil().max(0.0) as usize)
}

fn eclipse_radius(margin: f64, res: Vector3) -> [f64; 3] {
    [0, 1, 2].map(|axis| res[axis].max(margin.abs() + res[axis] / 2.0))
}

fn fudge_side(side: f64, res: f64) -> f64 {
    if side > 0.0 {
        res.max(side + res / 2.0)
    } else {
        0.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ResourceLimits;
    use crate::grid::Grid;
    use crate::math::Point3;
    use proptest::prelude::*;

    fn grid(dims: [usize; 3], res: [f64; 3]) -> Grid {
        Grid::new(
            dims,
            Vector3::new(res[0], res[1], res[2]),
            Point3::origin(),
            &ResourceLimits::default(),
        )
        .unwrap()
    }

    /// A box of inside voxels `[lo, hi)` on a grid of `dims`.
    fn boxed(dims: [usize; 3], res: [f64; 3], lo: [usize; 3], hi: [usize; 3]) -> Structure {
        let mut mask = Mask3D::filled(grid(dims, res), 0);
        for z in lo[2]..hi[2] {
            for y in lo[1]..hi[1] {
                for x in lo[0]..hi[0] {
                    mask.set(x, y, z, 1).unwrap();
                }
            }
        }
        Structure::new(mask)
    }

    fn extent(s: &Structure, axis: usize) -> f64 {
        let (min, max) = s.world_bounds().unwrap();
        max[axis] - min[axis]
    }

    #[test]
    fn zero_margin_is_an_independent_copy() {
        let s = boxed([6, 6, 6], [1.0; 3], [1, 1, 1], [4, 5, 3]);
        let out = MarginSymmetric::new(&s, 0.0).execute().unwrap();
        assert_eq!(out.mask().as_slice(), s.mask().as_slice());
        assert_eq!(out.grid(), s.grid());
        assert_ne!(out.mask().as_slice().as_ptr(), s.mask().as_slice().as_ptr());
    }

    #[test]
    fn outer_margin_pads_and_grows() {
        let s = boxed([4, 4, 4], [1.0, 1.0, 2.0], [1, 1, 1], [3, 3, 3]);
        let out = MarginSymmetric::new(&s, 2.0).execute().unwrap();
        // ceil(2 / res) voxels of padding per side.
        assert_eq!(out.grid().dims(), [8, 8, 6]);
        assert!((extent(&out, 0) - 6.0).abs() < 1e-9);
        assert!((extent(&out, 2) - 8.0).abs() < 1e-9);
        // Input untouched.
        assert_eq!(s.mask().count_inside(), 8);
    }

    #[test]
    fn inner_margin_removes_shallow_voxels() {
        let s = boxed([12, 12, 12], [1.0; 3], [1, 1, 1], [11, 11, 11]);
        let out = MarginSymmetric::new(&s, -3.0).execute().unwrap();
        assert_eq!(out.mask().count_inside(), 4 * 4 * 4);
        assert!((extent(&out, 0) - 4.0).abs() < 1e-9);

        let gone = MarginSymmetric::new(&s, -6.0).execute().unwrap();
        assert!(gone.is_empty());
    }

    #[test]
    fn inner_margin_on_border_touching_mask() {
        let s = boxed([5, 5, 5], [1.0; 3], [0, 0, 0], [5, 5, 5]);
        let out = MarginSymmetric::new(&s, -1.0).execute().unwrap();
        // The exterior counts as outside even though the mask fills the grid.
        assert_eq!(out.mask().count_inside(), 3 * 3 * 3);
    }

    #[test]
    fn eclipse_fudge_inflates_by_half_a_voxel() {
        let s = boxed([3, 3, 3], [2.0; 3], [1, 1, 1], [2, 2, 2]);
        let plain = MarginSymmetric::new(&s, 2.0).execute().unwrap();
        let fudged = MarginSymmetric::new(&s, 2.0).with_eclipse_fudge(true).execute().unwrap();
        assert!(fudged.mask().count_inside() > plain.mask().count_inside());
        // Radius 3 mm on a 2 mm grid reaches the diagonal neighbour in-plane.
        assert_eq!(plain.mask().count_inside(), 7);
        assert_eq!(fudged.mask().count_inside(), 19);
    }

    #[test]
    fn directional_outer_only_moves_requested_sides() {
        let s = boxed([6, 6, 3], [1.0; 3], [1, 1, 1], [5, 5, 2]);
        let per_side = PerSideMargins {
            left: 3.0,
            anterior: 1.0,
            ..PerSideMargins::default()
        };
        let out = MarginAsymmetric::new(&s, true, per_side).execute().unwrap();
        let (min0, max0) = s.world_bounds().unwrap();
        let (min1, max1) = out.world_bounds().unwrap();
        // Left is +X, anterior is −Y.
        assert!((max1.x - (max0.x + 3.0)).abs() < 1e-9);
        assert!((min1.x - min0.x).abs() < 1e-9);
        assert!((min1.y - (min0.y - 1.0)).abs() < 1e-9);
        assert!((max1.y - max0.y).abs() < 1e-9);
        assert!((min1.z - min0.z).abs() < 1e-9 && (max1.z - max0.z).abs() < 1e-9);
    }

    #[test]
    fn directional_inner_only_moves_requested_sides() {
        let s = boxed([12, 12, 3], [1.0; 3], [1, 1, 1], [11, 11, 2]);
        let per_side = PerSideMargins {
            right: 2.0,
            posterior: 3.0,
            ..PerSideMargins::default()
        };
        let out = MarginAsymmetric::new(&s, false, per_side).execute().unwrap();
        let (min0, max0) = s.world_bounds().unwrap();
        let (min1, max1) = out.world_bounds().unwrap();
        // Right (−X) side moves in by 2, posterior (+Y) by 3, others stay.
        assert!((min1.x - (min0.x + 2.0)).abs() < 1e-9);
        assert!((max1.x - max0.x).abs() < 1e-9);
        assert!((max1.y - (max0.y - 3.0)).abs() < 1e-9);
        assert!((min1.y - min0.y).abs() < 1e-9);
        assert_eq!(out.mask().count_inside(), 8 * 7);
    }

    #[test]
    fn uniform_directional_matches_symmetric() {
        let s = boxed([7, 7, 7], [1.0, 1.0, 2.0], [2, 2, 2], [5, 4, 4]);
        let sym = MarginSymmetric::new(&s, 2.0).execute().unwrap();
        let dir = MarginAsymmetric::new(&s, true, PerSideMargins::uniform(2.0))
            .execute()
            .unwrap();
        assert_eq!(sym.grid(), dir.grid());
        assert_eq!(sym.mask().as_slice(), dir.mask().as_slice());
    }

    #[test]
    fn collapse_mode_uses_largest_side() {
        let s = boxed([5, 5, 5], [1.0; 3], [2, 2, 2], [3, 3, 3]);
        let per_side = PerSideMargins {
            superior: 2.0,
            ..PerSideMargins::default()
        };
        let collapsed = MarginAsymmetric::new(&s, true, per_side)
            .collapse_to_isotropic()
            .execute()
            .unwrap();
        let sym = MarginSymmetric::new(&s, 2.0).execute().unwrap();
        assert_eq!(collapsed, sym);
    }

    #[test]
    fn anisotropic_uses_larger_side_per_axis() {
        let s = boxed([3, 3, 3], [1.0; 3], [1, 1, 1], [2, 2, 2]);
        let per_side = PerSideMargins {
            left: 2.0,
            right: 1.0,
            ..PerSideMargins::default()
        };
        let out = MarginAnisotropic::new(&s, true, per_side).execute().unwrap();
        assert!((extent(&out, 0) - 5.0).abs() < 1e-9);
        assert!((extent(&out, 1) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_parameters() {
        let s = boxed([3, 3, 3], [1.0; 3], [1, 1, 1], [2, 2, 2]);
        assert!(MarginSymmetric::new(&s, f64::NAN).execute().is_err());
        assert!(MarginAsymmetric::new(&s, true, PerSideMargins::uniform(-1.0))
            .execute()
            .is_err());
        let tight = ResourceLimits { max_voxels: 100 };
        assert!(MarginSymmetric::new(&s, 10.0).with_limits(tight).execute().is_err());
    }

    fn inside_world_centers(s: &Structure) -> Vec<[i64; 3]> {
        let g = s.grid();
        s.mask()
            .as_slice()
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(|(i, _)| {
                let (x, y, z) = g.coords(i);
                let c = g.voxel_center(x, y, z);
                // Centers are on a half-integer lattice for unit spacing.
                [c.x, c.y, c.z].map(|v| (v * 2.0).round() as i64)
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn margins_are_monotonic(
            bits in prop::collection::vec(prop::bool::weighted(0.4), 5 * 5 * 3),
            m1 in -3.0_f64..3.0,
            delta in 0.1_f64..3.0,
        ) {
            let mask = Mask3D::from_vec(grid([5, 5, 3], [1.0; 3]), bits.iter().map(|&b| u8::from(b)).collect()).unwrap();
            let s = Structure::new(mask);
            let small = MarginSymmetric::new(&s, m1).execute().unwrap();
            let large = MarginSymmetric::new(&s, m1 + delta).execute().unwrap();
            let big: std::collections::HashSet<_> = inside_world_centers(&large).into_iter().collect();
            for c in inside_world_centers(&small) {
                prop_assert!(big.contains(&c), "voxel {c:?} lost when margin grew");
            }
        }
    }
}
