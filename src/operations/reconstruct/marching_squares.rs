//! Binary marching squares over one plane of a mask.
//!
//! Samples sit at voxel centers. A boundary crossing is placed halfway
//! between an inside and an outside sample, i.e. on a voxel face. Points
//! are returned on a doubled lattice (`2 ×` grid-local voxel units) so that
//! every crossing has integer coordinates.

/// A point on the doubled lattice: grid-local coordinate × 2.
pub(crate) type LatticePoint = (i64, i64);

/// A boundary segment produced by one cell.
pub(crate) type Segment = (LatticePoint, LatticePoint);

#[derive(Debug, Clone, Copy)]
enum Edge {
    Bottom,
    Right,
    Top,
    Left,
}

use Edge::{Bottom, Left, Right, Top};

/// Segments per corner-occupancy case. Bit 0 is the lower-left sample,
/// then lower-right, upper-right, upper-left.
///
/// Saddles (5 and 10) never connect the two inside corners: each one is
/// cut off on its own.
const CASES: [&[(Edge, Edge)]; 16] = [
    &[],
    &[(Left, Bottom)],
    &[(Bottom, Right)],
    &[(Left, Right)],
    &[(Right, Top)],
    &[(Left, Bottom), (Right, Top)],
    &[(Bottom, Top)],
    &[(Left, Top)],
    &[(Top, Left)],
    &[(Bottom, Top)],
    &[(Bottom, Right), (Top, Left)],
    &[(Right, Top)],
    &[(Left, Right)],
    &[(Bottom, Right)],
    &[(Left, Bottom)],
    &[],
];

/// Extracts boundary segments of `plane` (`nx × ny`, row-major).
///
/// The plane is treated as surrounded by outside samples, so the segments
/// always form closed loops.
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn extract(plane: &[u8], nx: usize, ny: usize) -> Vec<Segment> {
    let nx_i = nx as i64;
    let ny_i = ny as i64;
    let sample = |x: i64, y: i64| -> bool {
        x >= 0 && y >= 0 && x < nx_i && y < ny_i && plane[(y * nx_i + x) as usize] != 0
    };

    let mut segments = Vec::new();
    // Cell (i, j) has its lower-left sample at (i, j); include the ring of
    // cells that straddle the plane border.
    for j in -1..ny_i {
        for i in -1..nx_i {
            let case = usize::from(sample(i, j))
                | usize::from(sample(i + 1, j)) << 1
                | usize::from(sample(i + 1, j + 1)) << 2
                | usize::from(sample(i, j + 1)) << 3;
            for &(a, b) in CASES[case] {
                segments.push((crossing(i, j, a), crossing(i, j, b)));
            }
        }
    }
    segments
}

fn crossing(i: i64, j: i64, edge: Edge) -> LatticePoint {
    match edge {
        Bottom => (2 * i + 2, 2 * j + 1),
        Right => (2 * i + 3, 2 * j + 2),
        Top => (2 * i + 2, 2 * j + 3),
        Left => (2 * i + 1, 2 * j + 2),
    }
}
