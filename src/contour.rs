//! Planar contours and margin requests exchanged with callers.

use serde::{Deserialize, Serialize};

use crate::math::Point3;

/// A closed polygon on one axial slice, in world millimeters.
///
/// Serialized as `{ "points": [x0, y0, z0, x1, ...], "slicePosition": z }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contour {
    #[serde(with = "flat_points")]
    pub points: Vec<Point3>,
    pub slice_position: f64,
}

impl Contour {
    #[must_use]
    pub fn new(points: Vec<Point3>, slice_position: f64) -> Self {
        Self {
            points,
            slice_position,
        }
    }

    /// Builds a contour from `(x, y)` pairs on the slice at `z`.
    #[must_use]
    pub fn from_xy(xy: &[(f64, f64)], z: f64) -> Self {
        Self::new(xy.iter().map(|&(x, y)| Point3::new(x, y, z)).collect(), z)
    }

    /// Whether the contour has enough vertices to enclose an area.
    #[must_use]
    pub fn is_polygon(&self) -> bool {
        self.points.len() >= 3
    }

    /// Whether every coordinate and the slice position are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.slice_position.is_finite()
            && self
                .points
                .iter()
                .all(|p| p.x.is_finite() && p.y.is_finite() && p.z.is_finite())
    }

    /// Enclosed area in mm² (absolute shoelace area of the XY projection).
    #[must_use]
    pub fn area(&self) -> f64 {
        let xy: Vec<_> = self.points.iter().map(|p| p.xy()).collect();
        crate::math::polygon_2d::signed_area(&xy).abs()
    }
}

/// Directional margin distances in mm, all non-negative.
///
/// Patient axes follow DICOM LPS: +X left, +Y posterior, +Z superior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerSideMargins {
    #[serde(rename = "post")]
    pub posterior: f64,
    #[serde(rename = "ant")]
    pub anterior: f64,
    pub left: f64,
    pub right: f64,
    #[serde(rename = "sup")]
    pub superior: f64,
    #[serde(rename = "inf")]
    pub inferior: f64,
}

impl PerSideMargins {
    /// The same distance on all six sides.
    #[must_use]
    pub fn uniform(distance: f64) -> Self {
        Self {
            posterior: distance,
            anterior: distance,
            left: distance,
            right: distance,
            superior: distance,
            inferior: distance,
        }
    }

    /// Distances toward the negative grid direction, `[-X, -Y, -Z]`.
    #[must_use]
    pub fn negative(&self) -> [f64; 3] {
        [self.right, self.anterior, self.inferior]
    }

    /// Distances toward the positive grid direction, `[+X, +Y, +Z]`.
    #[must_use]
    pub fn positive(&self) -> [f64; 3] {
        [self.left, self.posterior, self.superior]
    }

    /// Builds margins from per-direction arrays in grid order.
    #[must_use]
    pub fn from_directions(negative: [f64; 3], positive: [f64; 3]) -> Self {
        Self {
            right: negative[0],
            anterior: negative[1],
            inferior: negative[2],
            left: positive[0],
            posterior: positive[1],
            superior: positive[2],
        }
    }

    /// Swaps every side with its opposite.
    #[must_use]
    pub fn reflected(&self) -> Self {
        Self::from_directions(self.positive(), self.negative())
    }

    /// Largest of the six distances.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.negative()
            .into_iter()
            .chain(self.positive())
            .fold(0.0, f64::max)
    }

    /// Whether every distance is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.max() <= 0.0
    }

    /// Whether every distance is finite and non-negative.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.negative()
            .into_iter()
            .chain(self.positive())
            .all(|d| d.is_finite() && d >= 0.0)
    }
}

/// What margin to apply to a structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarginRequest {
    /// Isotropic margin; positive grows, negative shrinks.
    Uniform { margin: f64 },
    /// Six independent side distances.
    #[serde(rename_all = "camelCase")]
    Directional {
        #[serde(default = "default_outer")]
        is_outer: bool,
        per_side: PerSideMargins,
    },
    /// Axis-symmetric ellipsoid; each axis uses the larger of its two sides.
    #[serde(rename_all = "camelCase")]
    Anisotropic {
        #[serde(default = "default_outer")]
        is_outer: bool,
        per_side: PerSideMargins,
    },
}

fn default_outer() -> bool {
    true
}

mod flat_points {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::math::Point3;

    pub fn serialize<S: Serializer>(points: &[Point3], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(points.iter().flat_map(|p| [p.x, p.y, p.z]))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Point3>, D::Error> {
        let flat = Vec::<f64>::deserialize(deserializer)?;
        if flat.len() % 3 != 0 {
            return Err(D::Error::custom(format!(
                "point list length {} is not a multiple of 3",
                flat.len()
            )));
        }
        Ok(flat
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn contour_uses_flat_triples() {
        let json = r#"{ "points": [0,0,5, 10,0,5, 10,10,5], "slicePosition": 5 }"#;
        let c: Contour = serde_json::from_str(json).unwrap();
        assert_eq!(c.points.len(), 3);
        assert!((c.points[1].x - 10.0).abs() < 1e-12);
        assert!((c.slice_position - 5.0).abs() < 1e-12);

        let back = serde_json::to_value(&c).unwrap();
        assert_eq!(back["points"].as_array().unwrap().len(), 9);
    }

    #[test]
    fn ragged_point_list_is_rejected() {
        let json = r#"{ "points": [0,0,5, 10], "slicePosition": 5 }"#;
        assert!(serde_json::from_str::<Contour>(json).is_err());
    }

    #[test]
    fn request_kinds_decode() {
        let u: MarginRequest = serde_json::from_str(r#"{ "kind": "UNIFORM", "margin": -3 }"#).unwrap();
        assert_eq!(u, MarginRequest::Uniform { margin: -3.0 });

        let d: MarginRequest = serde_json::from_str(
            r#"{ "kind": "DIRECTIONAL", "perSide": { "post": 1, "ant": 2, "left": 3, "right": 4, "sup": 5, "inf": 6 } }"#,
        )
        .unwrap();
        let MarginRequest::Directional { is_outer, per_side } = d else {
            panic!("expected directional, got {d:?}");
        };
        assert!(is_outer);
        assert_eq!(per_side.negative(), [4.0, 2.0, 6.0]);
        assert_eq!(per_side.positive(), [3.0, 1.0, 5.0]);

        let a: MarginRequest = serde_json::from_str(
            r#"{ "kind": "ANISOTROPIC", "isOuter": false, "perSide": { "left": 2 } }"#,
        )
        .unwrap();
        assert!(matches!(a, MarginRequest::Anisotropic { is_outer: false, .. }));
    }

    #[test]
    fn reflection_swaps_opposite_sides() {
        let m = PerSideMargins {
            left: 1.0,
            right: 2.0,
            ..PerSideMargins::default()
        };
        let r = m.reflected();
        assert!((r.left - 2.0).abs() < 1e-12);
        assert!((r.right - 1.0).abs() < 1e-12);
        assert!((m.max() - 2.0).abs() < 1e-12);
        assert!(m.is_valid());
        assert!(!PerSideMargins::uniform(-1.0).is_valid());
    }

    #[test]
    fn area_of_square() {
        let c = Contour::from_xy(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)], 0.0);
        approx::assert_relative_eq!(c.area(), 100.0);
    }
}
