//! Pipeline parameters.
//!
//! Every struct deserializes from camelCase JSON and falls back to its
//! `Default` for omitted fields.

use serde::{Deserialize, Serialize};

use crate::math::Vector3;

/// Upper bounds checked before any voxel buffer is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceLimits {
    /// Largest grid, in voxels, a single invocation may allocate.
    pub max_voxels: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_voxels: 128 * 1024 * 1024,
        }
    }
}

/// Parameters for turning a result mask back into contours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconstructParams {
    /// Max distance (mm) between a grid plane and an original slice for the
    /// plane to be re-keyed onto that slice. `None` means half the Z spacing.
    pub slice_tolerance: Option<f64>,
    /// Emit planes that match no original slice at their own Z.
    pub include_new_slices: bool,
    /// Douglas-Peucker tolerance as a fraction of the finer in-plane spacing.
    pub simplify_factor: f64,
}

impl Default for ReconstructParams {
    fn default() -> Self {
        Self {
            slice_tolerance: None,
            include_new_slices: true,
            simplify_factor: 0.25,
        }
    }
}

impl ReconstructParams {
    /// Sets an explicit slice matching tolerance in mm.
    #[must_use]
    pub fn with_slice_tolerance(mut self, tolerance: f64) -> Self {
        self.slice_tolerance = Some(tolerance);
        self
    }

    /// Controls whether planes without an original slice are emitted.
    #[must_use]
    pub fn with_new_slices(mut self, include: bool) -> Self {
        self.include_new_slices = include;
        self
    }
}

/// Configuration shared by one full contour → margin → contour run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Voxel spacing `[x, y, z]` in mm.
    pub spacing: [f64; 3],
    /// Room left around the contours' bounding box, in mm.
    pub padding: f64,
    /// Reproduce the historical half-voxel inflation of outer margins.
    pub eclipse_fudge: bool,
    pub reconstruct: ReconstructParams,
    pub limits: ResourceLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            spacing: [1.0, 1.0, 1.0],
            padding: 0.0,
            eclipse_fudge: false,
            reconstruct: ReconstructParams::default(),
            limits: ResourceLimits::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with the given spacing and padding.
    #[must_use]
    pub fn new(spacing: [f64; 3], padding: f64) -> Self {
        Self {
            spacing,
            padding,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reconstruct(mut self, params: ReconstructParams) -> Self {
        self.reconstruct = params;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_eclipse_fudge(mut self, enabled: bool) -> Self {
        self.eclipse_fudge = enabled;
        self
    }

    /// Spacing as a vector.
    #[must_use]
    pub fn resolution(&self) -> Vector3 {
        Vector3::new(self.spacing[0], self.spacing[1], self.spacing[2])
    }
}

/// Settings for the job host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostConfig {
    /// Number of worker threads; each runs one job at a time.
    pub workers: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}
