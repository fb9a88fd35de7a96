//! Contours in, margined contours out.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::config::PipelineConfig;
use crate::contour::{Contour, MarginRequest};
use crate::error::{HostError, Result};
use crate::operations::{apply_margin, BuildStructure, ReconstructContours};

/// Runs Grid Builder → Margin Operator → Contour Reconstructor for one
/// structure.
///
/// When a cancel flag is attached it is checked before every stage and the
/// run stops with [`HostError::Cancelled`] once it is set.
#[derive(Debug)]
pub struct MarginPipeline<'a> {
    contours: &'a [Contour],
    request: MarginRequest,
    config: PipelineConfig,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> MarginPipeline<'a> {
    #[must_use]
    pub fn new(contours: &'a [Contour], request: MarginRequest, config: PipelineConfig) -> Self {
        Self {
            contours,
            request,
            config,
            cancel: None,
        }
    }

    /// Attaches a flag that aborts the run at the next stage boundary.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Executes the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is invalid, a grid would exceed the
    /// configured voxel limit, or the run was cancelled.
    pub fn execute(&self) -> Result<Vec<Contour>> {
        self.checkpoint()?;
        let structure = BuildStructure::new(self.contours, self.config.spacing, self.config.padding)
            .with_limits(self.config.limits)
            .execute()?;

        self.checkpoint()?;
        let margined = apply_margin(
            &structure,
            &self.request,
            self.config.eclipse_fudge,
            self.config.limits,
        )?;
        if margined.is_empty() {
            debug!("margin left an empty structure");
            return Ok(Vec::new());
        }

        self.checkpoint()?;
        let slices = slice_positions(self.contours);
        Ok(ReconstructContours::new(&margined, &slices)
            .with_params(self.config.reconstruct)
            .execute())
    }

    fn checkpoint(&self) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::Acquire) => Err(HostError::Cancelled.into()),
            _ => Ok(()),
        }
    }
}

/// Distinct input slice positions in ascending order.
fn slice_positions(contours: &[Contour]) -> Vec<f64> {
    let mut slices: Vec<f64> = contours
        .iter()
        .filter(|c| c.is_polygon() && c.is_finite())
        .map(|c| c.slice_position)
        .collect();
    slices.sort_by(f64::total_cmp);
    slices.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    slices
}
