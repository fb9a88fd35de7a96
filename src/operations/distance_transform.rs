//! Exact squared Euclidean distance transform on anisotropic grids.
//!
//! Each 1D pass builds the lower envelope of the parabolas
//! `f(p) + ((q − p)·res)²` rooted at every finite seed and samples it at
//! every position, so a line of `n` voxels costs O(n). Passes along Y then X
//! give the exact 2D transform of a plane; a final pass along Z completes
//! the 3D transform.

use tracing::debug;

use crate::grid::Float3D;
use crate::math::Vector3;

/// Which seeds a 1D pass may draw distance from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sweep {
    /// Seeds on either side of the query position.
    #[default]
    Both,
    /// Only seeds at or before the query position (`p ≤ q`).
    Forward,
    /// Only seeds at or after the query position (`p ≥ q`).
    Backward,
}

/// Settings for the pass along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisPass {
    /// Distance between neighbouring samples along the axis.
    pub resolution: f64,
    pub sweep: Sweep,
}

impl AxisPass {
    #[must_use]
    pub fn both(resolution: f64) -> Self {
        Self {
            resolution,
            sweep: Sweep::Both,
        }
    }
}

/// Squared distance transform of a seeded scalar field, in place.
///
/// The field must already be seeded: `0.0` at source voxels, `+∞` (or any
/// non-finite value) elsewhere. Non-finite values never act as sources. An
/// axis without a pass contributes no propagation along that axis.
#[derive(Debug, Clone, Copy)]
pub struct DistanceTransform {
    axes: [Option<AxisPass>; 3],
}

impl DistanceTransform {
    /// Full two-sided transform with the given per-axis spacing.
    #[must_use]
    pub fn new(resolution: Vector3) -> Self {
        Self {
            axes: [
                Some(AxisPass::both(resolution.x)),
                Some(AxisPass::both(resolution.y)),
                Some(AxisPass::both(resolution.z)),
            ],
        }
    }

    /// Replaces the pass along `axis` (0 = X, 1 = Y, 2 = Z); `None` disables it.
    #[must_use]
    pub fn with_axis(mut self, axis: usize, pass: Option<AxisPass>) -> Self {
        self.axes[axis] = pass;
        self
    }

    /// Runs the transform over `field`.
    pub fn execute(&self, field: &mut Float3D) {
        let [nx, ny, nz] = field.grid().dims();
        debug!(nx, ny, nz, axes = ?self.axes, "distance transform");

        let mut lines = LineScratch::new(nx.max(ny).max(nz));
        let plane_len = nx * ny;
        let data = field.as_mut_slice();

        for plane in data.chunks_exact_mut(plane_len) {
            if let Some(pass) = self.axes[1] {
                transform_lines(plane, ny, nx, nx, 1, pass, &mut lines);
            }
            if let Some(pass) = self.axes[0] {
                transform_lines(plane, nx, 1, ny, nx, pass, &mut lines);
            }
        }
        if let Some(pass) = self.axes[2] {
            transform_lines(data, nz, plane_len, plane_len, 1, pass, &mut lines);
        }
    }
}

/// 1D squared distance transform of `seed` into `out`.
///
/// `out[q] = min over finite seed[p] of seed[p] + ((q − p)·resolution)²`,
/// restricted by `sweep`; positions with no admissible seed get `+∞`.
///
/// # Panics
///
/// Panics if `out` is shorter than `seed`.
pub fn squared_edt_1d(seed: &[f32], out: &mut [f32], resolution: f64, sweep: Sweep) {
    let mut env = Envelope::with_capacity(seed.len());
    let out = &mut out[..seed.len()];
    match sweep {
        Sweep::Both => env.two_sided(seed, out, resolution),
        Sweep::Forward => env.forward(seed, out, resolution),
        Sweep::Backward => {
            let reversed: Vec<f32> = seed.iter().rev().copied().collect();
            env.forward(&reversed, out, resolution);
            out.reverse();
        }
    }
}

/// Applies the 1D transform to `count` lines of length `len`.
///
/// Line `i` starts at `i·line_step` when `count` lines are laid out with a
/// single step, which covers every line family used here: rows of a plane
/// (`step = 1`, `line_step = nx`), columns of a plane (`step = nx`,
/// `line_step = 1`) and Z columns (`step = nx·ny`, `line_step = 1`).
fn transform_lines(
    data: &mut [f32],
    len: usize,
    step: usize,
    count: usize,
    line_step: usize,
    pass: AxisPass,
    lines: &mut LineScratch,
) {
    if len <= 1 {
        return;
    }
    for i in 0..count {
        let start = i * line_step;
        let input = &mut lines.input[..len];
        for (j, slot) in input.iter_mut().enumerate() {
            *slot = data[start + j * step];
        }
        let output = &mut lines.output[..len];
        match pass.sweep {
            Sweep::Both => lines.env.two_sided(input, output, pass.resolution),
            Sweep::Forward => lines.env.forward(input, output, pass.resolution),
            Sweep::Backward => {
                input.reverse();
                lines.env.forward(input, output, pass.resolution);
                output.reverse();
            }
        }
        for (j, &value) in output.iter().enumerate() {
            data[start + j * step] = value;
        }
    }
}

struct LineScratch {
    input: Vec<f32>,
    output: Vec<f32>,
    env: Envelope,
}

impl LineScratch {
    fn new(len: usize) -> Self {
        Self {
            input: vec![0.0; len],
            output: vec![0.0; len],
            env: Envelope::with_capacity(len),
        }
    }
}

/// Lower envelope of parabolas: `sites[k]` owns positions from `starts[k]`
/// up to `starts[k + 1]`.
struct Envelope {
    sites: Vec<usize>,
    starts: Vec<f64>,
}

impl Envelope {
    fn with_capacity(n: usize) -> Self {
        Self {
            sites: Vec::with_capacity(n),
            starts: Vec::with_capacity(n),
        }
    }

    fn clear(&mut self) {
        self.sites.clear();
        self.starts.clear();
    }

    /// Adds the parabola rooted at `q`, dropping sites it fully dominates.
    #[allow(clippy::cast_precision_loss)]
    fn push(&mut self, f: &[f32], q: usize, res: f64) {
        let fq = f64::from(f[q]);
        if !fq.is_finite() {
            return;
        }
        let xq = q as f64 * res;
        while let (Some(&p), Some(&start)) = (self.sites.last(), self.starts.last()) {
            let xp = p as f64 * res;
            let fp = f64::from(f[p]);
            let s = ((fq + xq * xq) - (fp + xp * xp)) / (2.0 * (xq - xp));
            if s <= start && self.sites.len() > 1 {
                self.sites.pop();
                self.starts.pop();
            } else {
                self.sites.push(q);
                self.starts.push(s);
                return;
            }
        }
        self.sites.push(q);
        self.starts.push(f64::NEG_INFINITY);
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn value(f: &[f32], site: usize, q: usize, res: f64) -> f32 {
        let d = (q as f64 - site as f64) * res;
        (f64::from(f[site]) + d * d) as f32
    }

    #[allow(clippy::cast_precision_loss)]
    fn two_sided(&mut self, f: &[f32], out: &mut [f32], res: f64) {
        self.clear();
        for q in 0..f.len() {
            self.push(f, q, res);
        }
        if self.sites.is_empty() {
            out.fill(f32::INFINITY);
            return;
        }
        let mut k = 0;
        for (q, slot) in out.iter_mut().enumerate() {
            let x = q as f64 * res;
            while k + 1 < self.sites.len() && self.starts[k + 1] < x {
                k += 1;
            }
            *slot = Self::value(f, self.sites[k], q, res);
        }
    }

    /// One-sided transform: the envelope only ever holds sites `≤ q` when
    /// position `q` is sampled.
    #[allow(clippy::cast_precision_loss)]
    fn forward(&mut self, f: &[f32], out: &mut [f32], res: f64) {
        self.clear();
        let mut k = 0;
        for (q, slot) in out.iter_mut().enumerate() {
            self.push(f, q, res);
            if self.sites.is_empty() {
                *slot = f32::INFINITY;
                continue;
            }
            let x = q as f64 * res;
            k = k.min(self.sites.len() - 1);
            while k > 0 && self.starts[k] > x {
                k -= 1;
            }
            while k + 1 < self.sites.len() && self.starts[k + 1] < x {
                k += 1;
            }
            *slot = Self::value(f, self.sites[k], q, res);
        }
    }
}
