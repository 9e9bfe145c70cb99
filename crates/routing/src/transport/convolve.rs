//! Discrete convolution transport
//!
//! Every cell owns a unit hydrograph and a history of what entered it. A
//! step pushes the entering flux into the history, adds the convolution
//! of history and kernel to the leaving flux, and consumes the entering
//! flux.

use super::gamma::gamma_unit_hydrograph;
use super::gr4j::{gr4j_unit_hydrograph, Gr4jKernel};
use rivulet_core::error::check_len;
use rivulet_core::{Error, Result};
use tracing::debug;

/// Kernels must sum to one within this tolerance
const NORMALISATION_TOLERANCE: f64 = 1e-6;

/// Per-cell convolution transporter
#[derive(Debug, Clone)]
pub struct Convolution {
    kernels: Vec<Vec<f64>>,
    history: Vec<Vec<f64>>,
}

impl Convolution {
    /// Transporter over explicit per-cell kernels.
    ///
    /// # Errors
    /// `Error::InvalidParameter` if a kernel is empty, has negative
    /// weights or does not sum to one.
    pub fn new(kernels: Vec<Vec<f64>>) -> Result<Self> {
        for (cell, uh) in kernels.iter().enumerate() {
            let sum: f64 = uh.iter().sum();
            if uh.is_empty() || uh.iter().any(|&h| h < 0.0) || (sum - 1.0).abs() > NORMALISATION_TOLERANCE {
                return Err(Error::invalid(
                    "unit hydrograph",
                    format!("cell {cell}, sum {sum}"),
                    "kernel must be non-negative and sum to one",
                ));
            }
        }
        let history = kernels.iter().map(|uh| vec![0.0; uh.len()]).collect();
        Ok(Self { kernels, history })
    }

    /// Gamma kernels from per-cell `scale` and `shape` grids
    pub fn gamma(scale: &[f64], shape: &[f64]) -> Result<Self> {
        check_len("gamma shape", scale.len(), shape.len())?;
        let kernels = scale
            .iter()
            .zip(shape)
            .map(|(&a, &b)| gamma_unit_hydrograph(a, b))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            cells = kernels.len(),
            longest = kernels.iter().map(Vec::len).max().unwrap_or(0),
            "gamma unit hydrographs built"
        );
        Self::new(kernels)
    }

    /// The same GR4J kernel for every one of `n_cells`
    pub fn gr4j(kernel: Gr4jKernel, x4: f64, tstep: f64, n_cells: usize) -> Result<Self> {
        let uh = gr4j_unit_hydrograph(kernel, x4, tstep)?;
        Self::new(vec![uh; n_cells])
    }

    pub fn n_cells(&self) -> usize {
        self.kernels.len()
    }

    pub fn kernel(&self, cell: usize) -> &[f64] {
        &self.kernels[cell]
    }

    /// Convolve one step. `entering` is consumed (set to zero) and the
    /// transported flux is added to `leaving`.
    pub fn step(&mut self, entering: &mut [f64], leaving: &mut [f64]) -> Result<()> {
        check_len("entering", self.n_cells(), entering.len())?;
        check_len("leaving", self.n_cells(), leaving.len())?;

        for (cell, (uh, hist)) in self.kernels.iter().zip(self.history.iter_mut()).enumerate() {
            hist[0] = entering[cell];
            entering[cell] = 0.0;
            leaving[cell] += hist.iter().zip(uh).map(|(v, h)| v * h).sum::<f64>();
            hist.rotate_right(1);
            hist[0] = 0.0;
        }
        Ok(())
    }

    /// Flux still in transit
    pub fn pending(&self) -> f64 {
        self.history
            .iter()
            .zip(&self.kernels)
            .map(|(hist, uh)| {
                // history[n] has already released weights 0..n
                hist.iter()
                    .enumerate()
                    .map(|(n, v)| v * uh[n..].iter().sum::<f64>())
                    .sum::<f64>()
            })
            .sum()
    }

    pub fn is_drained(&self) -> bool {
        self.history.iter().all(|hist| hist.iter().all(|&v| v == 0.0))
    }
}
