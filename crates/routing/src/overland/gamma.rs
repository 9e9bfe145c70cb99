//! Overland flow by Gamma-kernel convolution (OLR_CIUH_GAMMA)

use crate::transport::Convolution;
use rivulet_core::error::check_len;
use rivulet_core::{Error, Result, SubbasinTotals};
use rivulet_parallel::{reduce_by_key, Executor};

/// Gamma convolution router for surface runoff.
///
/// Unlike the IUH router this one consumes the surface runoff it is given:
/// after a step the runoff slice is zero and the water is either in the
/// convolution history or has left through `to_channel`.
pub struct GammaOverland {
    convolution: Convolution,
    subbasin: Vec<i64>,
    n_subbasins: usize,
    cell_area: Vec<f64>,
    dt: f64,
    cell_outflow: Vec<f64>,
    to_channel: SubbasinTotals,
}

impl GammaOverland {
    /// `scale` and `shape` per cell, `cell_area` in m², `dt` in seconds
    pub fn new(scale: &[f64], shape: &[f64], subbasin: &[i64], cell_area: Vec<f64>, dt: f64) -> Result<Self> {
        let convolution = Convolution::gamma(scale, shape)?;
        let n = convolution.n_cells();
        check_len("subbasin", n, subbasin.len())?;
        check_len("cell_area", n, cell_area.len())?;
        if !(dt > 0.0) {
            return Err(Error::config("gamma_overland", "time step must be positive"));
        }
        let n_subbasins = subbasin.iter().copied().max().unwrap_or(0).max(0) as usize;
        Ok(Self {
            convolution,
            subbasin: subbasin.to_vec(),
            n_subbasins,
            cell_area,
            dt,
            cell_outflow: vec![0.0; n],
            to_channel: SubbasinTotals::zeros(n_subbasins),
        })
    }

    /// Advance one step, consuming `surface_runoff` (mm)
    pub fn step(&mut self, exec: &Executor, surface_runoff: &mut [f64]) -> Result<()> {
        self.cell_outflow.iter_mut().for_each(|v| *v = 0.0);
        self.convolution.step(surface_runoff, &mut self.cell_outflow)?;

        let scale = 0.001 / self.dt;
        let (out, area, subbasin) = (&self.cell_outflow, &self.cell_area, &self.subbasin);
        let partial = reduce_by_key(exec, out.len(), self.n_subbasins + 1, |cell| {
            (subbasin[cell] > 0).then(|| (subbasin[cell] as usize, out[cell] * area[cell] * scale))
        })?;
        self.to_channel = SubbasinTotals::from_partial(partial)?;
        Ok(())
    }

    /// Overland flow entering the channel per sub-basin (m³/s)
    pub fn to_channel(&self) -> &SubbasinTotals {
        &self.to_channel
    }

    /// Runoff leaving each cell in the last step (mm)
    pub fn cell_outflow(&self) -> &[f64] {
        &self.cell_outflow
    }

    pub fn convolution(&self) -> &Convolution {
        &self.convolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_runoff_consumed_and_conserved() {
        let (dt, area) = (86_400.0, 900.0);
        let mut ol = GammaOverland::new(&[2.0, 3.0], &[1.0, 1.0], &[1, 2], vec![area; 2], dt).unwrap();
        let exec = Executor::sequential();

        let mut runoff = vec![20.0, 10.0];
        ol.step(&exec, &mut runoff).unwrap();
        assert_eq!(runoff, vec![0.0, 0.0], "surface runoff is consumed");

        let mut volume = ol.to_channel().total() * dt;
        for _ in 0..60 {
            let mut dry = vec![0.0; 2];
            ol.step(&exec, &mut dry).unwrap();
            volume += ol.to_channel().total() * dt;
        }
        assert_relative_eq!(volume, 30.0 * 0.001 * area, epsilon = 1e-9);
        assert!(ol.convolution().is_drained());
    }

    #[test]
    fn test_invalid_kernel_propagates() {
        assert!(GammaOverland::new(&[1.0], &[10.0], &[1], vec![900.0], 60.0).is_err());
    }
}
