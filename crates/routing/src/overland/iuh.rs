//! Overland flow by cell IUH convolution (IUH_OL)
//!
//! Surface runoff of each cell is spread over its unit hydrograph and the
//! front of every cell buffer is summed per sub-basin as the overland flow
//! entering the channel. Surface runoff itself is read only.

use crate::iuh::UnitHydrograph;
use crate::transport::IuhBuffer;
use rivulet_core::error::check_len;
use rivulet_core::{Error, Result, SubbasinTotals};
use rivulet_parallel::Executor;

/// IUH overland router
pub struct IuhOverland {
    responses: Vec<UnitHydrograph>,
    subbasin: Vec<i64>,
    n_subbasins: usize,
    cell_area: f64,
    dt: f64,
    buffer: IuhBuffer,
    cell_outflow: Vec<f64>,
    to_channel: SubbasinTotals,
}

impl IuhOverland {
    /// `responses[cell]` at the model step resolution, `dt` in seconds
    pub fn new(responses: Vec<UnitHydrograph>, subbasin: &[i64], cell_area: f64, dt: f64) -> Result<Self> {
        check_len("subbasin", responses.len(), subbasin.len())?;
        if !(cell_area > 0.0) || !(dt > 0.0) {
            return Err(Error::config("iuh_overland", "cell area and time step must be positive"));
        }
        let n_subbasins = subbasin.iter().copied().max().unwrap_or(0).max(0) as usize;
        Ok(Self {
            buffer: IuhBuffer::for_responses(&responses),
            cell_outflow: vec![0.0; responses.len()],
            responses,
            subbasin: subbasin.to_vec(),
            n_subbasins,
            cell_area,
            dt,
            to_channel: SubbasinTotals::zeros(n_subbasins),
        })
    }

    /// Advance one step with this step's surface runoff (mm).
    pub fn step(&mut self, exec: &Executor, surface_runoff: &[f64]) -> Result<()> {
        let scale = 0.001 * self.cell_area / self.dt;
        self.buffer.advance(&self.responses, surface_runoff, scale)?;

        self.to_channel = self.buffer.front_by_subbasin(exec, &self.subbasin, self.n_subbasins)?;
        let buffer = &self.buffer;

        let to_mm = self.dt * 1000.0 / self.cell_area;
        for (cell, out) in self.cell_outflow.iter_mut().enumerate() {
            *out = buffer.front(cell) * to_mm;
        }
        Ok(())
    }

    /// Overland flow entering the channel per sub-basin (m³/s)
    pub fn to_channel(&self) -> &SubbasinTotals {
        &self.to_channel
    }

    /// Overland outflow of each cell in the last step (mm)
    pub fn cell_outflow(&self) -> &[f64] {
        &self.cell_outflow
    }

    pub fn buffer(&self) -> &IuhBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_volume_is_conserved() {
        let responses = vec![
            UnitHydrograph::from_coefficients(vec![0.2, 0.5, 0.3]),
            UnitHydrograph::unit_pulse(),
            UnitHydrograph::from_coefficients(vec![0.0, 1.0]),
        ];
        let (area, dt) = (900.0, 3600.0);
        let mut ol = IuhOverland::new(responses, &[1, 1, 2], area, dt).unwrap();
        let exec = Executor::sequential();

        let mut volume_out = 0.0;
        ol.step(&exec, &[10.0, 4.0, 6.0]).unwrap();
        volume_out += ol.to_channel().total() * dt;
        for _ in 0..4 {
            ol.step(&exec, &[0.0; 3]).unwrap();
            volume_out += ol.to_channel().total() * dt;
        }
        let volume_in = (10.0 + 4.0 + 6.0) * 0.001 * area;
        assert_relative_eq!(volume_out, volume_in, epsilon = 1e-9);
        assert!(ol.buffer().is_drained());
    }

    #[test]
    fn test_cell_outflow_in_mm() {
        let mut ol = IuhOverland::new(vec![UnitHydrograph::unit_pulse()], &[1], 900.0, 60.0).unwrap();
        ol.step(&Executor::sequential(), &[7.0]).unwrap();
        assert_relative_eq!(ol.cell_outflow()[0], 7.0, epsilon = 1e-12);
        assert_eq!(ol.to_channel().n_subbasins(), 1);
        assert_relative_eq!(ol.to_channel()[0], ol.to_channel()[1]);
    }
}
