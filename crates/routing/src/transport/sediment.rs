//! Overland sediment routing by cell IUH (IUH_SED_OL)

use super::IuhBuffer;
use crate::iuh::UnitHydrograph;
use rivulet_core::error::check_len;
use rivulet_core::{Result, SubbasinTotals};
use rivulet_parallel::Executor;

/// Routes eroded sediment from cells to the channel of their sub-basin.
///
/// Sediment yield enters in the units it is produced in (typically kg) and
/// leaves in the same units; the IUH only delays it.
pub struct SedimentOverland {
    responses: Vec<UnitHydrograph>,
    subbasin: Vec<i64>,
    n_subbasins: usize,
    buffer: IuhBuffer,
    to_channel: SubbasinTotals,
}

impl SedimentOverland {
    pub fn new(responses: Vec<UnitHydrograph>, subbasin: &[i64]) -> Result<Self> {
        check_len("subbasin", responses.len(), subbasin.len())?;
        let n_subbasins = subbasin.iter().copied().max().unwrap_or(0).max(0) as usize;
        Ok(Self {
            buffer: IuhBuffer::for_responses(&responses),
            responses,
            subbasin: subbasin.to_vec(),
            n_subbasins,
            to_channel: SubbasinTotals::zeros(n_subbasins),
        })
    }

    /// Advance one step with this step's sediment yield per cell
    pub fn step(&mut self, exec: &Executor, sediment_yield: &[f64]) -> Result<()> {
        self.buffer.advance(&self.responses, sediment_yield, 1.0)?;
        self.to_channel = self.buffer.front_by_subbasin(exec, &self.subbasin, self.n_subbasins)?;
        Ok(())
    }

    /// Sediment entering the channel per sub-basin in the last step
    pub fn to_channel(&self) -> &SubbasinTotals {
        &self.to_channel
    }

    /// Sediment leaving `cell` in the last step
    pub fn cell_outflow(&self, cell: usize) -> f64 {
        self.buffer.front(cell)
    }

    pub fn is_drained(&self) -> bool {
        self.buffer.is_drained()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sediment_reaches_channel() {
        let responses = vec![
            UnitHydrograph::from_coefficients(vec![0.0, 0.6, 0.4]),
            UnitHydrograph::unit_pulse(),
        ];
        let mut sed = SedimentOverland::new(responses, &[1, 2]).unwrap();
        let exec = Executor::sequential();

        sed.step(&exec, &[100.0, 50.0]).unwrap();
        assert_eq!(sed.to_channel()[1], 0.0, "first lag of cell 0 is empty");
        assert_relative_eq!(sed.to_channel()[2], 50.0);
        assert_relative_eq!(sed.to_channel()[0], 50.0);

        sed.step(&exec, &[0.0, 0.0]).unwrap();
        assert_relative_eq!(sed.to_channel()[1], 60.0);
        sed.step(&exec, &[0.0, 0.0]).unwrap();
        assert_relative_eq!(sed.cell_outflow(0), 40.0);
        sed.step(&exec, &[0.0, 0.0]).unwrap();
        assert!(sed.is_drained());
        assert_eq!(sed.to_channel().total(), 0.0);
    }

    #[test]
    fn test_negative_yield_ignored() {
        let mut sed = SedimentOverland::new(vec![UnitHydrograph::unit_pulse()], &[1]).unwrap();
        sed.step(&Executor::sequential(), &[-3.0]).unwrap();
        assert_eq!(sed.to_channel().total(), 0.0);
    }
}
