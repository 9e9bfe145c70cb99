//! Per-cell IUH convolution buffers
//!
//! Each cell keeps the future outflow it has already committed to. A step
//! shifts every row one lag toward the front, spreads the new input over
//! the cell's unit hydrograph, and reads the front as this step's outflow.

use crate::iuh::UnitHydrograph;
use rivulet_core::error::check_len;
use rivulet_core::{Result, SubbasinTotals};
use rivulet_parallel::{reduce_by_key, Executor};

/// Shift buffers for a set of cells
#[derive(Debug, Clone, PartialEq)]
pub struct IuhBuffer {
    width: usize,
    rows: Vec<Vec<f64>>,
}

impl IuhBuffer {
    /// Buffers wide enough for the longest of `responses`
    pub fn for_responses(responses: &[UnitHydrograph]) -> Self {
        let width = responses.iter().map(|uh| uh.end() + 1).max().unwrap_or(1);
        Self {
            width,
            rows: vec![vec![0.0; width]; responses.len()],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn n_cells(&self) -> usize {
        self.rows.len()
    }

    /// Advance every row by one lag; the last slot becomes zero
    pub fn shift(&mut self) {
        for row in &mut self.rows {
            row.rotate_left(1);
            if let Some(last) = row.last_mut() {
                *last = 0.0;
            }
        }
    }

    /// Spread `amount` over the support of `uh` in the row of `cell`
    pub fn inject(&mut self, cell: usize, amount: f64, uh: &UnitHydrograph) {
        let row = &mut self.rows[cell];
        for lag in uh.start()..=uh.end().min(row.len() - 1) {
            row[lag] += amount * uh.get(lag);
        }
    }

    /// Outflow of `cell` in the current step
    pub fn front(&self, cell: usize) -> f64 {
        self.rows[cell][0]
    }

    /// Everything still queued in the row of `cell`
    pub fn pending(&self, cell: usize) -> f64 {
        self.rows[cell].iter().sum()
    }

    pub fn is_drained(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(|&v| v == 0.0))
    }

    /// Shift, then inject `inputs[cell] · scale` for every cell with positive input
    pub fn advance(&mut self, responses: &[UnitHydrograph], inputs: &[f64], scale: f64) -> Result<()> {
        check_len("unit hydrographs", self.rows.len(), responses.len())?;
        check_len("buffer inputs", self.rows.len(), inputs.len())?;
        self.shift();
        for (cell, (&input, uh)) in inputs.iter().zip(responses).enumerate() {
            if input > 0.0 {
                self.inject(cell, input * scale, uh);
            }
        }
        Ok(())
    }

    /// Sum the fronts of all cells per sub-basin. Cells with id 0 or below
    /// are outside every sub-basin and are skipped.
    pub fn front_by_subbasin(&self, exec: &Executor, subbasin: &[i64], n_subbasins: usize) -> Result<SubbasinTotals> {
        check_len("subbasin", self.rows.len(), subbasin.len())?;
        let partial = reduce_by_key(exec, self.rows.len(), n_subbasins + 1, |cell| {
            (subbasin[cell] > 0).then(|| (subbasin[cell] as usize, self.rows[cell][0]))
        })?;
        SubbasinTotals::from_partial(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spread() -> UnitHydrograph {
        UnitHydrograph::from_coefficients(vec![0.5, 0.3, 0.2])
    }

    #[test]
    fn test_pulse_comes_out_over_three_steps() {
        let uh = [spread()];
        let mut buf = IuhBuffer::for_responses(&uh);
        buf.advance(&uh, &[10.0], 1.0).unwrap();
        assert_relative_eq!(buf.front(0), 5.0);
        buf.advance(&uh, &[0.0], 1.0).unwrap();
        assert_relative_eq!(buf.front(0), 3.0);
        buf.advance(&uh, &[0.0], 1.0).unwrap();
        assert_relative_eq!(buf.front(0), 2.0);
        buf.advance(&uh, &[0.0], 1.0).unwrap();
        assert_eq!(buf.front(0), 0.0);
        assert!(buf.is_drained());
    }

    #[test]
    fn test_unit_pulse_passes_through() {
        let uh = [UnitHydrograph::unit_pulse()];
        let mut buf = IuhBuffer::for_responses(&uh);
        buf.advance(&uh, &[4.0], 0.5).unwrap();
        assert_relative_eq!(buf.front(0), 2.0);
        assert_relative_eq!(buf.pending(0), 2.0);
    }

    #[test]
    fn test_length_checked() {
        let uh = [spread()];
        let mut buf = IuhBuffer::for_responses(&uh);
        assert!(buf.advance(&uh, &[1.0, 2.0], 1.0).is_err());
    }
}
