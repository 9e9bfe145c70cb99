//! Cell-level IUH calculation

use super::hydrograph::{finish, shape, aggregate, SupportRule, UnitHydrograph, CELL_SUPPORT};
use super::kernel::{iuh_kernel, is_degenerate, lag_bracket};
use rivulet_core::error::check_len;
use rivulet_core::{Error, Result};
use rivulet_parallel::{Executor, ParallelStrategy};
use tracing::debug;

/// Parameters shared by every IUH level
#[derive(Debug, Clone, Copy)]
pub struct IuhParams {
    /// Maximum IUH length in hours
    pub max_length: usize,
    /// Model time step in hours. Steps of one hour or more integrate the
    /// hourly coefficients into whole-hour buckets; shorter steps keep them
    /// unaggregated.
    pub dt_hours: f64,
}

impl Default for IuhParams {
    fn default() -> Self {
        Self {
            max_length: 200,
            dt_hours: 24.0,
        }
    }
}

/// Per-cell inputs to the IUH calculation.
///
/// `t0` and `delta` are the mean and standard deviation of the flow time to
/// the channel (hours), usually from [`super::flow_time`].
pub struct CellIuhCalculator<'a> {
    pub t0: &'a [f64],
    pub delta: &'a [f64],
    /// Sub-basin id of each cell (`1..=n`)
    pub subbasin: &'a [i64],
    /// Potential runoff coefficient, the weight of each cell in its sub-basin
    pub runoff_coefficient: &'a [f64],
    pub params: IuhParams,
}

/// Cell responses plus the weighted sums needed one level up
#[derive(Debug, Clone)]
pub struct CellIuhSet {
    /// Aggregated response of every cell
    pub cells: Vec<UnitHydrograph>,
    /// Runoff-weighted sum of fine cell responses per sub-basin (`[0..=n]`, 0 unused)
    pub(crate) subbasin_sum: Vec<Vec<f64>>,
    /// Sum of runoff coefficients per sub-basin
    pub(crate) subbasin_weight: Vec<f64>,
}

impl CellIuhSet {
    pub fn n_subbasins(&self) -> usize {
        self.subbasin_weight.len().saturating_sub(1)
    }

    /// Longest lag with a non-zero coefficient across all cells
    pub fn max_length(&self) -> usize {
        self.cells.iter().map(|uh| uh.end()).max().unwrap_or(0)
    }
}

struct CellResponse {
    aggregated: UnitHydrograph,
    fine: Vec<f64>,
}

impl<'a> CellIuhCalculator<'a> {
    fn validate(&self) -> Result<usize> {
        let n = self.t0.len();
        if n == 0 {
            return Err(Error::invalid("n_cells", 0, "IUH needs at least one cell"));
        }
        check_len("delta", n, self.delta.len())?;
        check_len("subbasin", n, self.subbasin.len())?;
        check_len("runoff coefficient", n, self.runoff_coefficient.len())?;
        if self.params.max_length == 0 {
            return Err(Error::config("iuh", "max_length must be positive"));
        }
        if !(self.params.dt_hours.is_finite() && self.params.dt_hours > 0.0) {
            return Err(Error::config("iuh", "dt_hours must be positive"));
        }
        for (cell, (&t0, &delta)) in self.t0.iter().zip(self.delta).enumerate() {
            if !(t0 >= 0.0) || !(delta >= 0.0) || !t0.is_finite() || !delta.is_finite() {
                return Err(Error::invalid(
                    "t0/delta",
                    format!("{t0}/{delta}"),
                    format!("cell {cell} needs finite non-negative flow times"),
                ));
            }
        }
        Ok(n)
    }

    fn cell_response(&self, cell: usize) -> CellResponse {
        let (t0, delta) = (self.t0[cell], self.delta[cell]);
        if is_degenerate(delta, t0) {
            let pulse = UnitHydrograph::unit_pulse();
            return CellResponse {
                fine: pulse.coeffs().to_vec(),
                aggregated: pulse,
            };
        }
        let (min, max) = lag_bracket(delta, t0, self.params.max_length);
        let mut raw = vec![0.0; max + 1];
        for (lag, slot) in raw.iter_mut().enumerate().skip(min) {
            *slot = iuh_kernel(delta, t0, lag as f64);
        }
        match shape(&raw, SupportRule::FirstDip, CELL_SUPPORT) {
            Some(shaped) => CellResponse {
                aggregated: aggregate(&shaped, self.params.dt_hours),
                fine: shaped.fine,
            },
            None => {
                let pulse = UnitHydrograph::unit_pulse();
                CellResponse {
                    fine: pulse.coeffs().to_vec(),
                    aggregated: pulse,
                }
            }
        }
    }

    /// Compute every cell response and the sub-basin weighted sums.
    pub fn compute(&self, exec: &Executor) -> Result<CellIuhSet> {
        let n = self.validate()?;
        let n_subbasins = self.subbasin.iter().copied().max().unwrap_or(0).max(0) as usize;
        for (cell, &s) in self.subbasin.iter().enumerate() {
            if s < 1 {
                return Err(Error::invalid(
                    "subbasin",
                    s,
                    format!("cell {cell} must belong to a sub-basin 1..={n_subbasins}"),
                ));
            }
        }

        let responses = exec.par_map(0..n, |cell| self.cell_response(cell));

        let mut subbasin_sum = vec![Vec::new(); n_subbasins + 1];
        let mut subbasin_weight = vec![0.0; n_subbasins + 1];
        let mut cells = Vec::with_capacity(n);
        for (cell, response) in responses.into_iter().enumerate() {
            let s = self.subbasin[cell] as usize;
            let weight = self.runoff_coefficient[cell];
            let acc = &mut subbasin_sum[s];
            if acc.len() < response.fine.len() {
                acc.resize(response.fine.len(), 0.0);
            }
            for (a, c) in acc.iter_mut().zip(&response.fine) {
                *a += c * weight;
            }
            subbasin_weight[s] += weight;
            cells.push(response.aggregated);
        }

        let set = CellIuhSet {
            cells,
            subbasin_sum,
            subbasin_weight,
        };
        debug!(
            cells = n,
            subbasins = n_subbasins,
            max_length = set.max_length(),
            "computed cell IUH"
        );
        Ok(set)
    }
}

/// Aggregated response of a single cell, for callers outside a full run
pub fn cell_iuh(t0: f64, delta: f64, params: &IuhParams) -> UnitHydrograph {
    if is_degenerate(delta, t0) {
        return UnitHydrograph::unit_pulse();
    }
    let (min, max) = lag_bracket(delta, t0, params.max_length);
    let raw: Vec<f64> = (0..=max)
        .map(|lag| if lag < min { 0.0 } else { iuh_kernel(delta, t0, lag as f64) })
        .collect();
    finish(&raw, SupportRule::FirstDip, CELL_SUPPORT, params.dt_hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hourly() -> IuhParams {
        IuhParams {
            max_length: 200,
            dt_hours: 1.0,
        }
    }

    #[test]
    fn test_cell_iuh_normalised() {
        for (t0, delta) in [(3.0, 1.0), (10.0, 2.5), (0.5, 0.3), (40.0, 12.0)] {
            let uh = cell_iuh(t0, delta, &hourly());
            assert_relative_eq!(uh.sum(), 1.0, epsilon = 1e-6);
            assert!(uh.coeffs().iter().all(|&c| c >= 0.0));
        }
    }

    #[test]
    fn test_degenerate_cell() {
        let uh = cell_iuh(0.0, 0.0, &hourly());
        assert!(uh.is_unit_pulse());
        assert_eq!((uh.start(), uh.end()), (0, 1));
    }

    #[test]
    fn test_daily_aggregation_single_bucket() {
        let params = IuhParams {
            max_length: 200,
            dt_hours: 24.0,
        };
        let uh = cell_iuh(3.0, 1.0, &params);
        assert_eq!(uh.len(), 1);
        assert_relative_eq!(uh.get(0), 1.0);
    }

    #[test]
    fn test_sub_hourly_step_keeps_hourly_coefficients() {
        let quarter = IuhParams {
            max_length: 200,
            dt_hours: 0.25,
        };
        let fine = cell_iuh(10.0, 2.5, &quarter);
        let hourly = cell_iuh(10.0, 2.5, &hourly());
        assert_eq!(fine.len(), hourly.len());
        for (a, b) in fine.coeffs().iter().zip(hourly.coeffs()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        assert_eq!((fine.start(), fine.end()), (hourly.start(), hourly.end()));
        assert!(fine.len() > 1);
        assert_relative_eq!(fine.sum(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fractional_step_uses_whole_hours() {
        let params = |dt_hours| IuhParams {
            max_length: 200,
            dt_hours,
        };
        let two = cell_iuh(10.0, 2.5, &params(2.0));
        let two_and_half = cell_iuh(10.0, 2.5, &params(2.5));
        assert_eq!(two.coeffs(), two_and_half.coeffs());
    }

    #[test]
    fn test_compute_rejects_non_positive_step() {
        for dt_hours in [0.0, -1.0, f64::NAN] {
            let calc = CellIuhCalculator {
                t0: &[1.0],
                delta: &[0.5],
                subbasin: &[1],
                runoff_coefficient: &[1.0],
                params: IuhParams {
                    max_length: 200,
                    dt_hours,
                },
            };
            assert!(matches!(
                calc.compute(&Executor::sequential()),
                Err(Error::Configuration { .. })
            ));
        }
    }

    #[test]
    fn test_compute_rejects_bad_subbasin() {
        let calc = CellIuhCalculator {
            t0: &[1.0],
            delta: &[0.5],
            subbasin: &[0],
            runoff_coefficient: &[1.0],
            params: hourly(),
        };
        assert!(calc.compute(&Executor::sequential()).is_err());
    }

    #[test]
    fn test_compute_rejects_empty() {
        let calc = CellIuhCalculator {
            t0: &[],
            delta: &[],
            subbasin: &[],
            runoff_coefficient: &[],
            params: hourly(),
        };
        assert!(matches!(
            calc.compute(&Executor::sequential()),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_compute_weights_by_runoff() {
        let calc = CellIuhCalculator {
            t0: &[2.0, 6.0, 4.0],
            delta: &[1.0, 1.0, 1.0],
            subbasin: &[1, 1, 2],
            runoff_coefficient: &[0.2, 0.6, 0.5],
            params: hourly(),
        };
        let set = calc.compute(&Executor::sequential()).unwrap();
        assert_eq!(set.n_subbasins(), 2);
        assert_relative_eq!(set.subbasin_weight[1], 0.8);
        let total: f64 = set.subbasin_sum[1].iter().sum();
        assert_relative_eq!(total, 0.8, epsilon = 1e-9);
    }
}
