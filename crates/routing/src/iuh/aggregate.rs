//! Sub-basin and watershed IUH
//!
//! A sub-basin response is the runoff-coefficient weighted mean of its
//! cell responses; the watershed response is the weighted mean of the
//! sub-basin responses. Both go through the same shaping pipeline as the
//! cells, with the 0.001 threshold delimiting the support.

use super::cell::{CellIuhSet, IuhParams};
use super::hydrograph::{finish, SupportRule, UnitHydrograph, TRUNCATION};
use tracing::debug;

/// Sub-basin responses with the watershed response at index 0
#[derive(Debug, Clone)]
pub struct WatershedIuh {
    responses: Vec<UnitHydrograph>,
}

impl WatershedIuh {
    pub fn from_cells(set: &CellIuhSet, params: &IuhParams) -> Self {
        let n = set.n_subbasins();
        let longest = set.subbasin_sum.iter().map(Vec::len).max().unwrap_or(0);
        let mut watershed = vec![0.0; longest];
        let mut total_weight = 0.0;
        let mut responses = Vec::with_capacity(n + 1);
        responses.push(UnitHydrograph::unit_pulse());

        for s in 1..=n {
            let weight = set.subbasin_weight[s];
            if weight <= 0.0 {
                responses.push(UnitHydrograph::unit_pulse());
                continue;
            }
            let mean: Vec<f64> = set.subbasin_sum[s].iter().map(|v| v / weight).collect();
            for (w, v) in watershed.iter_mut().zip(&mean) {
                *w += v * weight;
            }
            total_weight += weight;
            responses.push(finish(&mean, SupportRule::FirstDip, TRUNCATION, params.dt_hours));
        }

        if total_weight > 0.0 {
            for w in watershed.iter_mut() {
                *w /= total_weight;
            }
            responses[0] = finish(&watershed, SupportRule::LastAbove, TRUNCATION, params.dt_hours);
        }

        debug!(
            subbasins = n,
            watershed_length = responses[0].len(),
            "aggregated sub-basin IUH"
        );
        Self { responses }
    }

    pub fn n_subbasins(&self) -> usize {
        self.responses.len() - 1
    }

    /// Response of sub-basin `id` (`1..=n`), or of the watershed for 0
    pub fn subbasin(&self, id: usize) -> Option<&UnitHydrograph> {
        self.responses.get(id)
    }

    pub fn watershed(&self) -> &UnitHydrograph {
        &self.responses[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iuh::cell::CellIuhCalculator;
    use approx::assert_relative_eq;
    use rivulet_parallel::Executor;

    #[test]
    fn test_subbasin_and_watershed_normalised() {
        let params = IuhParams {
            max_length: 200,
            dt_hours: 1.0,
        };
        let calc = CellIuhCalculator {
            t0: &[2.0, 6.0, 4.0, 12.0],
            delta: &[1.0, 1.5, 1.0, 3.0],
            subbasin: &[1, 1, 2, 2],
            runoff_coefficient: &[0.2, 0.6, 0.5, 0.5],
            params,
        };
        let set = calc.compute(&Executor::sequential()).unwrap();
        let iuh = WatershedIuh::from_cells(&set, &params);
        assert_eq!(iuh.n_subbasins(), 2);
        for id in 0..=2 {
            let uh = iuh.subbasin(id).unwrap();
            assert_relative_eq!(uh.sum(), 1.0, epsilon = 1e-6);
            assert!(uh.coeffs().iter().all(|&c| c >= 0.0));
        }
        // The watershed response reaches at least as far as any sub-basin
        assert!(iuh.watershed().end() >= iuh.subbasin(1).unwrap().end());
    }

    #[test]
    fn test_zero_weight_subbasin_is_pulse() {
        let params = IuhParams {
            max_length: 200,
            dt_hours: 1.0,
        };
        let calc = CellIuhCalculator {
            t0: &[2.0, 3.0],
            delta: &[1.0, 1.0],
            subbasin: &[1, 2],
            runoff_coefficient: &[1.0, 0.0],
            params,
        };
        let set = calc.compute(&Executor::sequential()).unwrap();
        let iuh = WatershedIuh::from_cells(&set, &params);
        assert!(iuh.subbasin(2).unwrap().is_unit_pulse());
        assert_relative_eq!(iuh.watershed().sum(), 1.0, epsilon = 1e-6);
    }
}
