//! Per-sub-basin output arrays
//!
//! Sub-basin outputs are indexed `0..=n_subbasins`: entry `i` belongs to
//! sub-basin `i` and entry 0 holds the whole-watershed total.

use crate::error::{Error, Result};
use std::ops::Index;

/// An additive quantity aggregated per sub-basin, with the watershed total at index 0.
#[derive(Debug, Clone, PartialEq)]
pub struct SubbasinTotals {
    values: Vec<f64>,
}

impl SubbasinTotals {
    /// All-zero totals for `n_subbasins` sub-basins
    pub fn zeros(n_subbasins: usize) -> Self {
        Self {
            values: vec![0.0; n_subbasins + 1],
        }
    }

    /// Build from per-sub-basin values (entries 1..=n); index 0 is recomputed
    pub fn from_partial(mut values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::invalid("subbasin totals", 0, "need at least the index-0 slot"));
        }
        values[0] = values[1..].iter().sum();
        Ok(Self { values })
    }

    pub fn n_subbasins(&self) -> usize {
        self.values.len() - 1
    }

    /// Add to one sub-basin (index 0 is refreshed by [`SubbasinTotals::finalize`])
    pub fn add(&mut self, subbasin: usize, value: f64) -> Result<()> {
        let n = self.n_subbasins();
        if subbasin == 0 || subbasin > n {
            return Err(Error::invalid(
                "subbasin",
                subbasin,
                format!("must lie in 1..={n}"),
            ));
        }
        self.values[subbasin] += value;
        Ok(())
    }

    /// Recompute the watershed total at index 0
    pub fn finalize(&mut self) {
        self.values[0] = self.values[1..].iter().sum();
    }

    pub fn total(&self) -> f64 {
        self.values[0]
    }

    pub fn get(&self, subbasin: usize) -> Option<f64> {
        self.values.get(subbasin).copied()
    }

    /// The raw `[0..=n]` array
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }
}

impl Index<usize> for SubbasinTotals {
    type Output = f64;

    fn index(&self, subbasin: usize) -> &f64 {
        &self.values[subbasin]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_zero_is_sum() {
        let totals = SubbasinTotals::from_partial(vec![99.0, 1.0, 2.5, 3.5]).unwrap();
        assert_eq!(totals.n_subbasins(), 3);
        assert_eq!(totals.total(), 7.0);
        assert_eq!(totals[2], 2.5);
    }

    #[test]
    fn test_add_and_finalize() {
        let mut totals = SubbasinTotals::zeros(2);
        totals.add(1, 4.0).unwrap();
        totals.add(2, 1.0).unwrap();
        assert!(totals.add(0, 1.0).is_err(), "index 0 is reserved");
        assert!(totals.add(3, 1.0).is_err());
        totals.finalize();
        assert_eq!(totals.as_slice(), &[5.0, 4.0, 1.0]);
    }
}
