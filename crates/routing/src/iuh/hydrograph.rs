//! Discrete unit hydrographs and the shaping pipeline shared by the cell,
//! sub-basin and watershed levels:
//! normalise, truncate small coefficients, cut to the support window,
//! re-normalise, then integrate into time-step buckets.

use super::kernel::ZERO_SUM;

/// Coefficients at or below this are zeroed after normalisation
pub const TRUNCATION: f64 = 0.001;

/// Threshold delimiting the support window of a cell response
pub const CELL_SUPPORT: f64 = 0.0005;

/// How the end of the support window is found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportRule {
    /// End just before the first coefficient that drops under the threshold
    FirstDip,
    /// End at the last coefficient above the threshold
    LastAbove,
}

/// Normalised response over discrete lags.
///
/// `coeffs[lag]` for `lag in 0..=end`; entries outside `[start, end]` are
/// zero and the entries sum to one.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitHydrograph {
    coeffs: Vec<f64>,
    start: usize,
    end: usize,
}

impl UnitHydrograph {
    /// Everything leaves in the first step: `[1, 0]` with support `[0, 1]`
    pub fn unit_pulse() -> Self {
        Self {
            coeffs: vec![1.0, 0.0],
            start: 0,
            end: 1,
        }
    }

    /// Wrap already-normalised coefficients, support spanning all of them
    pub fn from_coefficients(coeffs: Vec<f64>) -> Self {
        let start = coeffs.iter().position(|&c| c > 0.0).unwrap_or(0);
        let end = coeffs.len().saturating_sub(1);
        Self { coeffs, start, end }
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// First lag of the support window
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last lag of the support window
    pub fn end(&self) -> usize {
        self.end
    }

    /// Coefficient at `lag`, zero beyond the support
    pub fn get(&self, lag: usize) -> f64 {
        self.coeffs.get(lag).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.coeffs.iter().sum()
    }

    pub fn is_unit_pulse(&self) -> bool {
        self.start == 0 && self.end == 1 && self.coeffs == [1.0, 0.0]
    }
}

/// Zero every coefficient `<= TRUNCATION` or `> 1`.
///
/// Returns the number of coefficients zeroed.
pub fn truncate_coefficients(coeffs: &mut [f64]) -> usize {
    let mut zeroed = 0;
    for c in coeffs.iter_mut() {
        if *c != 0.0 && (*c <= TRUNCATION || *c > 1.0) {
            *c = 0.0;
            zeroed += 1;
        }
    }
    zeroed
}

/// A normalised, truncated response at the fine (kernel) resolution
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Shaped {
    pub fine: Vec<f64>,
    pub start: usize,
    pub end: usize,
}

/// Normalise `raw` (indexed by lag), truncate and cut to its support.
///
/// `None` when the response is degenerate: the raw sum is below
/// [`ZERO_SUM`] or nothing survives truncation.
pub(crate) fn shape(raw: &[f64], rule: SupportRule, threshold: f64) -> Option<Shaped> {
    let sum: f64 = raw.iter().sum();
    if !(sum >= ZERO_SUM) {
        return None;
    }
    let mut fine: Vec<f64> = raw.iter().map(|v| v / sum).collect();
    truncate_coefficients(&mut fine);

    let start = fine.iter().position(|&c| c > threshold)?;
    let end = match rule {
        SupportRule::FirstDip => fine[start..]
            .iter()
            .position(|&c| c < threshold)
            .map_or(fine.len() - 1, |p| start + p - 1),
        SupportRule::LastAbove => fine.iter().rposition(|&c| c > threshold).unwrap_or(start),
    };
    let end = end.max(start);

    fine.truncate(end + 1);
    for c in fine[..start].iter_mut() {
        *c = 0.0;
    }
    let kept: f64 = fine.iter().sum();
    for c in fine.iter_mut() {
        *c /= kept;
    }
    Some(Shaped { fine, start, end })
}

/// Integrate fine coefficients into `dt`-hour buckets and re-normalise.
///
/// The bucket width is the whole number of hours in `dt`. Below one hour
/// the hourly coefficients are used as they are.
pub(crate) fn aggregate(shaped: &Shaped, dt_hours: f64) -> UnitHydrograph {
    if dt_hours < 1.0 {
        return UnitHydrograph {
            coeffs: shaped.fine.clone(),
            start: shaped.start,
            end: shaped.end,
        };
    }
    let dt = dt_hours as usize;
    let n_buckets = shaped.end / dt + 1;
    let mut coeffs: Vec<f64> = (0..n_buckets)
        .map(|k| shaped.fine.iter().skip(k * dt).take(dt).sum())
        .collect();
    let sum: f64 = coeffs.iter().sum();
    if sum > 0.0 {
        for c in coeffs.iter_mut() {
            *c /= sum;
        }
    }
    UnitHydrograph {
        coeffs,
        start: shaped.start / dt,
        end: n_buckets - 1,
    }
}

/// Shape and aggregate in one go, falling back to the unit pulse.
pub(crate) fn finish(raw: &[f64], rule: SupportRule, threshold: f64, dt_hours: f64) -> UnitHydrograph {
    match shape(raw, rule, threshold) {
        Some(shaped) => aggregate(&shaped, dt_hours),
        None => UnitHydrograph::unit_pulse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_truncation_boundary() {
        let mut coeffs = [0.001, 0.0011, 0.5, 1.2];
        let zeroed = truncate_coefficients(&mut coeffs);
        assert_eq!(coeffs[0], 0.0, "0.001 must be zeroed");
        assert_eq!(coeffs[1], 0.0011, "0.0011 must survive");
        assert_eq!(coeffs[3], 0.0, "values above 1 are noise");
        assert_eq!(zeroed, 2);
    }

    #[test]
    fn test_shape_first_dip_cuts_second_hump() {
        let raw = [0.0, 0.4, 0.4, 0.0, 0.2];
        let shaped = shape(&raw, SupportRule::FirstDip, CELL_SUPPORT).unwrap();
        assert_eq!((shaped.start, shaped.end), (1, 2));
        assert_relative_eq!(shaped.fine.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(shaped.fine[1], 0.5);
    }

    #[test]
    fn test_shape_last_above_keeps_second_hump() {
        let raw = [0.0, 0.4, 0.4, 0.0, 0.2];
        let shaped = shape(&raw, SupportRule::LastAbove, TRUNCATION).unwrap();
        assert_eq!((shaped.start, shaped.end), (1, 4));
        assert_relative_eq!(shaped.fine[4], 0.2);
    }

    #[test]
    fn test_zero_sum_is_degenerate() {
        assert!(shape(&[0.0, 0.0], SupportRule::FirstDip, CELL_SUPPORT).is_none());
        assert!(finish(&[0.0; 3], SupportRule::FirstDip, CELL_SUPPORT, 1.0).is_unit_pulse());
    }

    #[test]
    fn test_aggregate_blocks() {
        let shaped = Shaped {
            fine: vec![0.0, 0.25, 0.25, 0.25, 0.25],
            start: 1,
            end: 4,
        };
        let uh = aggregate(&shaped, 2.0);
        assert_eq!(uh.coeffs(), &[0.25, 0.5, 0.25]);
        assert_eq!((uh.start(), uh.end()), (0, 2));
    }
}
