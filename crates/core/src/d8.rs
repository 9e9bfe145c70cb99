//! D8 flow direction encodings
//!
//! Three code conventions are in common use for single-flow-direction grids:
//!
//! ```text
//!   TauDEM          Clockwise        ArcGIS
//!   4  3  2         6  7  8          32  64  128
//!   5  .  1         5  .  1          16   .    1
//!   6  7  8         4  3  2           8   4    2
//! ```
//!
//! Code 0 (or a no-data value) marks a pit or outlet. In both 1-8 schemes
//! the diagonal codes are the even ones.

use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

/// Row/column offsets for TauDEM codes 1..=8 (E, NE, N, NW, W, SW, S, SE)
const TAUDEM_OFFSETS: [(isize, isize); 8] = [
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Row/column offsets for clockwise codes 1..=8 (E, SE, S, SW, W, NW, N, NE)
const CLOCKWISE_OFFSETS: [(isize, isize); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// D8 direction code convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum D8Encoding {
    /// 1=E, 2=NE, 3=N, ... counter-clockwise
    #[default]
    TauDem,
    /// 1=E, 2=SE, 3=S, ... clockwise
    Clockwise,
    /// Powers of two: 1=E, 2=SE, 4=S, ..., 128=NE
    ArcGis,
}

impl D8Encoding {
    /// Offset (d_row, d_col) for a direction code.
    ///
    /// Returns `Ok(None)` for code 0 (pit/outlet) and `Err(code)` for a
    /// code that is not part of the convention.
    pub fn offset(self, code: i64) -> std::result::Result<Option<(isize, isize)>, i64> {
        if code == 0 {
            return Ok(None);
        }
        let slot = match self {
            D8Encoding::TauDem | D8Encoding::Clockwise => {
                if !(1..=8).contains(&code) {
                    return Err(code);
                }
                (code - 1) as usize
            }
            D8Encoding::ArcGis => {
                if !(1..=128).contains(&code) || (code & (code - 1)) != 0 {
                    return Err(code);
                }
                code.trailing_zeros() as usize
            }
        };
        let table = match self {
            D8Encoding::TauDem => &TAUDEM_OFFSETS,
            D8Encoding::Clockwise | D8Encoding::ArcGis => &CLOCKWISE_OFFSETS,
        };
        Ok(Some(table[slot]))
    }

    /// Whether the code points to a diagonal neighbor
    pub fn is_diagonal(self, code: i64) -> bool {
        matches!(self.offset(code), Ok(Some((dr, dc))) if dr != 0 && dc != 0)
    }

    /// Flow-path length factor: √2 for diagonal codes, 1 otherwise
    pub fn length_factor(self, code: i64) -> f64 {
        if self.is_diagonal(code) {
            SQRT_2
        } else {
            1.0
        }
    }

    /// Code for an offset, the inverse of [`D8Encoding::offset`]
    pub fn code_for(self, dr: isize, dc: isize) -> Option<i64> {
        let table = match self {
            D8Encoding::TauDem => &TAUDEM_OFFSETS,
            D8Encoding::Clockwise | D8Encoding::ArcGis => &CLOCKWISE_OFFSETS,
        };
        let slot = table.iter().position(|&o| o == (dr, dc))? as i64;
        Some(match self {
            D8Encoding::ArcGis => 1 << slot,
            _ => slot + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taudem_cardinals() {
        let enc = D8Encoding::TauDem;
        assert_eq!(enc.offset(1), Ok(Some((0, 1))));
        assert_eq!(enc.offset(3), Ok(Some((-1, 0))));
        assert_eq!(enc.offset(7), Ok(Some((1, 0))));
        assert_eq!(enc.offset(0), Ok(None));
        assert_eq!(enc.offset(9), Err(9));
    }

    #[test]
    fn test_even_codes_are_diagonal() {
        for enc in [D8Encoding::TauDem, D8Encoding::Clockwise] {
            for code in 1..=8 {
                assert_eq!(
                    enc.is_diagonal(code),
                    code % 2 == 0,
                    "{enc:?} code {code}"
                );
            }
        }
        assert!(D8Encoding::ArcGis.is_diagonal(2));
        assert!(!D8Encoding::ArcGis.is_diagonal(64));
    }

    #[test]
    fn test_arcgis_rejects_non_powers() {
        assert_eq!(D8Encoding::ArcGis.offset(3), Err(3));
        assert_eq!(D8Encoding::ArcGis.offset(256), Err(256));
        assert_eq!(D8Encoding::ArcGis.offset(4), Ok(Some((1, 0))));
    }

    #[test]
    fn test_code_roundtrip() {
        for enc in [D8Encoding::TauDem, D8Encoding::Clockwise, D8Encoding::ArcGis] {
            let code = enc.code_for(1, -1).unwrap();
            assert_eq!(enc.offset(code), Ok(Some((1, -1))));
        }
        assert_eq!(D8Encoding::TauDem.length_factor(2), SQRT_2);
        assert_eq!(D8Encoding::TauDem.length_factor(1), 1.0);
    }
}
