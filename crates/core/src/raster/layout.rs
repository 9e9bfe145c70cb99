//! Compact numbering of the valid cells of a grid

use crate::error::{check_len, Result};
use crate::raster::{Raster, RasterElement};

/// Maps between grid positions and compact cell ids.
///
/// Routing works on the valid cells only: cell ids run `0..n_cells` in
/// row-major order over the cells that are not no-data in the mask grid.
#[derive(Debug, Clone)]
pub struct CellLayout {
    rows: usize,
    cols: usize,
    cell_size: f64,
    /// Grid position (row-major offset) to cell id
    id_of: Vec<Option<usize>>,
    /// Cell id to (row, col)
    position: Vec<(usize, usize)>,
}

impl CellLayout {
    /// Number the valid cells of `mask`
    pub fn from_mask<T: RasterElement>(mask: &Raster<T>) -> Self {
        let (rows, cols) = mask.shape();
        let mut id_of = vec![None; rows * cols];
        let mut position = Vec::new();
        for ((row, col), value) in mask.data().indexed_iter() {
            if value.is_nodata(mask.nodata()) {
                continue;
            }
            id_of[row * cols + col] = Some(position.len());
            position.push((row, col));
        }
        Self {
            rows,
            cols,
            cell_size: mask.cell_size(),
            id_of,
            position,
        }
    }

    pub fn n_cells(&self) -> usize {
        self.position.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Cell id at (row, col), `None` for no-data or out-of-grid positions
    pub fn id(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.id_of[row * self.cols + col]
    }

    /// Grid position of a cell id
    pub fn position(&self, id: usize) -> Option<(usize, usize)> {
        self.position.get(id).copied()
    }

    /// Gather the values of `grid` at every valid cell, as f64
    pub fn gather<T: RasterElement>(&self, grid: &Raster<T>) -> Result<Vec<f64>> {
        check_len("grid cells", self.rows * self.cols, grid.len())?;
        let data = grid.data();
        Ok(self
            .position
            .iter()
            .map(|&(r, c)| data[(r, c)].to_f64().unwrap_or(f64::NAN))
            .collect())
    }

    /// Gather integer codes (links, sub-basin ids) at every valid cell
    pub fn gather_codes<T: RasterElement>(&self, grid: &Raster<T>) -> Result<Vec<i64>> {
        check_len("grid cells", self.rows * self.cols, grid.len())?;
        let data = grid.data();
        Ok(self
            .position
            .iter()
            .map(|&(r, c)| {
                let v = data[(r, c)];
                if v.is_nodata(grid.nodata()) {
                    -1
                } else {
                    v.to_i64().unwrap_or(-1)
                }
            })
            .collect())
    }

    /// Spread per-cell values back onto a grid, filling no-data positions with NaN
    pub fn scatter(&self, values: &[f64]) -> Result<Raster<f64>> {
        check_len("cell values", self.n_cells(), values.len())?;
        let mut out = Raster::filled(self.rows, self.cols, f64::NAN).with_cell_size(self.cell_size);
        let data = out.data_mut();
        for (&(r, c), &v) in self.position.iter().zip(values) {
            data[(r, c)] = v;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_skips_nodata() {
        let mask = Raster::from_vec(vec![1, -9999, 3, 4], 2, 2)
            .unwrap()
            .with_nodata(-9999);
        let layout = CellLayout::from_mask(&mask);
        assert_eq!(layout.n_cells(), 3);
        assert_eq!(layout.id(0, 0), Some(0));
        assert_eq!(layout.id(0, 1), None);
        assert_eq!(layout.id(1, 1), Some(2));
        assert_eq!(layout.position(1), Some((1, 0)));
    }

    #[test]
    fn test_gather_scatter() {
        let mask: Raster<f64> = Raster::from_vec(vec![1.0, 2.0, f64::NAN, 4.0], 2, 2).unwrap();
        let layout = CellLayout::from_mask(&mask);
        let values = layout.gather(&mask).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 4.0]);

        let back = layout.scatter(&[10.0, 20.0, 40.0]).unwrap();
        assert_eq!(back.get(1, 1).unwrap(), 40.0);
        assert!(back.get(1, 0).unwrap().is_nan());
    }
}
