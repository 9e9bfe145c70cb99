//! Co-registered grid type

use crate::error::{Error, Result};
use crate::raster::RasterElement;
use ndarray::{Array2, ArrayView2};

/// A 2D grid of cell values with a square cell size.
///
/// All inputs of one model run (direction codes, stream links, sub-basin
/// ids, slopes, soil parameters) are co-registered `Raster`s of the same
/// shape. Georeferencing is left to the I/O layer; only the cell width
/// matters for routing.
///
/// # Example
///
/// ```
/// use rivulet_core::Raster;
///
/// let mut dir: Raster<i32> = Raster::new(2, 3).with_cell_size(30.0);
/// dir.set(0, 1, 7).unwrap();
/// assert_eq!(dir.get(0, 1).unwrap(), 7);
/// assert_eq!(dir.cell_size(), 30.0);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Values stored in row-major order (row, col)
    data: Array2<T>,
    /// Cell width in metres
    cell_size: f64,
    /// No-data marker
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a grid filled with zeros and unit cell size
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a grid filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a grid from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Create a grid from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            cell_size: 1.0,
            nodata: None,
        }
    }

    /// Set the cell width (builder style)
    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = cell_size;
        self
    }

    /// Set the no-data marker (builder style)
    pub fn with_nodata(mut self, nodata: T) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Create a zero grid of another type with the same shape and cell size
    pub fn with_same_meta<U: RasterElement>(&self) -> Raster<U> {
        Raster {
            data: Array2::zeros(self.data.dim()),
            cell_size: self.cell_size,
            nodata: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn set_cell_size(&mut self, cell_size: f64) {
        self.cell_size = cell_size;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Whether the cell at (row, col) holds no-data (out of bounds counts as no-data)
    pub fn is_nodata_at(&self, row: usize, col: usize) -> bool {
        match self.data.get((row, col)) {
            Some(v) => v.is_nodata(self.nodata),
            None => true,
        }
    }

    /// Neighbor position at offset (dr, dc), or `None` if it falls off the grid
    pub fn offset(&self, row: usize, col: usize, dr: isize, dc: isize) -> Option<(usize, usize)> {
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if nr < 0 || nc < 0 || nr as usize >= self.rows() || nc as usize >= self.cols() {
            return None;
        }
        Some((nr as usize, nc as usize))
    }

    /// Fail unless `other` has the same shape as `self`
    pub fn check_same_shape<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        let (er, ec) = self.shape();
        let (ar, ac) = other.shape();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f64> = Raster::new(4, 6).with_cell_size(30.0);
        assert_eq!(raster.shape(), (4, 6));
        assert_eq!(raster.len(), 24);
        assert_eq!(raster.cell_size(), 30.0);
    }

    #[test]
    fn test_raster_access_out_of_bounds() {
        let mut raster: Raster<i32> = Raster::new(2, 2);
        raster.set(1, 1, 5).unwrap();
        assert_eq!(raster.get(1, 1).unwrap(), 5);
        assert!(raster.get(2, 0).is_err(), "row 2 is outside a 2x2 grid");
        assert!(raster.set(0, 2, 1).is_err());
    }

    #[test]
    fn test_offset_clips_at_edges() {
        let raster: Raster<u8> = Raster::new(3, 3);
        assert_eq!(raster.offset(0, 0, -1, 0), None);
        assert_eq!(raster.offset(1, 1, 1, 1), Some((2, 2)));
        assert_eq!(raster.offset(2, 2, 0, 1), None);
    }

    #[test]
    fn test_shape_check() {
        let a: Raster<f64> = Raster::new(3, 4);
        let b: Raster<i32> = Raster::new(4, 3);
        assert!(matches!(
            a.check_same_shape(&b),
            Err(Error::SizeMismatch { er: 3, ec: 4, ar: 4, ac: 3 })
        ));
    }

    #[test]
    fn test_nodata_detection() {
        let raster = Raster::from_vec(vec![1, -1, 2, 3], 2, 2).unwrap().with_nodata(-1);
        assert!(raster.is_nodata_at(0, 1));
        assert!(!raster.is_nodata_at(1, 0));
        assert!(raster.is_nodata_at(5, 5));
    }
}
