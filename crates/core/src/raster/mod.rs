//! Grid data structures

mod element;
mod grid;
mod layout;

pub use element::RasterElement;
pub use grid::Raster;
pub use layout::CellLayout;
