//! # rivulet core
//!
//! Core types shared by the rivulet watershed routing crates.
//!
//! This crate provides:
//! - `Raster<T>`: co-registered input grids and `CellLayout` for compact cell ids
//! - `D8Encoding`: TauDEM, clockwise and ArcGIS direction codes
//! - `RoutingConfig`: TOML-backed run configuration
//! - `FieldRegistry`: typed owner of per-cell and per-reach arrays
//! - `SubbasinTotals`: `[0..=n]` sub-basin outputs with the watershed total at 0
//! - The error taxonomy and the `Algorithm` trait

pub mod config;
pub mod d8;
pub mod error;
pub mod fields;
pub mod raster;
pub mod subbasin;

pub use config::RoutingConfig;
pub use d8::D8Encoding;
pub use error::{Error, Result};
pub use fields::{Field, FieldRegistry};
pub use raster::{CellLayout, Raster, RasterElement};
pub use subbasin::SubbasinTotals;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{ChannelMethod, InterflowMethod, OverlandMethod, RoutingConfig};
    pub use crate::d8::D8Encoding;
    pub use crate::error::{Error, Result};
    pub use crate::fields::{Field, FieldRegistry};
    pub use crate::raster::{CellLayout, Raster, RasterElement};
    pub use crate::subbasin::SubbasinTotals;
    pub use crate::Algorithm;
}

/// Core trait for the one-shot builders of rivulet.
///
/// Builders are pure functions from an input to an output, controlled by
/// parameters; time-stepping routers use their own `step` methods instead.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
