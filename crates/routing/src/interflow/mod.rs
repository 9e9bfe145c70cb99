//! Subsurface lateral flow
//!
//! A single root-zone Darcy router and a multi-layer Clapp–Hornberger
//! router, both swept in routing-layer order.

mod ikw;
mod soil_layers;

pub use ikw::{RootZoneInputs, RootZoneInterflow, RootZoneWater, MIN_INTERFLOW_SLOPE};
pub use soil_layers::{SoilLayerInputs, SoilLayerInterflow, SoilLayerParams, SoilLayerWater};
