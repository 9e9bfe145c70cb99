//! # rivulet routing
//!
//! Cell-to-reach flow and mass routing for grid-based watershed models.
//!
//! ## Modules
//!
//! - **topology**: flow indices from D8 grids, routing layers, reach tables,
//!   reach chains and reach-group partitioning
//! - **iuh**: instantaneous unit hydrographs per cell, sub-basin and watershed
//! - **kinematic**: the Newton-Raphson kinematic wave solve shared by routers
//! - **overland**: kinematic wave, IUH and Gamma-kernel hillslope routing
//! - **interflow**: root-zone kinematic wave and layered soil interflow
//! - **channel**: reach and cell channel routers, grouped execution
//! - **transport**: convolution kernels, sediment and nutrient transport
//! - **diagnostics**: clamp counters
//!
//! Every router is built once from borrowed inputs and advanced with `step`.
//! Nodes are swept in routing-layer order, so results do not depend on the
//! number of worker threads.

pub mod channel;
pub mod diagnostics;
pub mod interflow;
pub mod iuh;
pub mod kinematic;
pub mod overland;
pub mod topology;
pub mod transport;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::channel::{
        CellChannelRouter, DiffusiveChannel, GroupedReachRouter, KinematicChannel, KinematicReach,
        MuskingumReach, ReachInputs, ReachNetworkRouter,
    };
    pub use crate::interflow::{RootZoneInterflow, SoilLayerInterflow};
    pub use crate::iuh::{CellIuhCalculator, UnitHydrograph, WatershedIuh};
    pub use crate::overland::{GammaOverland, IuhOverland, KinematicOverland};
    pub use crate::topology::{
        build_flow_indices, build_reach_topology, build_routing_layers, LayerOrigin, ReachChains, ReachTable,
    };
    pub use crate::transport::{Convolution, NutrientOverland, SedimentOverland};
    pub use rivulet_core::prelude::*;
    pub use rivulet_parallel::{Executor, ProcessingMode};
}
