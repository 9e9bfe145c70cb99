//! Channel routers
//!
//! Reach-level routers keep one storage per reach and share the loss chain
//! (seepage, bank exchange, evaporation):
//! - `KinematicReach` (IKW_REACH)
//! - `MuskingumReach` (MUSK_CH)
//!
//! Cell-level routers walk the channel cells of each reach:
//! - `KinematicChannel` (IKW_CH)
//! - `DiffusiveChannel` (CH_DW)
//!
//! `GroupedReachRouter` runs a reach-level method with one thread per reach
//! group, exchanging boundary outflows once per step.

mod cells;
mod diffusive;
mod grouped;
mod ikw_cell;
mod ikw_reach;
mod losses;
mod muskingum;
mod network;

pub use cells::{
    CellChannelRouter, CellFlow, CellInflow, CellMethod, ChannelCell, ChannelCellForcing, ChannelCellInputs,
};
pub use diffusive::{DiffusiveChannel, MIN_FRICTION_SLOPE};
pub use grouped::GroupedReachRouter;
pub use ikw_cell::KinematicChannel;
pub use ikw_reach::KinematicReach;
pub use losses::{GAINING_REACH, MM_PER_HOUR};
pub use muskingum::{MuskingumReach, MuskingumWeights, Trapezoid, MIN_VELOCITY};
pub use network::{
    ReachInflow, ReachInputs, ReachMethod, ReachNetworkRouter, ReachOutflow, ReachState, UTIL_ZERO,
};
