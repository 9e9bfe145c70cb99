//! Instantaneous unit hydrographs
//!
//! Per-cell impulse responses from the flow-time distribution to the
//! channel, aggregated to sub-basins and the watershed. Used by the
//! IUH-based overland, sediment and nutrient routers.

mod aggregate;
mod cell;
mod flow_time;
mod hydrograph;
mod kernel;

pub use aggregate::WatershedIuh;
pub use cell::{cell_iuh, CellIuhCalculator, CellIuhSet, IuhParams};
pub use flow_time::{flow_time, FlowTime, StormClass, MIN_SLOPE, VELOCITY_RANGE};
pub use hydrograph::{truncate_coefficients, SupportRule, UnitHydrograph, CELL_SUPPORT, TRUNCATION};
pub use kernel::{iuh_kernel, is_degenerate, lag_bracket, KERNEL_FLOOR, ZERO_SUM};
