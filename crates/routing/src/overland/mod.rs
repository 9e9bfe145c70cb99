//! Hillslope overland routers
//!
//! Three ways to move surface runoff to the channel: the implicit
//! kinematic wave over the D8 network, per-cell IUH convolution, and
//! Gamma-kernel convolution.

mod gamma;
mod ikw;
mod iuh;

pub use gamma::GammaOverland;
pub use ikw::{KinematicOverland, OverlandInputs, OverlandWater, FLAT_SLOPE};
pub use iuh::IuhOverland;
