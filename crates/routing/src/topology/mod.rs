//! Drainage topology
//!
//! Graphs over cells and reaches, and the layer decomposition used by every
//! router:
//! - Flow indices: upstream lists and the single downstream target per cell
//! - Routing layers: dependency-respecting partition for parallel sweeps
//! - Reach topology: reach table, reach graph and outlet distances
//! - Reach chains: ordered channel cells per reach
//! - Partitioning: reach groups for grouped channel execution

mod chains;
mod flow_index;
mod layers;
mod partition;
mod reach;

pub use chains::ReachChains;
pub use flow_index::{build_flow_indices, BuildFlowIndices, CellTopology, FlowIndex, FlowIndexParams};
pub use layers::{build_routing_layers, distance_to_outlet, LayerOrigin, RoutingLayers};
pub use partition::{partition_reaches, ReachPartition};
pub use reach::{build_reach_topology, ReachRecord, ReachTable, ReachTopology, REQUIRED_COLUMNS};
