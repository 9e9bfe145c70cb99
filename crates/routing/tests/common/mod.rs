//! Synthetic watersheds shared by the integration tests.

#![allow(dead_code)]

use rivulet_core::Raster;
use rivulet_routing::topology::{
    build_flow_indices, build_reach_topology, CellTopology, FlowIndexParams, LayerOrigin, ReachTable, ReachTopology,
};

/// TauDEM codes
pub const EAST: i32 = 1;
pub const SOUTH: i32 = 7;
pub const SOUTH_EAST: i32 = 8;

/// A comb: every row drains east into the last column, which drains south
/// to the outlet in the bottom right corner.
pub fn comb_grid(rows: usize, cols: usize) -> Raster<i32> {
    let mut codes = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let code = if c + 1 < cols {
                EAST
            } else if r + 1 < rows {
                SOUTH
            } else {
                0
            };
            codes.push(code);
        }
    }
    Raster::from_vec(codes, rows, cols).unwrap().with_cell_size(30.0)
}

pub fn comb(rows: usize, cols: usize) -> CellTopology {
    build_flow_indices(&comb_grid(rows, cols), &FlowIndexParams::default()).unwrap()
}

/// Positional reach row with 10 m width, 1 km length and no losses
pub fn reach_row(id: usize, downstream: usize) -> Vec<f64> {
    vec![id as f64, downstream as f64, 1.0, 10.0, 1000.0, 1.0, 0.5, 1.0e6, 0.035, 0.005]
}

/// Three reach layers: headwaters 1, 2 and 4; 1 and 2 join in 3; 3 and 4
/// join in the outlet reach 5.
pub fn three_layer_reaches() -> (ReachTable, ReachTopology) {
    let table = ReachTable::from_rows(&[
        reach_row(1, 3),
        reach_row(2, 3),
        reach_row(3, 5),
        reach_row(4, 5),
        reach_row(5, 0),
    ])
    .unwrap();
    let topo = build_reach_topology(&table, LayerOrigin::FromSource).unwrap();
    (table, topo)
}

pub fn headwaters(topo: &ReachTopology) -> Vec<usize> {
    (0..topo.n_reaches()).filter(|&r| topo.upstream(r).is_empty()).collect()
}
