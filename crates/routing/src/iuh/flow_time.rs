//! Flow time to the channel
//!
//! Derives the mean (`t0`) and standard deviation (`delta`) of the travel
//! time from each cell to the nearest channel cell, the inputs of the cell
//! IUH. Hydraulic radius follows a power law of the contributing area
//! whose coefficients depend on the design storm.

use crate::topology::{build_routing_layers, CellTopology, LayerOrigin};
use rivulet_core::error::check_len;
use rivulet_core::Result;
use serde::{Deserialize, Serialize};

/// Minimum slope used in velocity and dispersion terms
pub const MIN_SLOPE: f64 = 0.0005;

/// Velocity clamp (m/s)
pub const VELOCITY_RANGE: (f64, f64) = (0.0001, 3.0);

/// Design storm return period selecting the radius power law
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StormClass {
    #[default]
    T2,
    T10,
    T100,
}

impl StormClass {
    /// `(a, b)` of `R = (a · A_km²)^b`
    pub fn coefficients(self) -> (f64, f64) {
        match self {
            StormClass::T2 => (0.05, 0.48),
            StormClass::T10 => (0.12, 0.52),
            StormClass::T100 => (0.18, 0.55),
        }
    }
}

/// Per-cell flow-time fields
#[derive(Debug, Clone)]
pub struct FlowTime {
    /// Mean flow time to the channel (h)
    pub t0: Vec<f64>,
    /// Standard deviation of the flow time (h)
    pub delta: Vec<f64>,
    /// Overland velocity (m/s)
    pub velocity: Vec<f64>,
    /// Hydraulic radius (m)
    pub radius: Vec<f64>,
}

/// Derive `t0` and `delta` for every cell.
///
/// `stream_link > 0` marks channel cells, which have zero flow time.
pub fn flow_time(
    topo: &CellTopology,
    slope: &[f64],
    manning: &[f64],
    stream_link: &[i64],
    storm: StormClass,
) -> Result<FlowTime> {
    let n = topo.index.n_nodes();
    check_len("slope", n, slope.len())?;
    check_len("manning", n, manning.len())?;
    check_len("stream link", n, stream_link.len())?;

    let layers = build_routing_layers(&topo.index, LayerOrigin::FromSource)?;
    let cell_size = topo.layout.cell_size();

    // Upstream cell count, headwaters first
    let mut accumulation = vec![0.0; n];
    for layer in layers.layers() {
        for &id in layer {
            if let Some(down) = topo.index.downstream(id) {
                accumulation[down] += accumulation[id] + 1.0;
            }
        }
    }

    let (a, b) = storm.coefficients();
    let area_km2 = cell_size * cell_size / 1.0e6;
    let radius: Vec<f64> = accumulation
        .iter()
        .map(|acc| (a * (acc + 1.0) * area_km2).powf(b))
        .collect();
    let velocity: Vec<f64> = (0..n)
        .map(|id| {
            let s = slope[id].max(MIN_SLOPE);
            let v = radius[id].powf(2.0 / 3.0) * s.sqrt() / manning[id];
            v.clamp(VELOCITY_RANGE.0, VELOCITY_RANGE.1)
        })
        .collect();

    let hillslope: Vec<f64> = stream_link
        .iter()
        .map(|&link| if link > 0 { 0.0 } else { 1.0 })
        .collect();
    let length = weighted_length(topo, layers.layers(), &hillslope, cell_size);

    let dispersion: Vec<f64> = (0..n)
        .map(|id| {
            let s = slope[id].max(MIN_SLOPE);
            let celerity = velocity[id] * 5.0 / 3.0;
            let damping = velocity[id] * radius[id] / (2.0 * s);
            damping * 2.0 / celerity.powi(3) * hillslope[id]
        })
        .collect();
    let spread = weighted_length(topo, layers.layers(), &dispersion, cell_size);

    let t0 = (0..n)
        .map(|id| length[id] / (velocity[id] * 5.0 / 3.0) / 3600.0)
        .collect();
    let delta = spread.iter().map(|s| s.sqrt() / 3600.0).collect();

    Ok(FlowTime {
        t0,
        delta,
        velocity,
        radius,
    })
}

/// Σ weight·step length along the flow path until a zero-weight cell.
fn weighted_length(topo: &CellTopology, layers: &[Vec<usize>], weight: &[f64], cell_size: f64) -> Vec<f64> {
    let mut length = vec![0.0; weight.len()];
    // Downstream cells first
    for layer in layers.iter().rev() {
        for &id in layer {
            if weight[id] <= 0.0 {
                continue;
            }
            let below = topo.index.downstream(id).map_or(0.0, |d| length[d]);
            length[id] = cell_size * topo.length_factor(id) * weight[id] + below;
        }
    }
    length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{build_flow_indices, FlowIndexParams};
    use approx::assert_relative_eq;
    use rivulet_core::Raster;

    // 1x4 strip flowing east, last cell is the channel
    fn strip() -> CellTopology {
        let grid = Raster::from_vec(vec![1, 1, 1, 0], 1, 4).unwrap().with_cell_size(30.0);
        build_flow_indices(&grid, &FlowIndexParams::default()).unwrap()
    }

    #[test]
    fn test_channel_cells_have_zero_time() {
        let topo = strip();
        let ft = flow_time(&topo, &[0.05; 4], &[0.1; 4], &[0, 0, 0, 1], StormClass::T2).unwrap();
        assert_eq!(ft.t0[3], 0.0);
        assert_eq!(ft.delta[3], 0.0);
        assert!(ft.t0[0] > ft.t0[2], "farther cells take longer");
    }

    #[test]
    fn test_adjacent_cell_time() {
        let topo = strip();
        let ft = flow_time(&topo, &[0.05; 4], &[0.1; 4], &[0, 0, 0, 1], StormClass::T2).unwrap();
        let expected = 30.0 / (ft.velocity[2] * 5.0 / 3.0) / 3600.0;
        assert_relative_eq!(ft.t0[2], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_clamped() {
        let topo = strip();
        let ft = flow_time(&topo, &[0.0; 4], &[1e-6; 4], &[0; 4], StormClass::T100).unwrap();
        assert!(ft.velocity.iter().all(|&v| v <= 3.0));
    }

    #[test]
    fn test_length_mismatch() {
        let topo = strip();
        assert!(flow_time(&topo, &[0.05; 3], &[0.1; 4], &[0; 4], StormClass::T2).is_err());
    }
}
