//! Overland flow by implicit kinematic wave (IKW_OL)
//!
//! Cells are updated layer by layer. Each cell converts its ponded surface
//! water into a discharge, adds the discharge of its upstream hillslope
//! cells and solves the kinematic wave with the remaining infiltration
//! capacity as a sink. Water that the solve removes beyond what flowed out
//! is credited back to infiltration. Channel cells pass all their surface
//! water to the channel.

use crate::diagnostics::{ClampCounter, ClampKind};
use crate::kinematic::{manning_alpha, solve_kinematic_wave, BETA, MIN_FLUX};
use crate::topology::{CellTopology, FlowIndex, RoutingLayers};
use rivulet_core::error::check_len;
use rivulet_core::{Error, Result, SubbasinTotals};
use rivulet_parallel::{reduce_by_key, sweep_layers, Executor};

/// Slopes of exactly zero are replaced by this value
pub const FLAT_SLOPE: f64 = 0.0001;

/// Static per-cell inputs
pub struct OverlandInputs<'a> {
    /// Slope (m/m)
    pub slope: &'a [f64],
    pub manning: &'a [f64],
    /// Reach id of channel cells, `<= 0` on hillslopes
    pub stream_link: &'a [i64],
    /// Channel width (m), 0 off the channel
    pub channel_width: &'a [f64],
    /// Sub-basin id of each cell
    pub subbasin: &'a [i64],
}

/// Per-step water fields shared with the infiltration module (all mm)
pub struct OverlandWater<'a> {
    /// Ponded surface water, updated in place
    pub surface_runoff: &'a mut [f64],
    /// Remaining infiltration capacity, reduced by re-infiltration
    pub infiltration_surplus: Option<&'a mut [f64]>,
    /// Infiltration of this step, increased by re-infiltration
    pub infiltration: &'a mut [f64],
    /// Accumulated infiltration depth
    pub accumulated_infiltration: Option<&'a mut [f64]>,
}

impl<'a> OverlandWater<'a> {
    fn check(&self, n: usize) -> Result<()> {
        check_len("surface runoff", n, self.surface_runoff.len())?;
        check_len("infiltration", n, self.infiltration.len())?;
        if let Some(s) = &self.infiltration_surplus {
            check_len("infiltration surplus", n, s.len())?;
        }
        if let Some(a) = &self.accumulated_infiltration {
            check_len("accumulated infiltration", n, a.len())?;
        }
        Ok(())
    }
}

struct CellUpdate {
    q: f64,
    sr: f64,
    velocity: f64,
    reinfiltration: f64,
}

struct Sweep<'s, 'a> {
    q: &'s mut [f64],
    water: &'s mut OverlandWater<'a>,
}

/// Static geometry of the hillslope cells
struct OverlandCells {
    index: FlowIndex,
    flow_width: Vec<f64>,
    flow_length: Vec<f64>,
    sin_slope: Vec<f64>,
    manning: Vec<f64>,
    stream_link: Vec<i64>,
    subbasin: Vec<i64>,
    dt: f64,
    clamps: ClampCounter,
}

impl OverlandCells {
    fn update_cell(&self, id: usize, s: &Sweep<'_, '_>) -> Result<CellUpdate> {
        let width = self.flow_width[id];
        let length = self.flow_length[id];
        let h = s.water.surface_runoff[id] / 1000.0;

        let q_up: f64 = self
            .index
            .upstream(id)
            .iter()
            .filter(|&&up| self.stream_link[up] <= 0)
            .map(|&up| s.q[up])
            .sum();

        if width <= 0.0 {
            return Ok(CellUpdate {
                q: q_up,
                sr: 0.0,
                velocity: 0.0,
                reinfiltration: 0.0,
            });
        }

        let perimeter = 2.0 * h + width;
        let radius = h * width / perimeter;
        let alpha = manning_alpha(self.manning[id], self.sin_slope[id], perimeter);
        let q_last = if alpha > 0.0 {
            (width * h / alpha).powf(1.0 / BETA)
        } else {
            0.0
        };
        let velocity = radius.powf(2.0 / 3.0) * self.sin_slope[id].sqrt() / self.manning[id];

        if q_up < MIN_FLUX && q_last < MIN_FLUX {
            if h != 0.0 {
                self.clamps.record(ClampKind::BelowMinFlux);
            }
            return Ok(CellUpdate {
                q: 0.0,
                sr: 0.0,
                velocity,
                reinfiltration: 0.0,
            });
        }

        let capacity = s.water.infiltration_surplus.as_ref().map_or(0.0, |c| c[id]);
        let surplus = -capacity / 1000.0 * width / self.dt;
        let mut q = solve_kinematic_wave(q_up, q_last, surplus, alpha, self.dt, length)
            .checked("overland", id)?;
        let h_new = alpha * q.powf(BETA) / width;
        let mut sr = h_new * 1000.0;

        let mut reinfiltration = ((q_up - q) * self.dt / (width * length) + h - h_new) * 1000.0;
        if reinfiltration < 0.0 {
            self.clamps.record(ClampKind::NegativeReinfiltration);
            reinfiltration = 0.0;
        }

        if self.stream_link[id] > 0 {
            q += sr / 1000.0 * width * length / self.dt;
            sr = 0.0;
        }

        Ok(CellUpdate {
            q,
            sr,
            velocity,
            reinfiltration,
        })
    }
}

/// Kinematic wave overland router
pub struct KinematicOverland {
    cells: OverlandCells,
    layers: RoutingLayers,
    n_subbasins: usize,
    q: Vec<f64>,
    velocity: Vec<f64>,
    reinfiltration: Vec<f64>,
    to_channel: SubbasinTotals,
}

impl KinematicOverland {
    /// Derive flow widths and lengths from the cell geometry.
    ///
    /// Flow width is the cell width, divided by √2 for diagonal flow and
    /// reduced by the channel width on channel cells. Flow length is the
    /// cell width corrected for slope, times √2 for diagonal flow.
    pub fn new(topo: &CellTopology, layers: RoutingLayers, inputs: &OverlandInputs<'_>, dt: f64) -> Result<Self> {
        let n = topo.index.n_nodes();
        check_len("slope", n, inputs.slope.len())?;
        check_len("manning", n, inputs.manning.len())?;
        check_len("stream link", n, inputs.stream_link.len())?;
        check_len("channel width", n, inputs.channel_width.len())?;
        check_len("subbasin", n, inputs.subbasin.len())?;
        if !(dt > 0.0) {
            return Err(Error::config("overland", "time step must be positive"));
        }
        if !layers.is_valid_for(&topo.index) {
            return Err(Error::config("overland", "routing layers do not match the cell graph"));
        }

        let cell_width = topo.layout.cell_size();
        let mut flow_width = vec![0.0; n];
        let mut flow_length = vec![0.0; n];
        let mut sin_slope = vec![0.0; n];
        for id in 0..n {
            let s = if inputs.slope[id] == 0.0 { FLAT_SLOPE } else { inputs.slope[id] };
            let radians = s.atan();
            sin_slope[id] = radians.sin();
            let factor = topo.length_factor(id);
            let mut width = cell_width / factor;
            if inputs.stream_link[id] > 0 {
                width -= inputs.channel_width[id];
            }
            flow_width[id] = width;
            flow_length[id] = cell_width / radians.cos() * factor;
        }
        let n_subbasins = inputs.subbasin.iter().copied().max().unwrap_or(0).max(0) as usize;

        Ok(Self {
            cells: OverlandCells {
                index: topo.index.clone(),
                flow_width,
                flow_length,
                sin_slope,
                manning: inputs.manning.to_vec(),
                stream_link: inputs.stream_link.to_vec(),
                subbasin: inputs.subbasin.to_vec(),
                dt,
                clamps: ClampCounter::new(),
            },
            layers,
            n_subbasins,
            q: vec![0.0; n],
            velocity: vec![0.0; n],
            reinfiltration: vec![0.0; n],
            to_channel: SubbasinTotals::zeros(n_subbasins),
        })
    }

    /// Route one hillslope time step.
    pub fn step(&mut self, exec: &Executor, water: &mut OverlandWater<'_>) -> Result<()> {
        let n = self.q.len();
        water.check(n)?;

        let cells = &self.cells;
        let velocity = &mut self.velocity;
        let reinfiltration = &mut self.reinfiltration;
        let mut sweep = Sweep {
            q: &mut self.q,
            water,
        };
        sweep_layers(
            exec,
            self.layers.layers(),
            &mut sweep,
            |id, s| cells.update_cell(id, s),
            |id, u, s| {
                s.q[id] = u.q;
                s.water.surface_runoff[id] = u.sr;
                s.water.infiltration[id] += u.reinfiltration;
                if let Some(acc) = s.water.accumulated_infiltration.as_deref_mut() {
                    acc[id] += u.reinfiltration;
                }
                if let Some(cap) = s.water.infiltration_surplus.as_deref_mut() {
                    cap[id] -= u.reinfiltration;
                }
                velocity[id] = u.velocity;
                reinfiltration[id] = u.reinfiltration;
            },
        )?;

        let q = &self.q;
        let stream_link = &cells.stream_link;
        let subbasin = &cells.subbasin;
        let partial = reduce_by_key(exec, n, self.n_subbasins + 1, |id| {
            (stream_link[id] > 0 && subbasin[id] > 0).then(|| (subbasin[id] as usize, q[id]))
        })?;
        self.to_channel = SubbasinTotals::from_partial(partial)?;
        cells.clamps.report("overland");
        Ok(())
    }

    /// Discharge leaving each cell in the last step (m³/s)
    pub fn discharge(&self) -> &[f64] {
        &self.q
    }

    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }

    /// Re-infiltration credited to each cell in the last step (mm)
    pub fn reinfiltration(&self) -> &[f64] {
        &self.reinfiltration
    }

    /// Overland flow entering the channel per sub-basin (m³/s)
    pub fn to_channel(&self) -> &SubbasinTotals {
        &self.to_channel
    }

    pub fn flow_width(&self) -> &[f64] {
        &self.cells.flow_width
    }

    pub fn flow_length(&self) -> &[f64] {
        &self.cells.flow_length
    }

    pub fn clamps(&self) -> &ClampCounter {
        &self.cells.clamps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{build_flow_indices, build_routing_layers, FlowIndexParams, LayerOrigin};
    use approx::assert_relative_eq;
    use rivulet_core::Raster;
    use rivulet_parallel::ProcessingMode;

    // 1x4 strip draining east into a channel cell at the end
    fn strip() -> (CellTopology, RoutingLayers) {
        let grid = Raster::from_vec(vec![1, 1, 1, 0], 1, 4).unwrap().with_cell_size(30.0);
        let topo = build_flow_indices(&grid, &FlowIndexParams::default()).unwrap();
        let layers = build_routing_layers(&topo.index, LayerOrigin::FromSource).unwrap();
        (topo, layers)
    }

    fn router() -> KinematicOverland {
        let (topo, layers) = strip();
        let inputs = OverlandInputs {
            slope: &[0.05, 0.05, 0.05, 0.0],
            manning: &[0.1; 4],
            stream_link: &[0, 0, 0, 1],
            channel_width: &[0.0, 0.0, 0.0, 5.0],
            subbasin: &[1; 4],
        };
        KinematicOverland::new(&topo, layers, &inputs, 60.0).unwrap()
    }

    fn run(exec: &Executor, surplus: f64) -> (KinematicOverland, Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut ol = router();
        let mut sr = vec![10.0, 10.0, 10.0, 0.0];
        let mut infil = vec![0.0; 4];
        let mut capacity = vec![surplus; 4];
        let mut water = OverlandWater {
            surface_runoff: &mut sr,
            infiltration_surplus: Some(&mut capacity),
            infiltration: &mut infil,
            accumulated_infiltration: None,
        };
        ol.step(exec, &mut water).unwrap();
        (ol, sr, infil, capacity)
    }

    #[test]
    fn test_geometry() {
        let ol = router();
        assert_relative_eq!(ol.flow_width()[3], 25.0);
        assert_relative_eq!(ol.flow_width()[0], 30.0);
        let expected = 30.0 / 0.05f64.atan().cos();
        assert_relative_eq!(ol.flow_length()[0], expected);
    }

    #[test]
    fn test_dry_grid_stays_dry() {
        let mut ol = router();
        let mut sr = vec![0.0; 4];
        let mut infil = vec![0.0; 4];
        let mut water = OverlandWater {
            surface_runoff: &mut sr,
            infiltration_surplus: None,
            infiltration: &mut infil,
            accumulated_infiltration: None,
        };
        ol.step(&Executor::sequential(), &mut water).unwrap();
        assert!(ol.discharge().iter().all(|&q| q == 0.0));
        assert_eq!(ol.to_channel().total(), 0.0);
    }

    #[test]
    fn test_ponded_water_reaches_channel() {
        let (ol, sr, _, _) = run(&Executor::sequential(), 0.0);
        assert!(ol.to_channel().total() > 0.0, "channel must receive overland flow");
        assert_eq!(sr[3], 0.0, "channel cells pass all surface water on");
        assert!(sr[0] < 10.0, "headwater cell must drain");
        assert_relative_eq!(ol.to_channel().total(), ol.discharge()[3]);
    }

    #[test]
    fn test_reinfiltration_balances_capacity() {
        let (ol, _, infil, capacity) = run(&Executor::sequential(), 50.0);
        for id in 0..4 {
            assert_relative_eq!(infil[id], ol.reinfiltration()[id]);
            assert_relative_eq!(capacity[id], 50.0 - ol.reinfiltration()[id]);
            assert!(ol.reinfiltration()[id] >= 0.0);
        }
        assert!(ol.reinfiltration()[0] > 0.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (seq, sr_seq, _, _) = run(&Executor::sequential(), 5.0);
        let exec = Executor::new(ProcessingMode::ParallelWith(2)).unwrap();
        let (par, sr_par, _, _) = run(&exec, 5.0);
        assert_eq!(seq.discharge(), par.discharge());
        assert_eq!(sr_seq, sr_par);
    }
}
