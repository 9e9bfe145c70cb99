//! Multi-layer subsurface flow (SSR_DA)
//!
//! Each soil layer drains laterally with a Clapp–Hornberger conductivity.
//! Upstream subsurface flow is only accepted from cells of the same
//! sub-basin, layer by layer. Channel cells collect the flow of all their
//! layers as the interflow discharge of their reach.

use crate::diagnostics::{ClampCounter, ClampKind};
use crate::topology::{CellTopology, FlowIndex, RoutingLayers};
use rivulet_core::error::check_len;
use rivulet_core::{Error, Result, SubbasinTotals};
use rivulet_parallel::{reduce_by_key, sweep_layers, Executor};

use super::ikw::MIN_INTERFLOW_SLOPE;

/// Volumes at or below this are treated as empty
const UTIL_ZERO: f64 = 1e-6;

/// Per-cell, per-layer soil properties. Every `Vec` holds one value per
/// soil layer of the cell, top first.
pub struct SoilLayerInputs<'a> {
    pub slope: &'a [f64],
    /// Layer thickness (mm)
    pub thickness: &'a [Vec<f64>],
    /// Saturated conductivity (mm/h)
    pub conductivity: &'a [Vec<f64>],
    /// Water content at saturation (mm)
    pub saturation: &'a [Vec<f64>],
    /// Water content at field capacity (mm)
    pub field_capacity: &'a [Vec<f64>],
    pub pore_index: &'a [Vec<f64>],
    pub stream_link: &'a [i64],
    pub channel_width: &'a [f64],
    pub subbasin: &'a [i64],
}

/// Interflow scaling and freezing parameters
#[derive(Debug, Clone, Copy)]
pub struct SoilLayerParams {
    pub ki: f64,
    /// Top layer at or below this temperature (°C) does not drain
    pub frozen_soil_temp: f64,
}

impl Default for SoilLayerParams {
    fn default() -> Self {
        Self {
            ki: 1.0,
            frozen_soil_temp: -5.0,
        }
    }
}

impl From<&rivulet_core::config::InterflowConfig> for SoilLayerParams {
    fn from(cfg: &rivulet_core::config::InterflowConfig) -> Self {
        Self {
            ki: cfg.ki,
            frozen_soil_temp: cfg.frozen_soil_temp,
        }
    }
}

/// Per-cell layer water
pub struct SoilLayerWater<'a> {
    /// Soil water per layer (mm), updated in place
    pub soil_water: &'a mut [Vec<f64>],
    /// Soil temperature (°C); without it no layer is frozen
    pub soil_temperature: Option<&'a [f64]>,
}

struct CellUpdate {
    runoff: Vec<f64>,
    volume: Vec<f64>,
    soil_water: Vec<f64>,
}

struct Sweep<'s, 'a> {
    runoff: &'s mut [Vec<f64>],
    volume: &'s mut [Vec<f64>],
    water: &'s mut SoilLayerWater<'a>,
}

struct SoilCells {
    index: FlowIndex,
    cell_width: f64,
    flow_width: Vec<f64>,
    s0: Vec<f64>,
    thickness: Vec<Vec<f64>>,
    conductivity: Vec<Vec<f64>>,
    saturation: Vec<Vec<f64>>,
    field_capacity: Vec<Vec<f64>>,
    pore_index: Vec<Vec<f64>>,
    subbasin: Vec<i64>,
    params: SoilLayerParams,
    dt: f64,
    clamps: ClampCounter,
}

impl SoilCells {
    fn update_cell(&self, id: usize, s: &Sweep<'_, '_>) -> Result<CellUpdate> {
        let n_layers = self.thickness[id].len();
        let width = self.flow_width[id];
        let frozen = s
            .water
            .soil_temperature
            .is_some_and(|t| t[id] <= self.params.frozen_soil_temp);
        let mut update = CellUpdate {
            runoff: vec![0.0; n_layers],
            volume: vec![0.0; n_layers],
            soil_water: s.water.soil_water[id].clone(),
        };

        for j in 0..n_layers {
            let mut q_up = 0.0;
            let mut q_up_volume = 0.0;
            for &up in self.index.upstream(id) {
                if self.subbasin[up] != self.subbasin[id] {
                    continue;
                }
                let (Some(&rf), Some(&vol)) = (s.runoff[up].get(j), s.volume[up].get(j)) else {
                    continue;
                };
                if rf < 0.0 {
                    continue;
                }
                q_up += rf;
                q_up_volume += vol;
            }
            if q_up <= 0.0 || q_up_volume <= 0.0 {
                q_up = 0.0;
                q_up_volume = 0.0;
            }

            if width <= 0.0 {
                update.runoff[j] = q_up;
                update.volume[j] = q_up_volume;
                continue;
            }

            let sw = update.soil_water[j];
            if !(sw >= 0.0) {
                return Err(Error::NumericalDivergence {
                    module: "soil_layers",
                    node: id,
                    reason: format!("layer {j} soil water is {sw}"),
                });
            }
            let sw = sw + q_up;
            update.soil_water[j] = sw;

            let fc = self.field_capacity[id][j];
            if sw <= fc || (j == 0 && frozen && q_up <= 0.0) {
                continue;
            }

            let sat = self.saturation[id][j];
            let k = if sw > sat {
                self.conductivity[id][j]
            } else {
                let k = self.conductivity[id][j] * (sw / sat).powf(2.0 * self.pore_index[id][j] + 3.0);
                if k <= UTIL_ZERO {
                    0.0
                } else {
                    k
                }
            };

            let mut rf = self.params.ki * self.s0[id] * k * self.dt / 3600.0 * self.thickness[id][j] * 0.001 / width;
            if sw - rf > sat {
                rf = sw - sat;
            } else if sw - rf < fc {
                rf = sw - fc;
            }
            if rf < 0.0 {
                self.clamps.record(ClampKind::NegativeFlux);
                rf = 0.0;
            }

            update.runoff[j] = rf;
            update.volume[j] = (rf * 0.001 * self.cell_width * width).max(UTIL_ZERO);
            update.soil_water[j] = sw - rf;
            if update.soil_water[j] < UTIL_ZERO {
                self.clamps.record(ClampKind::SoilWaterFloor);
                update.soil_water[j] = UTIL_ZERO;
            }
            if !update.soil_water[j].is_finite() {
                return Err(Error::NumericalDivergence {
                    module: "soil_layers",
                    node: id,
                    reason: format!("layer {j} soil water is not finite"),
                });
            }
        }
        Ok(update)
    }
}

/// Layered subsurface router
pub struct SoilLayerInterflow {
    cells: SoilCells,
    layers: RoutingLayers,
    stream_link: Vec<i64>,
    n_reaches: usize,
    runoff: Vec<Vec<f64>>,
    volume: Vec<Vec<f64>>,
    to_reach: SubbasinTotals,
}

impl SoilLayerInterflow {
    pub fn new(
        topo: &CellTopology,
        layers: RoutingLayers,
        inputs: &SoilLayerInputs<'_>,
        params: SoilLayerParams,
        dt: f64,
    ) -> Result<Self> {
        let n = topo.index.n_nodes();
        for (name, len) in [
            ("slope", inputs.slope.len()),
            ("thickness", inputs.thickness.len()),
            ("conductivity", inputs.conductivity.len()),
            ("saturation", inputs.saturation.len()),
            ("field_capacity", inputs.field_capacity.len()),
            ("pore_index", inputs.pore_index.len()),
            ("stream_link", inputs.stream_link.len()),
            ("channel_width", inputs.channel_width.len()),
            ("subbasin", inputs.subbasin.len()),
        ] {
            check_len(name, n, len)?;
        }
        for id in 0..n {
            let n_layers = inputs.thickness[id].len();
            for (name, layered) in [
                ("conductivity layers", &inputs.conductivity[id]),
                ("saturation layers", &inputs.saturation[id]),
                ("field capacity layers", &inputs.field_capacity[id]),
                ("pore index layers", &inputs.pore_index[id]),
            ] {
                check_len(name, n_layers, layered.len())?;
            }
        }
        if !(dt > 0.0) {
            return Err(Error::config("soil_layers", "time step must be positive"));
        }
        if !layers.is_valid_for(&topo.index) {
            return Err(Error::config("soil_layers", "routing layers do not match the cell graph"));
        }

        let cell_width = topo.layout.cell_size();
        let flow_width = (0..n)
            .map(|id| {
                if inputs.stream_link[id] > 0 {
                    cell_width - inputs.channel_width[id]
                } else {
                    cell_width
                }
            })
            .collect();
        let n_reaches = inputs.stream_link.iter().copied().max().unwrap_or(0).max(0) as usize;
        let empty: Vec<Vec<f64>> = inputs.thickness.iter().map(|t| vec![0.0; t.len()]).collect();

        Ok(Self {
            cells: SoilCells {
                index: topo.index.clone(),
                cell_width,
                flow_width,
                s0: inputs.slope.iter().map(|&s| s.max(MIN_INTERFLOW_SLOPE)).collect(),
                thickness: inputs.thickness.to_vec(),
                conductivity: inputs.conductivity.to_vec(),
                saturation: inputs.saturation.to_vec(),
                field_capacity: inputs.field_capacity.to_vec(),
                pore_index: inputs.pore_index.to_vec(),
                subbasin: inputs.subbasin.to_vec(),
                params,
                dt,
                clamps: ClampCounter::new(),
            },
            layers,
            stream_link: inputs.stream_link.to_vec(),
            n_reaches,
            runoff: empty.clone(),
            volume: empty,
            to_reach: SubbasinTotals::zeros(n_reaches),
        })
    }

    pub fn step(&mut self, exec: &Executor, water: &mut SoilLayerWater<'_>) -> Result<()> {
        let n = self.runoff.len();
        check_len("soil_water", n, water.soil_water.len())?;
        if let Some(t) = water.soil_temperature {
            check_len("soil_temperature", n, t.len())?;
        }

        let cells = &self.cells;
        let mut sweep = Sweep {
            runoff: &mut self.runoff,
            volume: &mut self.volume,
            water,
        };
        sweep_layers(
            exec,
            self.layers.layers(),
            &mut sweep,
            |id, s| cells.update_cell(id, s),
            |id, u, s| {
                s.runoff[id] = u.runoff;
                s.volume[id] = u.volume;
                s.water.soil_water[id] = u.soil_water;
            },
        )?;

        let (volume, stream_link, dt) = (&self.volume, &self.stream_link, cells.dt);
        let partial = reduce_by_key(exec, n, self.n_reaches + 1, |id| {
            (stream_link[id] > 0).then(|| {
                let q: f64 = volume[id].iter().filter(|&&v| v > UTIL_ZERO).map(|v| v / dt).sum();
                (stream_link[id] as usize, q)
            })
        })?;
        self.to_reach = SubbasinTotals::from_partial(partial)?;
        self.cells.clamps.report("soil_layers");
        Ok(())
    }

    /// Subsurface runoff per cell and layer (mm)
    pub fn runoff(&self) -> &[Vec<f64>] {
        &self.runoff
    }

    /// Subsurface runoff volume per cell and layer (m³)
    pub fn volume(&self) -> &[Vec<f64>] {
        &self.volume
    }

    /// Interflow entering each reach (m³/s), index 0 is the total
    pub fn to_reach(&self) -> &SubbasinTotals {
        &self.to_reach
    }

    pub fn clamps(&self) -> &ClampCounter {
        &self.cells.clamps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{build_flow_indices, build_routing_layers, FlowIndexParams, LayerOrigin};
    use rivulet_core::Raster;

    struct Fixture {
        topo: CellTopology,
        layers: RoutingLayers,
        thickness: Vec<Vec<f64>>,
        ks: Vec<Vec<f64>>,
        sat: Vec<Vec<f64>>,
        fc: Vec<Vec<f64>>,
        pore: Vec<Vec<f64>>,
    }

    fn fixture() -> Fixture {
        let grid = Raster::from_vec(vec![1, 1, 0], 1, 3).unwrap().with_cell_size(30.0);
        let topo = build_flow_indices(&grid, &FlowIndexParams::default()).unwrap();
        let layers = build_routing_layers(&topo.index, LayerOrigin::FromSource).unwrap();
        Fixture {
            topo,
            layers,
            thickness: vec![vec![100.0, 300.0]; 3],
            ks: vec![vec![50.0, 20.0]; 3],
            sat: vec![vec![45.0, 135.0]; 3],
            fc: vec![vec![25.0, 75.0]; 3],
            pore: vec![vec![0.5, 0.5]; 3],
        }
    }

    fn router(f: &Fixture, subbasin: &[i64]) -> SoilLayerInterflow {
        let inputs = SoilLayerInputs {
            slope: &[0.2; 3],
            thickness: &f.thickness,
            conductivity: &f.ks,
            saturation: &f.sat,
            field_capacity: &f.fc,
            pore_index: &f.pore,
            stream_link: &[0, 0, 1],
            channel_width: &[0.0, 0.0, 3.0],
            subbasin,
        };
        SoilLayerInterflow::new(&f.topo, f.layers.clone(), &inputs, SoilLayerParams::default(), 86_400.0).unwrap()
    }

    #[test]
    fn test_layers_drain_to_field_capacity_at_most() {
        let f = fixture();
        let mut sl = router(&f, &[1, 1, 1]);
        let mut sw = vec![vec![44.0, 130.0]; 3];
        sl.step(&Executor::sequential(), &mut SoilLayerWater { soil_water: &mut sw, soil_temperature: None })
            .unwrap();
        for cell in &sw {
            assert!(cell[0] >= 25.0 - 1e-9 && cell[1] >= 75.0 - 1e-9, "{cell:?}");
        }
        assert!(sl.runoff()[0][0] > 0.0);
        assert!(sl.to_reach().total() > 0.0);
        assert_eq!(sl.to_reach().n_subbasins(), 1);
    }

    #[test]
    fn test_upstream_from_other_subbasin_ignored() {
        let f = fixture();
        let mut same = router(&f, &[1, 1, 1]);
        let mut split = router(&f, &[2, 1, 1]);
        let mut sw_same = vec![vec![44.0, 130.0], vec![20.0, 60.0], vec![20.0, 60.0]];
        let mut sw_split = sw_same.clone();
        let exec = Executor::sequential();
        same.step(&exec, &mut SoilLayerWater { soil_water: &mut sw_same, soil_temperature: None })
            .unwrap();
        split
            .step(&exec, &mut SoilLayerWater { soil_water: &mut sw_split, soil_temperature: None })
            .unwrap();
        assert!(sw_same[1][0] > 20.0, "same sub-basin inflow wets the layer");
        assert_eq!(sw_split[1][0], 20.0, "inflow across sub-basins is dropped");
    }

    #[test]
    fn test_frozen_top_layer_holds_water() {
        let f = fixture();
        let mut sl = router(&f, &[1, 1, 1]);
        let mut sw = vec![vec![44.0, 130.0]; 3];
        let temp = [-10.0; 3];
        sl.step(&Executor::sequential(), &mut SoilLayerWater { soil_water: &mut sw, soil_temperature: Some(&temp) })
            .unwrap();
        assert_eq!(sw[0][0], 44.0, "frozen head cell keeps its top layer");
        assert!(sw[0][1] < 130.0, "deeper layers still drain");
    }
}
