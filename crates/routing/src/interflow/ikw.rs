//! Root-zone interflow by Darcy flux (IKW_IF)
//!
//! Cells are swept in routing-layer order. Interflow from upstream
//! hillslope cells wets the root zone of the receiving cell; the lateral
//! flux is Darcy's law with a power-law unsaturated conductivity and never
//! drains the soil below field capacity. Water pushed above porosity leaves
//! as return flow onto the surface.

use crate::diagnostics::{ClampCounter, ClampKind};
use crate::topology::{CellTopology, FlowIndex, RoutingLayers};
use rivulet_core::error::check_len;
use rivulet_core::{Error, Result, SubbasinTotals};
use rivulet_parallel::{reduce_by_key, sweep_layers, Executor};

/// Slopes are floored at this value
pub const MIN_INTERFLOW_SLOPE: f64 = 0.01;

/// Static per-cell root-zone inputs
pub struct RootZoneInputs<'a> {
    pub slope: &'a [f64],
    /// Root depth (mm)
    pub root_depth: &'a [f64],
    /// Saturated conductivity (mm/h)
    pub conductivity: &'a [f64],
    pub porosity: &'a [f64],
    pub field_capacity: &'a [f64],
    pub pore_index: &'a [f64],
    pub stream_link: &'a [i64],
    pub channel_width: &'a [f64],
    pub subbasin: &'a [i64],
}

/// Water fields updated by the interflow sweep
pub struct RootZoneWater<'a> {
    /// Volumetric soil moisture (m³/m³)
    pub soil_moisture: &'a mut [f64],
    /// Surface runoff (mm), receives return flow
    pub surface_runoff: &'a mut [f64],
}

#[derive(Debug, Clone, Copy)]
struct CellUpdate {
    q: f64,
    depth: f64,
    moisture: f64,
    return_flow: f64,
}

struct Sweep<'s, 'a> {
    q: &'s mut [f64],
    water: &'s mut RootZoneWater<'a>,
}

struct RootZoneCells {
    index: FlowIndex,
    cell_width: f64,
    flow_width: Vec<f64>,
    s0: Vec<f64>,
    root_depth: Vec<f64>,
    conductivity: Vec<f64>,
    porosity: Vec<f64>,
    field_capacity: Vec<f64>,
    pore_index: Vec<f64>,
    stream_link: Vec<i64>,
    landuse_factor: f64,
    dt: f64,
    clamps: ClampCounter,
}

impl RootZoneCells {
    fn update_cell(&self, id: usize, s: &Sweep<'_, '_>) -> Result<CellUpdate> {
        let q_up: f64 = self
            .index
            .upstream(id)
            .iter()
            .filter(|&&up| self.stream_link[up] <= 0)
            .map(|&up| s.q[up])
            .sum();
        let mut moisture = s.water.soil_moisture[id];

        let width = self.flow_width[id];
        if width <= 0.0 {
            return Ok(CellUpdate {
                q: q_up,
                depth: 0.0,
                moisture,
                return_flow: 0.0,
            });
        }

        let cw = self.cell_width;
        let s0 = self.s0[id];
        let root = self.root_depth[id];
        let porosity = self.porosity[id];
        let fc = self.field_capacity[id];
        let soil_volume = root / 1000.0 * cw * width / s0.atan().cos();
        if !(soil_volume > 0.0) {
            return Err(Error::invalid("root_depth", root, format!("cell {id} has no soil volume")));
        }

        moisture += q_up * self.dt / soil_volume;
        let mut return_flow = 0.0;
        if moisture > porosity {
            return_flow = (moisture - porosity) * root;
            moisture = porosity;
            self.clamps.record(ClampKind::ReturnFlow);
        }
        if moisture < fc {
            return Ok(CellUpdate {
                q: 0.0,
                depth: 0.0,
                moisture,
                return_flow,
            });
        }

        let k = self.conductivity[id] / 1000.0 / 3600.0 * (moisture / porosity).powf(self.pore_index[id]);
        let mut q = self.landuse_factor * root / 1000.0 * s0 * k * cw;
        let available = (moisture - fc) * soil_volume;
        let mut volume = q * self.dt;
        if volume > available {
            self.clamps.record(ClampKind::OutflowCapped);
            q = available / self.dt;
            volume = available;
        }
        moisture -= volume / soil_volume;
        if !moisture.is_finite() {
            return Err(Error::NumericalDivergence {
                module: "interflow",
                node: id,
                reason: "soil moisture is not finite".into(),
            });
        }

        Ok(CellUpdate {
            q,
            depth: 1000.0 * volume / (cw * cw),
            moisture,
            return_flow,
        })
    }
}

/// Root-zone interflow router
pub struct RootZoneInterflow {
    cells: RootZoneCells,
    layers: RoutingLayers,
    n_subbasins: usize,
    subbasin: Vec<i64>,
    q: Vec<f64>,
    depth: Vec<f64>,
    return_flow: Vec<f64>,
    to_channel: SubbasinTotals,
}

impl RootZoneInterflow {
    /// `landuse_factor` scales the Darcy flux, `dt` in seconds
    pub fn new(
        topo: &CellTopology,
        layers: RoutingLayers,
        inputs: &RootZoneInputs<'_>,
        landuse_factor: f64,
        dt: f64,
    ) -> Result<Self> {
        let n = topo.index.n_nodes();
        for (name, len) in [
            ("slope", inputs.slope.len()),
            ("root_depth", inputs.root_depth.len()),
            ("conductivity", inputs.conductivity.len()),
            ("porosity", inputs.porosity.len()),
            ("field_capacity", inputs.field_capacity.len()),
            ("pore_index", inputs.pore_index.len()),
            ("stream_link", inputs.stream_link.len()),
            ("channel_width", inputs.channel_width.len()),
            ("subbasin", inputs.subbasin.len()),
        ] {
            check_len(name, n, len)?;
        }
        if !(dt > 0.0) {
            return Err(Error::config("interflow", "time step must be positive"));
        }
        if !layers.is_valid_for(&topo.index) {
            return Err(Error::config("interflow", "routing layers do not match the cell graph"));
        }
        if let Some(id) = (0..n).find(|&id| !(inputs.porosity[id] > 0.0)) {
            return Err(Error::invalid("porosity", inputs.porosity[id], format!("cell {id} must be positive")));
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
        let n_subbasins = inputs.subbasin.iter().copied().max().unwrap_or(0).max(0) as usize;

        Ok(Self {
            cells: RootZoneCells {
                index: topo.index.clone(),
                cell_width,
                flow_width,
                s0: inputs.slope.iter().map(|&s| s.max(MIN_INTERFLOW_SLOPE)).collect(),
                root_depth: inputs.root_depth.to_vec(),
                conductivity: inputs.conductivity.to_vec(),
                porosity: inputs.porosity.to_vec(),
                field_capacity: inputs.field_capacity.to_vec(),
                pore_index: inputs.pore_index.to_vec(),
                stream_link: inputs.stream_link.to_vec(),
                landuse_factor,
                dt,
                clamps: ClampCounter::new(),
            },
            layers,
            n_subbasins,
            subbasin: inputs.subbasin.to_vec(),
            q: vec![0.0; n],
            depth: vec![0.0; n],
            return_flow: vec![0.0; n],
            to_channel: SubbasinTotals::zeros(n_subbasins),
        })
    }

    /// Route one hillslope step, updating soil moisture and surface runoff
    pub fn step(&mut self, exec: &Executor, water: &mut RootZoneWater<'_>) -> Result<()> {
        let n = self.q.len();
        check_len("soil_moisture", n, water.soil_moisture.len())?;
        check_len("surface_runoff", n, water.surface_runoff.len())?;

        let cells = &self.cells;
        let depth = &mut self.depth;
        let return_flow = &mut self.return_flow;
        let mut sweep = Sweep { q: &mut self.q, water };
        sweep_layers(
            exec,
            self.layers.layers(),
            &mut sweep,
            |id, s| cells.update_cell(id, s),
            |id, u, s| {
                s.q[id] = u.q;
                s.water.soil_moisture[id] = u.moisture;
                s.water.surface_runoff[id] += u.return_flow;
                depth[id] = u.depth;
                return_flow[id] = u.return_flow;
            },
        )?;

        let (q, stream_link, subbasin) = (&self.q, &cells.stream_link, &self.subbasin);
        let partial = reduce_by_key(exec, n, self.n_subbasins + 1, |id| {
            (stream_link[id] > 0 && subbasin[id] > 0).then(|| (subbasin[id] as usize, q[id]))
        })?;
        self.to_channel = SubbasinTotals::from_partial(partial)?;
        cells.clamps.report("interflow");
        Ok(())
    }

    /// Interflow leaving each cell (m³/s)
    pub fn discharge(&self) -> &[f64] {
        &self.q
    }

    /// Interflow depth over the cell (mm)
    pub fn depth(&self) -> &[f64] {
        &self.depth
    }

    pub fn return_flow(&self) -> &[f64] {
        &self.return_flow
    }

    /// Interflow entering the channel per sub-basin (m³/s)
    pub fn to_channel(&self) -> &SubbasinTotals {
        &self.to_channel
    }
}
