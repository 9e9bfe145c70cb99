//! Cell-by-cell channel routing along reach chains
//!
//! Reaches are swept in reach-layer order; inside a reach the channel
//! cells are updated from the source cell down to the reach outlet. The
//! first cell of a reach receives the outlet discharge of all upstream
//! reaches.

use crate::diagnostics::ClampCounter;
use crate::overland::FLAT_SLOPE;
use crate::topology::{CellTopology, ReachChains, ReachTable, ReachTopology};
use rivulet_core::error::check_len;
use rivulet_core::{Error, Result};
use rivulet_parallel::{sweep_layers, Executor};
use tracing::debug;

/// Discharge and water depth of one channel cell
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellFlow {
    /// Discharge (m³/s)
    pub q: f64,
    /// Water depth (m)
    pub h: f64,
}

/// Static geometry of one channel cell
#[derive(Debug, Clone, Copy)]
pub struct ChannelCell {
    /// Cell id in the grid layout
    pub id: usize,
    /// Flow length, corrected for slope and diagonal flow (m)
    pub dx: f64,
    /// Channel width (m)
    pub width: f64,
    pub sin_slope: f64,
    /// Bed elevation (m)
    pub elevation: f64,
    /// Manning's n of the reach
    pub manning: f64,
}

/// Inflow seen by one cell in one step
#[derive(Debug, Clone, Copy, Default)]
pub struct CellInflow {
    /// Discharge from upstream (m³/s)
    pub q_up: f64,
    /// Highest upstream water surface elevation (m), `None` at sources
    pub surface_up: Option<f64>,
    /// Precipitation on the channel (mm per step)
    pub precipitation: f64,
    /// Overland flow into the cell (m³/s)
    pub qs: f64,
    /// Interflow into the cell (m³/s)
    pub qi: f64,
    /// Groundwater share of the cell (m³/s)
    pub qg: f64,
}

/// A per-cell channel flow scheme
pub trait CellMethod: Send + Sync {
    fn name(&self) -> &'static str;

    fn update_cell(
        &self,
        cell: &ChannelCell,
        inflow: &CellInflow,
        last: CellFlow,
        dt: f64,
        clamps: &ClampCounter,
    ) -> Result<CellFlow>;
}

/// Static per-cell channel inputs, indexed by cell id
pub struct ChannelCellInputs<'a> {
    pub slope: &'a [f64],
    pub channel_width: &'a [f64],
    /// Bed elevation, only needed by the diffusive wave
    pub elevation: Option<&'a [f64]>,
}

/// Per-step lateral inflow
pub struct ChannelCellForcing<'a> {
    /// Precipitation per cell (mm per step)
    pub precipitation: Option<&'a [f64]>,
    /// Overland flow per cell (m³/s)
    pub surface: &'a [f64],
    /// Interflow per cell (m³/s)
    pub interflow: Option<&'a [f64]>,
    /// Groundwater per reach id, `n_reaches + 1` entries (m³/s)
    pub groundwater: Option<&'a [f64]>,
}

struct ReachCells {
    cells: Vec<ChannelCell>,
}

/// Router applying a [`CellMethod`] to every channel cell
pub struct CellChannelRouter<M: CellMethod> {
    method: M,
    reaches: Vec<ReachCells>,
    topology: ReachTopology,
    n_cells: usize,
    flows: Vec<Vec<CellFlow>>,
    dt: f64,
    clamps: ClampCounter,
}

impl<M: CellMethod> CellChannelRouter<M> {
    pub fn new(
        method: M,
        cells: &CellTopology,
        chains: &ReachChains,
        table: &ReachTable,
        topology: ReachTopology,
        inputs: &ChannelCellInputs<'_>,
        dt: f64,
    ) -> Result<Self> {
        let n_cells = cells.index.n_nodes();
        check_len("slope", n_cells, inputs.slope.len())?;
        check_len("channel width", n_cells, inputs.channel_width.len())?;
        if let Some(e) = inputs.elevation {
            check_len("elevation", n_cells, e.len())?;
        }
        check_len("reach chains", topology.n_reaches(), chains.n_reaches())?;
        check_len("reach table", topology.n_reaches(), table.len())?;
        if !(dt > 0.0) {
            return Err(Error::config(method.name(), "time step must be positive"));
        }

        let cell_width = cells.layout.cell_size();
        let mut reaches = Vec::with_capacity(chains.n_reaches());
        for r in 0..chains.n_reaches() {
            let manning = table.get(r).manning;
            let mut chain = Vec::with_capacity(chains.chain(r).len());
            for &id in chains.chain(r) {
                let width = inputs.channel_width[id];
                if !(width > 0.0) {
                    return Err(Error::invalid("channel width", width, format!("channel cell {id} must be positive")));
                }
                let s = if inputs.slope[id] == 0.0 { FLAT_SLOPE } else { inputs.slope[id] };
                let radians = s.atan();
                chain.push(ChannelCell {
                    id,
                    dx: cell_width / radians.cos() * cells.length_factor(id),
                    width,
                    sin_slope: radians.sin(),
                    elevation: inputs.elevation.map_or(0.0, |e| e[id]),
                    manning,
                });
            }
            reaches.push(ReachCells { cells: chain });
        }
        debug!(
            method = method.name(),
            reaches = reaches.len(),
            cells = reaches.iter().map(|r| r.cells.len()).sum::<usize>(),
            "channel cell router built"
        );

        let flows = reaches.iter().map(|r| vec![CellFlow::default(); r.cells.len()]).collect();
        Ok(Self {
            method,
            reaches,
            topology,
            n_cells,
            flows,
            dt,
            clamps: ClampCounter::new(),
        })
    }

    /// Route one channel step
    pub fn step(&mut self, exec: &Executor, forcing: &ChannelCellForcing<'_>) -> Result<()> {
        let n = self.n_cells;
        check_len("channel surface inflow", n, forcing.surface.len())?;
        if let Some(p) = forcing.precipitation {
            check_len("channel precipitation", n, p.len())?;
        }
        if let Some(qi) = forcing.interflow {
            check_len("channel interflow", n, qi.len())?;
        }
        if let Some(qg) = forcing.groundwater {
            check_len("reach groundwater", self.reaches.len() + 1, qg.len())?;
        }

        let mut flows = std::mem::take(&mut self.flows);
        let this = &*self;
        let result = sweep_layers(
            exec,
            this.topology.layers.layers(),
            &mut flows,
            |r, flows: &Vec<Vec<CellFlow>>| this.route_reach(r, flows, forcing),
            |r, updated, flows| flows[r] = updated,
        );
        self.flows = flows;
        result?;
        self.clamps.report(self.method.name());
        Ok(())
    }

    fn route_reach(&self, r: usize, flows: &[Vec<CellFlow>], forcing: &ChannelCellForcing<'_>) -> Result<Vec<CellFlow>> {
        let cells = &self.reaches[r].cells;

        let mut q_up = 0.0;
        let mut surface_up: Option<f64> = None;
        for &up in self.topology.upstream(r) {
            let upstream_q = self.upstream_discharge(flows, up);
            q_up += upstream_q;
            if let (Some(cell), Some(flow)) = (self.reaches[up].cells.last(), flows[up].last()) {
                let surface = cell.elevation + flow.h;
                surface_up = Some(surface_up.map_or(surface, |s: f64| s.max(surface)));
            }
        }
        let qg_each = match forcing.groundwater {
            Some(qg) if !cells.is_empty() => qg[ReachTopology::reach_id(r)] / cells.len() as f64,
            _ => 0.0,
        };

        let mut updated = Vec::with_capacity(cells.len());
        for (k, cell) in cells.iter().enumerate() {
            let inflow = CellInflow {
                q_up,
                surface_up,
                precipitation: forcing.precipitation.map_or(0.0, |p| p[cell.id]),
                qs: forcing.surface[cell.id],
                qi: forcing.interflow.map_or(0.0, |q| q[cell.id]),
                qg: qg_each,
            };
            let flow = self.method.update_cell(cell, &inflow, flows[r][k], self.dt, &self.clamps)?;
            q_up = flow.q;
            surface_up = Some(cell.elevation + flow.h);
            updated.push(flow);
        }
        Ok(updated)
    }

    /// Outlet discharge of reach `up`; reaches without cells pass their
    /// own upstream inflow on.
    fn upstream_discharge(&self, flows: &[Vec<CellFlow>], up: usize) -> f64 {
        match flows[up].last() {
            Some(flow) => flow.q,
            None => self
                .topology
                .upstream(up)
                .iter()
                .map(|&u| self.upstream_discharge(flows, u))
                .sum(),
        }
    }

    pub fn n_reaches(&self) -> usize {
        self.reaches.len()
    }

    /// Flow of every cell of reach `r`, source first
    pub fn reach_flows(&self, r: usize) -> &[CellFlow] {
        &self.flows[r]
    }

    /// Outlet discharge of reach `r` (m³/s)
    pub fn reach_discharge(&self, r: usize) -> f64 {
        self.upstream_discharge(&self.flows, r)
    }

    /// Reach outlet discharge indexed by reach id, sum of the watershed
    /// outlets at 0
    pub fn discharge(&self) -> Vec<f64> {
        let mut q = Vec::with_capacity(self.reaches.len() + 1);
        q.push(self.topology.outlets().iter().map(|&r| self.reach_discharge(r)).sum());
        q.extend((0..self.reaches.len()).map(|r| self.reach_discharge(r)));
        q
    }

    pub fn clamps(&self) -> &ClampCounter {
        &self.clamps
    }
}
