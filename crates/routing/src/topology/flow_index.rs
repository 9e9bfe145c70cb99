//! Flow-in / flow-out indices over D8 flow directions
//!
//! Every valid cell gets a compact id (see [`CellLayout`]). Each cell has at
//! most one downstream target; the flow-in lists are the inverse relation.
//!
//! Outlets are cells with direction code 0, cells whose code is no-data, and
//! cells draining into a no-data cell. A code pointing off the grid is a
//! topology error unless [`FlowIndexParams::off_grid_is_outlet`] is set.

use rivulet_core::raster::{CellLayout, Raster, RasterElement};
use rivulet_core::{Algorithm, D8Encoding, Error, Result};
use tracing::debug;

/// Upstream and downstream links of every node of a drainage graph.
///
/// Used for both cell graphs and reach graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowIndex {
    flow_in: Vec<Vec<usize>>,
    flow_out: Vec<Option<usize>>,
}

impl FlowIndex {
    /// Build from the single downstream target of each node (`None` = outlet).
    pub fn from_downstream(flow_out: Vec<Option<usize>>) -> Result<Self> {
        let n = flow_out.len();
        let mut flow_in = vec![Vec::new(); n];
        for (id, target) in flow_out.iter().enumerate() {
            if let Some(down) = *target {
                if down >= n {
                    return Err(Error::Topology {
                        node: id,
                        reason: format!("downstream node {down} does not exist ({n} nodes)"),
                    });
                }
                if down == id {
                    return Err(Error::Topology {
                        node: id,
                        reason: "node drains into itself".into(),
                    });
                }
                flow_in[down].push(id);
            }
        }
        Ok(Self { flow_in, flow_out })
    }

    pub fn n_nodes(&self) -> usize {
        self.flow_out.len()
    }

    /// Upstream nodes draining directly into `id`
    pub fn upstream(&self, id: usize) -> &[usize] {
        &self.flow_in[id]
    }

    /// Downstream target of `id`, `None` at an outlet
    pub fn downstream(&self, id: usize) -> Option<usize> {
        self.flow_out[id]
    }

    pub fn flow_out(&self) -> &[Option<usize>] {
        &self.flow_out
    }

    /// Nodes without upstream inflow
    pub fn headwaters(&self) -> impl Iterator<Item = usize> + '_ {
        self.flow_in
            .iter()
            .enumerate()
            .filter(|(_, up)| up.is_empty())
            .map(|(id, _)| id)
    }

    /// Nodes without a downstream target
    pub fn outlets(&self) -> impl Iterator<Item = usize> + '_ {
        self.flow_out
            .iter()
            .enumerate()
            .filter(|(_, down)| down.is_none())
            .map(|(id, _)| id)
    }

    /// Flow-in lists in the count-prefixed exchange format:
    /// element 0 is the number of upstream nodes, followed by their ids.
    pub fn to_count_prefixed(&self) -> Vec<Vec<i64>> {
        self.flow_in
            .iter()
            .map(|up| {
                let mut row = Vec::with_capacity(up.len() + 1);
                row.push(up.len() as i64);
                row.extend(up.iter().map(|&u| u as i64));
                row
            })
            .collect()
    }

    /// Flow-out targets in the exchange format, `-1` marking outlets
    pub fn to_sentinel_out(&self) -> Vec<i64> {
        self.flow_out
            .iter()
            .map(|d| d.map_or(-1, |d| d as i64))
            .collect()
    }
}

/// Parameters for building cell flow indices
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowIndexParams {
    /// Direction code scheme of the input grid
    pub encoding: D8Encoding,
    /// Treat codes that point off the grid as outlets instead of failing
    pub off_grid_is_outlet: bool,
}

/// Cell ids plus the drainage graph over them
#[derive(Debug, Clone)]
pub struct CellTopology {
    pub layout: CellLayout,
    pub index: FlowIndex,
    /// Raw direction code of every cell, used for diagonal length corrections
    pub codes: Vec<i64>,
    pub encoding: D8Encoding,
}

impl CellTopology {
    /// D8 length factor (1 or √2) of the flow path leaving cell `id`
    pub fn length_factor(&self, id: usize) -> f64 {
        self.encoding.length_factor(self.codes[id])
    }

    pub fn is_diagonal(&self, id: usize) -> bool {
        self.encoding.is_diagonal(self.codes[id])
    }
}

/// Build flow-in / flow-out indices from a D8 flow-direction grid.
///
/// Cells whose direction value is no-data are excluded from the layout.
///
/// # Errors
/// `Error::Topology` for an invalid direction code or one that points off
/// the grid (unless `off_grid_is_outlet`).
pub fn build_flow_indices<T: RasterElement>(
    flow_dir: &Raster<T>,
    params: &FlowIndexParams,
) -> Result<CellTopology> {
    let layout = CellLayout::from_mask(flow_dir);
    let codes = layout.gather_codes(flow_dir)?;
    let (rows, cols) = layout.shape();

    let mut flow_out = Vec::with_capacity(layout.n_cells());
    for (id, &code) in codes.iter().enumerate() {
        let (row, col) = layout
            .position(id)
            .ok_or_else(|| Error::Other(format!("cell {id} has no grid position")))?;

        let offset = params.encoding.offset(code).map_err(|bad| Error::Topology {
            node: id,
            reason: format!("invalid {:?} direction code {bad} at ({row}, {col})", params.encoding),
        })?;
        let Some((dr, dc)) = offset else {
            flow_out.push(None);
            continue;
        };

        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
            if params.off_grid_is_outlet {
                flow_out.push(None);
                continue;
            }
            return Err(Error::Topology {
                node: id,
                reason: format!("direction code {code} at ({row}, {col}) points off the grid"),
            });
        }
        // Draining into a no-data cell leaves the modelled area.
        flow_out.push(layout.id(nr as usize, nc as usize));
    }

    let index = FlowIndex::from_downstream(flow_out)?;
    debug!(
        cells = index.n_nodes(),
        outlets = index.outlets().count(),
        "built cell flow indices"
    );

    Ok(CellTopology {
        layout,
        index,
        codes,
        encoding: params.encoding,
    })
}

/// Flow index builder
#[derive(Debug, Clone, Default)]
pub struct BuildFlowIndices;

impl Algorithm for BuildFlowIndices {
    type Input = Raster<i32>;
    type Output = CellTopology;
    type Params = FlowIndexParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Indices (D8)"
    }

    fn description(&self) -> &'static str {
        "Build flow-in and flow-out cell indices from a D8 direction grid"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        build_flow_indices(&input, &params)
    }
}
