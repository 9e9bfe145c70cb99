//! Reach table and reach-level topology
//!
//! Reaches are numbered `1..=n` (one per sub-basin); a downstream id of 0
//! marks the watershed outlet. Internally reach `id` lives at node index
//! `id - 1` so the reach graph can reuse [`FlowIndex`] and the layering.

use super::flow_index::FlowIndex;
use super::layers::{build_routing_layers, distance_to_outlet, LayerOrigin, RoutingLayers};
use rivulet_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of leading columns that must be present in a positional row
pub const REQUIRED_COLUMNS: usize = 10;

/// One channel reach.
///
/// Positional column order: id, downstream id, stream order, width, length,
/// depth, velocity, area, Manning's n, slope, then optionally bed
/// conductivity, bank conductivity and side slope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachRecord {
    pub id: usize,
    /// Downstream reach id, 0 at the outlet
    pub downstream: usize,
    pub order: u32,
    /// Bankfull width (m)
    pub width: f64,
    /// Length (m)
    pub length: f64,
    /// Bankfull depth (m)
    pub depth: f64,
    /// Representative velocity (m/s)
    pub velocity: f64,
    /// Area of the draining sub-basin (m²)
    pub area: f64,
    pub manning: f64,
    /// Slope (m/m)
    pub slope: f64,
    /// Bed hydraulic conductivity (mm/h)
    #[serde(default)]
    pub bed_conductivity: f64,
    /// Bank hydraulic conductivity (mm/h)
    #[serde(default)]
    pub bank_conductivity: f64,
    /// Side slope (run over rise)
    #[serde(default = "default_side_slope")]
    pub side_slope: f64,
}

fn default_side_slope() -> f64 {
    2.0
}

impl ReachRecord {
    /// Parse one positional row.
    pub fn from_row(row: &[f64]) -> Result<Self> {
        if row.len() < REQUIRED_COLUMNS {
            return Err(Error::InputSizeMismatch {
                name: "reach row",
                expected: REQUIRED_COLUMNS,
                actual: row.len(),
            });
        }
        let id_col = |i: usize, name: &'static str| -> Result<usize> {
            let v = row[i];
            if v < 0.0 || v.fract() != 0.0 || !v.is_finite() {
                return Err(Error::invalid(name, v, "must be a non-negative integer"));
            }
            Ok(v as usize)
        };
        Ok(Self {
            id: id_col(0, "reach id")?,
            downstream: id_col(1, "downstream id")?,
            order: id_col(2, "stream order")? as u32,
            width: row[3],
            length: row[4],
            depth: row[5],
            velocity: row[6],
            area: row[7],
            manning: row[8],
            slope: row[9],
            bed_conductivity: row.get(10).copied().unwrap_or(0.0),
            bank_conductivity: row.get(11).copied().unwrap_or(0.0),
            side_slope: row.get(12).copied().unwrap_or_else(default_side_slope),
        })
    }
}

/// All reaches of a watershed, sorted by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReachTable {
    records: Vec<ReachRecord>,
}

impl ReachTable {
    /// Validate and sort `records`.
    ///
    /// Ids must be exactly `1..=n`; downstream ids must be `0..=n`.
    pub fn new(mut records: Vec<ReachRecord>) -> Result<Self> {
        records.sort_by_key(|r| r.id);
        let n = records.len();
        for (i, r) in records.iter().enumerate() {
            if r.id != i + 1 {
                return Err(Error::Topology {
                    node: r.id,
                    reason: format!("reach ids must be 1..={n} without gaps or duplicates"),
                });
            }
            if r.downstream > n {
                return Err(Error::Topology {
                    node: r.id,
                    reason: format!("downstream reach {} does not exist", r.downstream),
                });
            }
            if r.length <= 0.0 || r.width <= 0.0 {
                return Err(Error::invalid(
                    "reach geometry",
                    format!("width {} length {}", r.width, r.length),
                    format!("reach {} must have positive width and length", r.id),
                ));
            }
        }
        Ok(Self { records })
    }

    /// Parse positional rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let records = rows
            .iter()
            .map(|row| ReachRecord::from_row(row))
            .collect::<Result<Vec<_>>>()?;
        Self::new(records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at node index `idx` (reach id `idx + 1`)
    pub fn get(&self, idx: usize) -> &ReachRecord {
        &self.records[idx]
    }

    pub fn records(&self) -> &[ReachRecord] {
        &self.records
    }
}

/// Reach graph with its routing layers.
#[derive(Debug, Clone)]
pub struct ReachTopology {
    pub index: FlowIndex,
    pub layers: RoutingLayers,
    /// Hops from each reach to the outlet
    pub dist_to_outlet: Vec<usize>,
}

impl ReachTopology {
    pub fn n_reaches(&self) -> usize {
        self.index.n_nodes()
    }

    /// Reach id of node index `idx`
    pub fn reach_id(idx: usize) -> usize {
        idx + 1
    }

    /// Upstream node indices of node `idx`
    pub fn upstream(&self, idx: usize) -> &[usize] {
        self.index.upstream(idx)
    }

    pub fn downstream(&self, idx: usize) -> Option<usize> {
        self.index.downstream(idx)
    }

    /// Node indices of reaches that drain out of the watershed
    pub fn outlets(&self) -> Vec<usize> {
        self.index.outlets().collect()
    }
}

/// Build the reach graph, its routing layers and outlet distances.
///
/// # Errors
/// `Error::CycleDetected` if the downstream links form a loop.
pub fn build_reach_topology(table: &ReachTable, origin: LayerOrigin) -> Result<ReachTopology> {
    let flow_out = table
        .records()
        .iter()
        .map(|r| r.downstream.checked_sub(1))
        .collect();
    let index = FlowIndex::from_downstream(flow_out)?;
    let layers = build_routing_layers(&index, origin)?;
    let dist_to_outlet = distance_to_outlet(&index)?;
    debug!(
        reaches = index.n_nodes(),
        layers = layers.n_layers(),
        "built reach topology"
    );
    Ok(ReachTopology {
        index,
        layers,
        dist_to_outlet,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn row(id: usize, down: usize) -> Vec<f64> {
        vec![id as f64, down as f64, 1.0, 10.0, 1000.0, 1.0, 0.5, 1.0e6, 0.035, 0.01]
    }

    #[test]
    fn test_from_rows_sorted_and_defaults() {
        let table = ReachTable::from_rows(&[row(2, 0), row(1, 2)]).unwrap();
        assert_eq!(table.get(0).id, 1);
        assert_eq!(table.get(0).downstream, 2);
        assert_eq!(table.get(1).side_slope, 2.0);
        assert_eq!(table.get(1).bed_conductivity, 0.0);
    }

    #[test]
    fn test_short_row_rejected() {
        let err = ReachRecord::from_row(&[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::InputSizeMismatch { actual: 2, .. }));
    }

    #[test]
    fn test_gap_in_ids_rejected() {
        assert!(ReachTable::from_rows(&[row(1, 0), row(3, 1)]).is_err());
    }

    #[test]
    fn test_reach_topology() {
        // 1 -> 3, 2 -> 3, 3 -> 4, 4 outlet
        let table = ReachTable::from_rows(&[row(1, 3), row(2, 3), row(3, 4), row(4, 0)]).unwrap();
        let topo = build_reach_topology(&table, LayerOrigin::FromSource).unwrap();
        assert_eq!(topo.n_reaches(), 4);
        assert_eq!(topo.upstream(2), &[0, 1]);
        assert_eq!(topo.outlets(), vec![3]);
        assert_eq!(topo.dist_to_outlet, vec![2, 2, 1, 0]);
        assert_eq!(topo.layers.n_layers(), 3);
    }

    #[test]
    fn test_reach_cycle() {
        let table = ReachTable::from_rows(&[row(1, 2), row(2, 1), row(3, 0)]).unwrap();
        assert!(matches!(
            build_reach_topology(&table, LayerOrigin::FromSource),
            Err(Error::CycleDetected { .. })
        ));
    }
}
