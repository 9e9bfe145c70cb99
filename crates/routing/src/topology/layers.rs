//! Routing layers
//!
//! A partition of the nodes of a drainage graph into ordered layers such
//! that every upstream node of a node in layer `L` lies in a layer `< L`.
//! Nodes of one layer are independent and can be updated in parallel.
//!
//! Two origins are supported:
//! - `FromSource`: rank 1 for headwaters, otherwise one more than the
//!   highest upstream rank
//! - `FromOutlet`: hop distance to the outlet, reversed so the farthest
//!   nodes come first
//!
//! A graph that cannot be fully ranked contains a cycle and is rejected.

use super::flow_index::FlowIndex;
use rivulet_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Where layer numbering starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerOrigin {
    /// Headwaters in layer 0 (up-down order)
    #[default]
    FromSource,
    /// Outlet-distance ranking (down-up order)
    FromOutlet,
}

/// Ordered partition of nodes into routing layers.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingLayers {
    layers: Vec<Vec<usize>>,
    layer_of: Vec<usize>,
}

impl RoutingLayers {
    fn from_ranks(ranks: Vec<usize>) -> Self {
        let n_layers = ranks.iter().copied().max().map_or(0, |m| m + 1);
        let mut layers = vec![Vec::new(); n_layers];
        // Ascending ids within each layer
        for (id, &rank) in ranks.iter().enumerate() {
            layers[rank].push(id);
        }
        Self {
            layers,
            layer_of: ranks,
        }
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Vec<usize>] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> &[usize] {
        &self.layers[index]
    }

    /// Layer index of `node`
    pub fn layer_of(&self, node: usize) -> usize {
        self.layer_of[node]
    }

    /// Layers in the count-prefixed exchange format:
    /// element 0 of each row is the number of nodes in the layer.
    pub fn to_count_prefixed(&self) -> Vec<Vec<i64>> {
        self.layers
            .iter()
            .map(|layer| {
                std::iter::once(layer.len() as i64)
                    .chain(layer.iter().map(|&id| id as i64))
                    .collect()
            })
            .collect()
    }

    /// Check the layering invariant against `index`.
    pub fn is_valid_for(&self, index: &FlowIndex) -> bool {
        if self.layer_of.len() != index.n_nodes() {
            return false;
        }
        (0..index.n_nodes()).all(|id| match index.downstream(id) {
            Some(down) => self.layer_of[id] < self.layer_of[down],
            None => true,
        })
    }
}

/// Partition the nodes of `index` into routing layers.
///
/// # Errors
/// `Error::CycleDetected` if some nodes cannot be ranked because the graph
/// contains a cycle.
pub fn build_routing_layers(index: &FlowIndex, origin: LayerOrigin) -> Result<RoutingLayers> {
    let ranks = match origin {
        LayerOrigin::FromSource => rank_from_source(index)?,
        LayerOrigin::FromOutlet => rank_from_outlet(index)?,
    };
    let layers = RoutingLayers::from_ranks(ranks);
    debug!(
        nodes = index.n_nodes(),
        layers = layers.n_layers(),
        ?origin,
        "built routing layers"
    );
    Ok(layers)
}

/// Longest path from any headwater, computed by draining in-degrees.
///
/// A node is ranked once all of its upstream nodes are ranked, so the result
/// equals the fixed point `rank = 1 + max(upstream ranks)` (0-based here).
fn rank_from_source(index: &FlowIndex) -> Result<Vec<usize>> {
    let n = index.n_nodes();
    let mut pending: Vec<usize> = (0..n).map(|id| index.upstream(id).len()).collect();
    let mut rank = vec![0usize; n];
    let mut queue: VecDeque<usize> = index.headwaters().collect();
    let mut ranked = 0usize;

    while let Some(id) = queue.pop_front() {
        ranked += 1;
        if let Some(down) = index.downstream(id) {
            rank[down] = rank[down].max(rank[id] + 1);
            pending[down] -= 1;
            if pending[down] == 0 {
                queue.push_back(down);
            }
        }
    }

    if ranked < n {
        return Err(Error::CycleDetected {
            unranked: n - ranked,
            total: n,
        });
    }
    Ok(rank)
}

/// Hop distance to the outlet, reversed.
fn rank_from_outlet(index: &FlowIndex) -> Result<Vec<usize>> {
    let n = index.n_nodes();
    let mut distance: Vec<Option<usize>> = vec![None; n];
    let mut queue: VecDeque<usize> = index.outlets().collect();
    for &outlet in &queue {
        distance[outlet] = Some(0);
    }

    while let Some(id) = queue.pop_front() {
        let d = distance[id].unwrap_or(0);
        for &up in index.upstream(id) {
            if distance[up].is_none() {
                distance[up] = Some(d + 1);
                queue.push_back(up);
            }
        }
    }

    let unranked = distance.iter().filter(|d| d.is_none()).count();
    if unranked > 0 {
        return Err(Error::CycleDetected { unranked, total: n });
    }
    let distance: Vec<usize> = distance.into_iter().flatten().collect();
    let max = distance.iter().copied().max().unwrap_or(0);
    Ok(distance.into_iter().map(|d| max - d).collect())
}

/// Hop distance of every node to its outlet (0 at the outlet).
pub fn distance_to_outlet(index: &FlowIndex) -> Result<Vec<usize>> {
    let reversed = rank_from_outlet(index)?;
    let max = reversed.iter().copied().max().unwrap_or(0);
    Ok(reversed.into_iter().map(|r| max - r).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0 -> 2, 1 -> 2, 2 -> 4, 3 -> 4, 4 outlet
    fn tree() -> FlowIndex {
        FlowIndex::from_downstream(vec![Some(2), Some(2), Some(4), Some(4), None]).unwrap()
    }

    #[test]
    fn test_from_source_layers() {
        let layers = build_routing_layers(&tree(), LayerOrigin::FromSource).unwrap();
        assert_eq!(layers.layers(), &[vec![0, 1, 3], vec![2], vec![4]]);
        assert!(layers.is_valid_for(&tree()));
    }

    #[test]
    fn test_from_outlet_layers() {
        let layers = build_routing_layers(&tree(), LayerOrigin::FromOutlet).unwrap();
        // Node 3 is one hop from the outlet, so it sits next to node 2
        assert_eq!(layers.layers(), &[vec![0, 1], vec![2, 3], vec![4]]);
        assert!(layers.is_valid_for(&tree()));
    }

    #[test]
    fn test_count_prefixed_layers() {
        let layers = build_routing_layers(&tree(), LayerOrigin::FromSource).unwrap();
        let jagged = layers.to_count_prefixed();
        assert_eq!(jagged[0], vec![3, 0, 1, 3]);
        assert_eq!(jagged[2], vec![1, 4]);
    }

    #[test]
    fn test_cycle_detected() {
        // 0 -> 1 -> 2 -> 1, node 3 is a separate outlet
        let index = FlowIndex::from_downstream(vec![Some(1), Some(2), Some(1), None]).unwrap();
        for origin in [LayerOrigin::FromSource, LayerOrigin::FromOutlet] {
            let err = build_routing_layers(&index, origin).unwrap_err();
            match err {
                Error::CycleDetected { unranked, total } => {
                    assert_eq!(total, 4);
                    assert!(unranked >= 2, "{origin:?}: cycle nodes must stay unranked");
                }
                other => panic!("{origin:?}: unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_distance_to_outlet() {
        assert_eq!(distance_to_outlet(&tree()).unwrap(), vec![2, 2, 1, 1, 0]);
    }

    #[test]
    fn test_empty_graph() {
        let index = FlowIndex::from_downstream(Vec::new()).unwrap();
        let layers = build_routing_layers(&index, LayerOrigin::FromSource).unwrap();
        assert_eq!(layers.n_layers(), 0);
    }
}
