//! Reach-group partitioning
//!
//! Splits the reach tree into groups of similar total weight so that each
//! group can be routed by its own worker. Groups are whole upstream
//! subtrees cut greedily while walking the tree from the headwaters, so a
//! group only ever receives water from groups formed before it.

use super::reach::ReachTopology;
use rivulet_core::error::check_len;
use rivulet_core::{Error, Result};
use tracing::debug;

/// Assignment of reaches to groups.
#[derive(Debug, Clone, PartialEq)]
pub struct ReachPartition {
    group_of: Vec<usize>,
    /// Members of each group in routing-layer order
    groups: Vec<Vec<usize>>,
}

impl ReachPartition {
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn group_of(&self, reach: usize) -> usize {
        self.group_of[reach]
    }

    pub fn members(&self, group: usize) -> &[usize] {
        &self.groups[group]
    }

    /// Reaches whose downstream reach belongs to a different group
    pub fn boundary_reaches(&self, topo: &ReachTopology) -> Vec<usize> {
        (0..self.group_of.len())
            .filter(|&r| {
                topo.downstream(r)
                    .is_some_and(|d| self.group_of[d] != self.group_of[r])
            })
            .collect()
    }
}

/// Partition the reaches of `topo` into at most `n_groups` groups.
///
/// `weights[r]` is the routing cost of reach `r` (cell count, length, ...).
/// Fewer groups are returned when the tree cannot be split further.
pub fn partition_reaches(
    topo: &ReachTopology,
    weights: &[f64],
    n_groups: usize,
) -> Result<ReachPartition> {
    let n = topo.n_reaches();
    check_len("reach weights", n, weights.len())?;
    if n_groups == 0 {
        return Err(Error::invalid("n_groups", n_groups, "must be at least 1"));
    }

    let total: f64 = weights.iter().sum();
    let target = total / n_groups as f64;
    let mut assigned: Vec<Option<usize>> = vec![None; n];
    let mut pending = vec![0.0; n];
    let mut formed = 0usize;

    for layer in topo.layers.layers() {
        for &r in layer {
            pending[r] = weights[r]
                + topo
                    .upstream(r)
                    .iter()
                    .filter(|&&u| assigned[u].is_none())
                    .map(|&u| pending[u])
                    .sum::<f64>();
            if formed + 1 < n_groups && pending[r] >= target {
                claim_subtree(topo, r, formed, &mut assigned);
                formed += 1;
            }
        }
    }
    let rest = formed;
    for slot in assigned.iter_mut().filter(|a| a.is_none()) {
        *slot = Some(rest);
    }

    // Drop empty trailing group and collect members in layer order
    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); rest + 1];
    for layer in topo.layers.layers() {
        for &r in layer {
            if let Some(g) = assigned[r] {
                groups[g].push(r);
            }
        }
    }
    groups.retain(|g| !g.is_empty());
    let mut group_of = vec![0; n];
    for (g, members) in groups.iter().enumerate() {
        for &r in members {
            group_of[r] = g;
        }
    }

    debug!(reaches = n, groups = groups.len(), "partitioned reaches");
    Ok(ReachPartition { group_of, groups })
}

fn claim_subtree(topo: &ReachTopology, root: usize, group: usize, assigned: &mut [Option<usize>]) {
    let mut stack = vec![root];
    while let Some(r) = stack.pop() {
        if assigned[r].is_some() {
            continue;
        }
        assigned[r] = Some(group);
        stack.extend(topo.upstream(r).iter().copied());
    }
}
