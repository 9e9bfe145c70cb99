//! Channel cells of each reach, ordered from source to reach outlet.

use super::flow_index::FlowIndex;
use rivulet_core::{Error, Result};

/// Ordered channel-cell chains, one per reach.
///
/// `chain(r)` lists the cells of reach `r` (node index, reach id `r + 1`)
/// from its source cell down to the cell that leaves the reach.
#[derive(Debug, Clone, PartialEq)]
pub struct ReachChains {
    chains: Vec<Vec<usize>>,
    /// Reach node index of every cell, `None` off the channel network
    reach_of: Vec<Option<usize>>,
}

impl ReachChains {
    /// Walk each reach from its source cell along the flow-out links.
    ///
    /// `stream_link[cell]` holds the reach id (`1..=n_reaches`) of channel
    /// cells and a value `<= 0` elsewhere. The source cell of a reach is
    /// the one with no upstream cell carrying the same link.
    ///
    /// # Errors
    /// `Error::Topology` if a link id is out of range, a reach has no or
    /// several source cells, or its cells do not form a single path.
    pub fn build(index: &FlowIndex, stream_link: &[i64], n_reaches: usize) -> Result<Self> {
        rivulet_core::error::check_len("stream link", index.n_nodes(), stream_link.len())?;

        let mut reach_of = vec![None; stream_link.len()];
        let mut counts = vec![0usize; n_reaches];
        for (cell, &link) in stream_link.iter().enumerate() {
            if link <= 0 {
                continue;
            }
            let r = link as usize - 1;
            if r >= n_reaches {
                return Err(Error::Topology {
                    node: cell,
                    reason: format!("stream link {link} exceeds the {n_reaches} reaches"),
                });
            }
            reach_of[cell] = Some(r);
            counts[r] += 1;
        }

        let mut sources: Vec<Option<usize>> = vec![None; n_reaches];
        for (cell, reach) in reach_of.iter().enumerate() {
            let Some(r) = *reach else { continue };
            let fed_by_same_link = index
                .upstream(cell)
                .iter()
                .any(|&up| reach_of[up] == Some(r));
            if fed_by_same_link {
                continue;
            }
            if let Some(other) = sources[r] {
                return Err(Error::Topology {
                    node: cell,
                    reason: format!("reach {} has two source cells ({other} and {cell})", r + 1),
                });
            }
            sources[r] = Some(cell);
        }

        let mut chains = Vec::with_capacity(n_reaches);
        for (r, source) in sources.iter().enumerate() {
            let mut chain = Vec::with_capacity(counts[r]);
            let mut cursor = *source;
            while let Some(cell) = cursor {
                if reach_of[cell] != Some(r) {
                    break;
                }
                chain.push(cell);
                cursor = index.downstream(cell);
            }
            if chain.len() != counts[r] {
                return Err(Error::Topology {
                    node: source.unwrap_or(0),
                    reason: format!(
                        "reach {} has {} cells but only {} lie on its flow path",
                        r + 1,
                        counts[r],
                        chain.len()
                    ),
                });
            }
            chains.push(chain);
        }

        Ok(Self { chains, reach_of })
    }

    pub fn n_reaches(&self) -> usize {
        self.chains.len()
    }

    pub fn chain(&self, reach: usize) -> &[usize] {
        &self.chains[reach]
    }

    pub fn reach_of(&self, cell: usize) -> Option<usize> {
        self.reach_of[cell]
    }

    /// Last cell of `reach`, the one draining into the next reach
    pub fn outlet_cell(&self, reach: usize) -> Option<usize> {
        self.chains[reach].last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cells 0-1-2 form reach 1, cells 3-4 form reach 2, 2 -> 3, 4 outlet.
    // Cell 5 is a hillslope cell draining into 1.
    fn network() -> (FlowIndex, Vec<i64>) {
        let index = FlowIndex::from_downstream(vec![
            Some(1),
            Some(2),
            Some(3),
            Some(4),
            None,
            Some(1),
        ])
        .unwrap();
        (index, vec![1, 1, 1, 2, 2, 0])
    }

    #[test]
    fn test_chains_follow_flow() {
        let (index, links) = network();
        let chains = ReachChains::build(&index, &links, 2).unwrap();
        assert_eq!(chains.chain(0), &[0, 1, 2]);
        assert_eq!(chains.chain(1), &[3, 4]);
        assert_eq!(chains.outlet_cell(0), Some(2));
        assert_eq!(chains.reach_of(5), None);
    }

    #[test]
    fn test_split_reach_rejected() {
        let (index, mut links) = network();
        // Hillslope cell 5 now also claims reach 1, giving it two sources
        links[5] = 1;
        assert!(ReachChains::build(&index, &links, 2).is_err());
    }

    #[test]
    fn test_link_out_of_range() {
        let (index, mut links) = network();
        links[4] = 3;
        assert!(matches!(
            ReachChains::build(&index, &links, 2),
            Err(Error::Topology { node: 4, .. })
        ));
    }
}
