//! Reach groups routed on separate threads
//!
//! Each group of a [`ReachPartition`] owns a copy of the reach router and
//! updates only its member reaches. Outflow of a reach whose downstream
//! reach lives in another group is posted to that group's mailbox as soon
//! as it is known; a group blocks on its mailbox until every boundary
//! inflow of the step has arrived. A failing group aborts all others.

use super::network::{ReachInputs, ReachMethod, ReachNetworkRouter, ReachOutflow, ReachState};
use crate::topology::{ReachPartition, ReachTable, ReachTopology};
use rivulet_core::{Error, Result};
use rivulet_parallel::{BoundaryExchange, Mailbox, Postman};
use std::thread;
use tracing::{debug, info};

/// Channel router running one thread per reach group
pub struct GroupedReachRouter<M: ReachMethod + Clone> {
    partition: ReachPartition,
    downstream: Vec<Option<usize>>,
    routers: Vec<ReachNetworkRouter<M>>,
    member_layers: Vec<Vec<Vec<usize>>>,
    step: usize,
}

impl<M: ReachMethod + Clone> GroupedReachRouter<M> {
    pub fn new(method: M, table: ReachTable, topology: ReachTopology, partition: ReachPartition) -> Result<Self> {
        let n_groups = partition.n_groups();
        let n_members: usize = (0..n_groups).map(|g| partition.members(g).len()).sum();
        if n_members != topology.n_reaches() {
            return Err(Error::InputSizeMismatch {
                name: "reach partition",
                expected: topology.n_reaches(),
                actual: n_members,
            });
        }
        let mut member_layers = vec![Vec::new(); n_groups];
        for layer in topology.layers.layers() {
            let mut split = vec![Vec::new(); n_groups];
            for &idx in layer {
                split[partition.group_of(idx)].push(idx);
            }
            for (group, nodes) in split.into_iter().enumerate() {
                if !nodes.is_empty() {
                    member_layers[group].push(nodes);
                }
            }
        }
        let downstream = (0..topology.n_reaches()).map(|idx| topology.downstream(idx)).collect();
        let routers = (0..n_groups)
            .map(|_| ReachNetworkRouter::new(method.clone(), table.clone(), topology.clone()))
            .collect::<Result<Vec<_>>>()?;
        info!(
            groups = n_groups,
            boundary = partition.boundary_reaches(&topology).len(),
            "grouped channel router ready"
        );
        Ok(Self {
            partition,
            downstream,
            routers,
            member_layers,
            step: 0,
        })
    }

    pub fn n_groups(&self) -> usize {
        self.routers.len()
    }

    /// Route one channel step across all groups
    pub fn step(&mut self, inputs: &ReachInputs<'_>) -> Result<()> {
        let step = self.step;
        let endpoints = BoundaryExchange::<ReachOutflow>::new(self.n_groups()).into_endpoints();
        let partition = &self.partition;
        let downstream = &self.downstream;

        let results: Vec<Result<()>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .routers
                .iter_mut()
                .zip(&self.member_layers)
                .zip(endpoints)
                .enumerate()
                .map(|(group, ((router, layers), (postman, mailbox)))| {
                    scope.spawn(move || {
                        let result =
                            route_group(group, step, router, layers, inputs, partition, downstream, &postman, mailbox);
                        if result.is_err() {
                            postman.abort_all();
                        }
                        result
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(Error::Exchange("reach group worker panicked".into())))
                })
                .collect()
        });

        // Report the root cause rather than the aborts it triggered
        let mut first_abort = None;
        for result in results {
            match result {
                Ok(()) => {}
                Err(Error::Exchange(reason)) => {
                    first_abort.get_or_insert(Error::Exchange(reason));
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(e) = first_abort {
            return Err(e);
        }
        self.step += 1;
        Ok(())
    }

    fn owner(&self, idx: usize) -> &ReachNetworkRouter<M> {
        &self.routers[self.partition.group_of(idx)]
    }

    pub fn state(&self, idx: usize) -> &ReachState {
        self.owner(idx).state(idx)
    }

    /// Current state of every reach, gathered from the owning groups
    pub fn states(&self) -> Vec<ReachState> {
        (0..self.downstream.len()).map(|idx| *self.state(idx)).collect()
    }

    pub fn outlet_discharge(&self) -> f64 {
        (0..self.downstream.len())
            .filter(|&idx| self.downstream[idx].is_none())
            .map(|idx| self.state(idx).q_out)
            .sum()
    }
}

#[allow(clippy::too_many_arguments)]
fn route_group<M: ReachMethod>(
    group: usize,
    step: usize,
    router: &mut ReachNetworkRouter<M>,
    layers: &[Vec<usize>],
    inputs: &ReachInputs<'_>,
    partition: &ReachPartition,
    downstream: &[Option<usize>],
    postman: &Postman<ReachOutflow>,
    mut mailbox: Mailbox<ReachOutflow>,
) -> Result<()> {
    router.step_members(
        layers,
        inputs,
        |up| {
            if partition.group_of(up) == group {
                Ok(None)
            } else {
                mailbox.receive(step, up).map(Some)
            }
        },
        |idx, state| match downstream[idx] {
            Some(down) if partition.group_of(down) != group => {
                postman.send(partition.group_of(down), step, idx, state.outflow)
            }
            _ => Ok(()),
        },
    )?;
    router.clamps().report(router.method().name());
    debug!(group, step, "reach group routed");
    Ok(())
}
