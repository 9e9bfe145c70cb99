//! Reach network routing
//!
//! Reaches are swept in reach-layer order. Every reach collects the
//! outflow of its upstream reaches from the same step, its own sub-basin
//! contribution and any point source, and hands them to a [`ReachMethod`]
//! that updates its storage and outflow.

use crate::diagnostics::ClampCounter;
use crate::topology::{ReachRecord, ReachTable, ReachTopology};
use rivulet_core::error::check_len;
use rivulet_core::{Error, Result};
use rivulet_parallel::{sweep_layers, Executor};
use tracing::debug;

/// Component sums below this are treated as no inflow
pub const UTIL_ZERO: f64 = 1e-6;

/// Reach outflow split by origin (m³/s)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReachOutflow {
    /// Surface runoff
    pub qs: f64,
    /// Interflow
    pub qi: f64,
    /// Groundwater
    pub qg: f64,
}

impl ReachOutflow {
    pub fn total(&self) -> f64 {
        self.qs + self.qi + self.qg
    }

    pub fn add(&mut self, other: &ReachOutflow) {
        self.qs += other.qs;
        self.qi += other.qi;
        self.qg += other.qg;
    }

    /// Split `q_out` in proportion to the components of `local + upstream`.
    /// Returns `None` when those components carry no water.
    pub fn apportion(q_out: f64, local: &ReachOutflow, upstream: &ReachOutflow) -> Option<ReachOutflow> {
        let mut sum = *local;
        sum.add(upstream);
        let total = sum.total();
        if total < UTIL_ZERO {
            return None;
        }
        Some(ReachOutflow {
            qs: q_out * sum.qs / total,
            qi: q_out * sum.qi / total,
            qg: q_out * sum.qg / total,
        })
    }
}

/// Everything entering one reach in one step
#[derive(Debug, Clone, Copy, Default)]
pub struct ReachInflow {
    /// Contribution of the reach's own sub-basin
    pub local: ReachOutflow,
    /// Summed outflow of the upstream reaches
    pub upstream: ReachOutflow,
    /// Point sources (m³/s)
    pub point_source: f64,
    /// Potential evapotranspiration (mm per step)
    pub pet: f64,
}

/// Per-step reach forcing. Slices are indexed by reach id, so they have
/// `n_reaches + 1` entries with the watershed total at index 0.
#[derive(Debug, Clone, Copy)]
pub struct ReachInputs<'a> {
    pub surface: &'a [f64],
    pub interflow: Option<&'a [f64]>,
    pub groundwater: Option<&'a [f64]>,
    pub point_source: Option<&'a [f64]>,
    pub pet: Option<&'a [f64]>,
}

impl<'a> ReachInputs<'a> {
    /// Surface inflow only
    pub fn surface(surface: &'a [f64]) -> Self {
        Self {
            surface,
            interflow: None,
            groundwater: None,
            point_source: None,
            pet: None,
        }
    }

    fn check(&self, n_reaches: usize) -> Result<()> {
        check_len("reach surface inflow", n_reaches + 1, self.surface.len())?;
        for (name, slice) in [
            ("reach interflow", self.interflow),
            ("reach groundwater", self.groundwater),
            ("reach point source", self.point_source),
            ("reach pet", self.pet),
        ] {
            if let Some(s) = slice {
                check_len(name, n_reaches + 1, s.len())?;
            }
        }
        Ok(())
    }

    /// Local inflow of the reach at index `idx`
    pub fn local(&self, idx: usize) -> ReachOutflow {
        let id = ReachTopology::reach_id(idx);
        ReachOutflow {
            qs: self.surface[id],
            qi: self.interflow.map_or(0.0, |q| q[id]),
            qg: self.groundwater.map_or(0.0, |q| q[id]),
        }
    }

    fn inflow(&self, idx: usize, upstream: ReachOutflow) -> ReachInflow {
        let id = ReachTopology::reach_id(idx);
        ReachInflow {
            local: self.local(idx),
            upstream,
            point_source: self.point_source.map_or(0.0, |q| q[id]),
            pet: self.pet.map_or(0.0, |q| q[id]),
        }
    }
}

/// Storage and fluxes of one reach
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReachState {
    /// Total inflow of the last step (m³/s)
    pub q_in: f64,
    /// Outflow of the last step (m³/s)
    pub q_out: f64,
    /// `q_out` split by origin
    pub outflow: ReachOutflow,
    /// Channel storage (m³)
    pub storage: f64,
    /// Bank storage (m³)
    pub bank_storage: f64,
    /// Losses of the last step (m³)
    pub seepage: f64,
    pub bank_in: f64,
    pub evaporation: f64,
    /// Bank storage released to groundwater in the last step (m³)
    pub bank_to_groundwater: f64,
    /// Water depth (m)
    pub water_depth: f64,
    /// Water surface width (m)
    pub water_width: f64,
}

impl ReachState {
    /// Bank recharge of the last step as a depth over `area` (mm)
    pub fn groundwater_recharge(&self, area: f64) -> f64 {
        if area > 0.0 {
            self.bank_to_groundwater / area * 1000.0
        } else {
            0.0
        }
    }

    /// Drop all outflow, keeping storages
    pub(crate) fn dry(&mut self) {
        self.q_out = 0.0;
        self.outflow = ReachOutflow::default();
    }
}

/// A per-reach storage routing scheme
pub trait ReachMethod: Send + Sync {
    fn name(&self) -> &'static str;

    /// State before the first step
    fn initial_state(&self, idx: usize, reach: &ReachRecord) -> ReachState;

    /// Advance one reach by one step
    fn update(
        &self,
        idx: usize,
        reach: &ReachRecord,
        state: &ReachState,
        inflow: &ReachInflow,
        clamps: &ClampCounter,
    ) -> Result<ReachState>;
}

/// Sweeps a [`ReachMethod`] over a reach network
pub struct ReachNetworkRouter<M: ReachMethod> {
    method: M,
    table: ReachTable,
    topology: ReachTopology,
    states: Vec<ReachState>,
    primed: bool,
    clamps: ClampCounter,
}

impl<M: ReachMethod> ReachNetworkRouter<M> {
    pub fn new(method: M, table: ReachTable, topology: ReachTopology) -> Result<Self> {
        if table.len() != topology.n_reaches() {
            return Err(Error::InputSizeMismatch {
                name: "reach topology",
                expected: table.len(),
                actual: topology.n_reaches(),
            });
        }
        let states = table
            .records()
            .iter()
            .enumerate()
            .map(|(idx, reach)| method.initial_state(idx, reach))
            .collect();
        debug!(
            method = method.name(),
            reaches = table.len(),
            layers = topology.layers.n_layers(),
            "reach router built"
        );
        Ok(Self {
            method,
            table,
            topology,
            states,
            primed: false,
            clamps: ClampCounter::new(),
        })
    }

    pub fn n_reaches(&self) -> usize {
        self.table.len()
    }

    /// Before the first step every reach is assumed to pass its local
    /// inflow straight through.
    fn prime(&mut self, inputs: &ReachInputs<'_>) {
        for (idx, state) in self.states.iter_mut().enumerate() {
            let local = inputs.local(idx);
            state.q_out = local.total();
            state.outflow = local;
        }
        self.primed = true;
    }

    /// Route one channel step
    pub fn step(&mut self, exec: &Executor, inputs: &ReachInputs<'_>) -> Result<()> {
        inputs.check(self.n_reaches())?;
        if !self.primed {
            self.prime(inputs);
        }

        let (method, table, topology, clamps) = (&self.method, &self.table, &self.topology, &self.clamps);
        sweep_layers(
            exec,
            topology.layers.layers(),
            &mut self.states,
            |idx, states: &Vec<ReachState>| {
                let mut upstream = ReachOutflow::default();
                for &up in topology.upstream(idx) {
                    upstream.add(&states[up].outflow);
                }
                let inflow = inputs.inflow(idx, upstream);
                method.update(idx, table.get(idx), &states[idx], &inflow, clamps)
            },
            |idx, state, states| states[idx] = state,
        )?;
        self.clamps.report(self.method.name());
        Ok(())
    }

    /// Route one step for the reach layers in `members` only. For every
    /// upstream reach, `external(up)` may supply its outflow from elsewhere;
    /// `None` means the local state of `up` is current. `publish` sees every
    /// reach right after its update.
    pub(crate) fn step_members<F, P>(
        &mut self,
        members: &[Vec<usize>],
        inputs: &ReachInputs<'_>,
        mut external: F,
        mut publish: P,
    ) -> Result<()>
    where
        F: FnMut(usize) -> Result<Option<ReachOutflow>>,
        P: FnMut(usize, &ReachState) -> Result<()>,
    {
        inputs.check(self.n_reaches())?;
        if !self.primed {
            self.prime(inputs);
        }
        for layer in members {
            for &idx in layer {
                let mut upstream = ReachOutflow::default();
                for &up in self.topology.upstream(idx) {
                    match external(up)? {
                        Some(outflow) => upstream.add(&outflow),
                        None => upstream.add(&self.states[up].outflow),
                    }
                }
                let inflow = inputs.inflow(idx, upstream);
                self.states[idx] =
                    self.method
                        .update(idx, self.table.get(idx), &self.states[idx], &inflow, &self.clamps)?;
                publish(idx, &self.states[idx])?;
            }
        }
        Ok(())
    }

    pub fn states(&self) -> &[ReachState] {
        &self.states
    }

    pub fn state(&self, idx: usize) -> &ReachState {
        &self.states[idx]
    }

    /// Outflow of every reach, indexed by reach id with the sum of the
    /// outlet reaches at 0
    pub fn discharge(&self) -> Vec<f64> {
        let mut q = Vec::with_capacity(self.n_reaches() + 1);
        q.push(self.outlet_discharge());
        q.extend(self.states.iter().map(|s| s.q_out));
        q
    }

    /// Summed outflow of the outlet reaches (m³/s)
    pub fn outlet_discharge(&self) -> f64 {
        self.topology.outlets().iter().map(|&idx| self.states[idx].q_out).sum()
    }

    pub fn topology(&self) -> &ReachTopology {
        &self.topology
    }

    pub fn table(&self) -> &ReachTable {
        &self.table
    }

    pub fn method(&self) -> &M {
        &self.method
    }

    pub fn clamps(&self) -> &ClampCounter {
        &self.clamps
    }
}
