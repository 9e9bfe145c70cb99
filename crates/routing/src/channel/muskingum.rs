//! Muskingum reach routing (MUSK_CH)
//!
//! Trapezoidal reaches with storage constant
//! `K = (4.64 - 3.64·co1)·L / (5v/3)`. The channel step is split into
//! sub-steps short enough that `2Kx <= dt <= 2K(1-x)` holds wherever
//! possible.

use super::losses::{
    bank_loss_potential, evaporation_potential, recession, seepage_potential, withdraw,
};
use super::network::{ReachInflow, ReachMethod, ReachOutflow, ReachState, UTIL_ZERO};
use crate::diagnostics::{ClampCounter, ClampKind};
use crate::topology::{ReachRecord, ReachTable};
use rivulet_core::config::ReachConfig;
use rivulet_core::{Error, Result};

/// Velocity used for reaches without one (m/s)
pub const MIN_VELOCITY: f64 = 0.0005;

/// Trapezoidal cross section
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trapezoid {
    pub bottom_width: f64,
    /// Horizontal run per unit rise of the banks
    pub side_slope: f64,
}

impl Trapezoid {
    /// Bottom width from the bankfull geometry. Banks too flat for the
    /// bankfull width are steepened so the bottom keeps half the width.
    pub fn from_reach(reach: &ReachRecord) -> Self {
        let mut side_slope = reach.side_slope;
        let mut bottom_width = reach.width - 2.0 * side_slope * reach.depth;
        if bottom_width <= UTIL_ZERO {
            bottom_width = 0.5 * reach.width;
            side_slope = (reach.width - bottom_width) * 0.5 / reach.depth;
        }
        Self {
            bottom_width,
            side_slope,
        }
    }

    /// Water depth and surface width holding `storage` over `length`
    pub fn depth_width(&self, storage: f64, length: f64) -> (f64, f64) {
        let area = (storage / length).max(0.0);
        let (bw, z) = (self.bottom_width, self.side_slope);
        let depth = if z > 0.0 {
            ((bw * bw + 4.0 * z * area).sqrt() - bw) / 2.0 / z
        } else if bw > 0.0 {
            area / bw
        } else {
            0.0
        };
        if depth < UTIL_ZERO {
            (depth, bw)
        } else {
            (depth, bw + 2.0 * z * depth)
        }
    }

    /// Storage at water depth `depth` over `length`
    pub fn storage(&self, depth: f64, length: f64) -> f64 {
        length * depth * (self.bottom_width + self.side_slope * depth)
    }
}

/// Muskingum weights for one reach and channel step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MuskingumWeights {
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
    /// Sub-step length (s)
    pub dt: f64,
    /// Number of sub-steps
    pub n: usize,
}

impl MuskingumWeights {
    pub fn new(length: f64, velocity: f64, x: f64, co1: f64, dt: f64) -> Self {
        let k = (4.64 - 3.64 * co1) * length / (5.0 * velocity / 3.0);
        let lower = 2.0 * k * x;
        let upper = 2.0 * k * (1.0 - x);

        let (sub_dt, n) = if upper >= dt {
            (dt, 1)
        } else {
            let mut n = ((dt / upper) as usize).max(1);
            let mut sub_dt = dt / n as f64;
            if sub_dt > upper {
                n += 1;
                sub_dt = dt / n as f64;
            }
            (sub_dt, n)
        };

        let denom = upper + sub_dt;
        let mut c1 = (sub_dt - lower) / denom;
        let mut c2 = (sub_dt + lower) / denom;
        let mut c3 = (upper - sub_dt) / denom;
        if c1 < 0.0 {
            c2 += c1;
            c1 = 0.0;
        }
        if c3 < 0.0 {
            c2 += c3;
            c3 = 0.0;
        }
        Self { c1, c2, c3, dt: sub_dt, n }
    }
}

/// Muskingum reach method
#[derive(Debug, Clone)]
pub struct MuskingumReach {
    params: ReachConfig,
    geometry: Vec<Trapezoid>,
    dt: f64,
}

impl MuskingumReach {
    pub fn new(table: &ReachTable, params: ReachConfig, dt: f64) -> Result<Self> {
        if !(dt > 0.0) {
            return Err(Error::config("muskingum", "time step must be positive"));
        }
        if !(0.0..=0.5).contains(&params.muskingum_x) {
            return Err(Error::invalid("muskingum_x", params.muskingum_x, "must lie in [0, 0.5]"));
        }
        if let Some(r) = table.records().iter().find(|r| !(r.depth > 0.0)) {
            return Err(Error::invalid("reach depth", r.depth, format!("reach {} must have a positive depth", r.id)));
        }
        Ok(Self {
            geometry: table.records().iter().map(Trapezoid::from_reach).collect(),
            params,
            dt,
        })
    }

    pub fn geometry(&self, idx: usize) -> &Trapezoid {
        &self.geometry[idx]
    }
}

impl ReachMethod for MuskingumReach {
    fn name(&self) -> &'static str {
        "muskingum"
    }

    fn initial_state(&self, idx: usize, reach: &ReachRecord) -> ReachState {
        let geometry = &self.geometry[idx];
        let depth = reach.depth * self.params.chs0_perc;
        ReachState {
            storage: geometry.storage(depth, reach.length),
            bank_storage: self.params.bank0 * reach.length,
            water_depth: depth,
            water_width: geometry.bottom_width + 2.0 * geometry.side_slope * depth,
            ..ReachState::default()
        }
    }

    fn update(
        &self,
        idx: usize,
        reach: &ReachRecord,
        state: &ReachState,
        inflow: &ReachInflow,
        clamps: &ClampCounter,
    ) -> Result<ReachState> {
        let p = &self.params;
        let dt = self.dt;
        let geometry = &self.geometry[idx];
        let length = reach.length;
        let st0 = state.storage;
        let mut next = *state;

        let local = ReachOutflow {
            qs: inflow.local.qs,
            qi: inflow.local.qi.max(0.0),
            qg: inflow.local.qg.max(0.0),
        };
        let mut q_in = local.total()
            + inflow.point_source.max(0.0)
            + p.deep_groundwater
            + inflow.upstream.total();
        let bank_out = recession(next.bank_storage, p.a_bank);
        next.bank_storage -= bank_out;
        q_in += bank_out / dt;

        next.storage += q_in * dt;
        (next.water_depth, next.water_width) = geometry.depth_width(next.storage, length);

        let seep = seepage_potential(reach.bed_conductivity, geometry.bottom_width, length, dt, local.qg, UTIL_ZERO);
        next.seepage = withdraw(&mut next.storage, seep, clamps);

        let wetted_bank = next.water_depth * (1.0 + geometry.side_slope * geometry.side_slope).sqrt();
        next.bank_in = withdraw(
            &mut next.storage,
            bank_loss_potential(reach.bank_conductivity, wetted_bank, length, dt),
            clamps,
        );
        next.bank_to_groundwater = recession(next.bank_storage, p.b_bank);
        next.bank_storage += next.bank_in - next.bank_to_groundwater;

        next.evaporation = withdraw(
            &mut next.storage,
            evaporation_potential(p.epch, inflow.pet, next.water_width, length),
            clamps,
        );

        if next.storage <= 0.0 {
            clamps.record(ClampKind::StorageExhausted);
            next.storage = 0.0;
            next.q_in = q_in;
            next.water_depth = 0.0;
            next.water_width = 0.0;
            next.dry();
            return Ok(next);
        }

        let total_loss = next.seepage + next.bank_in + next.evaporation;
        let velocity = if reach.velocity == 0.0 { MIN_VELOCITY } else { reach.velocity };
        let w = MuskingumWeights::new(length, velocity, p.muskingum_x, p.muskingum_co1, dt);

        let mut storage = st0;
        let mut q = state.q_out;
        let mut q_in_prev = state.q_in;
        let mut sum = 0.0;
        for _ in 0..w.n {
            q = w.c1 * q_in + w.c2 * q_in_prev + w.c3 * q;
            q_in_prev = q_in;
            let tmp = storage + (q_in - total_loss / dt - q) * w.dt;
            if tmp < 0.0 {
                clamps.record(ClampKind::OutflowCapped);
                q = (storage / w.dt + q_in - total_loss / dt).max(0.0);
                storage = 0.0;
            } else {
                storage = tmp;
            }
            sum += q;
        }
        let q_out = sum / w.n as f64;

        next.storage = storage;
        next.q_in = q_in;
        match ReachOutflow::apportion(q_out, &local, &inflow.upstream) {
            Some(outflow) => {
                next.q_out = q_out;
                next.outflow = outflow;
            }
            None => next.dry(),
        }
        (next.water_depth, next.water_width) = geometry.depth_width(next.storage, length);
        Ok(next)
    }
}
