//! Implicit kinematic wave over whole reaches (IKW_REACH)

use super::losses::{
    bank_loss_potential, evaporation_potential, recession, seepage_potential, withdraw, GAINING_REACH,
};
use super::network::{ReachInflow, ReachMethod, ReachOutflow, ReachState};
use crate::diagnostics::{ClampCounter, ClampKind};
use crate::kinematic::{manning_alpha, solve_kinematic_wave};
use crate::topology::ReachRecord;
use rivulet_core::config::ReachConfig;
use rivulet_core::{Error, Result};

/// Rectangular-channel kinematic wave reach method.
///
/// Losses are drawn from storage in the order bed seepage, bank
/// infiltration, evaporation. The remaining water is routed by the
/// kinematic wave with the losses as a distributed sink, starting from the
/// storage at the beginning of the step.
#[derive(Debug, Clone)]
pub struct KinematicReach {
    params: ReachConfig,
    dt: f64,
}

impl KinematicReach {
    /// `dt` is the channel time step in seconds
    pub fn new(params: ReachConfig, dt: f64) -> Result<Self> {
        if !(dt > 0.0) {
            return Err(Error::config("ikw_reach", "time step must be positive"));
        }
        if !(params.manning_scale > 0.0) {
            return Err(Error::invalid("manning_scale", params.manning_scale, "must be positive"));
        }
        Ok(Self { params, dt })
    }
}

/// Zero outflow after storage ran out part way through the losses
fn exhausted(mut state: ReachState, clamps: &ClampCounter) -> ReachState {
    clamps.record(ClampKind::StorageExhausted);
    state.storage = 0.0;
    state.dry();
    state
}

impl ReachMethod for KinematicReach {
    fn name(&self) -> &'static str {
        "ikw_reach"
    }

    fn initial_state(&self, _idx: usize, reach: &ReachRecord) -> ReachState {
        ReachState {
            storage: self.params.chs0 * reach.length,
            bank_storage: self.params.bank0 * reach.length,
            water_width: reach.width,
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
        let (width, length) = (reach.width, reach.length);
        let st0 = state.storage;
        let mut next = *state;

        let mut q_in =
            inflow.local.total() + inflow.upstream.total() + inflow.point_source + p.deep_groundwater;
        let bank_out = recession(next.bank_storage, p.a_bank);
        next.bank_storage -= bank_out;
        q_in += bank_out / dt;
        next.q_in = q_in;
        next.storage += q_in * dt;

        let seep = seepage_potential(reach.bed_conductivity, width, length, dt, inflow.local.qg, GAINING_REACH);
        next.seepage = withdraw(&mut next.storage, seep, clamps);
        if next.storage <= 0.0 {
            return Ok(exhausted(next, clamps));
        }

        let depth = next.storage / (width * length);
        next.bank_in = withdraw(
            &mut next.storage,
            bank_loss_potential(reach.bank_conductivity, depth, length, dt),
            clamps,
        );
        next.bank_to_groundwater = recession(next.bank_storage, p.b_bank);
        next.bank_storage += next.bank_in - next.bank_to_groundwater;
        next.water_depth = depth;
        if next.storage <= 0.0 {
            return Ok(exhausted(next, clamps));
        }

        next.evaporation = withdraw(
            &mut next.storage,
            evaporation_potential(p.epch, inflow.pet, width, length),
            clamps,
        );
        if next.storage <= 0.0 {
            return Ok(exhausted(next, clamps));
        }

        let total_loss = next.seepage + next.bank_in + next.evaporation;
        let h = st0 / width / length;
        let alpha = manning_alpha(reach.manning * p.manning_scale, reach.slope.sin(), 2.0 * h + width);
        let loss_rate = -total_loss / dt / width;
        let mut q_out = solve_kinematic_wave(q_in, state.q_out, loss_rate, alpha, dt, length).checked("ikw_reach", idx)?;

        let mut storage = st0 + (q_in - q_out) * dt - total_loss;
        if storage < 0.0 {
            clamps.record(ClampKind::OutflowCapped);
            q_out = ((st0 - total_loss) / dt + q_in).max(0.0);
            storage = 0.0;
        }
        next.storage = storage;
        next.q_out = q_out;
        next.outflow = ReachOutflow::apportion(q_out, &inflow.local, &inflow.upstream).unwrap_or(ReachOutflow {
            qg: q_out,
            ..ReachOutflow::default()
        });
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reach() -> ReachRecord {
        ReachRecord::from_row(&[1.0, 0.0, 1.0, 5.0, 1000.0, 1.0, 0.5, 1e6, 0.035, 0.005]).unwrap()
    }

    fn lossless() -> KinematicReach {
        KinematicReach::new(ReachConfig { epch: 0.0, ..ReachConfig::default() }, 3600.0).unwrap()
    }

    fn inflow(qs: f64, qg: f64) -> ReachInflow {
        ReachInflow {
            local: ReachOutflow { qs, qi: 0.0, qg },
            ..ReachInflow::default()
        }
    }

    #[test]
    fn test_converges_to_inflow() {
        let m = lossless();
        let r = reach();
        let clamps = ClampCounter::new();
        let mut st = m.initial_state(0, &r);
        for _ in 0..200 {
            st = m.update(0, &r, &st, &inflow(4.0, 1.0), &clamps).unwrap();
        }
        assert_relative_eq!(st.q_out, 5.0, epsilon = 1e-6);
        assert_relative_eq!(st.outflow.qs, 4.0, epsilon = 1e-6);
        assert_relative_eq!(st.outflow.qg, 1.0, epsilon = 1e-6);
        assert!(st.storage > 0.0);
    }

    #[test]
    fn test_empty_reach_stays_dry() {
        let m = lossless();
        let r = reach();
        let clamps = ClampCounter::new();
        let st = m.update(0, &r, &m.initial_state(0, &r), &inflow(0.0, 0.0), &clamps).unwrap();
        assert_eq!(st.q_out, 0.0);
        assert_eq!(st.outflow, ReachOutflow::default());
        assert_eq!(clamps.count(ClampKind::StorageExhausted), 1);
    }

    #[test]
    fn test_seepage_only_on_losing_reach() {
        let m = lossless();
        let mut r = reach();
        r.bed_conductivity = 10.0;
        let clamps = ClampCounter::new();
        let losing = m.update(0, &r, &m.initial_state(0, &r), &inflow(2.0, 0.0), &clamps).unwrap();
        let gaining = m.update(0, &r, &m.initial_state(0, &r), &inflow(2.0, 0.5), &clamps).unwrap();
        assert!(losing.seepage > 0.0);
        assert_eq!(gaining.seepage, 0.0);
        assert!(losing.q_out < 2.0);
    }
}
