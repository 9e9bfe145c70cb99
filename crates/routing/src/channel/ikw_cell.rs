//! Kinematic wave routing through channel cells (IKW_CH)

use super::cells::{CellFlow, CellInflow, CellMethod, ChannelCell};
use crate::diagnostics::{ClampCounter, ClampKind};
use crate::kinematic::{depth_from_discharge, manning_alpha, solve_kinematic_wave, MIN_FLUX};
use rivulet_core::Result;

/// Implicit kinematic wave per channel cell.
///
/// Lateral inflow (channel precipitation, overland flow, interflow and the
/// cell's share of the reach groundwater) is added to the upstream
/// discharge before the solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct KinematicChannel;

impl KinematicChannel {
    const NAME: &'static str = "IKW_CH";

    fn lateral(cell: &ChannelCell, inflow: &CellInflow, dt: f64) -> f64 {
        inflow.precipitation / 1000.0 * cell.width * cell.dx / dt + inflow.qg + inflow.qs + inflow.qi
    }
}

impl CellMethod for KinematicChannel {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn update_cell(
        &self,
        cell: &ChannelCell,
        inflow: &CellInflow,
        last: CellFlow,
        dt: f64,
        clamps: &ClampCounter,
    ) -> Result<CellFlow> {
        let q_lat = Self::lateral(cell, inflow, dt);
        if q_lat < MIN_FLUX && inflow.q_up < MIN_FLUX {
            if q_lat < 0.0 || inflow.q_up < 0.0 {
                clamps.record(ClampKind::BelowMinFlux);
            }
            return Ok(CellFlow::default());
        }

        let q_up = inflow.q_up + q_lat;
        let perimeter = 2.0 * last.h + cell.width;
        let alpha = manning_alpha(cell.manning, cell.sin_slope, perimeter);
        let q = solve_kinematic_wave(q_up, last.q, 0.0, alpha, dt, cell.dx).checked(Self::NAME, cell.id)?;
        Ok(CellFlow {
            q,
            h: depth_from_discharge(alpha, q, cell.width),
        })
    }
}
