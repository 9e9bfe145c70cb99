//! Diffusive wave channel routing (CH_DW)
//!
//! The friction slope is taken from the water surface gradient between the
//! upstream neighbour and the cell instead of the bed slope, so backwater
//! from a high downstream stage slows the flow.

use super::cells::{CellFlow, CellInflow, CellMethod, ChannelCell};
use crate::diagnostics::{ClampCounter, ClampKind};
use crate::kinematic::{BETA, MAX_ITERATIONS, MIN_FLUX_DIFFUSIVE};
use rivulet_core::{Error, Result};

/// Lower bound of the friction slope
pub const MIN_FRICTION_SLOPE: f64 = 1e-4;

/// Diffusive wave per channel cell
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffusiveChannel;

impl DiffusiveChannel {
    const NAME: &'static str = "CH_DW";

    /// Lateral inflow per unit channel length (m²/s)
    fn lateral(cell: &ChannelCell, inflow: &CellInflow, dt: f64) -> f64 {
        inflow.precipitation / 1000.0 * cell.width / dt + (inflow.qs + inflow.qi + inflow.qg) / cell.dx
    }

    fn friction_slope(cell: &ChannelCell, inflow: &CellInflow, last: CellFlow) -> f64 {
        match inflow.surface_up {
            Some(up) => ((up - cell.elevation - last.h) / cell.dx).max(MIN_FRICTION_SLOPE),
            None => cell.sin_slope.max(MIN_FRICTION_SLOPE),
        }
    }
}

impl CellMethod for DiffusiveChannel {
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
        if q_lat < MIN_FLUX_DIFFUSIVE && inflow.q_up < MIN_FLUX_DIFFUSIVE {
            return Ok(CellFlow::default());
        }

        let sf = Self::friction_slope(cell, inflow, last);
        let perimeter = 2.0 * last.h + cell.width;
        let c = (cell.manning * perimeter.powf(2.0 / 3.0) / sf.sqrt()).powf(BETA);

        let dt_x = dt / cell.dx;
        let rhs = inflow.q_up * dt_x + c * last.q.max(0.0).powf(BETA) + q_lat * dt;
        let mut q = if last.q < MIN_FLUX_DIFFUSIVE { q_lat.max(MIN_FLUX_DIFFUSIVE) } else { last.q };
        for _ in 0..MAX_ITERATIONS {
            let residual = q * dt_x + c * q.powf(BETA) - rhs;
            let slope = dt_x + BETA * c / q.powf(1.0 - BETA);
            let delta = residual / slope;
            q -= delta;
            if q <= 0.0 {
                q = 0.0;
                clamps.record(ClampKind::NegativeFlux);
                break;
            }
            if delta.abs() <= MIN_FLUX_DIFFUSIVE {
                break;
            }
        }
        if !q.is_finite() {
            return Err(Error::NumericalDivergence {
                module: Self::NAME,
                node: cell.id,
                reason: format!("diffusive wave solve returned {q}"),
            });
        }

        let available = last.h * cell.width * cell.dx / dt + q_lat * cell.dx + inflow.q_up;
        if q > available {
            clamps.record(ClampKind::OutflowCapped);
            return Ok(CellFlow { q: available, h: 0.0 });
        }
        Ok(CellFlow {
            q,
            h: c * q.powf(BETA) / cell.width,
        })
    }
}
