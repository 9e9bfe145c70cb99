//! Implicit kinematic wave
//!
//! Solves the backward-difference kinematic wave continuity equation
//!
//! ```text
//! dt/dx·Q + α·Q^β = dt/dx·q_in + α·q_last^β + dt·surplus
//! ```
//!
//! for the new discharge `Q` with Newton-Raphson (β = 0.6, from Manning's
//! equation with a wide-channel approximation). Shared by the overland,
//! interflow-free channel and reach routers.

use rivulet_core::{Error, Result};

/// Manning exponent of the storage-discharge relation
pub const BETA: f64 = 0.6;

/// Fluxes below this are hard zero in kinematic solves (m³/s)
pub const MIN_FLUX: f64 = 1e-12;

/// Flux guard used by the diffusive-wave channel router (m³/s)
pub const MIN_FLUX_DIFFUSIVE: f64 = 1e-9;

/// Residual tolerance of the Newton iteration
pub const TOLERANCE: f64 = 1e-12;

/// Newton iteration cap
pub const MAX_ITERATIONS: usize = 10;

/// Result of one kinematic wave solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicSolve {
    /// New discharge (m³/s)
    pub q: f64,
    /// Newton iterations performed (0 when the solve short-circuited)
    pub iterations: usize,
    /// Residual of the last evaluated iterate
    pub residual: f64,
}

impl KinematicSolve {
    fn zero() -> Self {
        Self {
            q: 0.0,
            iterations: 0,
            residual: 0.0,
        }
    }

    /// The discharge, or `NumericalDivergence` if it is not finite
    pub fn checked(self, module: &'static str, node: usize) -> Result<f64> {
        if self.q.is_finite() {
            Ok(self.q)
        } else {
            Err(Error::NumericalDivergence {
                module,
                node,
                reason: format!("kinematic wave solve returned {}", self.q),
            })
        }
    }
}

/// Kinematic wave coefficient α from Manning's equation:
/// `(n / sqrt(sin θ) · P^(2/3))^0.6`.
pub fn manning_alpha(manning: f64, sin_slope: f64, perimeter: f64) -> f64 {
    (manning / sin_slope.sqrt() * perimeter.powf(2.0 / 3.0)).powf(BETA)
}

/// Flow depth for discharge `q` over width `width`: `α·q^0.6 / width`
pub fn depth_from_discharge(alpha: f64, q: f64, width: f64) -> f64 {
    alpha * q.powf(BETA) / width
}

/// Solve for the new discharge of one node.
///
/// * `q_in` - summed upstream inflow in this step (m³/s)
/// * `q_last` - outflow of the node in the previous step (m³/s)
/// * `surplus` - lateral source per unit length (m²/s), negative for losses
/// * `alpha` - kinematic coefficient from [`manning_alpha`]
/// * `dt` - time step (s)
/// * `dx` - flow length through the node (m)
///
/// Returns zero when the losses exceed the available water or the first
/// guess falls below [`MIN_FLUX`].
pub fn solve_kinematic_wave(
    q_in: f64,
    q_last: f64,
    surplus: f64,
    alpha: f64,
    dt: f64,
    dx: f64,
) -> KinematicSolve {
    if q_in + q_last <= -surplus * dx {
        return KinematicSolve::zero();
    }

    let mean = ((q_last + q_in) / 2.0).max(MIN_FLUX);
    let ab_pq = alpha * BETA * mean.powf(BETA - 1.0);
    let dt_x = dt / dx;
    let c = dt_x * q_in + alpha * q_last.powf(BETA) + dt * surplus;

    let mut q = (dt_x * q_in + q_last * ab_pq + dt * surplus) / (dt_x + ab_pq);
    if q < MIN_FLUX {
        return KinematicSolve::zero();
    }

    let mut iterations = 0;
    let mut residual;
    loop {
        residual = dt_x * q + alpha * q.powf(BETA) - c;
        let slope = dt_x + alpha * BETA * q.powf(BETA - 1.0);
        q -= residual / slope;
        q = q.max(MIN_FLUX);
        iterations += 1;
        if residual.abs() <= TOLERANCE || iterations >= MAX_ITERATIONS {
            break;
        }
    }

    KinematicSolve {
        q,
        iterations,
        residual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_steady_state_is_fixed_point() {
        let solve = solve_kinematic_wave(1.0, 1.0, 0.0, 0.5, 60.0, 30.0);
        assert_relative_eq!(solve.q, 1.0, epsilon = 1e-12);
        assert!(solve.iterations <= MAX_ITERATIONS);
        assert!(solve.residual.abs() < TOLERANCE);
    }

    #[test]
    fn test_converges_to_continuity() {
        let (q_in, q_last, alpha, dt, dx) = (5.0, 0.5, 1.2, 60.0, 30.0);
        let solve = solve_kinematic_wave(q_in, q_last, 0.0, alpha, dt, dx);
        let lhs = dt / dx * solve.q + alpha * solve.q.powf(BETA);
        let rhs = dt / dx * q_in + alpha * q_last.powf(BETA);
        assert_relative_eq!(lhs, rhs, epsilon = 1e-9);
        assert!(solve.q > q_last && solve.q < q_in);
    }

    #[test]
    fn test_losses_exceeding_water_give_zero() {
        let solve = solve_kinematic_wave(0.1, 0.1, -1.0, 0.5, 60.0, 30.0);
        assert_eq!(solve.q, 0.0);
        assert_eq!(solve.iterations, 0);
    }

    #[test]
    fn test_lateral_source_from_dry_start() {
        let solve = solve_kinematic_wave(0.0, 0.0, 0.01, 0.5, 60.0, 30.0);
        assert!(solve.q.is_finite() && solve.q > 0.0);
    }

    #[test]
    fn test_checked_rejects_nan() {
        let bad = KinematicSolve {
            q: f64::NAN,
            iterations: 1,
            residual: 0.0,
        };
        assert!(matches!(
            bad.checked("test", 3),
            Err(Error::NumericalDivergence { node: 3, .. })
        ));
    }

    #[test]
    fn test_manning_alpha() {
        // n = 0.04, slope 1%, perimeter 10 m
        let sin = 0.01f64.atan().sin();
        let alpha = manning_alpha(0.04, sin, 10.0);
        let expected = (0.04 / sin.sqrt() * 10f64.powf(2.0 / 3.0)).powf(0.6);
        assert_relative_eq!(alpha, expected);
        let h = depth_from_discharge(alpha, 2.0, 5.0);
        assert_relative_eq!(h, alpha * 2f64.powf(0.6) / 5.0);
    }
}
