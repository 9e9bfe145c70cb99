//! GR4J routing unit hydrographs
//!
//! UH1 spreads over `x4` and UH2 over `2·x4` (both in the units of the
//! time step). Lengths are capped at 50 steps.

use rivulet_core::{Error, Result};

/// Longest GR4J unit hydrograph (steps)
pub const MAX_GR4J_STEPS: usize = 50;

/// Which GR4J hydrograph to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gr4jKernel {
    Uh1,
    Uh2,
}

/// S-curve of UH1
fn s_curve_1(t: f64, x4: f64) -> f64 {
    (t / x4).powf(2.5).min(1.0)
}

/// S-curve of UH2
fn s_curve_2(t: f64, x4: f64) -> f64 {
    let r = t / x4;
    if r < 1.0 {
        0.5 * r.powf(2.5)
    } else if r < 2.0 {
        1.0 - 0.5 * (2.0 - r).powf(2.5)
    } else {
        1.0
    }
}

/// Normalised GR4J unit hydrograph for time base `x4` and step `tstep`.
///
/// # Errors
/// `Error::InvalidParameter` for non-positive `x4` or `tstep`, or a kernel
/// longer than [`MAX_GR4J_STEPS`].
pub fn gr4j_unit_hydrograph(kernel: Gr4jKernel, x4: f64, tstep: f64) -> Result<Vec<f64>> {
    if !(x4 > 0.0) || !(tstep > 0.0) {
        return Err(Error::invalid("x4", x4, "time base and step must be positive"));
    }
    let max_time = match kernel {
        Gr4jKernel::Uh1 => x4,
        Gr4jKernel::Uh2 => 2.0 * x4,
    };
    let steps = ((max_time / tstep).ceil() as usize).max(1);
    if steps > MAX_GR4J_STEPS {
        return Err(Error::invalid(
            "x4",
            x4,
            format!("unit hydrograph of {steps} steps exceeds {MAX_GR4J_STEPS}"),
        ));
    }

    let curve = match kernel {
        Gr4jKernel::Uh1 => s_curve_1,
        Gr4jKernel::Uh2 => s_curve_2,
    };
    let mut uh: Vec<f64> = (0..steps)
        .map(|n| curve((n + 1) as f64 * tstep, x4) - curve(n as f64 * tstep, x4))
        .collect();
    let sum: f64 = uh.iter().sum();
    if sum == 0.0 {
        return Err(Error::invalid("x4", x4, "unit hydrograph sums to zero"));
    }
    for h in uh.iter_mut() {
        *h /= sum;
    }
    Ok(uh)
}
