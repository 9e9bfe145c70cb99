//! Instantaneous unit hydrograph kernel

use std::f64::consts::PI;

/// Floor applied to `delta`, `t0` and `t` before evaluating the kernel
pub const KERNEL_FLOOR: f64 = 0.01;

/// Kernel sums below this are treated as zero
pub const ZERO_SUM: f64 = 1e-9;

/// Response at lag `t` of a cell with mean flow time `t0` and standard
/// deviation `delta` (all in hours):
///
/// ```text
/// 1 / (δ·sqrt(2π·t³/t0³)) · exp(-(t - t0)² / (2·δ²·t / t0))
/// ```
///
/// The kernel is singular at `t = 0` and `δ = 0`; all three arguments are
/// floored at [`KERNEL_FLOOR`].
pub fn iuh_kernel(delta: f64, t0: f64, t: f64) -> f64 {
    let delta = delta.max(KERNEL_FLOOR);
    let t0 = t0.max(KERNEL_FLOOR);
    let t = t.max(KERNEL_FLOOR);
    let scale = 1.0 / (delta * (2.0 * PI * t.powi(3) / t0.powi(3)).sqrt());
    scale * (-(t - t0).powi(2) / (2.0 * delta * delta * t / t0)).exp()
}

/// Integer lag bracket `[min, max]` evaluated for a cell.
///
/// `min = round(max(0, t0 - 3δ))`, `max = clamp(round(t0 + 5δ), 1, max_length)`.
pub fn lag_bracket(delta: f64, t0: f64, max_length: usize) -> (usize, usize) {
    let delta = delta.max(KERNEL_FLOOR);
    let t0 = t0.max(KERNEL_FLOOR);
    let min = ((t0 - 3.0 * delta).max(0.0) + 0.5) as usize;
    let max = ((t0 + 5.0 * delta + 0.5) as usize).min(max_length).max(1);
    (min.min(max), max)
}

/// Whether the kernel collapses onto lag 0 (both inputs at the floor)
pub fn is_degenerate(delta: f64, t0: f64) -> bool {
    delta <= KERNEL_FLOOR && t0 <= KERNEL_FLOOR
}
