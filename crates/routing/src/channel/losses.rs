//! Transmission and evaporation losses shared by the reach methods

use crate::diagnostics::{ClampCounter, ClampKind};

/// mm/h to m/s
pub const MM_PER_HOUR: f64 = 1.0 / 1000.0 / 3600.0;

/// Groundwater inflow at or above this suppresses bed seepage (m³/s)
pub const GAINING_REACH: f64 = 0.001;

/// Remove up to `amount` from `storage` and return what was removed.
pub(crate) fn withdraw(storage: &mut f64, amount: f64, clamps: &ClampCounter) -> f64 {
    let amount = amount.max(0.0);
    if *storage > amount {
        *storage -= amount;
        amount
    } else {
        if amount > 0.0 {
            clamps.record(ClampKind::LossCapped);
        }
        let taken = storage.max(0.0);
        *storage = 0.0;
        taken
    }
}

/// Share of a linear store released in one step
pub(crate) fn recession(storage: f64, coefficient: f64) -> f64 {
    storage * (1.0 - (-coefficient).exp())
}

/// Bed seepage to the deep aquifer (m³). Gaining reaches do not seep.
pub(crate) fn seepage_potential(conductivity: f64, bed_width: f64, length: f64, dt: f64, qg_local: f64, threshold: f64) -> f64 {
    if qg_local < threshold {
        conductivity * MM_PER_HOUR * bed_width * length * dt
    } else {
        0.0
    }
}

/// Loss from both banks over `wetted_bank` metres of bank per side (m³)
pub(crate) fn bank_loss_potential(conductivity: f64, wetted_bank: f64, length: f64, dt: f64) -> f64 {
    2.0 * conductivity * MM_PER_HOUR * wetted_bank * length * dt
}

/// Open-water evaporation from the water surface (m³)
pub(crate) fn evaporation_potential(epch: f64, pet: f64, width: f64, length: f64) -> f64 {
    epch * pet * 0.001 * width * length
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_withdraw_caps_at_storage() {
        let clamps = ClampCounter::new();
        let mut st = 10.0;
        assert_relative_eq!(withdraw(&mut st, 4.0, &clamps), 4.0);
        assert_relative_eq!(st, 6.0);
        assert_relative_eq!(withdraw(&mut st, 8.0, &clamps), 6.0);
        assert_eq!(st, 0.0);
        assert_eq!(clamps.count(ClampKind::LossCapped), 1);
    }

    #[test]
    fn test_gaining_reach_does_not_seep() {
        assert_eq!(seepage_potential(3.6, 2.0, 100.0, 3600.0, 0.5, GAINING_REACH), 0.0);
        // 3.6 mm/h over 200 m² for an hour is 0.72 m³
        assert_relative_eq!(seepage_potential(3.6, 2.0, 100.0, 3600.0, 0.0, GAINING_REACH), 0.72, epsilon = 1e-12);
    }

    #[test]
    fn test_recession() {
        assert_relative_eq!(recession(100.0, 0.0), 0.0);
        assert_relative_eq!(recession(100.0, 1.0), 100.0 * (1.0 - (-1.0f64).exp()));
    }
}
