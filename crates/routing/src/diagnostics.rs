//! Clamp diagnostics.
//!
//! Several routers force negative, non-finite or over-drawn intermediates
//! back into range. The clamping itself is kept as is; each event is also
//! counted here so a run can report how often it happened.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Kinds of clamping events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClampKind {
    /// A solved or intermediate flux was negative and set to zero
    NegativeFlux,
    /// A flux below the minimum-flux guard was forced to zero
    BelowMinFlux,
    /// Re-infiltration computed after the overland solve was negative
    NegativeReinfiltration,
    /// A loss exceeded the available storage and was capped
    LossCapped,
    /// Storage ran out and the node returned zero outflow
    StorageExhausted,
    /// An outflow exceeded the water available in the node and was capped
    OutflowCapped,
    /// Soil water was floored at its lower bound
    SoilWaterFloor,
    /// Soil water above porosity became return flow
    ReturnFlow,
}

impl ClampKind {
    const ALL: [ClampKind; 8] = [
        ClampKind::NegativeFlux,
        ClampKind::BelowMinFlux,
        ClampKind::NegativeReinfiltration,
        ClampKind::LossCapped,
        ClampKind::StorageExhausted,
        ClampKind::OutflowCapped,
        ClampKind::SoilWaterFloor,
        ClampKind::ReturnFlow,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ClampKind::NegativeFlux => "negative_flux",
            ClampKind::BelowMinFlux => "below_min_flux",
            ClampKind::NegativeReinfiltration => "negative_reinfiltration",
            ClampKind::LossCapped => "loss_capped",
            ClampKind::StorageExhausted => "storage_exhausted",
            ClampKind::OutflowCapped => "outflow_capped",
            ClampKind::SoilWaterFloor => "soil_water_floor",
            ClampKind::ReturnFlow => "return_flow",
        }
    }
}

/// Thread-safe per-kind event counter, shared by reference across a sweep.
#[derive(Debug, Default)]
pub struct ClampCounter {
    counts: [AtomicUsize; 8],
}

impl ClampCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: ClampKind) {
        self.counts[kind.slot()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, kind: ClampKind) -> usize {
        self.counts[kind.slot()].load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Log non-zero counts for `module` and reset them.
    ///
    /// Returns the number of events reported.
    pub fn report(&self, module: &'static str) -> usize {
        let mut reported = 0;
        for kind in ClampKind::ALL {
            let n = self.counts[kind.slot()].swap(0, Ordering::Relaxed);
            if n > 0 {
                warn!(module, kind = kind.name(), count = n, "values clamped");
                reported += n;
            }
        }
        reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_report_resets() {
        let counter = ClampCounter::new();
        counter.record(ClampKind::NegativeFlux);
        counter.record(ClampKind::NegativeFlux);
        counter.record(ClampKind::LossCapped);
        assert_eq!(counter.count(ClampKind::NegativeFlux), 2);
        assert_eq!(counter.total(), 3);

        assert_eq!(counter.report("test"), 3);
        assert_eq!(counter.total(), 0, "report must reset the counters");
    }

    #[test]
    fn test_slots_are_distinct() {
        let counter = ClampCounter::new();
        for kind in ClampKind::ALL {
            counter.record(kind);
        }
        for kind in ClampKind::ALL {
            assert_eq!(counter.count(kind), 1, "{}", kind.name());
        }
    }
}
