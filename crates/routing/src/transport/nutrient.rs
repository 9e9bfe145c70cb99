//! Overland nutrient routing by cell IUH (NutrOL_IUH)
//!
//! Ten nitrogen, phosphorus and COD species are loaded per cell in kg/ha,
//! scaled to kg by the cell area and the fraction of the carrier that
//! actually reaches the channel, and delayed by the cell IUH.

use super::IuhBuffer;
use crate::iuh::UnitHydrograph;
use rivulet_core::error::check_len;
use rivulet_core::{Error, Field, Result, SubbasinTotals};
use rivulet_parallel::Executor;

/// What carries a species to the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    /// Dissolved in surface runoff
    SurfaceFlow,
    /// Subsurface pathways, delivered entirely
    Subsurface,
    /// Attached to eroded sediment
    Sediment,
}

/// Routed nutrient species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    SurfaceNitrate,
    LateralNitrate,
    GroundwaterNitrate,
    SurfaceSolubleP,
    GroundwaterMineralP,
    SedimentOrganicN,
    SedimentOrganicP,
    SedimentActiveMineralP,
    SedimentStableMineralP,
    Cod,
}

impl Species {
    pub const ALL: [Species; 10] = [
        Species::SurfaceNitrate,
        Species::LateralNitrate,
        Species::GroundwaterNitrate,
        Species::SurfaceSolubleP,
        Species::GroundwaterMineralP,
        Species::SedimentOrganicN,
        Species::SedimentOrganicP,
        Species::SedimentActiveMineralP,
        Species::SedimentStableMineralP,
        Species::Cod,
    ];

    pub fn carrier(self) -> Carrier {
        match self {
            Species::SurfaceNitrate | Species::SurfaceSolubleP | Species::Cod => Carrier::SurfaceFlow,
            Species::LateralNitrate | Species::GroundwaterNitrate | Species::GroundwaterMineralP => {
                Carrier::Subsurface
            }
            _ => Carrier::Sediment,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Species::SurfaceNitrate => "surqno3",
            Species::LateralNitrate => "latno3",
            Species::GroundwaterNitrate => "no3gw",
            Species::SurfaceSolubleP => "surqsolp",
            Species::GroundwaterMineralP => "minpgw",
            Species::SedimentOrganicN => "sedorgn",
            Species::SedimentOrganicP => "sedorgp",
            Species::SedimentActiveMineralP => "sedminpa",
            Species::SedimentStableMineralP => "sedminps",
            Species::Cod => "cod",
        }
    }

    /// Registry field holding the cell loads of this species
    pub fn field(self) -> Field {
        match self {
            Species::SurfaceNitrate => Field::SurfaceNo3,
            Species::LateralNitrate => Field::LateralNo3,
            Species::GroundwaterNitrate => Field::GroundwaterNo3,
            Species::SurfaceSolubleP => Field::SurfaceSolP,
            Species::GroundwaterMineralP => Field::GroundwaterMinP,
            Species::SedimentOrganicN => Field::SedimentOrgN,
            Species::SedimentOrganicP => Field::SedimentOrgP,
            Species::SedimentActiveMineralP => Field::SedimentActiveMinP,
            Species::SedimentStableMineralP => Field::SedimentStableMinP,
            Species::Cod => Field::Cod,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Per-cell carriers used to derive delivery fractions
#[derive(Debug, Clone, Copy)]
pub struct CarrierInputs<'a> {
    /// Surface runoff generated in the cell
    pub surface_runoff: &'a [f64],
    /// Part of the surface runoff that reached the channel
    pub routed_flow: &'a [f64],
    /// Soil eroded in the cell
    pub eroded: &'a [f64],
    /// Part of the eroded soil that reached the channel
    pub routed_sediment: &'a [f64],
}

/// `part / whole` clipped to [0, 1]; a dry or uneroded cell delivers nothing
fn delivery_fraction(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        (part / whole).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// IUH nutrient router
pub struct NutrientOverland {
    responses: Vec<UnitHydrograph>,
    subbasin: Vec<i64>,
    n_subbasins: usize,
    cell_area: f64,
    buffers: Vec<IuhBuffer>,
    to_channel: Vec<SubbasinTotals>,
}

impl NutrientOverland {
    pub fn new(responses: Vec<UnitHydrograph>, subbasin: &[i64], cell_area: f64) -> Result<Self> {
        check_len("subbasin", responses.len(), subbasin.len())?;
        if !(cell_area > 0.0) {
            return Err(Error::config("nutrient_overland", "cell area must be positive"));
        }
        let n_subbasins = subbasin.iter().copied().max().unwrap_or(0).max(0) as usize;
        let buffer = IuhBuffer::for_responses(&responses);
        Ok(Self {
            buffers: vec![buffer; Species::ALL.len()],
            to_channel: vec![SubbasinTotals::zeros(n_subbasins); Species::ALL.len()],
            responses,
            subbasin: subbasin.to_vec(),
            n_subbasins,
            cell_area,
        })
    }

    /// Advance one step. `loads(species)` gives the cell loads in kg/ha of
    /// every species, typically `|s| registry.get(s.field())`.
    pub fn step<'a, F>(&mut self, exec: &Executor, carriers: &CarrierInputs<'_>, loads: F) -> Result<()>
    where
        F: Fn(Species) -> Result<&'a [f64]>,
    {
        let n = self.responses.len();
        check_len("surface_runoff", n, carriers.surface_runoff.len())?;
        check_len("routed_flow", n, carriers.routed_flow.len())?;
        check_len("eroded", n, carriers.eroded.len())?;
        check_len("routed_sediment", n, carriers.routed_sediment.len())?;

        let flow_fraction: Vec<f64> = (0..n)
            .map(|i| delivery_fraction(carriers.routed_flow[i], carriers.surface_runoff[i]))
            .collect();
        let sediment_fraction: Vec<f64> = (0..n)
            .map(|i| delivery_fraction(carriers.routed_sediment[i], carriers.eroded[i]))
            .collect();
        let kg_per_unit = self.cell_area / 10_000.0;

        for species in Species::ALL {
            let load = loads(species)?;
            check_len(species.name(), n, load.len())?;
            let buffer = &mut self.buffers[species.index()];
            buffer.shift();
            for (cell, (&amount, uh)) in load.iter().zip(&self.responses).enumerate() {
                if amount <= 0.0 {
                    continue;
                }
                let ratio = match species.carrier() {
                    Carrier::SurfaceFlow => flow_fraction[cell],
                    Carrier::Subsurface => 1.0,
                    Carrier::Sediment => sediment_fraction[cell],
                };
                buffer.inject(cell, amount * kg_per_unit * ratio, uh);
            }
            self.to_channel[species.index()] = buffer.front_by_subbasin(exec, &self.subbasin, self.n_subbasins)?;
        }
        Ok(())
    }

    /// Load of `species` entering the channel per sub-basin (kg)
    pub fn to_channel(&self, species: Species) -> &SubbasinTotals {
        &self.to_channel[species.index()]
    }

    pub fn is_drained(&self) -> bool {
        self.buffers.iter().all(IuhBuffer::is_drained)
    }
}
