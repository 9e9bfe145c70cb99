//! Typed registry of per-cell and per-reach arrays
//!
//! The registry owns every per-node input array of a run by value. Routers
//! never keep references across steps: they borrow slices out of the
//! registry while assembling their input views, and own their state.

use crate::error::{check_len, Error, Result};
use std::collections::BTreeMap;

/// Named per-node arrays understood by the routers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    // Terrain and channel geometry
    Elevation,
    Slope,
    Manning,
    FlowDirection,
    StreamLink,
    Subbasin,
    ChannelWidth,
    // Soil
    RootDepth,
    Porosity,
    FieldCapacity,
    Conductivity,
    PoreIndex,
    SoilMoisture,
    SoilTemperature,
    // Water fluxes and storages
    Precipitation,
    SurfaceRunoff,
    InfiltrationSurplus,
    Infiltration,
    AccumulatedInfiltration,
    OverlandQ,
    InterflowQ,
    GroundwaterQ,
    // Unit hydrograph inputs
    TravelTime,
    TravelTimeStd,
    RunoffCoefficient,
    GammaScale,
    GammaShape,
    // Sediment and nutrients
    SedimentYield,
    SurfaceNo3,
    LateralNo3,
    GroundwaterNo3,
    SurfaceSolP,
    GroundwaterMinP,
    SedimentOrgN,
    SedimentOrgP,
    SedimentActiveMinP,
    SedimentStableMinP,
    Cod,
}

impl Field {
    /// Stable name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Field::Elevation => "elevation",
            Field::Slope => "slope",
            Field::Manning => "manning",
            Field::FlowDirection => "flow_direction",
            Field::StreamLink => "stream_link",
            Field::Subbasin => "subbasin",
            Field::ChannelWidth => "channel_width",
            Field::RootDepth => "root_depth",
            Field::Porosity => "porosity",
            Field::FieldCapacity => "field_capacity",
            Field::Conductivity => "conductivity",
            Field::PoreIndex => "pore_index",
            Field::SoilMoisture => "soil_moisture",
            Field::SoilTemperature => "soil_temperature",
            Field::Precipitation => "precipitation",
            Field::SurfaceRunoff => "surface_runoff",
            Field::InfiltrationSurplus => "infiltration_surplus",
            Field::Infiltration => "infiltration",
            Field::AccumulatedInfiltration => "accumulated_infiltration",
            Field::OverlandQ => "overland_q",
            Field::InterflowQ => "interflow_q",
            Field::GroundwaterQ => "groundwater_q",
            Field::TravelTime => "t0",
            Field::TravelTimeStd => "delta",
            Field::RunoffCoefficient => "runoff_coefficient",
            Field::GammaScale => "gamma_scale",
            Field::GammaShape => "gamma_shape",
            Field::SedimentYield => "sediment_yield",
            Field::SurfaceNo3 => "surqno3",
            Field::LateralNo3 => "latno3",
            Field::GroundwaterNo3 => "no3gw",
            Field::SurfaceSolP => "surqsolp",
            Field::GroundwaterMinP => "minpgw",
            Field::SedimentOrgN => "sedorgn",
            Field::SedimentOrgP => "sedorgp",
            Field::SedimentActiveMinP => "sedminpa",
            Field::SedimentStableMinP => "sedminps",
            Field::Cod => "cod",
        }
    }
}

/// Owner of all per-node arrays of one domain (cells or reaches).
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    n_nodes: usize,
    fields: BTreeMap<Field, Vec<f64>>,
}

impl FieldRegistry {
    /// Empty registry for `n_nodes` cells or reaches
    pub fn new(n_nodes: usize) -> Self {
        Self {
            n_nodes,
            fields: BTreeMap::new(),
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Store a field, replacing any previous array
    pub fn insert(&mut self, field: Field, values: Vec<f64>) -> Result<()> {
        check_len(field.name(), self.n_nodes, values.len())?;
        self.fields.insert(field, values);
        Ok(())
    }

    /// Store a constant field
    pub fn fill(&mut self, field: Field, value: f64) {
        self.fields.insert(field, vec![value; self.n_nodes]);
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    /// Borrow a required field
    pub fn get(&self, field: Field) -> Result<&[f64]> {
        self.fields
            .get(&field)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::config("fields", format!("required field `{}` is not set", field.name())))
    }

    /// Borrow an optional field
    pub fn get_opt(&self, field: Field) -> Option<&[f64]> {
        self.fields.get(&field).map(Vec::as_slice)
    }

    /// Mutably borrow a field
    pub fn get_mut(&mut self, field: Field) -> Result<&mut [f64]> {
        self.fields
            .get_mut(&field)
            .map(Vec::as_mut_slice)
            .ok_or_else(|| Error::config("fields", format!("required field `{}` is not set", field.name())))
    }

    /// Take a field out of the registry
    pub fn take(&mut self, field: Field) -> Option<Vec<f64>> {
        self.fields.remove(&field)
    }
}
