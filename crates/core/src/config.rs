//! Run configuration
//!
//! A [`RoutingConfig`] is assembled once per run, usually from a TOML file,
//! and validated before any router is built. Every section has defaults so a
//! configuration file only needs to name what differs.
//!
//! ```toml
//! threads = 4
//!
//! [time]
//! hillslope_dt = 60.0
//! channel_dt = 3600.0
//! iuh_dt = 24.0
//!
//! [methods]
//! overland = "kinematic_wave"
//! channel = "muskingum"
//!
//! [reach]
//! muskingum_x = 0.2
//! ```

use crate::d8::D8Encoding;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Overland routing method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlandMethod {
    /// Implicit kinematic wave over cell routing layers
    #[default]
    KinematicWave,
    /// Convolution with each cell's IUH
    Iuh,
    /// Convolution with a Gamma-distribution unit hydrograph
    GammaIuh,
}

/// Subsurface lateral flow method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterflowMethod {
    /// Darcy flux through the root zone, routed cell to cell
    #[default]
    KinematicWave,
    /// Layered Clapp-Hornberger storage routing within each sub-basin
    SoilLayers,
}

/// Channel routing method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMethod {
    /// Implicit kinematic wave with one storage per reach
    #[default]
    KinematicReach,
    /// Variable-storage Muskingum per reach
    Muskingum,
    /// Diffusive wave along the channel cells of each reach
    DiffusiveWave,
    /// Implicit kinematic wave along the channel cells of each reach
    KinematicCell,
}

/// Time steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Hillslope (overland and interflow) step in seconds
    pub hillslope_dt: f64,
    /// Channel step in seconds
    pub channel_dt: f64,
    /// IUH aggregation step in hours; below one hour the IUH is not aggregated
    pub iuh_dt: f64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            hillslope_dt: 3600.0,
            channel_dt: 3600.0,
            iuh_dt: 24.0,
        }
    }
}

/// Grid description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Cell width in metres
    pub cell_width: f64,
    pub d8_encoding: D8Encoding,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_width: 30.0,
            d8_encoding: D8Encoding::TauDem,
        }
    }
}

/// Selected method per component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodConfig {
    pub overland: OverlandMethod,
    pub interflow: InterflowMethod,
    pub channel: ChannelMethod,
}

/// Unit hydrograph settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IuhConfig {
    /// Longest IUH support in hours
    pub max_length: usize,
}

impl Default for IuhConfig {
    fn default() -> Self {
        Self { max_length: 200 }
    }
}

/// Interflow parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterflowConfig {
    /// Interflow scale factor
    pub ki: f64,
    /// Land-use factor for the root-zone Darcy flux
    pub landuse_factor: f64,
    /// Soil temperature (°C) at or below which the top layer is frozen
    pub frozen_soil_temp: f64,
}

impl Default for InterflowConfig {
    fn default() -> Self {
        Self {
            ki: 1.0,
            landuse_factor: 1.0,
            frozen_soil_temp: -5.0,
        }
    }
}

/// Reach (channel storage) parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachConfig {
    /// Bank storage recession constant toward the channel
    pub a_bank: f64,
    /// Bank storage recession constant toward groundwater
    pub b_bank: f64,
    /// Initial bank storage per unit length (m³/m)
    pub bank0: f64,
    /// Initial channel storage per unit length (m³/m)
    pub chs0: f64,
    /// Initial water depth as a fraction of bankfull depth (Muskingum)
    pub chs0_perc: f64,
    /// Channel evaporation coefficient
    pub epch: f64,
    /// Manning's n scaling factor
    pub manning_scale: f64,
    /// Muskingum weighting factor
    pub muskingum_x: f64,
    /// Muskingum storage-time calibration coefficient
    pub muskingum_co1: f64,
    /// Deep groundwater discharge added to every reach (m³/s)
    pub deep_groundwater: f64,
}

impl Default for ReachConfig {
    fn default() -> Self {
        Self {
            a_bank: 0.2,
            b_bank: 0.05,
            bank0: 0.0,
            chs0: 0.0,
            chs0_perc: 0.05,
            epch: 0.5,
            manning_scale: 1.0,
            muskingum_x: 0.2,
            muskingum_co1: 0.7,
            deep_groundwater: 0.0,
        }
    }
}

/// Complete configuration of one routing run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Worker threads for layer sweeps (0 = all cores)
    pub threads: usize,
    pub time: TimeConfig,
    pub grid: GridConfig,
    pub methods: MethodConfig,
    pub iuh: IuhConfig,
    pub interflow: InterflowConfig,
    pub reach: ReachConfig,
}

fn positive(module: &'static str, name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::config(module, format!("{name} must be positive, got {value}")));
    }
    Ok(())
}

fn within(module: &'static str, name: &str, value: f64, lo: f64, hi: f64) -> Result<()> {
    if !(value >= lo && value <= hi) {
        return Err(Error::config(
            module,
            format!("{name} must lie in [{lo}, {hi}], got {value}"),
        ));
    }
    Ok(())
}

impl RoutingConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RoutingConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check every parameter range, naming the first offender
    pub fn validate(&self) -> Result<()> {
        positive("time", "hillslope_dt", self.time.hillslope_dt)?;
        positive("time", "channel_dt", self.time.channel_dt)?;
        positive("time", "iuh_dt", self.time.iuh_dt)?;
        positive("grid", "cell_width", self.grid.cell_width)?;
        if self.iuh.max_length == 0 {
            return Err(Error::config("iuh", "max_length must be at least 1"));
        }
        positive("interflow", "ki", self.interflow.ki)?;
        within("interflow", "landuse_factor", self.interflow.landuse_factor, 0.0, f64::MAX)?;
        let reach = &self.reach;
        within("reach", "a_bank", reach.a_bank, 0.0, f64::MAX)?;
        within("reach", "b_bank", reach.b_bank, 0.0, f64::MAX)?;
        within("reach", "bank0", reach.bank0, 0.0, f64::MAX)?;
        within("reach", "chs0", reach.chs0, 0.0, f64::MAX)?;
        within("reach", "chs0_perc", reach.chs0_perc, 0.0, 1.0)?;
        within("reach", "epch", reach.epch, 0.0, 1.0)?;
        positive("reach", "manning_scale", reach.manning_scale)?;
        within("reach", "muskingum_x", reach.muskingum_x, 0.0, 0.5)?;
        within("reach", "muskingum_co1", reach.muskingum_co1, 0.0, 1.0)?;
        within("reach", "deep_groundwater", reach.deep_groundwater, 0.0, f64::MAX)?;
        Ok(())
    }
}
