//! Convolution-based transport
//!
//! Generic, Gamma and GR4J convolution plus the IUH shift buffers behind
//! overland sediment and nutrient routing.

mod convolve;
mod gamma;
mod gr4j;
mod iuh_buffer;
mod nutrient;
mod sediment;

pub use convolve::Convolution;
pub use gamma::{gamma, gamma_cdf, gamma_unit_hydrograph, incomplete_gamma, MAX_GAMMA_STEPS};
pub use gr4j::{gr4j_unit_hydrograph, Gr4jKernel, MAX_GR4J_STEPS};
pub use iuh_buffer::IuhBuffer;
pub use nutrient::{Carrier, CarrierInputs, NutrientOverland, Species};
pub use sediment::SedimentOverland;
