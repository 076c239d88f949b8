//! Lumped daily Xinanjiang (XAJ) rainfall-runoff model.
//!
//! Three-layer evapotranspiration, saturation-excess runoff generation,
//! free-water source separation into surface, interflow and groundwater
//! runoff, then linear-reservoir routing. All depths are in mm per step.

pub mod constants;
pub mod params;
pub mod processes;
pub mod run;
pub mod state;

pub use constants::{N_PARAMS, PARAM_NAMES};
pub use params::{ParamRanges, XajParams};
pub use run::{FluxesTimeseries, Xaj};
pub use state::{InitialState, State};
