/// XAJ model state variables.
///
/// Tension water per layer, free water storage and its runoff-producing
/// area, and the outflow of the three routing reservoirs.
use super::constants::MIN_RUNOFF_AREA;
use super::params::XajParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct State {
    /// Upper layer tension water [mm].
    pub wu: f64,
    /// Lower layer tension water [mm].
    pub wl: f64,
    /// Deep layer tension water [mm].
    pub wd: f64,
    /// Free water storage over the runoff-producing area [mm].
    pub s: f64,
    /// Runoff-producing area fraction [-].
    pub fr: f64,
    /// Interflow reservoir outflow [mm].
    pub qi: f64,
    /// Groundwater reservoir outflow [mm].
    pub qg: f64,
    /// Channel outflow [mm].
    pub q: f64,
}

/// Initial conditions, expressed relative to the capacities of the candidate parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    /// Fraction of UM filled at start
    #[serde(default = "half_default")]
    pub wu: f64,
    /// Fraction of LM filled at start
    #[serde(default = "half_default")]
    pub wl: f64,
    /// Fraction of DM filled at start
    #[serde(default = "half_default")]
    pub wd: f64,
    /// Fraction of SM filled at start
    #[serde(default = "zero_default")]
    pub s: f64,
    #[serde(default = "fr_default")]
    pub fr: f64,
    #[serde(default = "zero_default")]
    pub qi: f64,
    #[serde(default = "zero_default")]
    pub qg: f64,
    #[serde(default = "zero_default")]
    pub q: f64,
}

impl Default for InitialState {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl InitialState {
    pub fn check(&self) -> Result<(), String> {
        for (name, value) in [
            ("wu", self.wu),
            ("wl", self.wl),
            ("wd", self.wd),
            ("s", self.s),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!(
                    "initial {} = {} must be a fraction in [0, 1]",
                    name, value
                ));
            }
        }
        if !(MIN_RUNOFF_AREA..=1.0).contains(&self.fr) {
            return Err(format!(
                "initial fr = {} must be a runoff area fraction in [{}, 1]",
                self.fr, MIN_RUNOFF_AREA
            ));
        }
        for (name, value) in [("qi", self.qi), ("qg", self.qg), ("q", self.q)] {
            if !(value >= 0.0) {
                return Err(format!("initial {} = {} must be non-negative", name, value));
            }
        }
        Ok(())
    }
}

impl State {
    /// Build the starting state of a simulation from relative initial conditions.
    pub fn initialize(params: &XajParams, init: &InitialState) -> Self {
        Self {
            wu: init.wu * params.um,
            wl: init.wl * params.lm,
            wd: init.wd * params.dm,
            s: init.s * params.sm,
            fr: init.fr,
            qi: init.qi,
            qg: init.qg,
            q: init.q,
        }
    }

    /// Total tension water W = WU + WL + WD [mm].
    pub fn w(&self) -> f64 {
        self.wu + self.wl + self.wd
    }
}

fn half_default() -> f64 {
    0.5
}
fn zero_default() -> f64 {
    0.0
}
fn fr_default() -> f64 {
    0.1
}
