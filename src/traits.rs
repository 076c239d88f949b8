use crate::xaj::{InitialState, XajParams};

/// Forcing series of one basin.
///
/// Both slices have the same length, one value per time step, in mm.
#[derive(Debug, Clone, Copy)]
pub struct Forcing<'a> {
    pub precip: &'a [f64],
    pub pet: &'a [f64],
}

impl<'a> Forcing<'a> {
    /// Validates:
    /// - precip and pet have the same length
    /// - no NaN and no negative value in either series
    pub fn new(precip: &'a [f64], pet: &'a [f64]) -> Result<Self, String> {
        if precip.len() != pet.len() {
            return Err(format!(
                "precip length {} does not match pet length {}",
                precip.len(),
                pet.len()
            ));
        }
        if precip.iter().any(|v| !(*v >= 0.0)) {
            return Err("precip series contains NaN or negative values".to_string());
        }
        if pet.iter().any(|v| !(*v >= 0.0)) {
            return Err("pet series contains NaN or negative values".to_string());
        }
        Ok(Self { precip, pet })
    }

    pub fn len(&self) -> usize {
        self.precip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precip.is_empty()
    }
}

/// Rainfall-runoff simulator driven by the calibration.
///
/// Maps a physical parameter set and a forcing series onto a simulated
/// streamflow series of the same length.
pub trait Simulator: Send + Sync {
    fn simulate(
        &self,
        params: &XajParams,
        forcing: Forcing<'_>,
        initial_state: &InitialState,
    ) -> Result<Vec<f64>, String>;
}
