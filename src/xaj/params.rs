/// XAJ physical parameters and their calibration ranges.
use super::constants::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XajParams {
    pub b: f64,
    pub im: f64,
    pub um: f64,
    pub lm: f64,
    pub dm: f64,
    pub c: f64,
    pub sm: f64,
    pub ex: f64,
    pub ki: f64,
    pub kg: f64,
    pub cs: f64,
    pub ci: f64,
    pub cg: f64,
}

impl XajParams {
    /// Create XajParams from a 13-element slice in `PARAM_NAMES` order.
    pub fn from_array(arr: &[f64]) -> Result<Self, String> {
        if arr.len() != N_PARAMS {
            return Err(format!(
                "expected {} parameters, got {}",
                N_PARAMS,
                arr.len()
            ));
        }
        Ok(Self {
            b: arr[0],
            im: arr[1],
            um: arr[2],
            lm: arr[3],
            dm: arr[4],
            c: arr[5],
            sm: arr[6],
            ex: arr[7],
            ki: arr[8],
            kg: arr[9],
            cs: arr[10],
            ci: arr[11],
            cg: arr[12],
        })
    }

    pub fn to_array(&self) -> [f64; N_PARAMS] {
        [
            self.b, self.im, self.um, self.lm, self.dm, self.c, self.sm, self.ex, self.ki,
            self.kg, self.cs, self.ci, self.cg,
        ]
    }

    /// Total tension water capacity WM = UM + LM + DM [mm].
    pub fn wm(&self) -> f64 {
        self.um + self.lm + self.dm
    }

    /// Check physical consistency before a simulation.
    pub fn check(&self) -> Result<(), String> {
        for (name, value) in PARAM_NAMES.iter().zip(self.to_array()) {
            if !value.is_finite() {
                return Err(format!("{} = {} is not finite", name, value));
            }
            if value < 0.0 {
                return Err(format!("{} = {} must be non-negative", name, value));
            }
        }
        if self.wm() <= 0.0 {
            return Err(format!(
                "tension water capacity UM+LM+DM = {} must be positive",
                self.wm()
            ));
        }
        if self.im >= 1.0 {
            return Err(format!("IM = {} must be lower than 1", self.im));
        }
        for (name, value) in [("CS", self.cs), ("CI", self.ci), ("CG", self.cg)] {
            if value > 1.0 {
                return Err(format!("{} = {} must be in [0, 1]", name, value));
            }
        }
        Ok(())
    }

    /// KI and KG, rescaled so that their sum stays below `MAX_KI_PLUS_KG`.
    pub fn outflow_coefficients(&self) -> (f64, f64) {
        let sum = self.ki + self.kg;
        if sum >= 1.0 {
            let factor = MAX_KI_PLUS_KG / sum;
            (self.ki * factor, self.kg * factor)
        } else {
            (self.ki, self.kg)
        }
    }
}

impl fmt::Display for XajParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = PARAM_NAMES
            .iter()
            .zip(self.to_array())
            .map(|(name, value)| format!("{}={:.4}", name, value))
            .collect::<Vec<String>>()
            .join(" ");
        write!(f, "{}", text)
    }
}

/// Calibration range [lower, upper] of every XAJ parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct ParamRanges {
    #[serde(default = "b_range")]
    pub B: [f64; 2],
    #[serde(default = "im_range")]
    pub IM: [f64; 2],
    #[serde(default = "um_range")]
    pub UM: [f64; 2],
    #[serde(default = "lm_range")]
    pub LM: [f64; 2],
    #[serde(default = "dm_range")]
    pub DM: [f64; 2],
    #[serde(default = "c_range")]
    pub C: [f64; 2],
    #[serde(default = "sm_range")]
    pub SM: [f64; 2],
    #[serde(default = "ex_range")]
    pub EX: [f64; 2],
    #[serde(default = "ki_range")]
    pub KI: [f64; 2],
    #[serde(default = "kg_range")]
    pub KG: [f64; 2],
    #[serde(default = "cs_range")]
    pub CS: [f64; 2],
    #[serde(default = "ci_range")]
    pub CI: [f64; 2],
    #[serde(default = "cg_range")]
    pub CG: [f64; 2],
}

impl Default for ParamRanges {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl ParamRanges {
    pub fn to_array(&self) -> [[f64; 2]; N_PARAMS] {
        [
            self.B, self.IM, self.UM, self.LM, self.DM, self.C, self.SM, self.EX, self.KI,
            self.KG, self.CS, self.CI, self.CG,
        ]
    }

    /// Map normalized genes onto physical values: `(hi - lo) * gene + lo`.
    pub fn denormalize(&self, genes: &[f64]) -> Result<XajParams, String> {
        if genes.len() != N_PARAMS {
            return Err(format!(
                "expected {} genes, got {}",
                N_PARAMS,
                genes.len()
            ));
        }
        let values: Vec<f64> = self
            .to_array()
            .iter()
            .zip(genes)
            .map(|([lo, hi], gene)| (hi - lo) * gene + lo)
            .collect();
        XajParams::from_array(&values)
    }
}

fn b_range() -> [f64; 2] {
    B_RANGE
}
fn im_range() -> [f64; 2] {
    IM_RANGE
}
fn um_range() -> [f64; 2] {
    UM_RANGE
}
fn lm_range() -> [f64; 2] {
    LM_RANGE
}
fn dm_range() -> [f64; 2] {
    DM_RANGE
}
fn c_range() -> [f64; 2] {
    C_RANGE
}
fn sm_range() -> [f64; 2] {
    SM_RANGE
}
fn ex_range() -> [f64; 2] {
    EX_RANGE
}
fn ki_range() -> [f64; 2] {
    KI_RANGE
}
fn kg_range() -> [f64; 2] {
    KG_RANGE
}
fn cs_range() -> [f64; 2] {
    CS_RANGE
}
fn ci_range() -> [f64; 2] {
    CI_RANGE
}
fn cg_range() -> [f64; 2] {
    CG_RANGE
}
