/// XAJ numerical constants and default calibration ranges.

// -- Model contract constants --

/// Parameter names in canonical (gene) order.
pub const PARAM_NAMES: &[&str] = &[
    "B", "IM", "UM", "LM", "DM", "C", "SM", "EX", "KI", "KG", "CS", "CI", "CG",
];

/// Number of calibrated parameters.
pub const N_PARAMS: usize = 13;

/// Upper bound enforced on KI + KG so that free water never drains completely in one step.
pub const MAX_KI_PLUS_KG: f64 = 0.99;

/// Lower bound on the runoff-producing area fraction.
pub const MIN_RUNOFF_AREA: f64 = 1e-3;

// -- Default calibration ranges [lower, upper] --

/// Exponent of the tension water capacity curve [-].
pub const B_RANGE: [f64; 2] = [0.1, 0.4];
/// Impervious area fraction [-].
pub const IM_RANGE: [f64; 2] = [0.01, 0.04];
/// Upper layer tension water capacity [mm].
pub const UM_RANGE: [f64; 2] = [10.0, 20.0];
/// Lower layer tension water capacity [mm].
pub const LM_RANGE: [f64; 2] = [60.0, 90.0];
/// Deep layer tension water capacity [mm].
pub const DM_RANGE: [f64; 2] = [50.0, 90.0];
/// Deep layer evapotranspiration coefficient [-].
pub const C_RANGE: [f64; 2] = [0.1, 0.2];
/// Areal mean free water capacity [mm].
pub const SM_RANGE: [f64; 2] = [5.0, 60.0];
/// Exponent of the free water capacity curve [-].
pub const EX_RANGE: [f64; 2] = [1.0, 1.5];
/// Free water outflow coefficient to interflow [-].
pub const KI_RANGE: [f64; 2] = [0.0, 0.7];
/// Free water outflow coefficient to groundwater [-].
pub const KG_RANGE: [f64; 2] = [0.0, 0.7];
/// Channel recession constant [-].
pub const CS_RANGE: [f64; 2] = [0.0, 1.0];
/// Interflow recession constant [-].
pub const CI_RANGE: [f64; 2] = [0.0, 0.9];
/// Groundwater recession constant [-].
pub const CG_RANGE: [f64; 2] = [0.95, 0.998];
