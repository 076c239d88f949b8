//! Goodness-of-fit scores between observed and simulated streamflow.
//!
//! Every score drops the pairs whose observed value is NaN (missing
//! gauge record) before computing. With no pair left the score is NaN.

use crate::param::FitFunction;
use serde::{Deserialize, Serialize};

/// Keep only the pairs with an observed value.
fn paired(observed: &[f64], simulated: &[f64]) -> (Vec<f64>, Vec<f64>) {
    observed
        .iter()
        .zip(simulated)
        .filter(|(o, _)| !o.is_nan())
        .map(|(o, s)| (*o, *s))
        .unzip()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Root Mean Square Error. Range: [0, inf), 0 = perfect.
pub fn rmse(observed: &[f64], simulated: &[f64]) -> f64 {
    let (obs, sim) = paired(observed, simulated);
    if obs.is_empty() {
        return f64::NAN;
    }
    let mse = obs
        .iter()
        .zip(&sim)
        .map(|(o, s)| (o - s).powi(2))
        .sum::<f64>()
        / obs.len() as f64;
    mse.sqrt()
}

/// Mean Absolute Error. Range: [0, inf), 0 = perfect.
pub fn mae(observed: &[f64], simulated: &[f64]) -> f64 {
    let (obs, sim) = paired(observed, simulated);
    if obs.is_empty() {
        return f64::NAN;
    }
    obs.iter().zip(&sim).map(|(o, s)| (o - s).abs()).sum::<f64>() / obs.len() as f64
}

/// Nash-Sutcliffe Efficiency. Range: (-inf, 1], 1 = perfect.
///
/// A constant observed series has no variance to explain and scores -inf.
pub fn nse(observed: &[f64], simulated: &[f64]) -> f64 {
    let (obs, sim) = paired(observed, simulated);
    if obs.is_empty() {
        return f64::NAN;
    }
    let mean_obs = mean(&obs);
    let numerator: f64 = obs.iter().zip(&sim).map(|(o, s)| (o - s).powi(2)).sum();
    let denominator: f64 = obs.iter().map(|o| (o - mean_obs).powi(2)).sum();
    if denominator == 0.0 {
        return f64::NEG_INFINITY;
    }
    1.0 - numerator / denominator
}

/// Kling-Gupta Efficiency (2009). Range: (-inf, 1], 1 = perfect.
pub fn kge(observed: &[f64], simulated: &[f64]) -> f64 {
    let (obs, sim) = paired(observed, simulated);
    if obs.is_empty() {
        return f64::NAN;
    }
    let n = obs.len() as f64;
    let mean_o = mean(&obs);
    let mean_s = mean(&sim);
    let std_o = (obs.iter().map(|o| (o - mean_o).powi(2)).sum::<f64>() / n).sqrt();
    let std_s = (sim.iter().map(|s| (s - mean_s).powi(2)).sum::<f64>() / n).sqrt();

    let r = if std_o == 0.0 || std_s == 0.0 {
        0.0
    } else {
        obs.iter()
            .zip(&sim)
            .map(|(o, s)| (o - mean_o) * (s - mean_s))
            .sum::<f64>()
            / (n * std_o * std_s)
    };
    let alpha = if std_o == 0.0 { 0.0 } else { std_s / std_o };
    let beta = if mean_o == 0.0 { 0.0 } else { mean_s / mean_o };

    1.0 - ((r - 1.0).powi(2) + (alpha - 1.0).powi(2) + (beta - 1.0).powi(2)).sqrt()
}

/// Percent Bias. Optimal = 0, positive = overestimation.
pub fn pbias(observed: &[f64], simulated: &[f64]) -> f64 {
    let (obs, sim) = paired(observed, simulated);
    if obs.is_empty() {
        return f64::NAN;
    }
    let sum_obs: f64 = obs.iter().sum();
    if sum_obs == 0.0 {
        return f64::INFINITY;
    }
    let diff_sum: f64 = sim.iter().zip(&obs).map(|(s, o)| s - o).sum();
    100.0 * diff_sum / sum_obs
}

/// Average of per-basin scores. Any non-finite basin score makes the mean
/// non-finite too, so a basin cannot hide a failed simulation.
pub fn basin_mean(per_basin: &[f64]) -> f64 {
    if per_basin.is_empty() {
        return f64::NAN;
    }
    mean(per_basin)
}

/// Every score of one simulation (or their average over basins)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(with = "crate::utils::serde_nan")]
    pub rmse: f64,
    #[serde(with = "crate::utils::serde_nan")]
    pub mae: f64,
    #[serde(with = "crate::utils::serde_nan")]
    pub nse: f64,
    #[serde(with = "crate::utils::serde_nan")]
    pub kge: f64,
    #[serde(with = "crate::utils::serde_nan")]
    pub pbias: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::failed()
    }
}

impl Metrics {
    pub fn compute(observed: &[f64], simulated: &[f64]) -> Metrics {
        Metrics {
            rmse: rmse(observed, simulated),
            mae: mae(observed, simulated),
            nse: nse(observed, simulated),
            kge: kge(observed, simulated),
            pbias: pbias(observed, simulated),
        }
    }

    /// Scores of a simulation that could not run
    pub fn failed() -> Metrics {
        Metrics {
            rmse: f64::NAN,
            mae: f64::NAN,
            nse: f64::NAN,
            kge: f64::NAN,
            pbias: f64::NAN,
        }
    }

    pub fn basin_mean(per_basin: &[Metrics]) -> Metrics {
        let column = |f: fn(&Metrics) -> f64| -> f64 {
            basin_mean(&per_basin.iter().map(f).collect::<Vec<f64>>())
        };
        Metrics {
            rmse: column(|m| m.rmse),
            mae: column(|m| m.mae),
            nse: column(|m| m.nse),
            kge: column(|m| m.kge),
            pbias: column(|m| m.pbias),
        }
    }

    /// Calibration objective where higher is better. Error scores are negated.
    pub fn objective(&self, fit: &FitFunction) -> f64 {
        match fit {
            FitFunction::rmse => -self.rmse,
            FitFunction::mae => -self.mae,
            FitFunction::nse => self.nse,
            FitFunction::kge => self.kge,
            FitFunction::pbias => -self.pbias.abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // --- RMSE / MAE ---

    #[test]
    fn rmse_perfect_match() {
        let obs = [1.0, 2.0, 3.0];
        assert_eq!(rmse(&obs, &obs), 0.0);
    }

    #[test]
    fn rmse_known_value() {
        // errors 1, -1, 2, 0 -> mse = 6/4
        let obs = [1.0, 2.0, 3.0, 4.0];
        let sim = [2.0, 1.0, 5.0, 4.0];
        assert_relative_eq!(rmse(&obs, &sim), 1.5f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn rmse_skips_missing_observations() {
        let obs = [1.0, f64::NAN, 3.0];
        let sim = [1.0, 100.0, 5.0];
        assert_relative_eq!(rmse(&obs, &sim), 2.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn rmse_all_missing_is_nan() {
        assert!(rmse(&[f64::NAN, f64::NAN], &[1.0, 2.0]).is_nan());
    }

    #[test]
    fn mae_known_value() {
        let obs = [1.0, 2.0, 3.0, 4.0];
        let sim = [2.0, 1.0, 5.0, 4.0];
        assert_relative_eq!(mae(&obs, &sim), 1.0);
    }

    // --- NSE ---

    #[test]
    fn nse_perfect_match() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(nse(&obs, &obs), 1.0);
    }

    #[test]
    fn nse_mean_simulation_gives_zero() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sim = [3.0; 5];
        assert_relative_eq!(nse(&obs, &sim), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn nse_known_value() {
        // num = 0.11, den = 10
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sim = [1.1, 2.2, 2.8, 4.1, 4.9];
        assert_relative_eq!(nse(&obs, &sim), 0.989, epsilon = 1e-10);
    }

    #[test]
    fn nse_constant_observed_returns_neg_inf() {
        let obs = [5.0; 5];
        let sim = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(nse(&obs, &sim), f64::NEG_INFINITY);
    }

    #[test]
    fn nse_ignores_missing_observations() {
        let obs = [1.0, 2.0, f64::NAN, 3.0, 4.0, 5.0];
        let sim = [1.1, 2.2, -50.0, 2.8, 4.1, 4.9];
        assert_relative_eq!(nse(&obs, &sim), 0.989, epsilon = 1e-10);
    }

    // --- KGE ---

    #[test]
    fn kge_perfect_match() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(kge(&obs, &obs), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn kge_bias_reduces_score() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sim = [2.0, 3.0, 4.0, 5.0, 6.0];
        // r = 1, alpha = 1, beta = 4/3
        assert_relative_eq!(kge(&obs, &sim), 1.0 - 1.0 / 3.0, epsilon = 1e-10);
    }

    #[test]
    fn kge_zero_variance_observed_is_finite() {
        let obs = [3.0; 5];
        let sim = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(kge(&obs, &sim).is_finite());
    }

    // --- PBIAS ---

    #[test]
    fn pbias_overestimation_is_positive() {
        let obs = [1.0, 2.0, 3.0, 4.0];
        let sim = [1.5, 2.5, 3.5, 4.5];
        assert_relative_eq!(pbias(&obs, &sim), 20.0, epsilon = 1e-10);
    }

    #[test]
    fn pbias_zero_observed_sum_is_inf() {
        assert_eq!(pbias(&[0.0, 0.0], &[1.0, 1.0]), f64::INFINITY);
    }

    // --- basin mean ---

    #[test]
    fn basin_mean_averages() {
        assert_relative_eq!(basin_mean(&[0.5, 0.7, 0.9]), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn basin_mean_propagates_failure() {
        assert!(basin_mean(&[0.5, f64::NEG_INFINITY]).is_infinite());
        assert!(basin_mean(&[]).is_nan());
    }

    // --- Metrics ---

    #[test]
    fn metrics_objective_is_higher_for_better_fit() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let good = Metrics::compute(&obs, &[1.1, 2.0, 3.1, 3.9, 5.0]);
        let bad = Metrics::compute(&obs, &[2.0, 3.5, 1.0, 6.0, 2.0]);
        for fit in [
            FitFunction::rmse,
            FitFunction::mae,
            FitFunction::nse,
            FitFunction::kge,
            FitFunction::pbias,
        ] {
            assert!(
                good.objective(&fit) > bad.objective(&fit),
                "{:?} should prefer the closer simulation",
                fit
            );
        }
    }

    #[test]
    fn metrics_basin_mean_is_columnwise() {
        let a = Metrics { rmse: 1.0, mae: 0.5, nse: 0.8, kge: 0.7, pbias: 10.0 };
        let b = Metrics { rmse: 3.0, mae: 1.5, nse: 0.6, kge: 0.5, pbias: -10.0 };
        let m = Metrics::basin_mean(&[a, b]);
        assert_relative_eq!(m.rmse, 2.0);
        assert_relative_eq!(m.mae, 1.0);
        assert_relative_eq!(m.nse, 0.7, epsilon = 1e-12);
        assert_relative_eq!(m.kge, 0.6, epsilon = 1e-12);
        assert_relative_eq!(m.pbias, 0.0);
    }

    #[test]
    fn failed_metrics_give_non_finite_objective() {
        assert!(!Metrics::failed().objective(&FitFunction::rmse).is_finite());
    }
}
