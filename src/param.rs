use crate::xaj::{InitialState, ParamRanges, PARAM_NAMES};
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

/// Calibration objective, averaged across basins after the warm-up period
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[allow(non_camel_case_types)]
pub enum FitFunction {
    rmse,
    mae,
    nse,
    kge,
    pbias,
}

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub ga: GA,
    #[serde(default)]
    pub xaj: Xaj,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    #[serde(default = "uzero_default")]
    pub thread_number: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "fit_default")]
    pub fit: FitFunction,
    #[serde(default = "n_model_to_display_default")]
    pub n_model_to_display: u32,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "false_default")]
    pub keep_trace: bool,
    #[serde(default = "save_experiment_default")]
    pub save_exp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Data {
    #[serde(default = "empty_string")]
    pub precip: String,
    #[serde(default = "empty_string")]
    pub pet: String,
    #[serde(default = "empty_string")]
    pub qobs: String,
    #[serde(default = "empty_string")]
    pub precip_test: String,
    #[serde(default = "empty_string")]
    pub pet_test: String,
    #[serde(default = "empty_string")]
    pub qobs_test: String,
    #[serde(default = "warmup_default")]
    pub warmup: usize,
    #[serde(default = "basins_default")]
    pub basins: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GA {
    #[serde(default = "pop_size_default")]
    pub population_size: u32,
    #[serde(default = "max_epochs_default")]
    pub max_epochs: usize,
    #[serde(default = "uzero_default")]
    pub min_epochs: usize,
    #[serde(default = "uzero_default")]
    pub max_age_best_model: usize,
    #[serde(default = "tournament_size_default")]
    pub tournament_size: usize,
    #[serde(default = "zero_default")]
    pub select_elite_pct: f64,
    #[serde(default = "half_default")]
    pub crossover_prob: f64,
    #[serde(default = "half_default")]
    pub mutation_prob: f64,
    #[serde(default = "zero_default")]
    pub mutation_mu: f64,
    #[serde(default = "one_default")]
    pub mutation_sigma: f64,
    #[serde(default = "mutation_indpb_default")]
    pub mutation_indpb: f64,
    #[serde(default = "zero_default")]
    pub gene_min: f64,
    #[serde(default = "one_default")]
    pub gene_max: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Xaj {
    #[serde(default)]
    pub ranges: ParamRanges,
    #[serde(default)]
    pub initial_state: InitialState,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for GA {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Xaj {
    fn default() -> Self {
        Xaj {
            ranges: ParamRanges::default(),
            initial_state: InitialState::default(),
        }
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

pub fn get(param_file: String) -> Result<Param, Box<dyn Error>> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);

    let mut config: Param = serde_yaml::from_reader(param_reader)?;

    let _ = validate(&mut config)?;

    Ok(config)
}

pub fn validate(param: &mut Param) -> Result<(), String> {
    if param.general.log_base.len() > 0 {
        param.general.display_colorful = false;
    }

    let test_files = [
        &param.data.precip_test,
        &param.data.pet_test,
        &param.data.qobs_test,
    ];
    let provided = test_files.iter().filter(|f| !f.is_empty()).count();
    if provided != 0 && provided != test_files.len() {
        return Err(format!(
            "precip_test, pet_test and qobs_test must be provided together."
        ));
    }

    if param.data.warmup == 0 {
        warn!("No warm-up period: initial states will weigh on the calibration objective.");
    }

    validate_ga(param)?;
    validate_ranges(param)?;
    param.xaj.initial_state.check()?;
    Ok(())
}

fn validate_ga(param: &mut Param) -> Result<(), String> {
    if param.ga.population_size < 2 {
        return Err(format!(
            "Invalid population_size={}. At least 2 individuals are needed for crossover.",
            param.ga.population_size
        ));
    }

    if param.ga.tournament_size == 0 {
        return Err(format!("Invalid tournament_size=0. Must be >= 1."));
    }

    for (name, value) in [
        ("crossover_prob", param.ga.crossover_prob),
        ("mutation_prob", param.ga.mutation_prob),
        ("mutation_indpb", param.ga.mutation_indpb),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!(
                "Invalid {}={:.3}. Must be in range [0, 1].",
                name, value
            ));
        }
    }

    if param.ga.mutation_sigma < 0.0 {
        return Err(format!(
            "Invalid mutation_sigma={:.3}. Must be >= 0.",
            param.ga.mutation_sigma
        ));
    }

    if !(0.0..=100.0).contains(&param.ga.select_elite_pct) {
        return Err(format!(
            "Invalid select_elite_pct={:.3}. Must be in range [0, 100].",
            param.ga.select_elite_pct
        ));
    }

    if param.ga.gene_min >= param.ga.gene_max {
        return Err(format!(
            "Invalid gene bounds [{}, {}]. gene_min must be lower than gene_max.",
            param.ga.gene_min, param.ga.gene_max
        ));
    }

    if param.ga.max_age_best_model > 0 && param.ga.min_epochs > param.ga.max_epochs {
        warn!(
            "min_epochs={} is above max_epochs={}: the best-model age criterion will never be used.",
            param.ga.min_epochs, param.ga.max_epochs
        );
    }

    Ok(())
}

fn validate_ranges(param: &mut Param) -> Result<(), String> {
    for (name, [lo, hi]) in PARAM_NAMES.iter().zip(param.xaj.ranges.to_array()) {
        if !lo.is_finite() || !hi.is_finite() || lo > hi {
            return Err(format!(
                "Invalid range for {}: [{}, {}]. Bounds must be finite with lower <= upper.",
                name, lo, hi
            ));
        }
    }

    let [_, ki_max] = param.xaj.ranges.KI;
    let [_, kg_max] = param.xaj.ranges.KG;
    if ki_max + kg_max >= 1.0 {
        warn!(
            "KI and KG upper bounds sum to {:.3}: candidates with KI+KG >= 1 are rescaled to 0.99 during simulation.",
            ki_max + kg_max
        );
    }

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    4815162342
}
fn empty_string() -> String {
    "".to_string()
}
fn max_epochs_default() -> usize {
    40
}
fn warmup_default() -> usize {
    365
}
fn basins_default() -> Vec<String> {
    Vec::new()
}
fn save_experiment_default() -> String {
    "".to_string()
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn fit_default() -> FitFunction {
    FitFunction::rmse
}
fn n_model_to_display_default() -> u32 {
    10
}
fn false_default() -> bool {
    false
}
fn true_default() -> bool {
    true
}
fn zero_default() -> f64 {
    0.0
}
fn uzero_default() -> usize {
    0
}
fn half_default() -> f64 {
    0.5
}
fn one_default() -> f64 {
    1.0
}
fn tournament_size_default() -> usize {
    3
}
fn mutation_indpb_default() -> f64 {
    0.1
}
fn pop_size_default() -> u32 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_param_matches_reference_setup() {
        let param = Param::default();
        assert_eq!(param.ga.population_size, 50);
        assert_eq!(param.ga.max_epochs, 40);
        assert_eq!(param.ga.tournament_size, 3);
        assert_eq!(param.ga.crossover_prob, 0.5);
        assert_eq!(param.ga.mutation_prob, 0.5);
        assert_eq!(param.ga.mutation_sigma, 1.0);
        assert_eq!(param.ga.mutation_indpb, 0.1);
        assert_eq!(param.ga.gene_min, 0.0);
        assert_eq!(param.ga.gene_max, 1.0);
        assert_eq!(param.data.warmup, 365);
        assert_eq!(param.general.fit, FitFunction::rmse);
        assert_eq!(param.xaj.ranges.CG, [0.95, 0.998]);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "
general:
  seed: 7
  fit: nse
ga:
  population_size: 20
xaj:
  ranges:
    SM: [10.0, 40.0]
";
        let mut param: Param = serde_yaml::from_str(yaml).unwrap();
        assert!(validate(&mut param).is_ok());
        assert_eq!(param.general.seed, 7);
        assert_eq!(param.general.fit, FitFunction::nse);
        assert_eq!(param.ga.population_size, 20);
        assert_eq!(param.ga.max_epochs, 40);
        assert_eq!(param.xaj.ranges.SM, [10.0, 40.0]);
        assert_eq!(param.xaj.ranges.B, [0.1, 0.4]);
    }

    #[test]
    fn test_validate_rejects_probability_out_of_range() {
        let mut param = Param::default();
        param.ga.crossover_prob = 1.5;
        let err = validate(&mut param).unwrap_err();
        assert!(err.contains("crossover_prob"));
    }

    #[test]
    fn test_validate_rejects_tiny_population() {
        let mut param = Param::default();
        param.ga.population_size = 1;
        assert!(validate(&mut param).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut param = Param::default();
        param.xaj.ranges.UM = [20.0, 10.0];
        let err = validate(&mut param).unwrap_err();
        assert!(err.contains("UM"));
    }

    #[test]
    fn test_validate_rejects_inverted_gene_bounds() {
        let mut param = Param::default();
        param.ga.gene_min = 1.0;
        param.ga.gene_max = 0.0;
        assert!(validate(&mut param).is_err());
    }

    #[test]
    fn test_validate_rejects_null_initial_runoff_area() {
        let mut param = Param::default();
        param.xaj.initial_state.fr = 0.0;
        let err = validate(&mut param).unwrap_err();
        assert!(err.contains("initial fr"));
    }

    #[test]
    fn test_validate_requires_all_test_files() {
        let mut param = Param::default();
        param.data.precip_test = "p.tsv".to_string();
        assert!(validate(&mut param).is_err());

        param.data.pet_test = "e.tsv".to_string();
        param.data.qobs_test = "q.tsv".to_string();
        assert!(validate(&mut param).is_ok());
    }

    #[test]
    fn test_log_base_disables_colors() {
        let mut param = Param::default();
        param.general.log_base = "calibration".to_string();
        validate(&mut param).unwrap();
        assert!(!param.general.display_colorful);
    }
}
