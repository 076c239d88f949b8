#![allow(non_snake_case)]

pub mod data;
pub mod experiment;
pub mod ga;
pub mod individual;
pub mod metrics;
pub mod param;
pub mod population;
pub mod traits;
pub mod utils;
pub mod xaj;

use crate::experiment::Experiment;
use crate::ga::ga;
use crate::traits::Simulator;
use chrono::Local;
use data::Data;
use param::Param;
use xaj::Xaj;

use log::{debug, info};

use std::error::Error;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Crate version and git short hash, `x.y.z#sha`
pub fn version() -> String {
    format!(
        "{}#{}",
        env!("CARGO_PKG_VERSION"),
        option_env!("XAJCAL_GIT_SHA").unwrap_or("unknown")
    )
}

/// File name of `save_exp` without directory nor extension, `xajcal` if empty
fn experiment_stem(save_exp: &str) -> &str {
    Path::new(save_exp)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("xajcal")
}

/// Load the files named in `param`, then calibrate the XAJ model on them
pub fn run(param: &Param, running: Arc<AtomicBool>) -> Result<Experiment, Box<dyn Error>> {
    // Load train data
    let mut data = Data::new();
    data.load_data(&param.data.precip, &param.data.pet, &param.data.qobs)?;
    if !param.data.basins.is_empty() {
        data = data.subset(&param.data.basins)?;
    }

    // Loading test data
    let test_data = if !param.data.precip_test.is_empty() {
        debug!("Loading test data...");
        let mut td = Data::new();
        td.load_data(&param.data.precip_test, &param.data.pet_test, &param.data.qobs_test)?;
        let td = td.subset(&data.basins)?;
        Some(td)
    } else {
        None
    };

    run_on_data(&data, test_data.as_ref(), &Xaj, param, running)
}

/// Calibrate on already loaded data with any simulator
pub fn run_on_data(
    data: &Data,
    test_data: Option<&Data>,
    simulator: &dyn Simulator,
    param: &Param,
    running: Arc<AtomicBool>,
) -> Result<Experiment, Box<dyn Error>> {
    let start = std::time::Instant::now();
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    if data.n_basins == 0 {
        return Err("No basin to calibrate".into());
    }
    data.check_scoring_window(param.data.warmup)
        .map_err(|e| format!("Calibration data: {}", e))?;
    if let Some(test_data) = test_data {
        if !data.check_compatibility(test_data) {
            return Err("Test data do not hold the calibration basins".into());
        }
        test_data
            .check_scoring_window(param.data.warmup)
            .map_err(|e| format!("Test data: {}", e))?;
    }

    cinfo!(param.general.display_colorful, "\x1b[2;97m{:?}\x1b[0m", data);

    // Launch training
    let collection = if param.general.thread_number > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(param.general.thread_number)
            .build()?;
        pool.install(|| ga(data, simulator, &mut None, param, running))
    } else {
        ga(data, simulator, &mut None, param, running)
    };
    let final_population = collection.last().cloned();

    let exec_time = start.elapsed().as_secs_f64();
    info!("Calibration done in {:.2}s", exec_time);

    let mut exp = Experiment {
        id: format!("{}_{}", experiment_stem(&param.general.save_exp), timestamp),
        version: version(),
        timestamp,

        parameters: param.clone(),
        train_data: data.clone(),
        test_data: test_data.cloned(),

        collection,
        final_population,
        best: None,

        execution_time: exec_time,
    };

    exp.compute_best(simulator)?;

    Ok(exp)
}
