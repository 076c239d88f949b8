use crate::data::Data;
use crate::individual::{BasinMetrics, Individual};
use crate::metrics::Metrics;
use crate::param::Param;
use crate::population::Population;
use crate::traits::Simulator;
use crate::xaj::{Xaj, XajParams};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;

/////////////////////////////////////////////////////////////
// Experiment structures and methods
/////////////////////////////////////////////////////////////

/// Calibrated parameter set and its scores
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BestModel {
    pub individual: Individual,
    /// Physical parameters decoded from the genes
    pub params: XajParams,
    pub calibration: Vec<BasinMetrics>,
    pub calibration_mean: Metrics,
    pub validation: Option<Vec<BasinMetrics>>,
    pub validation_mean: Option<Metrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    pub id: String,
    pub timestamp: String,
    /// Crate version and git short hash, `x.y.z#sha`
    pub version: String,
    pub parameters: Param,

    pub train_data: Data,
    pub test_data: Option<Data>,

    /// Every generation when `keep_trace`, otherwise the last one
    pub collection: Vec<Population>,
    pub final_population: Option<Population>,
    pub best: Option<BestModel>,

    pub execution_time: f64,
}

impl Experiment {
    /// Decode and score the best individual of the final population on the
    /// calibration data, and on the test data when present.
    pub fn compute_best(&mut self, simulator: &dyn Simulator) -> Result<(), String> {
        let individual = self
            .final_population
            .as_ref()
            .and_then(|pop| pop.best())
            .ok_or("No final population available")?
            .clone();

        let xaj = &self.parameters.xaj;
        let warmup = self.parameters.data.warmup;
        let params = individual.denormalize(&xaj.ranges)?;

        let calibration = individual.score_basins(
            &self.train_data,
            simulator,
            &xaj.ranges,
            &xaj.initial_state,
            warmup,
        )?;
        let calibration_mean = mean_of(&calibration);

        let (validation, validation_mean) = match &self.test_data {
            Some(test_data) => {
                let scores = individual.score_basins(
                    test_data,
                    simulator,
                    &xaj.ranges,
                    &xaj.initial_state,
                    warmup,
                )?;
                let mean = mean_of(&scores);
                (Some(scores), Some(mean))
            }
            None => (None, None),
        };

        self.best = Some(BestModel {
            individual,
            params,
            calibration,
            calibration_mean,
            validation,
            validation_mean,
        });
        Ok(())
    }

    /// Displays the results of the experiment.
    ///
    /// # Returns
    ///
    /// String containing the formatted experiment results.
    pub fn display_results(&self) -> String {
        let mut text = String::new();
        text.push_str(&format!(
            "\n=============== Experiment {} ===============\n\n",
            self.id
        ));
        text.push_str(&format!("xajcal version: v{}\n", self.version));
        text.push_str(&format!("Timestamp: {}\n", self.timestamp));
        text.push_str(&format!("Execution time: {:.2}s\n", self.execution_time));
        text.push_str(&format!(
            "Objective: {:?} | generations traced: {}\n",
            self.parameters.general.fit,
            self.collection.len()
        ));
        text.push_str(&format!("Calibration {}\n", self.train_data));
        if let Some(test_data) = &self.test_data {
            text.push_str(&format!("Validation {}\n", test_data));
        }
        text.push_str("Experiment results:\n\n");

        match &self.final_population {
            Some(pop) => text.push_str(&format!("{}\n", pop.display(&self.parameters))),
            None => text.push_str("No final population available\n"),
        }

        if let Some(best) = &self.best {
            text.push_str("\x1b[1;93mBest parameter set\x1b[0m\n");
            text.push_str(&format!("  {}\n", best.params));
            text.push_str(&format!(
                "\x1b[1;96mCalibration\x1b[0m  {}\n",
                display_metrics(&best.calibration_mean)
            ));
            for score in &best.calibration {
                text.push_str(&format!("  {:<12} {}\n", score.basin, display_metrics(&score.metrics)));
            }
            if let (Some(validation), Some(mean)) = (&best.validation, &best.validation_mean) {
                text.push_str(&format!(
                    "\x1b[1;96mValidation\x1b[0m   {}\n",
                    display_metrics(mean)
                ));
                for score in validation {
                    text.push_str(&format!("  {:<12} {}\n", score.basin, display_metrics(&score.metrics)));
                }
            }
        }

        crate::utils::strip_ansi_if_needed(&text, self.parameters.general.display_colorful)
    }

    /// Scores the best parameter set on another period, with the XAJ model.
    ///
    /// The new files must hold at least the calibrated basins; other columns
    /// are ignored. The same warm-up is applied.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use xajcal::experiment::Experiment;
    /// let experiment = Experiment::load_auto("experiment.mp").unwrap();
    /// let scores = experiment
    ///     .evaluate_on_new_dataset("precip_2015.tsv", "pet_2015.tsv", "qobs_2015.tsv")
    ///     .unwrap();
    /// ```
    pub fn evaluate_on_new_dataset(
        &self,
        precip_path: &str,
        pet_path: &str,
        qobs_path: &str,
    ) -> Result<Vec<BasinMetrics>, Box<dyn Error>> {
        let best = self
            .best
            .as_ref()
            .ok_or("No calibrated model in this experiment")?;

        let mut new_data = Data::new();
        new_data.load_data(precip_path, pet_path, qobs_path)?;
        let new_data = new_data.subset(&self.train_data.basins)?;
        new_data.check_scoring_window(self.parameters.data.warmup)?;

        let xaj = &self.parameters.xaj;
        let scores = best.individual.score_basins(
            &new_data,
            &Xaj,
            &xaj.ranges,
            &xaj.initial_state,
            self.parameters.data.warmup,
        )?;
        info!(
            "New dataset ({} steps): {}",
            new_data.n_steps,
            display_metrics(&mean_of(&scores))
        );
        Ok(scores)
    }

    /// Saves the experiment in a suitable format based on file extension.
    pub fn save_auto<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => self.save_json(path),
            "yaml" | "yml" => self.save_yaml(path),
            "msgpack" | "mp" => self.save_messagepack(path),
            "bin" | "bincode" => self.save_bincode(path),
            _ => {
                warn!("Unknown format. Saving experiment in msgpack.");
                let mp_path = path.with_extension("mp");
                self.save_messagepack(mp_path)
            }
        }
    }

    /// Saves to JSON (human readable, but may have slight inaccuracies for decimal values)
    fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn save_yaml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves as MessagePack (language interoperable)
    fn save_messagepack<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        use rmp_serde::Serializer;

        let mut buf = Vec::new();
        self.serialize(&mut Serializer::new(&mut buf).with_struct_map())?;
        std::fs::write(path, buf)?;
        Ok(())
    }

    /// Saves as Bincode (compact binary, Rust-only)
    fn save_bincode<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let encoded = bincode::serialize(self)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }

    /// Loads the experiment from a file, automatically detecting the format based on file extension.
    ///
    /// Files without a known extension are tried as MessagePack, Bincode,
    /// then JSON.
    pub fn load_auto<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => Self::load_json(path),
            "yaml" | "yml" => Self::load_yaml(path),
            "msgpack" | "mp" => Self::load_messagepack(path),
            "bin" | "bincode" => Self::load_bincode(path),
            _ => Self::load_with_fallback(path),
        }
    }

    fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let content = std::fs::read_to_string(path)?;
        let experiment: Experiment = serde_json::from_str(&content)?;
        Ok(experiment)
    }

    fn load_yaml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let content = std::fs::read_to_string(path)?;
        let experiment: Experiment = serde_yaml::from_str(&content)?;
        Ok(experiment)
    }

    fn load_messagepack<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let bytes = std::fs::read(path)?;
        let experiment: Experiment = rmp_serde::from_slice(&bytes)?;
        Ok(experiment)
    }

    fn load_bincode<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let bytes = std::fs::read(path)?;
        let experiment: Experiment = bincode::deserialize(&bytes)?;
        Ok(experiment)
    }

    fn load_with_fallback<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref();

        if let Ok(experiment) = Self::load_messagepack(path) {
            return Ok(experiment);
        }

        if let Ok(experiment) = Self::load_bincode(path) {
            return Ok(experiment);
        }

        if let Ok(experiment) = Self::load_json(path) {
            return Ok(experiment);
        }

        Err(format!("Unable to load the experiment {}", path.display()).into())
    }
}

fn mean_of(scores: &[BasinMetrics]) -> Metrics {
    Metrics::basin_mean(&scores.iter().map(|s| s.metrics).collect::<Vec<Metrics>>())
}

fn display_metrics(m: &Metrics) -> String {
    format!(
        "RMSE {:.4} | MAE {:.4} | NSE {:.4} | KGE {:.4} | PBIAS {:.2}%",
        m.rmse, m.mae, m.nse, m.kge, m.pbias
    )
}
