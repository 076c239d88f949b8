use crate::data::Data;
use crate::metrics::Metrics;
use crate::param::Param;
use crate::traits::Simulator;
use crate::xaj::{InitialState, ParamRanges, XajParams, PARAM_NAMES};
use log::{debug, warn};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Candidate parameter set, encoded as normalized genes
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Individual {
    /// Normalized parameter values, one per XAJ parameter in `PARAM_NAMES` order
    pub genes: Vec<f64>,

    /// Fit value of the model (higher is better, -inf when the simulation failed)
    #[serde(with = "crate::utils::serde_fit")]
    pub fit: f64,
    /// Calibration scores averaged over basins, after warm-up
    pub metrics: Metrics,
    /// False once the genes changed since the last evaluation
    pub evaluated: bool,

    /// Iteration of the algorithm that led to the emergence of the model
    pub epoch: usize,
    /// Hashes of the crossover parents, if any
    pub parents: Option<Vec<u64>>,

    /// Identfier hash of the model
    pub hash: u64,
}

/// Scores of one basin
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct BasinMetrics {
    pub basin: String,
    pub metrics: Metrics,
}

impl Individual {
    /// Generates a new empty Individual with default values
    ///
    /// # Examples
    ///
    /// ```
    /// # use xajcal::individual::Individual;
    /// let individual = Individual::new();
    /// assert!(individual.genes.is_empty());
    /// assert!(!individual.evaluated);
    /// ```
    pub fn new() -> Individual {
        Individual {
            genes: Vec::new(),
            fit: f64::NEG_INFINITY,
            metrics: Metrics::failed(),
            evaluated: false,
            epoch: 0,
            parents: None,
            hash: 0,
        }
    }

    pub fn from_genes(genes: Vec<f64>) -> Individual {
        let mut i = Individual::new();
        i.genes = genes;
        i.compute_hash();
        i
    }

    /// Every gene drawn uniformly from [0, 1)
    pub fn random(n_genes: usize, rng: &mut ChaCha8Rng) -> Individual {
        Individual::from_genes((0..n_genes).map(|_| rng.gen::<f64>()).collect())
    }

    /// Computes the hash of the Individual based on the bits of its genes
    pub fn compute_hash(&mut self) {
        let mut hasher = DefaultHasher::new();
        for gene in &self.genes {
            gene.to_bits().hash(&mut hasher);
        }
        self.hash = hasher.finish();
    }

    /// Bounded repair: bring every gene back into [min, max]
    pub fn clip(&mut self, min: f64, max: f64) {
        for gene in self.genes.iter_mut() {
            if *gene > max {
                *gene = max;
            } else if *gene < min {
                *gene = min;
            }
        }
    }

    /// Mark the individual as modified: its fit must be computed again
    pub fn invalidate(&mut self, epoch: usize) {
        self.evaluated = false;
        self.epoch = epoch;
    }

    pub fn denormalize(&self, ranges: &ParamRanges) -> Result<XajParams, String> {
        ranges.denormalize(&self.genes)
    }

    /// Simulate every basin and score it after the warm-up period
    pub fn score_basins(
        &self,
        data: &Data,
        simulator: &dyn Simulator,
        ranges: &ParamRanges,
        initial_state: &InitialState,
        warmup: usize,
    ) -> Result<Vec<BasinMetrics>, String> {
        let params = self.denormalize(ranges)?;
        let mut scores = Vec::with_capacity(data.n_basins);
        for basin in 0..data.n_basins {
            let forcing = data.forcing(basin)?;
            let simulated = simulator.simulate(&params, forcing, initial_state)?;
            if simulated.len() != data.n_steps {
                return Err(format!(
                    "simulated {} steps for basin {}, expected {}",
                    simulated.len(),
                    data.basins[basin],
                    data.n_steps
                ));
            }
            let observed = data.scored_observed(basin, warmup);
            let simulated = &simulated[simulated.len() - observed.len()..];
            scores.push(BasinMetrics {
                basin: data.basins[basin].clone(),
                metrics: Metrics::compute(observed, simulated),
            });
        }
        Ok(scores)
    }

    /// Compute metrics and fit on the calibration data
    pub fn evaluate(&mut self, data: &Data, simulator: &dyn Simulator, param: &Param) {
        match self.score_basins(
            data,
            simulator,
            &param.xaj.ranges,
            &param.xaj.initial_state,
            param.data.warmup,
        ) {
            Ok(scores) => {
                let per_basin: Vec<Metrics> = scores.iter().map(|s| s.metrics).collect();
                self.metrics = Metrics::basin_mean(&per_basin);
                let fit = self.metrics.objective(&param.general.fit);
                self.fit = if fit.is_nan() { f64::NEG_INFINITY } else { fit };
                if !self.fit.is_finite() {
                    debug!("Individual {} has a non-finite fit", self.hash);
                }
            }
            Err(e) => {
                warn!("Simulation failed for individual {}: {}", self.hash, e);
                self.metrics = Metrics::failed();
                self.fit = f64::NEG_INFINITY;
            }
        }
        self.evaluated = true;
    }

    /// Human readable description: scores then physical parameters
    pub fn display(&self, ranges: &ParamRanges) -> String {
        let scores = format!(
            "fit {:.4} | RMSE {:.4} | MAE {:.4} | NSE {:.4} | KGE {:.4} | PBIAS {:.2}% | epoch {}",
            self.fit,
            self.metrics.rmse,
            self.metrics.mae,
            self.metrics.nse,
            self.metrics.kge,
            self.metrics.pbias,
            self.epoch
        );
        let params = match self.denormalize(ranges) {
            Ok(p) => p.to_string(),
            Err(e) => format!("invalid genes ({})", e),
        };
        format!("{}\n  {}", scores, params)
    }
}

impl fmt::Debug for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let genes = self
            .genes
            .iter()
            .enumerate()
            .map(|(i, g)| match PARAM_NAMES.get(i) {
                Some(name) => format!("{}:{:.3}", name, g),
                None => format!("#{}:{:.3}", i, g),
            })
            .collect::<Vec<String>>()
            .join(" ");
        write!(f, "[{}] fit={:.4}", genes, self.fit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::FitFunction;
    use crate::traits::Forcing;
    use crate::xaj::N_PARAMS;
    use rand::SeedableRng;

    /// Returns precipitation scaled by B, ignoring everything else
    struct ScaledRain;

    impl Simulator for ScaledRain {
        fn simulate(&self, params: &XajParams, forcing: Forcing<'_>, _init: &InitialState) -> Result<Vec<f64>, String> {
            Ok(forcing.precip.iter().map(|p| p * params.b).collect())
        }
    }

    struct Failing;

    impl Simulator for Failing {
        fn simulate(&self, _params: &XajParams, _forcing: Forcing<'_>, _init: &InitialState) -> Result<Vec<f64>, String> {
            Err("solver diverged".to_string())
        }
    }

    fn create_test_data() -> Data {
        let precip = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        Data {
            basins: vec!["A".to_string()],
            dates: (0..6).map(|d| format!("d{}", d)).collect(),
            qobs: vec![precip.iter().map(|p| p * 0.25).collect()],
            precip: vec![precip],
            pet: vec![vec![0.0; 6]],
            n_basins: 1,
            n_steps: 6,
        }
    }

    fn create_test_params() -> Param {
        let mut param = Param::default();
        param.data.warmup = 2;
        param.xaj.ranges.B = [0.0, 1.0];
        param
    }

    fn genes_with_b(b: f64) -> Vec<f64> {
        let mut genes = vec![0.5; N_PARAMS];
        genes[0] = b;
        genes
    }

    #[test]
    fn test_random_genes_in_unit_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let ind = Individual::random(N_PARAMS, &mut rng);
        assert_eq!(ind.genes.len(), N_PARAMS);
        assert!(ind.genes.iter().all(|g| (0.0..1.0).contains(g)));
        assert_ne!(ind.hash, 0);
    }

    #[test]
    fn test_random_is_deterministic_per_seed() {
        let a = Individual::random(N_PARAMS, &mut ChaCha8Rng::seed_from_u64(7));
        let b = Individual::random(N_PARAMS, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a.genes, b.genes);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_clip_repairs_out_of_bounds_genes() {
        let mut ind = Individual::from_genes(vec![-0.3, 0.4, 1.7, 1.0, 0.0]);
        ind.clip(0.0, 1.0);
        assert_eq!(ind.genes, vec![0.0, 0.4, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_hash_follows_genes() {
        let mut a = Individual::from_genes(vec![0.1, 0.2]);
        let b = Individual::from_genes(vec![0.1, 0.2]);
        assert_eq!(a.hash, b.hash);
        a.genes[1] = 0.3;
        a.compute_hash();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_evaluate_perfect_candidate() {
        let data = create_test_data();
        let param = create_test_params();
        let mut ind = Individual::from_genes(genes_with_b(0.25));

        ind.evaluate(&data, &ScaledRain, &param);

        assert!(ind.evaluated);
        assert!(ind.metrics.rmse.abs() < 1e-12);
        assert!(ind.fit.abs() < 1e-12);
        assert!((ind.metrics.nse - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_ranks_closer_candidate_higher() {
        let data = create_test_data();
        for fit in [FitFunction::rmse, FitFunction::nse, FitFunction::kge, FitFunction::mae] {
            let mut param = create_test_params();
            param.general.fit = fit;
            let mut close = Individual::from_genes(genes_with_b(0.3));
            let mut far = Individual::from_genes(genes_with_b(0.9));
            close.evaluate(&data, &ScaledRain, &param);
            far.evaluate(&data, &ScaledRain, &param);
            assert!(close.fit > far.fit);
        }
    }

    #[test]
    fn test_evaluate_skips_warmup() {
        let mut data = create_test_data();
        // spoil the warm-up observations only
        data.qobs[0][0] = 100.0;
        data.qobs[0][1] = 100.0;
        let param = create_test_params();
        let mut ind = Individual::from_genes(genes_with_b(0.25));
        ind.evaluate(&data, &ScaledRain, &param);
        assert!(ind.metrics.rmse.abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_failed_simulation_gets_worst_fit() {
        let data = create_test_data();
        let param = create_test_params();
        let mut ind = Individual::from_genes(genes_with_b(0.25));
        ind.evaluate(&data, &Failing, &param);
        assert!(ind.evaluated);
        assert_eq!(ind.fit, f64::NEG_INFINITY);
        assert!(ind.metrics.rmse.is_nan());
    }

    #[test]
    fn test_evaluate_wrong_gene_count_fails() {
        let data = create_test_data();
        let param = create_test_params();
        let mut ind = Individual::from_genes(vec![0.5; 3]);
        ind.evaluate(&data, &ScaledRain, &param);
        assert_eq!(ind.fit, f64::NEG_INFINITY);
    }

    #[test]
    fn test_score_basins_names_each_basin() {
        let data = create_test_data();
        let param = create_test_params();
        let ind = Individual::from_genes(genes_with_b(0.5));
        let scores = ind
            .score_basins(&data, &ScaledRain, &param.xaj.ranges, &param.xaj.initial_state, 2)
            .unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].basin, "A");
        assert!(scores[0].metrics.pbias > 0.0);
    }

    #[test]
    fn test_display_lists_physical_parameters() {
        let param = create_test_params();
        let ind = Individual::from_genes(genes_with_b(0.25));
        let text = ind.display(&param.xaj.ranges);
        assert!(text.contains("B=0.2500"));
        assert!(text.contains("CG="));
    }
}
