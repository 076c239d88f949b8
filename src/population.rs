use crate::data::Data;
use crate::individual::Individual;
use crate::param::Param;
use crate::traits::Simulator;
use crate::utils::{mean_and_std, median};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Population {
    pub individuals: Vec<Individual>,
}

impl Population {
    pub fn new() -> Population {
        Population {
            individuals: Vec::new(),
        }
    }

    /// populate the population with a set of random individuals
    pub fn generate(&mut self, population_size: u32, n_genes: usize, rng: &mut ChaCha8Rng) {
        for _ in 0..population_size {
            self.individuals.push(Individual::random(n_genes, rng))
        }
    }

    /// add some individuals in the population
    pub fn add(&mut self, population: Population) {
        self.individuals.extend(population.individuals);
    }

    pub fn compute_hash(&mut self) {
        for individual in &mut self.individuals {
            individual.compute_hash();
        }
    }

    /// Evaluate in parallel every individual whose genes changed since its last evaluation
    pub fn fit(&mut self, data: &Data, simulator: &dyn Simulator, param: &Param) {
        self.individuals
            .par_iter_mut()
            .filter(|i| !i.evaluated)
            .for_each(|i| i.evaluate(data, simulator, param));
    }

    /// Best individuals first
    pub fn sort(mut self) -> Self {
        self.individuals.sort_by(|i, j| j.fit.total_cmp(&i.fit));
        self
    }

    pub fn best(&self) -> Option<&Individual> {
        self.individuals
            .iter()
            .reduce(|best, i| if i.fit > best.fit { i } else { best })
    }

    /// select first element of a (sorted) population
    pub fn select_first_pct(&self, pct: f64) -> (Population, usize) {
        let n: usize = (self.individuals.len() as f64 * pct / 100.0) as usize;

        (
            Population {
                individuals: self.individuals.iter().take(n).cloned().collect(),
            },
            n,
        )
    }

    /// Summary of the fit distribution then the first `n_model_to_display` models
    pub fn display(&self, param: &Param) -> String {
        let fits: Vec<f64> = self.individuals.iter().map(|i| i.fit).collect();
        let (mean, std) = mean_and_std(&fits);
        let mut text = format!(
            "Population of {} individuals | fit mean {:.4} (std {:.4}) median {:.4}\n",
            self.individuals.len(),
            mean,
            std,
            median(&fits)
        );

        let limit = (param.general.n_model_to_display as usize).min(self.individuals.len());
        for (rank, individual) in self.individuals.iter().take(limit).enumerate() {
            text.push_str(&format!(
                "\x1b[1;93m#{}\x1b[0m {}\n",
                rank + 1,
                individual.display(&param.xaj.ranges)
            ));
        }
        text
    }
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("individuals", &self.individuals)
            .finish()
    }
}
