use crate::genetic_algorithm::PairwiseFn;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Normalization {
    // (jobs - machines) * sqrt((mu^2 - mu) / 2)
    ProblemScaled { jobs: usize, machines: usize },
    Fixed(f64),
}

impl Normalization {
    pub fn factor(&self, population_size: usize) -> f64 {
        match *self {
            Normalization::ProblemScaled { jobs, machines } => {
                let mu = population_size as f64;
                (jobs as f64 - machines as f64) * ((mu * mu - mu) / 2.0).sqrt()
            }
            Normalization::Fixed(factor) => factor,
        }
    }
}

/// A pairwise similarity measure and the normalization that turns pair
/// scores into `1 - ||scores|| / factor`. Higher is more diverse.
#[derive(Clone)]
pub struct DiversityModel<T> {
    measure: PairwiseFn<T>,
    normalization: Normalization,
}

impl<T> Debug for DiversityModel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiversityModel")
            .field("normalization", &self.normalization)
            .finish_non_exhaustive()
    }
}

impl<T> DiversityModel<T> {
    pub fn new<F>(measure: F, normalization: Normalization) -> Self
    where
        F: Fn(&T, &T) -> f64 + Send + Sync + 'static,
    {
        Self {
            measure: Arc::new(measure),
            normalization,
        }
    }

    pub fn from_measure(measure: PairwiseFn<T>, normalization: Normalization) -> Self {
        Self {
            measure,
            normalization,
        }
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn same_as(&self, other: &DiversityModel<T>) -> bool {
        Arc::ptr_eq(&self.measure, &other.measure) && self.normalization == other.normalization
    }

    pub fn pairwise(&self, a: &T, b: &T) -> f64 {
        (self.measure)(a, b)
    }

    // Fewer than two members, or a degenerate factor with all-zero scores,
    // count as fully diverse
    pub fn aggregate(&self, squared_sum: f64, size: usize) -> f64 {
        if size < 2 {
            return 1.0;
        }
        let factor = self.normalization.factor(size);
        if factor <= 0.0 || !factor.is_finite() {
            return if squared_sum == 0.0 { 1.0 } else { 0.0 };
        }
        1.0 - squared_sum.max(0.0).sqrt() / factor
    }

    /// All `size choose 2` pair scores in row-major `(i, j), i < j` order.
    pub fn pair_scores(&self, genes: &[T]) -> Vec<f64> {
        let mut scores = Vec::with_capacity(genes.len() * genes.len().saturating_sub(1) / 2);
        for (i, a) in genes.iter().enumerate() {
            for b in &genes[i + 1..] {
                scores.push(self.pairwise(a, b));
            }
        }
        scores
    }

    /// Full O(mu^2) recomputation of the population diversity.
    pub fn population_diversity(&self, genes: &[T]) -> f64 {
        let squared_sum: f64 = self.pair_scores(genes).iter().map(|s| s * s).sum();
        self.aggregate(squared_sum, genes.len())
    }
}
