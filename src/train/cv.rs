//! Seeded K-fold splitting and cross-validation summaries

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// K-fold index splitter with reproducible shuffling
#[derive(Clone, Debug)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl KFold {
    /// Splitter with shuffling on and the default seed
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            seed: 42,
        }
    }

    /// Set the shuffle seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Keep samples in input order
    pub fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }

    /// Train/test index pairs for each fold
    ///
    /// Earlier folds absorb the remainder, so fold sizes differ by at
    /// most one and every sample lands in exactly one test fold.
    pub fn split(&self, n_samples: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed);
            for i in (1..n_samples).rev() {
                let j = rng.random_range(0..=i);
                indices.swap(i, j);
            }
        }

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let end = start + fold_size + usize::from(i < remainder);
            let test: Vec<usize> = indices[start..end].to_vec();
            let train: Vec<usize> = indices[..start]
                .iter()
                .chain(&indices[end..])
                .copied()
                .collect();
            folds.push((train, test));
            start = end;
        }
        folds
    }
}

/// Cross-validation score summary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CvSummary {
    /// Per-fold accuracy
    pub scores: Vec<f64>,
    /// Mean across folds
    pub mean: f64,
    /// Sample standard deviation across folds
    pub std: f64,
}

impl CvSummary {
    /// Summarize fold scores; the empty case reports zeros
    pub fn from_scores(scores: Vec<f64>) -> Self {
        if scores.is_empty() {
            return Self {
                scores,
                mean: 0.0,
                std: 0.0,
            };
        }
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let std = if scores.len() > 1 {
            let var = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>()
                / (scores.len() - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };
        Self { scores, mean, std }
    }

    /// Two standard deviations, the reported confidence half-width
    pub fn interval(&self) -> f64 {
        2.0 * self.std
    }
}

impl std::fmt::Display for CvSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4} (+/- {:.4})", self.mean, self.interval())
    }
}
