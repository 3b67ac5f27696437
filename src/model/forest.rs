//! Random forest of weighted CART trees
//!
//! Each tree trains on a bootstrap resample with sqrt-feature subsampling
//! per split; per-sample weights multiply through into the resample so
//! balanced class weighting reaches every tree.

use bincode::{Decode, Encode};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::tree::{argmax, DecisionTree, TreeParams};

/// Forest training parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Encode, Decode)]
pub struct ForestParams {
    /// Number of trees
    pub n_trees: usize,
    /// Depth limit per tree; `None` grows to purity
    pub max_depth: Option<usize>,
    /// Minimum rows to split
    pub min_samples_split: usize,
    /// Minimum rows per child
    pub min_samples_leaf: usize,
    /// Master seed for bootstrap and feature subsampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// Fitted random forest classifier
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    /// Fit a forest on weighted samples
    pub fn fit(
        x: &Array2<f64>,
        y: &[usize],
        weights: &[f64],
        n_classes: usize,
        params: ForestParams,
    ) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::EmptyTable(
                "cannot fit a forest on zero rows".to_string(),
            ));
        }
        if params.n_trees == 0 {
            return Err(Error::InvalidParameter(
                "forest needs at least one tree".to_string(),
            ));
        }

        let n = x.nrows();
        let max_features = ((x.ncols() as f64).sqrt().round() as usize).max(1);
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: Some(max_features),
        };

        let mut master = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let mut rng = StdRng::seed_from_u64(master.random());

            // materialized bootstrap resample
            let picks: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let bx = Array2::from_shape_fn((n, x.ncols()), |(i, j)| x[[picks[i], j]]);
            let by: Vec<usize> = picks.iter().map(|&i| y[i]).collect();
            let bw: Vec<f64> = picks.iter().map(|&i| weights[i]).collect();

            let tree = DecisionTree::fit(&bx, &by, &bw, n_classes, tree_params, &mut rng)?;
            trees.push(tree);
        }

        Ok(Self {
            trees,
            n_classes,
            n_features: x.ncols(),
        })
    }

    /// Mean leaf distribution across trees, row per sample
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for tree in &self.trees {
            for (i, row) in x.rows().into_iter().enumerate() {
                let dist = tree.predict_proba_row(row);
                for (c, p) in dist.iter().enumerate() {
                    proba[[i, c]] += p;
                }
            }
        }
        proba /= self.trees.len() as f64;
        proba
    }

    /// Most probable class per row
    pub fn predict(&self, x: &Array2<f64>) -> Vec<usize> {
        let proba = self.predict_proba(x);
        proba
            .rows()
            .into_iter()
            .map(|row| argmax(row.as_slice().unwrap_or(&[])))
            .collect()
    }

    /// Mean impurity-decrease importance across trees
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (i, v) in tree.feature_importances().iter().enumerate() {
                total[i] += v;
            }
        }
        let n = self.trees.len() as f64;
        for v in &mut total {
            *v /= n;
        }
        total
    }

    /// Fitted trees, for path-based explanation
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Number of features seen at fit time
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Mean per-class probability over a set of rows
    pub fn mean_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        let proba = self.predict_proba(x);
        let n = proba.nrows().max(1) as f64;
        proba.sum_axis(ndarray::Axis(0)) / n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Vec<usize>, Vec<f64>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let v = i as f64 / 20.0;
            rows.push([v, 1.0 - v]);
            y.push(usize::from(i >= 10));
        }
        let x = Array2::from_shape_fn((20, 2), |(i, j)| rows[i][j]);
        let w = vec![1.0; 20];
        (x, y, w)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 20,
            max_depth: Some(5),
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_forest_learns_separable_data() {
        let (x, y, w) = separable();
        let forest = RandomForest::fit(&x, &y, &w, 2, small_params()).unwrap();
        let preds = forest.predict(&x);
        let correct = preds.iter().zip(&y).filter(|(a, b)| a == b).count();
        assert!(correct >= 18, "forest fit too weak: {correct}/20");
    }

    #[test]
    fn test_proba_rows_sum_to_one() {
        let (x, y, w) = separable();
        let forest = RandomForest::fit(&x, &y, &w, 2, small_params()).unwrap();
        let proba = forest.predict_proba(&x);
        for row in proba.rows() {
            let sum: f64 = row.sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y, w) = separable();
        let a = RandomForest::fit(&x, &y, &w, 2, small_params()).unwrap();
        let b = RandomForest::fit(&x, &y, &w, 2, small_params()).unwrap();
        assert_eq!(a.predict(&x), b.predict(&x));
    }

    #[test]
    fn test_different_seed_allowed() {
        let (x, y, w) = separable();
        let params = ForestParams {
            seed: 7,
            ..small_params()
        };
        let forest = RandomForest::fit(&x, &y, &w, 2, params).unwrap();
        assert_eq!(forest.trees().len(), 20);
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y, w) = separable();
        let forest = RandomForest::fit(&x, &y, &w, 2, small_params()).unwrap();
        let imp = forest.feature_importances();
        assert_eq!(imp.len(), 2);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_trees_rejected() {
        let x = array![[1.0], [2.0]];
        let params = ForestParams {
            n_trees: 0,
            ..ForestParams::default()
        };
        let err = RandomForest::fit(&x, &[0, 1], &[1.0, 1.0], 2, params);
        assert!(matches!(err, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_three_class_proba_shape() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [5.0, 5.0],
            [5.1, 5.0],
            [10.0, 0.0],
            [10.1, 0.0],
        ];
        let y = vec![0, 0, 1, 1, 2, 2];
        let w = vec![1.0; 6];
        let forest = RandomForest::fit(&x, &y, &w, 3, small_params()).unwrap();
        let proba = forest.predict_proba(&x);
        assert_eq!(proba.shape(), &[6, 3]);
    }
}
