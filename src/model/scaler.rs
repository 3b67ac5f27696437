//! Feature standardization

use bincode::{Decode, Encode};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column-wise standardizer, fit on training data only
///
/// Transforms to zero mean and unit variance per column. A zero-variance
/// column is centered but not divided, so constant columns survive
/// untouched apart from the shift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    /// Fit means and population standard deviations per column
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::EmptyTable(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }
        let n = x.nrows() as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut std = Vec::with_capacity(x.ncols());
        for col in x.columns() {
            let m = col.sum() / n;
            let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
            mean.push(m);
            std.push(var.sqrt());
        }
        Ok(Self { mean, std })
    }

    /// Standardize a matrix with the fitted statistics
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(Error::FeatureMismatch(format!(
                "scaler fitted on {} columns, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok(Array2::from_shape_fn(x.dim(), |(i, j)| {
            let centered = x[[i, j]] - self.mean[j];
            if self.std[j] > 0.0 {
                centered / self.std[j]
            } else {
                centered
            }
        }))
    }

    /// Fit then transform the same matrix
    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }

    /// Number of fitted columns
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}
