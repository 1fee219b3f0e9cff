//! # Ridge Classification with Built-in Regularisation Search
//!
//! Labels are binarised to +1/-1 targets and fitted by ridge regression. The
//! penalty is chosen from a fixed grid by exact leave-one-out error, which for
//! ridge has a closed form in terms of the eigendecomposition of the Gram matrix
//! `K = X X^T`:
//!
//! ```text
//! c(alpha)      = Q diag(1 / (v + alpha)) Q^T y
//! G^-1_ii       = sum_j Q_ij^2 / (v_j + alpha)
//! loo_error_i   = (c_i / G^-1_ii)^2
//! ```
//!
//! One decomposition serves every alpha on the grid.

use super::faer_ndarray::FaerEigh;
use super::{ClassSet, Classifier, ModelError, argmax, validate_prediction, validate_training};
use faer::Side;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeParams {
    pub alphas: Vec<f64>,
}

impl Default for RidgeParams {
    fn default() -> Self {
        Self {
            alphas: (-3..=3).map(|p| 10f64.powi(p)).collect(),
        }
    }
}

impl RidgeParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.alphas.is_empty() {
            return Err(ModelError::InvalidParameter(
                "ridge.alphas must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self.alphas.iter().find(|a| !(**a > 0.0 && a.is_finite())) {
            return Err(ModelError::InvalidParameter(format!(
                "ridge.alphas must be positive and finite, got {bad}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct FittedRidge {
    classes: ClassSet,
    alpha: f64,
    /// Shape: [n_targets, n_features].
    coef: Array2<f64>,
    intercept: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct RidgeClassifierCv {
    params: RidgeParams,
    fitted: Option<FittedRidge>,
}

impl RidgeClassifierCv {
    pub fn new(params: RidgeParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    /// The penalty selected by leave-one-out error during the last fit.
    pub fn alpha(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.alpha)
    }
}

/// +1/-1 target matrix: one column for two classes, one column per class otherwise.
fn binarize(encoded: &[usize], n_classes: usize) -> Array2<f64> {
    if n_classes == 2 {
        Array2::from_shape_fn((encoded.len(), 1), |(i, _)| {
            if encoded[i] == 1 { 1.0 } else { -1.0 }
        })
    } else {
        Array2::from_shape_fn((encoded.len(), n_classes), |(i, k)| {
            if encoded[i] == k { 1.0 } else { -1.0 }
        })
    }
}

impl Classifier for RidgeClassifierCv {
    fn fit(
        &mut self,
        features: ArrayView2<f64>,
        labels: ArrayView1<usize>,
    ) -> Result<(), ModelError> {
        self.params.validate()?;
        let classes = validate_training(features, labels)?;
        let encoded = classes.encode(labels);
        let targets = binarize(&encoded, classes.len());

        let x_mean = features.mean_axis(Axis(0)).ok_or(ModelError::EmptySampleSet)?;
        let y_mean = targets.mean_axis(Axis(0)).ok_or(ModelError::EmptySampleSet)?;
        let xc = &features - &x_mean.view().insert_axis(Axis(0));
        let yc = &targets - &y_mean.view().insert_axis(Axis(0));

        let gram = xc.dot(&xc.t());
        let (eigenvalues, q) = gram.eigh(Side::Lower)?;
        let qt_y = q.t().dot(&yc);
        let q_squared = q.mapv(|v| v * v);

        let mut best: Option<(f64, f64, Array2<f64>)> = None;
        for &alpha in &self.params.alphas {
            let w = eigenvalues.mapv(|v| 1.0 / (v + alpha));
            let dual = q.dot(&(&qt_y * &w.view().insert_axis(Axis(1))));
            let g_diag = q_squared.dot(&w);
            let loo = &dual / &g_diag.view().insert_axis(Axis(1));
            let error = loo.mapv(|v| v * v).mean().unwrap_or(f64::INFINITY);
            log::trace!("ridge alpha {alpha:e}: mean squared LOO error {error:.6e}");
            if best.as_ref().is_none_or(|(_, best_error, _)| error < *best_error) {
                best = Some((alpha, error, dual));
            }
        }
        let (alpha, _, dual) = best.ok_or_else(|| {
            ModelError::InvalidParameter("ridge.alphas must not be empty".to_string())
        })?;

        let coef = dual.t().dot(&xc);
        let intercept = &y_mean - &coef.dot(&x_mean);

        self.fitted = Some(FittedRidge {
            classes,
            alpha,
            coef,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<usize>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        validate_prediction(features, fitted.coef.ncols())?;
        let scores =
            features.dot(&fitted.coef.t()) + &fitted.intercept.view().insert_axis(Axis(0));
        Ok(scores
            .axis_iter(Axis(0))
            .map(|row| {
                let position = if row.len() == 1 {
                    usize::from(row[0] > 0.0)
                } else {
                    argmax(row)
                };
                fitted.classes.label(position)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn default_grid_is_logspace() {
        let params = RidgeParams::default();
        assert_eq!(params.alphas.len(), 7);
        assert_abs_diff_eq!(params.alphas[0], 1e-3, epsilon = 1e-15);
        assert_abs_diff_eq!(params.alphas[6], 1e3, epsilon = 1e-9);
    }

    #[test]
    fn binary_targets_use_single_column() {
        let t = binarize(&[0, 1, 1], 2);
        assert_eq!(t, array![[-1.0], [1.0], [1.0]]);
        let t3 = binarize(&[0, 2], 3);
        assert_eq!(t3, array![[1.0, -1.0, -1.0], [-1.0, -1.0, 1.0]]);
    }

    #[test]
    fn fits_linearly_separable_labels() {
        let x = array![
            [0.0, 1.0],
            [0.2, 0.9],
            [0.1, 1.1],
            [1.0, 0.0],
            [0.9, 0.2],
            [1.1, 0.1],
        ];
        let y = array![4usize, 4, 4, 8, 8, 8];
        let mut ridge = RidgeClassifierCv::new(RidgeParams::default());
        ridge.fit(x.view(), y.view()).unwrap();
        assert_eq!(ridge.score(x.view(), y.view()).unwrap(), 1.0);
        let alpha = ridge.alpha().unwrap();
        assert!(RidgeParams::default().alphas.contains(&alpha));
    }

    #[test]
    fn three_classes_use_argmax() {
        let x = array![
            [3.0, 0.0, 0.0],
            [2.8, 0.1, 0.0],
            [0.0, 3.0, 0.0],
            [0.1, 2.9, 0.0],
            [0.0, 0.0, 3.0],
            [0.0, 0.1, 3.1],
        ];
        let y = array![0usize, 0, 1, 1, 2, 2];
        let mut ridge = RidgeClassifierCv::new(RidgeParams {
            alphas: vec![0.01],
        });
        ridge.fit(x.view(), y.view()).unwrap();
        assert_eq!(ridge.predict(x.view()).unwrap().to_vec(), y.to_vec());
    }

    #[test]
    fn rejects_non_positive_alpha() {
        let params = RidgeParams {
            alphas: vec![1.0, -1.0],
        };
        assert!(matches!(params.validate(), Err(ModelError::InvalidParameter(_))));
    }
}
