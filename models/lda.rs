//! Linear discriminant analysis, SVD solver.
//!
//! Never forms the covariance matrix, so it works when features outnumber
//! samples (the usual case for connectivity features).

use super::faer_ndarray::FaerSvd;
use super::{ClassSet, Classifier, ModelError, argmax, validate_prediction, validate_training};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LdaParams {
    /// Singular values below this are treated as zero when ranking the
    /// within-class scatter.
    pub tol: f64,
}

impl Default for LdaParams {
    fn default() -> Self {
        Self { tol: 1e-4 }
    }
}

impl LdaParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(self.tol > 0.0 && self.tol.is_finite()) {
            return Err(ModelError::InvalidParameter(format!(
                "lda.tol must be positive and finite, got {}",
                self.tol
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct FittedLda {
    classes: ClassSet,
    /// Shape: [n_classes, n_features].
    coef: Array2<f64>,
    intercept: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct LinearDiscriminant {
    params: LdaParams,
    fitted: Option<FittedLda>,
}

impl LinearDiscriminant {
    pub fn new(params: LdaParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    /// Per-class discriminant scores, shape `[n_samples, n_classes]`.
    pub fn decision_scores(&self, features: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        validate_prediction(features, fitted.coef.ncols())?;
        Ok(features.dot(&fitted.coef.t()) + &fitted.intercept.view().insert_axis(Axis(0)))
    }
}

impl Classifier for LinearDiscriminant {
    fn fit(
        &mut self,
        features: ArrayView2<f64>,
        labels: ArrayView1<usize>,
    ) -> Result<(), ModelError> {
        self.params.validate()?;
        let classes = validate_training(features, labels)?;
        let encoded = classes.encode(labels);
        let (n_samples, n_features) = features.dim();
        let n_classes = classes.len();
        let tol = self.params.tol;

        // --- Class means and priors ---
        let mut means = Array2::<f64>::zeros((n_classes, n_features));
        let mut counts = vec![0usize; n_classes];
        for (row, &class) in features.axis_iter(Axis(0)).zip(encoded.iter()) {
            let mut mean = means.row_mut(class);
            mean += &row;
            counts[class] += 1;
        }
        for (class, &count) in counts.iter().enumerate() {
            means.row_mut(class).mapv_inplace(|v| v / count as f64);
        }
        let priors = Array1::from_iter(counts.iter().map(|&c| c as f64 / n_samples as f64));
        let xbar = priors.dot(&means);

        // --- Within-class scaling ---
        let mut centered = features.to_owned();
        for (mut row, &class) in centered.axis_iter_mut(Axis(0)).zip(encoded.iter()) {
            row -= &means.row(class);
        }
        let std = centered
            .std_axis(Axis(0), 0.0)
            .mapv(|v| if v == 0.0 { 1.0 } else { v });
        let fac = 1.0 / n_samples.saturating_sub(n_classes).max(1) as f64;
        let scaled = (&centered / &std.view().insert_axis(Axis(0))) * fac.sqrt();

        let within = scaled.thin_svd()?;
        let rank = within.s.iter().filter(|&&v| v > tol).count();
        if rank < n_features {
            log::debug!("LDA: variables are collinear (rank {rank} of {n_features})");
        }
        // scalings[:, k] = vt[k, :] / std / s[k]
        let mut scalings = within.vt.slice(s![..rank, ..]).t().to_owned();
        for k in 0..rank {
            let sk = within.s[k];
            let mut column = scalings.column_mut(k);
            column /= &std;
            column.mapv_inplace(|v| v / sk);
        }

        // --- Between-class rotation ---
        let centered_means = &means - &xbar.view().insert_axis(Axis(0));
        let weights = priors.mapv(|p| (n_samples as f64 * p * fac).sqrt());
        let between =
            (&centered_means * &weights.view().insert_axis(Axis(1))).dot(&scalings);
        let rotation = between.thin_svd()?;
        let leading = rotation.s.first().copied().unwrap_or(0.0);
        let rank_between = rotation.s.iter().filter(|&&v| v > tol * leading).count();
        let scalings = scalings.dot(&rotation.vt.slice(s![..rank_between, ..]).t());

        // --- Linear decision functions ---
        let reduced = centered_means.dot(&scalings);
        let mut intercept = Array1::from_iter(
            reduced
                .axis_iter(Axis(0))
                .zip(priors.iter())
                .map(|(row, &p)| -0.5 * row.dot(&row) + p.ln()),
        );
        let coef = reduced.dot(&scalings.t());
        intercept -= &coef.dot(&xbar);

        self.fitted = Some(FittedLda {
            classes,
            coef,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<usize>, ModelError> {
        let scores = self.decision_scores(features)?;
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        Ok(scores
            .axis_iter(Axis(0))
            .map(|row| fitted.classes.label(argmax(row)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn separates_shifted_classes() {
        let x = array![
            [1.0, 0.2],
            [1.2, -0.1],
            [0.9, 0.1],
            [1.1, 0.0],
            [-1.0, 0.1],
            [-1.1, -0.2],
            [-0.9, 0.0],
            [-1.2, 0.2],
        ];
        let y = array![1usize, 1, 1, 1, 0, 0, 0, 0];
        let mut lda = LinearDiscriminant::new(LdaParams::default());
        lda.fit(x.view(), y.view()).unwrap();
        assert_eq!(lda.score(x.view(), y.view()).unwrap(), 1.0);
        let queries = array![[2.0, 0.0], [-2.0, 0.0]];
        assert_eq!(lda.predict(queries.view()).unwrap().to_vec(), vec![1, 0]);
    }

    #[test]
    fn handles_more_features_than_samples() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 12;
        let f = 60;
        let mut x = Array2::from_shape_fn((n, f), |_| rng.gen_range(-1.0..1.0));
        let y = Array1::from_iter((0..n).map(|i| i % 2));
        for i in 0..n {
            if y[i] == 1 {
                x.row_mut(i).mapv_inplace(|v| v + 2.0);
            }
        }
        let mut lda = LinearDiscriminant::new(LdaParams::default());
        lda.fit(x.view(), y.view()).unwrap();
        let acc = lda.score(x.view(), y.view()).unwrap();
        assert!(acc >= 0.9, "training accuracy {acc}");
    }

    #[test]
    fn identical_class_means_fall_back_to_priors() {
        let x = array![[0.0], [1.0], [0.0], [1.0], [0.5]];
        let y = array![0usize, 0, 1, 1, 1];
        let mut lda = LinearDiscriminant::new(LdaParams::default());
        lda.fit(x.view(), y.view()).unwrap();
        let scores = lda.decision_scores(x.view()).unwrap();
        assert_eq!(scores.dim(), (5, 2));
        assert!(scores.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rejects_wrong_width_at_prediction() {
        let x = array![[0.0, 1.0], [1.0, 0.0]];
        let y = array![0usize, 1];
        let mut lda = LinearDiscriminant::new(LdaParams::default());
        lda.fit(x.view(), y.view()).unwrap();
        let wrong = array![[0.0]];
        assert!(matches!(
            lda.predict(wrong.view()),
            Err(ModelError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        ));
    }
}
