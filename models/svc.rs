//! # Support Vector Classification
//!
//! C-SVC with an RBF kernel. Each pair of classes gets its own binary machine,
//! trained by sequential minimal optimisation on the dual problem
//!
//! ```text
//! min_a  1/2 a^T Q a - e^T a    subject to  0 <= a_t <= C,  y^T a = 0
//! ```
//!
//! with `Q_st = y_s y_t K(x_s, x_t)`. Prediction is a one-vs-one vote.

use super::{
    ClassSet, Classifier, ModelError, argmax, validate_prediction, validate_training,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Lower bound for the curvature of a two-variable sub-problem.
const TAU: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GammaRule {
    /// `1 / n_features`
    Auto,
}

/// RBF kernel width, either derived from the data or fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Gamma {
    Rule(GammaRule),
    Fixed(f64),
}

impl Gamma {
    fn resolve(self, n_features: usize) -> f64 {
        match self {
            Gamma::Rule(GammaRule::Auto) => 1.0 / n_features.max(1) as f64,
            Gamma::Fixed(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvcParams {
    pub c: f64,
    pub gamma: Gamma,
    pub tol: f64,
    pub max_iter: usize,
}

impl Default for SvcParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: Gamma::Rule(GammaRule::Auto),
            tol: 1e-3,
            max_iter: 10_000_000,
        }
    }
}

impl SvcParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(ModelError::InvalidParameter(format!(
                "svc.c must be positive and finite, got {}",
                self.c
            )));
        }
        match self.gamma {
            Gamma::Fixed(value) if !(value > 0.0 && value.is_finite()) => {
                return Err(ModelError::InvalidParameter(format!(
                    "svc.gamma must be positive and finite, got {value}"
                )));
            }
            _ => {}
        }
        if !(self.tol > 0.0) {
            return Err(ModelError::InvalidParameter(format!(
                "svc.tol must be positive, got {}",
                self.tol
            )));
        }
        if self.max_iter == 0 {
            return Err(ModelError::InvalidParameter(
                "svc.max_iter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One binary machine of the one-vs-one ensemble.
#[derive(Debug, Clone)]
struct PairMachine {
    /// Class position voted for when the decision value is positive.
    positive: usize,
    negative: usize,
    /// `(training row, a_t * y_t)` for every support vector.
    support: Vec<(usize, f64)>,
    rho: f64,
}

impl PairMachine {
    fn decision(&self, kernel_row: ArrayView1<f64>) -> f64 {
        self.support
            .iter()
            .map(|&(row, coef)| coef * kernel_row[row])
            .sum::<f64>()
            - self.rho
    }
}

#[derive(Debug, Clone)]
struct FittedSvc {
    classes: ClassSet,
    gamma: f64,
    training: Array2<f64>,
    machines: Vec<PairMachine>,
}

#[derive(Debug, Clone)]
pub struct SupportVectorClassifier {
    params: SvcParams,
    fitted: Option<FittedSvc>,
}

impl SupportVectorClassifier {
    pub fn new(params: SvcParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    /// Number of support vectors across all pair machines.
    #[cfg(test)]
    fn n_support(&self) -> usize {
        self.fitted
            .as_ref()
            .map(|f| f.machines.iter().map(|m| m.support.len()).sum())
            .unwrap_or(0)
    }
}

impl Classifier for SupportVectorClassifier {
    fn fit(
        &mut self,
        features: ArrayView2<f64>,
        labels: ArrayView1<usize>,
    ) -> Result<(), ModelError> {
        self.params.validate()?;
        let classes = validate_training(features, labels)?;
        let encoded = classes.encode(labels);
        let gamma = self.params.gamma.resolve(features.ncols());
        let kernel = rbf_kernel(features, features, gamma);

        let mut machines = Vec::with_capacity(classes.len() * (classes.len() - 1) / 2);
        for positive in 0..classes.len() {
            for negative in (positive + 1)..classes.len() {
                let rows: Vec<usize> = encoded
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| c == positive || c == negative)
                    .map(|(i, _)| i)
                    .collect();
                let signs: Vec<f64> = rows
                    .iter()
                    .map(|&i| if encoded[i] == positive { 1.0 } else { -1.0 })
                    .collect();
                let sub_kernel = kernel.select(Axis(0), &rows).select(Axis(1), &rows);
                let solution = solve_dual(&sub_kernel, &signs, &self.params);
                if !solution.converged {
                    log::warn!(
                        "SVC pair ({}, {}) stopped at the iteration cap ({}) before reaching tolerance {}",
                        classes.label(positive),
                        classes.label(negative),
                        self.params.max_iter,
                        self.params.tol
                    );
                }
                let support = rows
                    .iter()
                    .zip(solution.alpha.iter().zip(signs.iter()))
                    .filter(|&(_, (&a, _))| a > 0.0)
                    .map(|(&row, (&a, &y))| (row, a * y))
                    .collect();
                machines.push(PairMachine {
                    positive,
                    negative,
                    support,
                    rho: solution.rho,
                });
            }
        }

        self.fitted = Some(FittedSvc {
            classes,
            gamma,
            training: features.to_owned(),
            machines,
        });
        Ok(())
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<usize>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        validate_prediction(features, fitted.training.ncols())?;
        let kernel = rbf_kernel(features, fitted.training.view(), fitted.gamma);
        let n_classes = fitted.classes.len();
        Ok(kernel
            .axis_iter(Axis(0))
            .map(|row| {
                let mut votes = Array1::<f64>::zeros(n_classes);
                for machine in &fitted.machines {
                    if machine.decision(row) > 0.0 {
                        votes[machine.positive] += 1.0;
                    } else {
                        votes[machine.negative] += 1.0;
                    }
                }
                fitted.classes.label(argmax(votes.view()))
            })
            .collect())
    }
}

/// `K[i, j] = exp(-gamma * |a_i - b_j|^2)`.
pub(crate) fn rbf_kernel(a: ArrayView2<f64>, b: ArrayView2<f64>, gamma: f64) -> Array2<f64> {
    let a_norms: Array1<f64> = a.rows().into_iter().map(|r| r.dot(&r)).collect();
    let b_norms: Array1<f64> = b.rows().into_iter().map(|r| r.dot(&r)).collect();
    let mut kernel = a.dot(&b.t());
    for ((i, j), value) in kernel.indexed_iter_mut() {
        let squared = (a_norms[i] + b_norms[j] - 2.0 * *value).max(0.0);
        *value = (-gamma * squared).exp();
    }
    kernel
}

struct DualSolution {
    alpha: Vec<f64>,
    rho: f64,
    converged: bool,
}

/// SMO with maximal-violating-pair working set selection.
fn solve_dual(kernel: &Array2<f64>, y: &[f64], params: &SvcParams) -> DualSolution {
    let n = y.len();
    let c = params.c;
    let mut alpha = vec![0.0_f64; n];
    let mut grad = vec![-1.0_f64; n];
    let mut converged = false;
    let mut iterations = 0usize;

    while iterations < params.max_iter {
        let mut g_max = f64::NEG_INFINITY;
        let mut g_max2 = f64::NEG_INFINITY;
        let mut i_sel = None;
        let mut j_sel = None;
        for t in 0..n {
            // I_up and I_low swap bounds with the sign of y.
            let (in_up, in_low) = if y[t] > 0.0 {
                (alpha[t] < c, alpha[t] > 0.0)
            } else {
                (alpha[t] > 0.0, alpha[t] < c)
            };
            let up = -y[t] * grad[t];
            if in_up && up >= g_max {
                g_max = up;
                i_sel = Some(t);
            }
            if in_low && -up >= g_max2 {
                g_max2 = -up;
                j_sel = Some(t);
            }
        }
        let (Some(i), Some(j)) = (i_sel, j_sel) else {
            converged = true;
            break;
        };
        if g_max + g_max2 < params.tol {
            converged = true;
            break;
        }
        iterations += 1;

        let (old_i, old_j) = (alpha[i], alpha[j]);
        let q_ij = y[i] * y[j] * kernel[(i, j)];
        if y[i] != y[j] {
            let mut quad = kernel[(i, i)] + kernel[(j, j)] + 2.0 * q_ij;
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else {
                if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = c + diff;
                }
            }
        } else {
            let mut quad = kernel[(i, i)] + kernel[(j, j)] - 2.0 * q_ij;
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }
        }

        let delta_i = alpha[i] - old_i;
        let delta_j = alpha[j] - old_j;
        for t in 0..n {
            grad[t] += y[t] * (y[i] * kernel[(t, i)] * delta_i + y[j] * kernel[(t, j)] * delta_j);
        }
    }

    log::debug!("SMO finished after {iterations} iterations on {n} samples");
    DualSolution {
        rho: compute_rho(&alpha, &grad, y, c),
        alpha,
        converged,
    }
}

/// Bias term: average of `y_t * G_t` over free variables, or the midpoint of the
/// feasible interval when every variable sits at a bound.
fn compute_rho(alpha: &[f64], grad: &[f64], y: &[f64], c: f64) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free = 0usize;
    let mut free_sum = 0.0;
    for t in 0..alpha.len() {
        let yg = y[t] * grad[t];
        if alpha[t] >= c {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if alpha[t] <= 0.0 {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free += 1;
            free_sum += yg;
        }
    }
    if free > 0 {
        free_sum / free as f64
    } else {
        (upper + lower) / 2.0
    }
}
