//! # Classifier Variants
//!
//! Every classifier is driven through the `Classifier` capability: `fit` on a
//! feature matrix and its labels, then `predict` or `score` on held-out rows.
//! Evaluators never hold a fitted model across splits; they ask a
//! `ClassifierFactory` for a fresh instance every time. `ClassifierKind` is
//! the source of factories for the built-in variants.

pub mod faer_ndarray;
pub mod lda;
pub mod ridge;
pub mod svc;

use faer_ndarray::FaerLinalgError;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub use lda::{LdaParams, LinearDiscriminant};
pub use ridge::{RidgeClassifierCv, RidgeParams};
pub use svc::{Gamma, GammaRule, SupportVectorClassifier, SvcParams};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Training labels contain {found} distinct class(es); at least two are required.")]
    SingleClass { found: usize },
    #[error("Feature matrix has {rows} rows, but {labels} labels were supplied.")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("Cannot fit or score on an empty sample set.")]
    EmptySampleSet,
    #[error("Feature matrix has {found} columns, but the model was fitted on {expected}.")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Feature matrix contains non-finite values (NaN or Infinity).")]
    NonFinite,
    #[error("The classifier must be fitted before it can predict.")]
    NotFitted,
    #[error("Invalid hyperparameter: {0}")]
    InvalidParameter(String),
    #[error("Linear algebra failure: {0}")]
    Linalg(#[from] FaerLinalgError),
}

/// The fit/predict/score capability every classifier variant provides.
pub trait Classifier: Send {
    fn fit(&mut self, features: ArrayView2<f64>, labels: ArrayView1<usize>)
    -> Result<(), ModelError>;

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<usize>, ModelError>;

    /// Mean accuracy of `predict` against `labels`.
    fn score(&self, features: ArrayView2<f64>, labels: ArrayView1<usize>) -> Result<f64, ModelError> {
        let predicted = self.predict(features)?;
        accuracy(predicted.view(), labels)
    }
}

/// Fraction of positions where `predicted` equals `truth`.
pub fn accuracy(predicted: ArrayView1<usize>, truth: ArrayView1<usize>) -> Result<f64, ModelError> {
    if predicted.len() != truth.len() {
        return Err(ModelError::LengthMismatch {
            rows: predicted.len(),
            labels: truth.len(),
        });
    }
    if truth.is_empty() {
        return Err(ModelError::EmptySampleSet);
    }
    let correct = predicted
        .iter()
        .zip(truth.iter())
        .filter(|(p, t)| p == t)
        .count();
    Ok(correct as f64 / truth.len() as f64)
}

/// The classifier variants compared by the evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Svc,
    Lda,
    RidgeCv,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 3] = [Self::Svc, Self::Lda, Self::RidgeCv];

    /// Name used in figure legends.
    pub fn legend(self) -> &'static str {
        match self {
            Self::Svc => "SVC",
            Self::Lda => "LDA",
            Self::RidgeCv => "Ridge cl",
        }
    }

    /// A fresh, unfitted classifier of this kind.
    pub fn build(self, params: &ModelParams) -> Box<dyn Classifier> {
        match self {
            Self::Svc => Box::new(SupportVectorClassifier::new(params.svc.clone())),
            Self::Lda => Box::new(LinearDiscriminant::new(params.lda.clone())),
            Self::RidgeCv => Box::new(RidgeClassifierCv::new(params.ridge.clone())),
        }
    }

    /// A factory named by this kind's legend that builds with `params`.
    pub fn factory(self, params: &ModelParams) -> ClassifierFactory<'static> {
        let params = params.clone();
        ClassifierFactory::new(self.legend(), move || self.build(&params))
    }
}

/// A named source of fresh, unfitted classifiers.
pub struct ClassifierFactory<'a> {
    name: String,
    build: Box<dyn Fn() -> Box<dyn Classifier> + Send + Sync + 'a>,
}

impl<'a> ClassifierFactory<'a> {
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn() -> Box<dyn Classifier> + Send + Sync + 'a,
    {
        Self {
            name: name.into(),
            build: Box::new(build),
        }
    }

    /// Legend name of the classifiers this factory builds.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self) -> Box<dyn Classifier> {
        (self.build)()
    }
}

impl fmt::Debug for ClassifierFactory<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierFactory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.legend())
    }
}

/// Hyperparameters for every classifier variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub svc: SvcParams,
    pub lda: LdaParams,
    pub ridge: RidgeParams,
}

impl ModelParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        self.svc.validate()?;
        self.lda.validate()?;
        self.ridge.validate()
    }

    /// One factory per kind, in the given order.
    pub fn factories(&self, kinds: &[ClassifierKind]) -> Vec<ClassifierFactory<'static>> {
        kinds.iter().map(|kind| kind.factory(self)).collect()
    }
}

/// The sorted distinct labels seen during fitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSet {
    labels: Vec<usize>,
}

impl ClassSet {
    pub fn from_labels(labels: ArrayView1<usize>) -> Self {
        let unique: BTreeSet<usize> = labels.iter().copied().collect();
        Self {
            labels: unique.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, position: usize) -> usize {
        self.labels[position]
    }

    pub fn position(&self, label: usize) -> Option<usize> {
        self.labels.binary_search(&label).ok()
    }

    /// Each label replaced by its position in the sorted class list.
    pub fn encode(&self, labels: ArrayView1<usize>) -> Vec<usize> {
        labels
            .iter()
            .map(|&label| self.position(label).unwrap_or(0))
            .collect()
    }
}

/// Shared input checks for `fit`; returns the classes present in `labels`.
pub(crate) fn validate_training(
    features: ArrayView2<f64>,
    labels: ArrayView1<usize>,
) -> Result<ClassSet, ModelError> {
    if features.nrows() != labels.len() {
        return Err(ModelError::LengthMismatch {
            rows: features.nrows(),
            labels: labels.len(),
        });
    }
    if labels.is_empty() {
        return Err(ModelError::EmptySampleSet);
    }
    if features.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite);
    }
    let classes = ClassSet::from_labels(labels);
    if classes.len() < 2 {
        return Err(ModelError::SingleClass {
            found: classes.len(),
        });
    }
    Ok(classes)
}

/// Shared input checks for `predict`.
pub(crate) fn validate_prediction(
    features: ArrayView2<f64>,
    expected_columns: usize,
) -> Result<(), ModelError> {
    if features.ncols() != expected_columns {
        return Err(ModelError::DimensionMismatch {
            expected: expected_columns,
            found: features.ncols(),
        });
    }
    if features.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite);
    }
    Ok(())
}

/// Position of the largest value; ties resolve to the first position.
pub(crate) fn argmax(values: ArrayView1<f64>) -> usize {
    let mut best = 0usize;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &value) in values.iter().enumerate() {
        if value > best_value {
            best_value = value;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn accuracy_counts_matches() {
        let p = array![0usize, 1, 1, 0];
        let t = array![0usize, 1, 0, 0];
        assert_eq!(accuracy(p.view(), t.view()).unwrap(), 0.75);
    }

    #[test]
    fn accuracy_rejects_empty_and_mismatched() {
        let empty = Array1::<usize>::zeros(0);
        assert!(matches!(
            accuracy(empty.view(), empty.view()),
            Err(ModelError::EmptySampleSet)
        ));
        let a = array![0usize];
        let b = array![0usize, 1];
        assert!(matches!(
            accuracy(a.view(), b.view()),
            Err(ModelError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn class_set_sorts_and_encodes() {
        let y = array![5usize, 2, 5, 9];
        let classes = ClassSet::from_labels(y.view());
        assert_eq!(classes.len(), 3);
        assert_eq!(classes.label(0), 2);
        assert_eq!(classes.encode(y.view()), vec![1, 0, 1, 2]);
    }

    #[test]
    fn training_needs_two_classes() {
        let x = array![[1.0], [2.0]];
        let y = array![1usize, 1];
        assert!(matches!(
            validate_training(x.view(), y.view()),
            Err(ModelError::SingleClass { found: 1 })
        ));
    }

    #[test]
    fn training_rejects_non_finite() {
        let x = array![[1.0], [f64::NAN]];
        let y = array![0usize, 1];
        assert!(matches!(
            validate_training(x.view(), y.view()),
            Err(ModelError::NonFinite)
        ));
    }

    #[test]
    fn argmax_prefers_first_tie() {
        assert_eq!(argmax(array![1.0, 3.0, 3.0].view()), 1);
    }

    #[test]
    fn legends_match_figure_labels() {
        let names: Vec<&str> = ClassifierKind::ALL.iter().map(|k| k.legend()).collect();
        assert_eq!(names, vec!["SVC", "LDA", "Ridge cl"]);
    }

    #[test]
    fn factories_build_unfitted_models_named_by_legend() {
        let factories = ModelParams::default().factories(&[ClassifierKind::Lda, ClassifierKind::Svc]);
        let names: Vec<&str> = factories.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["LDA", "SVC"]);
        let x = array![[0.0]];
        for factory in &factories {
            assert!(matches!(factory.build().predict(x.view()), Err(ModelError::NotFitted)));
        }
    }
}
