//! # Accuracy Evaluation
//!
//! Two evaluation schemes are kept side by side because they answer slightly
//! different questions:
//!
//! - `learning_curve` rotates stratified k-folds and trains on growing prefixes
//!   of each fold's training set.
//! - `pairwise_accuracy` draws many stratified shuffle splits at each exact
//!   train fraction, independent of any fold count.
//!
//! Both refit a fresh classifier for every (split, train size) and report the
//! mean accuracy per classifier per train size.

pub mod learning_curve;
pub mod pairwise;
pub mod splits;

use crate::models::{ClassifierFactory, ModelError};
use crate::samples::LabeledSampleSet;
use serde::{Deserialize, Serialize};
use splits::SplitError;
use thiserror::Error;

pub use learning_curve::{LearningCurveParams, absolute_train_sizes, learning_curve};
pub use pairwise::{PairwiseParams, pairwise_accuracy};

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Failed to build train/test splits: {0}")]
    Split(#[from] SplitError),
    #[error("Classifier failed: {0}")]
    Model(#[from] ModelError),
    #[error("At least one classifier variant must be evaluated.")]
    NoClassifiers,
    #[error("At least one train size must be requested.")]
    NoTrainSizes,
}

/// Mean accuracy of one classifier at every train size of a `CurveSet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    /// Legend name of the classifier.
    pub classifier: String,
    pub mean_accuracy: Vec<f64>,
}

/// The output of one evaluator invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSet {
    /// x-values: absolute sample counts for learning curves, fractions for
    /// pairwise evaluation.
    pub train_sizes: Vec<f64>,
    pub curves: Vec<Curve>,
}

impl CurveSet {
    pub fn curve(&self, classifier: &str) -> Option<&Curve> {
        self.curves.iter().find(|c| c.classifier == classifier)
    }
}

/// Fits a fresh classifier from `factory` on `train` and scores it on `test`.
pub(crate) fn fit_and_score(
    factory: &ClassifierFactory<'_>,
    samples: &LabeledSampleSet,
    train: &[usize],
    test: &[usize],
) -> Result<f64, ModelError> {
    let (x_train, y_train) = samples.subset(train);
    let (x_test, y_test) = samples.subset(test);
    let mut model = factory.build();
    model.fit(x_train.view(), y_train.view())?;
    model.score(x_test.view(), y_test.view())
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
