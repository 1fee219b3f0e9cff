use super::learning_curve::default_train_fractions;
use super::splits::{Split, SplitError, StratifiedShuffleSplit};
use super::{Curve, CurveSet, EvaluationError, fit_and_score, mean};
use crate::models::ClassifierFactory;
use crate::samples::LabeledSampleSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairwiseParams {
    /// Train fractions of the whole pair, each in `(0, 1]`.
    pub train_sizes: Vec<f64>,
    pub n_iter: usize,
    pub test_size: f64,
    pub seed: u64,
}

impl Default for PairwiseParams {
    fn default() -> Self {
        Self {
            train_sizes: default_train_fractions(),
            n_iter: 50,
            test_size: 0.1,
            seed: 42,
        }
    }
}

impl PairwiseParams {
    pub fn validate(&self) -> Result<(), EvaluationError> {
        if self.train_sizes.is_empty() {
            return Err(EvaluationError::NoTrainSizes);
        }
        if self.n_iter == 0 {
            return Err(SplitError::NoIterations.into());
        }
        if let Some(&bad) = self
            .train_sizes
            .iter()
            .find(|&&f| !(f > 0.0 && f <= 1.0))
        {
            return Err(SplitError::InvalidFraction {
                name: "train_size",
                range: "(0, 1]",
                value: bad,
            }
            .into());
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(SplitError::InvalidFraction {
                name: "test_size",
                range: "(0, 1)",
                value: self.test_size,
            }
            .into());
        }
        Ok(())
    }
}

/// Mean accuracy per classifier at each exact train fraction, averaged over
/// `n_iter` stratified shuffle splits.
///
/// Splits for a fraction come from a generator seeded with `params.seed`, so
/// every classifier is scored on the same splits and repeated calls agree.
pub fn pairwise_accuracy(
    samples: &LabeledSampleSet,
    factories: &[ClassifierFactory<'_>],
    params: &PairwiseParams,
) -> Result<CurveSet, EvaluationError> {
    if factories.is_empty() {
        return Err(EvaluationError::NoClassifiers);
    }
    params.validate()?;

    let split_sets: Vec<Vec<Split>> = params
        .train_sizes
        .iter()
        .map(|&fraction| {
            let splitter =
                StratifiedShuffleSplit::new(samples.labels(), fraction, params.test_size)?;
            log::debug!(
                "pairwise: train fraction {fraction:.2} -> {} train / {} test of {}",
                splitter.n_train(),
                splitter.n_test(),
                samples.len()
            );
            Ok(splitter.splits(params.n_iter, params.seed))
        })
        .collect::<Result<_, SplitError>>()?;

    let mut curves = Vec::with_capacity(factories.len());
    for factory in factories {
        let mut mean_accuracy = Vec::with_capacity(split_sets.len());
        for splits in &split_sets {
            let scores = splits
                .par_iter()
                .map(|split| fit_and_score(factory, samples, &split.train, &split.test))
                .collect::<Result<Vec<f64>, _>>()?;
            mean_accuracy.push(mean(&scores));
        }
        curves.push(Curve {
            classifier: factory.name().to_string(),
            mean_accuracy,
        });
    }

    Ok(CurveSet {
        train_sizes: params.train_sizes.clone(),
        curves,
    })
}
