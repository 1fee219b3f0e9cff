use super::splits::{SplitError, floor_fraction, stratified_k_fold};
use super::{Curve, CurveSet, EvaluationError, fit_and_score, mean};
use crate::models::ClassifierFactory;
use crate::samples::LabeledSampleSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningCurveParams {
    /// Fractions of the largest training fold, each in `(0, 1]`.
    pub train_sizes: Vec<f64>,
    pub folds: usize,
}

impl Default for LearningCurveParams {
    fn default() -> Self {
        Self {
            train_sizes: default_train_fractions(),
            folds: 8,
        }
    }
}

/// Eight evenly spaced fractions from 0.2 to 0.9.
pub fn default_train_fractions() -> Vec<f64> {
    (2..=9).map(|tenths| tenths as f64 / 10.0).collect()
}

/// Converts train-size fractions to sample counts out of `n_max`.
///
/// Counts are floored, clipped to `[1, n_max]`, deduplicated and sorted.
pub fn absolute_train_sizes(fractions: &[f64], n_max: usize) -> Result<Vec<usize>, SplitError> {
    if let Some(&bad) = fractions.iter().find(|&&f| !(f > 0.0 && f <= 1.0)) {
        return Err(SplitError::InvalidFraction {
            name: "train_sizes",
            range: "(0, 1]",
            value: bad,
        });
    }
    let mut sizes: Vec<usize> = fractions
        .iter()
        .map(|&f| floor_fraction(f, n_max).clamp(1, n_max.max(1)))
        .collect();
    sizes.sort_unstable();
    let requested = sizes.len();
    sizes.dedup();
    if sizes.len() < requested {
        log::warn!(
            "{} of the requested train sizes collapse onto the same sample count (max {n_max}); keeping {} distinct sizes",
            requested - sizes.len(),
            sizes.len()
        );
    }
    Ok(sizes)
}

/// Mean held-out accuracy per classifier for growing training prefixes of
/// every stratified fold.
///
/// For each fold and each size `n`, a fresh classifier is trained on the
/// first `n` training indices of that fold (ascending sample order) and
/// scored on the fold's test indices; accuracies are averaged over folds.
/// The returned x-values are the absolute train sizes.
pub fn learning_curve(
    samples: &LabeledSampleSet,
    factories: &[ClassifierFactory<'_>],
    params: &LearningCurveParams,
) -> Result<CurveSet, EvaluationError> {
    if factories.is_empty() {
        return Err(EvaluationError::NoClassifiers);
    }
    if params.train_sizes.is_empty() {
        return Err(EvaluationError::NoTrainSizes);
    }
    let folds = stratified_k_fold(samples.labels(), params.folds)?;
    let n_max = folds[0].train.len();
    let sizes = absolute_train_sizes(&params.train_sizes, n_max)?;
    log::debug!(
        "learning curve: {} samples, {} folds, train sizes {:?}",
        samples.len(),
        folds.len(),
        sizes
    );

    let jobs: Vec<(usize, usize)> = (0..folds.len())
        .flat_map(|fold| sizes.iter().map(move |&size| (fold, size)))
        .collect();

    let mut curves = Vec::with_capacity(factories.len());
    for factory in factories {
        let scores: Vec<f64> = jobs
            .par_iter()
            .map(|&(fold, size)| {
                let split = &folds[fold];
                let train = &split.train[..size.min(split.train.len())];
                fit_and_score(factory, samples, train, &split.test)
            })
            .collect::<Result<Vec<f64>, _>>()?;

        // scores are laid out fold-major: scores[fold * sizes.len() + size_idx]
        let mean_accuracy = (0..sizes.len())
            .map(|size_idx| {
                let per_fold: Vec<f64> = (0..folds.len())
                    .map(|fold| scores[fold * sizes.len() + size_idx])
                    .collect();
                mean(&per_fold)
            })
            .collect();
        curves.push(Curve {
            classifier: factory.name().to_string(),
            mean_accuracy,
        });
    }

    Ok(CurveSet {
        train_sizes: sizes.iter().map(|&s| s as f64).collect(),
        curves,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::tests::{SplitLog, indexed_samples, recording_factory};
    use crate::models::{ClassifierKind, ModelParams};
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn default_fractions_span_point_two_to_point_nine() {
        let f = default_train_fractions();
        assert_eq!(f.len(), 8);
        assert_eq!(f[0], 0.2);
        assert_eq!(f[7], 0.9);
    }

    #[test]
    fn absolute_sizes_are_floored_clipped_and_unique() {
        assert_eq!(
            absolute_train_sizes(&[0.2, 0.5, 1.0], 10).unwrap(),
            vec![2, 5, 10]
        );
        assert_eq!(absolute_train_sizes(&[0.01, 0.05], 10).unwrap(), vec![1]);
        assert!(absolute_train_sizes(&[1.5], 10).is_err());
    }

    fn interleaved_samples(n: usize) -> LabeledSampleSet {
        let labels: Vec<usize> = (0..n).map(|i| i % 2).collect();
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            let shift = if labels[i] == 1 { 2.0 } else { -2.0 };
            shift + 0.1 * ((i * 7 + j * 3) % 5) as f64
        });
        LabeledSampleSet::new(x, labels).unwrap()
    }

    #[test]
    fn separable_data_gives_high_accuracy() {
        let samples = interleaved_samples(32);
        let params = LearningCurveParams {
            train_sizes: vec![0.5, 1.0],
            folds: 4,
        };
        let factories = ModelParams::default().factories(&ClassifierKind::ALL);
        let set = learning_curve(&samples, &factories, &params).unwrap();
        assert_eq!(set.train_sizes, vec![12.0, 24.0]);
        assert_eq!(set.curves.len(), 3);
        for curve in &set.curves {
            assert_eq!(curve.mean_accuracy.len(), 2);
            for &acc in &curve.mean_accuracy {
                assert!(acc > 0.9, "{} accuracy {acc}", curve.classifier);
            }
        }
    }

    #[test]
    fn too_many_folds_aborts() {
        let samples = interleaved_samples(6);
        let params = LearningCurveParams {
            train_sizes: vec![1.0],
            folds: 8,
        };
        let factories = ModelParams::default().factories(&[ClassifierKind::Lda]);
        let err = learning_curve(&samples, &factories, &params).unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::Split(SplitError::ClassTooSmallForFolds { .. })
        ));
    }

    #[test]
    fn averages_each_size_over_folds_of_training_prefixes() {
        // 16 alternating labels in 4 folds: fold f tests rows 4f..4f+4.
        let samples = indexed_samples(16);
        let params = LearningCurveParams {
            train_sizes: vec![0.25, 0.5, 1.0],
            folds: 4,
        };
        let log = SplitLog::default();
        let factories = [recording_factory("rec", &log)];
        let set = learning_curve(&samples, &factories, &params).unwrap();

        assert_eq!(set.train_sizes, vec![3.0, 6.0, 12.0]);
        let curve = set.curve("rec").unwrap();
        // mean over folds of n/100 + 4f/1000
        for (&acc, n) in curve.mean_accuracy.iter().zip([3.0, 6.0, 12.0]) {
            assert_abs_diff_eq!(acc, n / 100.0 + 0.006, epsilon = 1e-12);
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4 * 3);
        for (train, test) in log.iter() {
            let first = test[0];
            assert_eq!(test, &(first..first + 4).collect::<Vec<_>>());
            let prefix: Vec<usize> = (0..16)
                .filter(|i| !test.contains(i))
                .take(train.len())
                .collect();
            assert_eq!(train, &prefix);
        }
    }
}
