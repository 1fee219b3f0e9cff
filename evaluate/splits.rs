//! Stratified train/test partitions.

use ndarray::ArrayView1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error("Cross-validation needs at least 2 folds, got {folds}.")]
    TooFewFolds { folds: usize },
    #[error("Class {label} has {count} members, fewer than the {folds} requested folds.")]
    ClassTooSmallForFolds {
        label: usize,
        count: usize,
        folds: usize,
    },
    #[error(
        "Class {label} has only {count} member(s); stratified shuffle splits need at least 2 per class."
    )]
    ClassTooSmall { label: usize, count: usize },
    #[error("{name} must lie in {range}, got {value}.")]
    InvalidFraction {
        name: &'static str,
        range: &'static str,
        value: f64,
    },
    #[error("train_size ({train}) + test_size ({test}) exceeds 1.")]
    FractionsExceedOne { train: f64, test: f64 },
    #[error("The {which} set would hold {size} samples, fewer than the {classes} classes.")]
    SetSmallerThanClasses {
        which: &'static str,
        size: usize,
        classes: usize,
    },
    #[error("At least one split iteration is required.")]
    NoIterations,
    #[error("train ({train}) + test ({test}) samples exceed the {samples} available.")]
    SplitExceedsSamples {
        train: usize,
        test: usize,
        samples: usize,
    },
}

/// One train/test partition, as row indices into the sample set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Member indices per label, each list in sample order, labels ascending.
fn class_members(labels: ArrayView1<usize>) -> BTreeMap<usize, Vec<usize>> {
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        members.entry(label).or_default().push(i);
    }
    members
}

/// Stratified k-fold partitions without shuffling.
///
/// Each class's members are dealt, in sample order, into `folds` contiguous
/// chunks whose sizes differ by at most one (larger chunks first). Fold `f`
/// tests on every class's chunk `f`. Both index lists are ascending.
pub fn stratified_k_fold(labels: ArrayView1<usize>, folds: usize) -> Result<Vec<Split>, SplitError> {
    if folds < 2 {
        return Err(SplitError::TooFewFolds { folds });
    }
    let members = class_members(labels);
    if let Some((&label, list)) = members.iter().find(|(_, list)| list.len() < folds) {
        return Err(SplitError::ClassTooSmallForFolds {
            label,
            count: list.len(),
            folds,
        });
    }

    let mut test_fold = vec![0usize; labels.len()];
    for list in members.values() {
        let base = list.len() / folds;
        let extra = list.len() % folds;
        let mut cursor = 0usize;
        for fold in 0..folds {
            let size = base + usize::from(fold < extra);
            for &index in &list[cursor..cursor + size] {
                test_fold[index] = fold;
            }
            cursor += size;
        }
    }

    Ok((0..folds)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| test_fold[i] == fold);
            Split { train, test }
        })
        .collect())
}

/// `floor(fraction * n)`, tolerant of representation error in the fraction.
pub(crate) fn floor_fraction(fraction: f64, n: usize) -> usize {
    (fraction * n as f64 + 1e-9).floor() as usize
}

fn ceil_fraction(fraction: f64, n: usize) -> usize {
    (fraction * n as f64 - 1e-9).ceil().max(0.0) as usize
}

/// Splits `total` across classes in proportion to `weights`, never exceeding
/// `capacity`. Floors first, then hands out the remainder by largest
/// fractional part (ties to the lower class), so the parts sum to `total`
/// whenever capacity allows.
fn allocate(total: usize, weights: &[usize], capacity: &[usize]) -> Vec<usize> {
    let weight_sum: usize = weights.iter().sum();
    if weight_sum == 0 {
        return vec![0; weights.len()];
    }
    let exact: Vec<f64> = weights
        .iter()
        .map(|&w| total as f64 * w as f64 / weight_sum as f64)
        .collect();
    let mut parts: Vec<usize> = exact
        .iter()
        .zip(capacity)
        .map(|(&e, &cap)| (e.floor() as usize).min(cap))
        .collect();
    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.partial_cmp(&fa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut remaining = total.saturating_sub(parts.iter().sum());
    while remaining > 0 {
        let mut progressed = false;
        for &i in &order {
            if remaining == 0 {
                break;
            }
            if parts[i] < capacity[i] {
                parts[i] += 1;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    parts
}

/// Random stratified train/test splits at a fixed train and test fraction.
#[derive(Debug, Clone)]
pub struct StratifiedShuffleSplit {
    n_train: usize,
    n_test: usize,
    members: Vec<Vec<usize>>,
    train_per_class: Vec<usize>,
    test_per_class: Vec<usize>,
}

impl StratifiedShuffleSplit {
    pub fn new(
        labels: ArrayView1<usize>,
        train_fraction: f64,
        test_fraction: f64,
    ) -> Result<Self, SplitError> {
        if !(train_fraction > 0.0 && train_fraction <= 1.0) {
            return Err(SplitError::InvalidFraction {
                name: "train_size",
                range: "(0, 1]",
                value: train_fraction,
            });
        }
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(SplitError::InvalidFraction {
                name: "test_size",
                range: "(0, 1)",
                value: test_fraction,
            });
        }
        if train_fraction + test_fraction > 1.0 + 1e-9 {
            return Err(SplitError::FractionsExceedOne {
                train: train_fraction,
                test: test_fraction,
            });
        }

        let n_samples = labels.len();
        let n_train = floor_fraction(train_fraction, n_samples);
        let n_test = ceil_fraction(test_fraction, n_samples);
        if n_train + n_test > n_samples {
            return Err(SplitError::SplitExceedsSamples {
                train: n_train,
                test: n_test,
                samples: n_samples,
            });
        }

        let by_class = class_members(labels);
        if let Some((&label, list)) = by_class.iter().find(|(_, list)| list.len() < 2) {
            return Err(SplitError::ClassTooSmall {
                label,
                count: list.len(),
            });
        }
        let n_classes = by_class.len();
        if n_train < n_classes {
            return Err(SplitError::SetSmallerThanClasses {
                which: "train",
                size: n_train,
                classes: n_classes,
            });
        }
        if n_test < n_classes {
            return Err(SplitError::SetSmallerThanClasses {
                which: "test",
                size: n_test,
                classes: n_classes,
            });
        }

        let members: Vec<Vec<usize>> = by_class.into_values().collect();
        let counts: Vec<usize> = members.iter().map(Vec::len).collect();
        let train_per_class = allocate(n_train, &counts, &counts);
        let left_over: Vec<usize> = counts
            .iter()
            .zip(&train_per_class)
            .map(|(&c, &t)| c - t)
            .collect();
        let test_per_class = allocate(n_test, &counts, &left_over);

        Ok(Self {
            n_train,
            n_test,
            members,
            train_per_class,
            test_per_class,
        })
    }

    pub fn n_train(&self) -> usize {
        self.n_train
    }

    pub fn n_test(&self) -> usize {
        self.n_test
    }

    /// `n_iter` splits drawn from a generator seeded with `seed`.
    pub fn splits(&self, n_iter: usize, seed: u64) -> Vec<Split> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n_iter).map(|_| self.draw(&mut rng)).collect()
    }

    fn draw(&self, rng: &mut StdRng) -> Split {
        let mut train = Vec::with_capacity(self.n_train);
        let mut test = Vec::with_capacity(self.n_test);
        for ((list, &n_i), &t_i) in self
            .members
            .iter()
            .zip(&self.train_per_class)
            .zip(&self.test_per_class)
        {
            let mut permuted = list.clone();
            permuted.shuffle(rng);
            train.extend_from_slice(&permuted[..n_i]);
            test.extend_from_slice(&permuted[n_i..n_i + t_i]);
        }

        train.shuffle(rng);
        test.shuffle(rng);
        Split { train, test }
    }
}
