//! Feature rows paired with their labels.
//!
//! Rows and labels are only ever combined at construction time, so a subset or a
//! stacked pair of groups always carries the labels of exactly the rows it holds.

use crate::labels::pairwise_labels;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SampleError {
    #[error("Feature matrix has {rows} rows, but {labels} labels were supplied.")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("Row index {index} is out of range for a feature matrix with {rows} rows.")]
    RowOutOfRange { index: usize, rows: usize },
}

#[derive(Debug, Clone)]
pub struct LabeledSampleSet {
    features: Array2<f64>,
    labels: Array1<usize>,
}

impl LabeledSampleSet {
    pub fn new(features: Array2<f64>, labels: Vec<usize>) -> Result<Self, SampleError> {
        if features.nrows() != labels.len() {
            return Err(SampleError::LengthMismatch {
                rows: features.nrows(),
                labels: labels.len(),
            });
        }
        Ok(Self {
            features,
            labels: Array1::from_vec(labels),
        })
    }

    /// Stacks the rows of `group_i` above the rows of `group_j` and labels them 0 and 1.
    pub fn pairwise(
        features: ArrayView2<f64>,
        group_i: &[usize],
        group_j: &[usize],
    ) -> Result<Self, SampleError> {
        let rows = features.nrows();
        if let Some(&index) = group_i.iter().chain(group_j).find(|&&index| index >= rows) {
            return Err(SampleError::RowOutOfRange { index, rows });
        }
        let order: Vec<usize> = group_i.iter().chain(group_j).copied().collect();
        let stacked = features.select(Axis(0), &order);
        Self::new(stacked, pairwise_labels(group_i.len(), group_j.len()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, usize> {
        self.labels.view()
    }

    /// Rows and labels at `indices`, in the given order.
    pub fn subset(&self, indices: &[usize]) -> (Array2<f64>, Array1<usize>) {
        (
            self.features.select(Axis(0), indices),
            self.labels.select(Axis(0), indices),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn new_rejects_misaligned_labels() {
        let x = Array2::<f64>::zeros((3, 2));
        let err = LabeledSampleSet::new(x, vec![0, 1]).unwrap_err();
        assert_eq!(err, SampleError::LengthMismatch { rows: 3, labels: 2 });
    }

    #[test]
    fn pairwise_stacks_rows_with_their_labels() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let set = LabeledSampleSet::pairwise(x.view(), &[4, 1], &[0, 2, 3]).unwrap();
        assert_eq!(set.len(), 5);
        assert_eq!(set.features().column(0).to_vec(), vec![4.0, 1.0, 0.0, 2.0, 3.0]);
        assert_eq!(set.labels().to_vec(), vec![0, 0, 1, 1, 1]);
    }

    #[test]
    fn pairwise_rejects_unknown_rows() {
        let x = array![[0.0], [1.0]];
        let err = LabeledSampleSet::pairwise(x.view(), &[0], &[5]).unwrap_err();
        assert_eq!(err, SampleError::RowOutOfRange { index: 5, rows: 2 });
    }

    #[test]
    fn subset_keeps_requested_order() {
        let x = array![[0.0], [1.0], [2.0]];
        let set = LabeledSampleSet::new(x, vec![2, 0, 2]).unwrap();
        let (xs, ys) = set.subset(&[2, 1]);
        assert_eq!(xs, array![[2.0], [1.0]]);
        assert_eq!(ys.to_vec(), vec![2, 0]);
    }
}
