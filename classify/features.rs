//! # Connectivity Feature Extraction
//!
//! A connectivity matrix is symmetric, so every subject is reduced to the values
//! strictly below its diagonal. The index set is computed once from the region
//! count and then shared by every subject of a run: the column order of the
//! resulting feature matrix is fixed by `LowerTriangle`, never by the subject.

use ndarray::{Array1, Array2, ArrayView2};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FeatureError {
    #[error(
        "Connectivity matrix has shape {rows}x{cols}, but the region set defines {expected}x{expected}."
    )]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        expected: usize,
    },
    #[error("Cannot build a feature matrix from zero subjects.")]
    NoSubjects,
}

/// The ordered strictly-lower-triangular positions of an `R x R` matrix.
///
/// Order is row-major: `(1,0), (2,0), (2,1), (3,0), ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerTriangle {
    dim: usize,
    positions: Vec<(usize, usize)>,
}

impl LowerTriangle {
    pub fn new(dim: usize) -> Self {
        let mut positions = Vec::with_capacity(Self::len_for(dim));
        for row in 1..dim {
            for col in 0..row {
                positions.push((row, col));
            }
        }
        Self { dim, positions }
    }

    /// Number of strictly-lower entries for dimension `dim`.
    pub fn len_for(dim: usize) -> usize {
        dim * dim.saturating_sub(1) / 2
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[(usize, usize)] {
        &self.positions
    }

    /// Reads the matrix values at every index position, in index order.
    pub fn extract(&self, matrix: ArrayView2<f64>) -> Result<Array1<f64>, FeatureError> {
        let (rows, cols) = matrix.dim();
        if rows != self.dim || cols != self.dim {
            return Err(FeatureError::ShapeMismatch {
                rows,
                cols,
                expected: self.dim,
            });
        }
        Ok(self
            .positions
            .iter()
            .map(|&(row, col)| matrix[(row, col)])
            .collect())
    }
}

/// Stacks one feature row per matrix, in the order the matrices are given.
pub fn stack_features<'a, I>(index: &LowerTriangle, matrices: I) -> Result<Array2<f64>, FeatureError>
where
    I: IntoIterator<Item = ArrayView2<'a, f64>>,
{
    let rows = matrices
        .into_iter()
        .map(|matrix| index.extract(matrix))
        .collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Err(FeatureError::NoSubjects);
    }
    let mut features = Array2::zeros((rows.len(), index.len()));
    for (i, row) in rows.iter().enumerate() {
        features.row_mut(i).assign(row);
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn index_set_has_triangular_size() {
        for r in 2..40 {
            let tri = LowerTriangle::new(r);
            assert_eq!(tri.len(), r * (r - 1) / 2);
            assert!(tri.positions().iter().all(|&(i, j)| i > j && i < r));
        }
        assert!(LowerTriangle::new(0).is_empty());
        assert!(LowerTriangle::new(1).is_empty());
    }

    #[test]
    fn index_order_is_stable_and_row_major() {
        let a = LowerTriangle::new(4);
        let b = LowerTriangle::new(4);
        assert_eq!(a, b);
        assert_eq!(
            a.positions(),
            &[(1, 0), (2, 0), (2, 1), (3, 0), (3, 1), (3, 2)]
        );
    }

    #[test]
    fn extract_reads_lower_values() {
        let m = array![[1.0, 0.1, 0.2], [0.1, 1.0, 0.3], [0.2, 0.3, 1.0]];
        let tri = LowerTriangle::new(3);
        let v = tri.extract(m.view()).unwrap();
        assert_eq!(v.to_vec(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn extract_rejects_wrong_shape() {
        let tri = LowerTriangle::new(3);
        let m = Array2::<f64>::zeros((3, 4));
        assert_eq!(
            tri.extract(m.view()),
            Err(FeatureError::ShapeMismatch {
                rows: 3,
                cols: 4,
                expected: 3
            })
        );
    }

    #[test]
    fn stack_keeps_subject_order() {
        let tri = LowerTriangle::new(2);
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let b = array![[0.0, 2.0], [2.0, 0.0]];
        let x = stack_features(&tri, [a.view(), b.view()]).unwrap();
        assert_eq!(x, array![[1.0], [2.0]]);
    }

    #[test]
    fn stack_rejects_empty_input() {
        let tri = LowerTriangle::new(3);
        let empty: Vec<ArrayView2<f64>> = Vec::new();
        assert_eq!(stack_features(&tri, empty), Err(FeatureError::NoSubjects));
    }
}
