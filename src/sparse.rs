//! Sparse matrix utilities.
//!
//! Helper functions for working with nalgebra-sparse matrices. All
//! constructors go through COO, so duplicate entries are summed.

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Create a CSC matrix from `(row, col, value)` triplets.
///
/// Duplicates are summed together; out-of-range entries are dropped.
pub fn csc_from_triplets(
    nrows: usize,
    ncols: usize,
    triplets: impl IntoIterator<Item = (usize, usize, f64)>,
) -> CscMatrix<f64> {
    let mut coo = CooMatrix::new(nrows, ncols);
    for (row, col, val) in triplets {
        if row < nrows && col < ncols {
            coo.push(row, col, val);
        }
    }
    CscMatrix::from(&coo)
}

/// Convert a dense matrix to CSC format, skipping exact zeros.
pub fn dense_to_csc(dense: &DMatrix<f64>) -> CscMatrix<f64> {
    let triplets = (0..dense.ncols()).flat_map(|j| {
        (0..dense.nrows()).filter_map(move |i| {
            let v = dense[(i, j)];
            (v != 0.0).then_some((i, j, v))
        })
    });
    csc_from_triplets(dense.nrows(), dense.ncols(), triplets)
}

/// Convert CSC to dense matrix.
pub fn csc_to_dense(sparse: &CscMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(sparse.nrows(), sparse.ncols());
    for (row, col, val) in sparse.triplet_iter() {
        dense[(row, col)] += *val;
    }
    dense
}

/// Add two CSC matrices of equal dimensions.
pub fn csc_add(a: &CscMatrix<f64>, b: &CscMatrix<f64>) -> CscMatrix<f64> {
    let triplets = a
        .triplet_iter()
        .chain(b.triplet_iter())
        .map(|(r, c, v)| (r, c, *v));
    csc_from_triplets(a.nrows(), a.ncols(), triplets)
}

/// Scale a CSC matrix.
pub fn csc_scale(a: &CscMatrix<f64>, scalar: f64) -> CscMatrix<f64> {
    let mut scaled = a.clone();
    for v in scaled.values_mut() {
        *v *= scalar;
    }
    scaled
}

/// Sparse product `a * b`.
pub fn csc_matmul(a: &CscMatrix<f64>, b: &CscMatrix<f64>) -> CscMatrix<f64> {
    let mut triplets = Vec::new();
    for j in 0..b.ncols() {
        let b_col = b.col(j);
        for (&k, &v) in b_col.row_indices().iter().zip(b_col.values()) {
            let a_col = a.col(k);
            for (&i, &u) in a_col.row_indices().iter().zip(a_col.values()) {
                triplets.push((i, j, u * v));
            }
        }
    }
    csc_from_triplets(a.nrows(), b.ncols(), triplets)
}

/// Sparse matrix times dense vector.
pub fn csc_mul_vec(a: &CscMatrix<f64>, x: &[f64]) -> Vec<f64> {
    let mut y = vec![0.0; a.nrows()];
    for (row, col, val) in a.triplet_iter() {
        y[row] += val * x[col];
    }
    y
}
