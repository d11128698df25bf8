//! Affine expressions in coefficient form.
//!
//! After canonicalization every expression is `sum_k A_k * vec(x_k) + vec(b)`
//! where each `x_k` is an original or auxiliary variable, `vec` flattens in
//! column-major order, and `A_k` has one row per entry of the expression.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use crate::expr::{ExprId, Shape};
use crate::sparse::{csc_add, csc_from_triplets, csc_matmul, csc_mul_vec, csc_scale};

/// Optimization variable of the cone program.
///
/// Original variables order before auxiliaries; auxiliaries are numbered in
/// order of introduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VarKey {
    Original(ExprId),
    Aux(usize),
}

/// An affine expression: `sum_k A_k * x_k + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinExpr {
    /// Coefficient matrix per variable, of size `(self.size(), var_size)`.
    pub coeffs: BTreeMap<VarKey, CscMatrix<f64>>,
    /// Constant term, with the dimensions of `shape`.
    pub constant: DMatrix<f64>,
    pub shape: Shape,
    /// Part of the data came from a parameter value. Zero entries of such
    /// data are structural: they stay in the sparsity pattern of `A`.
    pub parametric: bool,
}

impl LinExpr {
    /// Create a zero linear expression with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        LinExpr {
            coeffs: BTreeMap::new(),
            constant: DMatrix::zeros(shape.rows(), shape.cols()),
            shape,
            parametric: false,
        }
    }

    /// A single variable (identity coefficient).
    pub fn variable(key: VarKey, shape: Shape) -> Self {
        let mut coeffs = BTreeMap::new();
        coeffs.insert(key, CscMatrix::identity(shape.size()));
        LinExpr {
            coeffs,
            constant: DMatrix::zeros(shape.rows(), shape.cols()),
            shape,
            parametric: false,
        }
    }

    /// A constant with the given shape; `value` is reshaped column-major.
    pub fn constant(value: &DMatrix<f64>, shape: Shape) -> Self {
        let constant = if value.nrows() == shape.rows() && value.ncols() == shape.cols() {
            value.clone()
        } else {
            DMatrix::from_column_slice(shape.rows(), shape.cols(), value.as_slice())
        };
        LinExpr {
            coeffs: BTreeMap::new(),
            constant,
            shape,
            parametric: false,
        }
    }

    /// Create a scalar constant.
    pub fn scalar(value: f64) -> Self {
        LinExpr {
            coeffs: BTreeMap::new(),
            constant: DMatrix::from_element(1, 1, value),
            shape: Shape::scalar(),
            parametric: false,
        }
    }

    /// Mark the data as derived from a parameter value.
    pub fn into_parametric(mut self) -> Self {
        self.parametric = true;
        self
    }

    /// Check if this is a constant (no variables).
    pub fn is_constant(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Get the output size (flattened).
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Variables with a coefficient block, in column order.
    pub fn variables(&self) -> Vec<VarKey> {
        self.coeffs.keys().copied().collect()
    }

    /// Apply a linear map to the flattened expression.
    ///
    /// `op` has `shape.size()` rows and `self.size()` columns.
    pub fn transform(&self, op: &CscMatrix<f64>, shape: Shape) -> LinExpr {
        let coeffs = self
            .coeffs
            .iter()
            .map(|(k, a)| (*k, csc_matmul(op, a)))
            .collect();
        let flat = csc_mul_vec(op, self.constant.as_slice());
        LinExpr {
            coeffs,
            constant: DMatrix::from_vec(shape.rows(), shape.cols(), flat),
            shape,
            parametric: self.parametric,
        }
    }

    /// Same entries, different shape (column-major reshape).
    pub fn reshape(&self, shape: Shape) -> LinExpr {
        LinExpr {
            coeffs: self.coeffs.clone(),
            constant: DMatrix::from_column_slice(shape.rows(), shape.cols(), self.constant.as_slice()),
            shape,
            parametric: self.parametric,
        }
    }

    /// Broadcast to `shape`: a single-entry expression is repeated, an
    /// expression of matching size is reshaped.
    pub fn broadcast_to(&self, shape: &Shape) -> LinExpr {
        if self.size() == shape.size() {
            if &self.shape == shape {
                return self.clone();
            }
            return self.reshape(shape.clone());
        }
        let ones = csc_from_triplets(shape.size(), 1, (0..shape.size()).map(|i| (i, 0, 1.0)));
        self.transform(&ones, shape.clone())
    }

    /// Add two linear expressions, broadcasting a single-entry operand.
    pub fn add(&self, other: &LinExpr) -> LinExpr {
        let shape = if self.size() >= other.size() {
            self.shape.clone()
        } else {
            other.shape.clone()
        };
        let parametric = self.parametric || other.parametric;
        let lhs = self.broadcast_to(&shape);
        let rhs = other.broadcast_to(&shape);

        let mut coeffs = lhs.coeffs;
        for (key, coeff) in rhs.coeffs {
            match coeffs.get_mut(&key) {
                Some(existing) => *existing = csc_add(existing, &coeff),
                None => {
                    coeffs.insert(key, coeff);
                }
            }
        }
        LinExpr {
            coeffs,
            constant: lhs.constant + rhs.constant,
            shape,
            parametric,
        }
    }

    /// `self - other`.
    pub fn sub(&self, other: &LinExpr) -> LinExpr {
        self.add(&other.neg())
    }

    /// Negate a linear expression.
    pub fn neg(&self) -> LinExpr {
        self.scale(-1.0)
    }

    /// Scale by a scalar.
    pub fn scale(&self, scalar: f64) -> LinExpr {
        LinExpr {
            coeffs: self
                .coeffs
                .iter()
                .map(|(k, v)| (*k, csc_scale(v, scalar)))
                .collect(),
            constant: &self.constant * scalar,
            shape: self.shape.clone(),
            parametric: self.parametric,
        }
    }

    /// Entrywise product with a constant of the same size.
    pub fn mul_elementwise(&self, weights: &DMatrix<f64>) -> LinExpr {
        let n = self.size();
        let diag = csc_from_triplets(n, n, weights.iter().enumerate().map(|(i, &w)| (i, i, w)));
        self.transform(&diag, self.shape.clone())
    }

    /// Entries `start..stop` of the flattening, as a vector (or scalar).
    pub fn slice(&self, start: usize, stop: usize) -> LinExpr {
        let len = stop.saturating_sub(start);
        let select = csc_from_triplets(len, self.size(), (0..len).map(|i| (i, start + i, 1.0)));
        let shape = if len == 1 {
            Shape::scalar()
        } else {
            Shape::vector(len)
        };
        self.transform(&select, shape)
    }

    /// Scalar entry `i` of the flattening.
    pub fn entry(&self, i: usize) -> LinExpr {
        self.slice(i, i + 1)
    }

    /// Sum of all entries.
    pub fn sum(&self) -> LinExpr {
        let ones = csc_from_triplets(1, self.size(), (0..self.size()).map(|j| (0, j, 1.0)));
        self.transform(&ones, Shape::scalar())
    }

    /// Flattened concatenation of `parts`, as a vector.
    pub fn concat(parts: &[LinExpr]) -> LinExpr {
        let total: usize = parts.iter().map(LinExpr::size).sum();
        let shape = Shape::vector(total);
        let mut offset = 0;
        let mut result = LinExpr::zeros(shape.clone());
        for part in parts {
            let n = part.size();
            let place = csc_from_triplets(total, n, (0..n).map(|i| (offset + i, i, 1.0)));
            result = result.add(&part.transform(&place, shape.clone()));
            offset += n;
        }
        result
    }

    /// Constant value when the expression has no variables.
    pub fn constant_value(&self) -> Option<&DMatrix<f64>> {
        self.is_constant().then_some(&self.constant)
    }
}
