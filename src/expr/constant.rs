//! Constant values and constant node creation.

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use super::expression::{ConstantData, ExprGraph, ExprId, Node};
use super::shape::Shape;
use crate::dcp::Sign;
use crate::sparse::csc_to_dense;

/// Numeric array storage (scalar, dense or sparse).
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    /// Scalar value.
    Scalar(f64),
    /// Dense matrix storage. An `n x 1` matrix is a vector.
    Dense(DMatrix<f64>),
    /// Sparse CSC matrix storage.
    Sparse(CscMatrix<f64>),
}

impl Array {
    /// Get the shape of the array.
    pub fn shape(&self) -> Shape {
        match self {
            Array::Scalar(_) => Shape::scalar(),
            Array::Dense(m) => Shape::of_dims(m.nrows(), m.ncols()),
            Array::Sparse(m) => Shape::of_dims(m.nrows(), m.ncols()),
        }
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.shape().size()
    }

    /// Try to get as a scalar value.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Array::Scalar(v) => Some(*v),
            Array::Dense(m) if m.len() == 1 => Some(m[(0, 0)]),
            _ => None,
        }
    }

    /// Dense copy with the dimensions of its shape.
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Array::Scalar(v) => DMatrix::from_element(1, 1, *v),
            Array::Dense(m) => m.clone(),
            Array::Sparse(m) => csc_to_dense(m),
        }
    }

    /// Sign of the data, counting implicit zeros of sparse storage.
    pub fn sign(&self) -> Sign {
        match self {
            Array::Scalar(v) => Sign::of_value(*v),
            Array::Dense(m) => Sign::of_values(m.iter().copied()),
            Array::Sparse(m) => Sign::of_values(m.values().iter().copied()),
        }
    }

    /// Wrap a dense value, collapsing `1 x 1` to a scalar.
    pub fn from_dense(m: DMatrix<f64>) -> Self {
        if m.nrows() == 1 && m.ncols() == 1 {
            Array::Scalar(m[(0, 0)])
        } else {
            Array::Dense(m)
        }
    }

    /// Create from a vector.
    pub fn from_vec(v: Vec<f64>) -> Self {
        let n = v.len();
        Array::Dense(DMatrix::from_vec(n, 1, v))
    }
}

impl From<f64> for Array {
    fn from(v: f64) -> Self {
        Array::Scalar(v)
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::from_vec(v)
    }
}

impl From<&[f64]> for Array {
    fn from(v: &[f64]) -> Self {
        Array::from_vec(v.to_vec())
    }
}

impl From<DMatrix<f64>> for Array {
    fn from(m: DMatrix<f64>) -> Self {
        Array::Dense(m)
    }
}

impl From<CscMatrix<f64>> for Array {
    fn from(m: CscMatrix<f64>) -> Self {
        Array::Sparse(m)
    }
}

impl ExprGraph {
    /// Add a constant node.
    ///
    /// ```
    /// use cvxcanon::prelude::*;
    ///
    /// let mut g = ExprGraph::new();
    /// let five = g.constant(5.0);
    /// let v = g.constant(vec![1.0, 2.0]);
    /// assert_eq!(g.shape(v).unwrap(), &Shape::vector(2));
    /// assert_eq!(g.sign(five).unwrap(), Sign::Positive);
    /// ```
    pub fn constant(&mut self, value: impl Into<Array>) -> ExprId {
        let value = value.into();
        let shape = value.shape();
        self.push(Node::Constant(ConstantData { value }), shape)
    }

    /// Add a dense matrix constant from column-major data.
    pub fn constant_matrix(&mut self, values: Vec<f64>, rows: usize, cols: usize) -> ExprId {
        self.constant(DMatrix::from_vec(rows, cols, values))
    }

    /// Add a zero constant with the given shape.
    pub fn zeros(&mut self, shape: impl Into<Shape>) -> ExprId {
        self.filled(shape.into(), 0.0)
    }

    /// Add a ones constant with the given shape.
    pub fn ones(&mut self, shape: impl Into<Shape>) -> ExprId {
        self.filled(shape.into(), 1.0)
    }

    /// Add an identity matrix constant.
    pub fn eye(&mut self, n: usize) -> ExprId {
        self.constant(DMatrix::<f64>::identity(n, n))
    }

    fn filled(&mut self, shape: Shape, v: f64) -> ExprId {
        let value = if shape.is_scalar() {
            Array::Scalar(v)
        } else {
            Array::Dense(DMatrix::from_element(shape.rows(), shape.cols(), v))
        };
        self.push(Node::Constant(ConstantData { value }), shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_shapes() {
        assert_eq!(Array::Scalar(1.0).shape(), Shape::scalar());
        assert_eq!(Array::from_vec(vec![1.0, 2.0]).shape(), Shape::vector(2));
        assert_eq!(Array::Dense(DMatrix::zeros(2, 3)).shape(), Shape::matrix(2, 3));
    }

    #[test]
    fn test_array_sign() {
        assert_eq!(Array::from_vec(vec![0.0, 1.0]).sign(), Sign::Positive);
        assert_eq!(Array::Scalar(0.0).sign(), Sign::Zero);
        let sparse = CscMatrix::identity(3);
        assert_eq!(Array::Sparse(sparse).sign(), Sign::Positive);
    }

    #[test]
    fn test_filled_constants() {
        let mut g = ExprGraph::new();
        let z = g.zeros(4);
        let o = g.ones((2, 2));
        assert_eq!(g.sign(z).unwrap(), Sign::Zero);
        assert_eq!(g.shape(o).unwrap(), &Shape::matrix(2, 2));
    }
}
