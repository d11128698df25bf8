//! Shape representation for expressions.
//!
//! Expressions are at most two-dimensional:
//! - `()` is a scalar
//! - `(n,)` is a vector of length n (an n x 1 column)
//! - `(m, n)` is an m x n matrix
//!
//! Values are flattened in column-major order whenever an expression is
//! viewed as a vector (coefficient rows, reshapes, flat indexing).

use std::fmt;

/// Shape of an expression.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a scalar shape.
    pub fn scalar() -> Self {
        Shape(vec![])
    }

    /// Create a vector shape.
    pub fn vector(n: usize) -> Self {
        Shape(vec![n])
    }

    /// Create a matrix shape.
    pub fn matrix(m: usize, n: usize) -> Self {
        Shape(vec![m, n])
    }

    /// Shape for a dense value of the given dimensions.
    ///
    /// `1 x 1` becomes a scalar and `n x 1` a vector.
    pub fn of_dims(rows: usize, cols: usize) -> Self {
        match (rows, cols) {
            (1, 1) => Shape::scalar(),
            (n, 1) => Shape::vector(n),
            (m, n) => Shape::matrix(m, n),
        }
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    /// Number of dimensions (0 for scalar, 1 for vector, 2 for matrix).
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Get the dimensions as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_vector(&self) -> bool {
        self.0.len() == 1
    }

    pub fn is_matrix(&self) -> bool {
        self.0.len() == 2
    }

    /// Whether the shape holds exactly one element.
    pub fn is_unit(&self) -> bool {
        self.size() == 1
    }

    /// Number of rows (1 for scalar, n for vector, m for matrix).
    pub fn rows(&self) -> usize {
        match self.0.len() {
            0 => 1,
            _ => self.0[0],
        }
    }

    /// Number of columns (1 for scalar and vector).
    pub fn cols(&self) -> usize {
        match self.0.len() {
            2 => self.0[1],
            _ => 1,
        }
    }

    /// Get the transposed shape. A vector becomes a `1 x n` row.
    pub fn transpose(&self) -> Self {
        match self.0.len() {
            0 => Shape::scalar(),
            1 => Shape::matrix(1, self.0[0]),
            _ => Shape::matrix(self.0[1], self.0[0]),
        }
    }

    /// Elementwise broadcast: equal shapes, or one side holds one element.
    pub fn broadcast(&self, other: &Shape) -> Option<Shape> {
        if self == other || other.is_unit() {
            Some(self.clone())
        } else if self.is_unit() {
            Some(other.clone())
        } else {
            None
        }
    }

    /// Result shape of `self @ other`.
    ///
    /// A vector on the left is a row, a vector on the right a column.
    pub fn matmul(&self, other: &Shape) -> Option<Shape> {
        let (_, inner_left) = self.matmul_left_dims();
        let (inner_right, _) = other.matmul_right_dims();
        if self.is_scalar() || other.is_scalar() || inner_left != inner_right {
            return None;
        }
        match (self.ndim(), other.ndim()) {
            (2, 2) => Some(Shape::matrix(self.rows(), other.cols())),
            (2, 1) => Some(Shape::vector(self.rows())),
            (1, 2) => Some(Shape::vector(other.cols())),
            (1, 1) => Some(Shape::scalar()),
            _ => None,
        }
    }

    /// Dimensions of this shape as the left operand of a matrix product.
    pub fn matmul_left_dims(&self) -> (usize, usize) {
        match self.0.len() {
            1 => (1, self.0[0]),
            _ => (self.rows(), self.cols()),
        }
    }

    /// Dimensions of this shape as the right operand of a matrix product.
    pub fn matmul_right_dims(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.0)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.len() {
            0 => write!(f, "()"),
            1 => write!(f, "({},)", self.0[0]),
            _ => write!(f, "({}, {})", self.0[0], self.0[1]),
        }
    }
}

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape::scalar()
    }
}

impl From<usize> for Shape {
    fn from(n: usize) -> Self {
        Shape::vector(n)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((m, n): (usize, usize)) -> Self {
        Shape::matrix(m, n)
    }
}
