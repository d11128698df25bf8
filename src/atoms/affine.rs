//! Affine atoms.
//!
//! These are solver primitives: canonicalization maps them straight to
//! coefficient matrices without auxiliary variables.

use nalgebra::DMatrix;

use super::registry::*;
use super::AtomKind;
use crate::canon::affine::{
    lower_add, lower_index, lower_matmul, lower_mul, lower_neg, lower_reshape, lower_sum,
    lower_trace, lower_transpose, lower_vstack,
};
use crate::dcp::{join_sign, Sign};
use crate::error::{ConstructionError, CvxError, Result};
use crate::expr::{ExprGraph, ExprId, Inferred, Shape};

pub static ADD: AtomSpec = AtomSpec {
    name: "add",
    arity: Arity::AtLeast(1),
    shape: add_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: affine,
        monotonicity: nondecreasing,
    },
    sign: add_sign_rule,
    eval: eval_add,
    lowering: Lowering::Affine(lower_add),
};

pub static NEG: AtomSpec = AtomSpec {
    name: "neg",
    arity: Arity::Fixed(1),
    shape: same_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: affine,
        monotonicity: nonincreasing,
    },
    sign: |_, args| args.first().map_or(Sign::Unknown, |a| a.sign.negate()),
    eval: |_, args, _| map_first(args, |v| -v),
    lowering: Lowering::Affine(lower_neg),
};

pub static MUL: AtomSpec = AtomSpec {
    name: "mul",
    arity: Arity::Fixed(2),
    shape: |_, shapes| broadcast_shapes("mul", shapes),
    curvature: CurvatureRule::SignScaled,
    sign: |_, args| args.iter().map(|a| a.sign).fold(Sign::Positive, |acc, s| acc * s),
    eval: eval_mul,
    lowering: Lowering::Affine(lower_mul),
};

pub static MATMUL: AtomSpec = AtomSpec {
    name: "matmul",
    arity: Arity::Fixed(2),
    shape: matmul_shape,
    curvature: CurvatureRule::SignScaled,
    sign: matmul_sign,
    eval: eval_matmul,
    lowering: Lowering::Affine(lower_matmul),
};

pub static SUM: AtomSpec = AtomSpec {
    name: "sum",
    arity: Arity::Fixed(1),
    shape: scalar_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: affine,
        monotonicity: nondecreasing,
    },
    sign: first_arg_sign,
    eval: |_, args, _| DMatrix::from_element(1, 1, args.first().map_or(0.0, |m| m.sum())),
    lowering: Lowering::Affine(lower_sum),
};

pub static RESHAPE: AtomSpec = AtomSpec {
    name: "reshape",
    arity: Arity::Fixed(1),
    shape: reshape_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: affine,
        monotonicity: nondecreasing,
    },
    sign: first_arg_sign,
    eval: |_, args, shape| broadcast_value(&map_first(args, |v| v), shape),
    lowering: Lowering::Affine(lower_reshape),
};

pub static INDEX: AtomSpec = AtomSpec {
    name: "index",
    arity: Arity::Fixed(1),
    shape: index_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: affine,
        monotonicity: nondecreasing,
    },
    sign: first_arg_sign,
    eval: eval_index,
    lowering: Lowering::Affine(lower_index),
};

pub static VSTACK: AtomSpec = AtomSpec {
    name: "vstack",
    arity: Arity::AtLeast(1),
    shape: vstack_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: affine,
        monotonicity: nondecreasing,
    },
    sign: |_, args| args.iter().map(|a| a.sign).fold(Sign::Zero, join_sign),
    eval: eval_vstack,
    lowering: Lowering::Affine(lower_vstack),
};

pub static TRANSPOSE: AtomSpec = AtomSpec {
    name: "transpose",
    arity: Arity::Fixed(1),
    shape: |_, shapes| Ok(shapes.first().map(Shape::transpose).unwrap_or_default()),
    curvature: CurvatureRule::Composition {
        intrinsic: affine,
        monotonicity: nondecreasing,
    },
    sign: first_arg_sign,
    eval: |_, args, _| args.first().map_or_else(|| DMatrix::zeros(1, 1), |m| m.transpose()),
    lowering: Lowering::Affine(lower_transpose),
};

pub static TRACE: AtomSpec = AtomSpec {
    name: "trace",
    arity: Arity::Fixed(1),
    shape: trace_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: affine,
        monotonicity: nondecreasing,
    },
    sign: first_arg_sign,
    eval: |_, args, _| DMatrix::from_element(1, 1, args.first().map_or(0.0, |m| m.trace())),
    lowering: Lowering::Affine(lower_trace),
};

fn add_shape(_: &AtomKind, shapes: &[Shape]) -> std::result::Result<Shape, ConstructionError> {
    broadcast_shapes("add", shapes)
}

fn add_sign_rule(_: &AtomKind, args: &[Inferred]) -> Sign {
    args.iter().map(|a| a.sign).fold(Sign::Zero, |acc, s| acc + s)
}

fn matmul_shape(_: &AtomKind, shapes: &[Shape]) -> std::result::Result<Shape, ConstructionError> {
    match shapes {
        [a, b] => a.matmul(b).ok_or_else(|| ConstructionError::ShapeMismatch {
            atom: "matmul",
            expected: format!("an operand with {} rows", a.matmul_left_dims().1),
            got: b.to_string(),
        }),
        _ => Ok(Shape::scalar()),
    }
}

/// Conservative: entries of a product of same-signed matrices keep the sign.
fn matmul_sign(_: &AtomKind, args: &[Inferred]) -> Sign {
    match args {
        [a, b] if a.sign.is_zero() || b.sign.is_zero() => Sign::Zero,
        [a, b] => match (a.sign, b.sign) {
            (Sign::Unknown, _) | (_, Sign::Unknown) => Sign::Unknown,
            (x, y) => x * y,
        },
        _ => Sign::Unknown,
    }
}

fn reshape_shape(kind: &AtomKind, shapes: &[Shape]) -> std::result::Result<Shape, ConstructionError> {
    let (AtomKind::Reshape(target), Some(from)) = (kind, shapes.first()) else {
        return Ok(Shape::scalar());
    };
    if target.size() != from.size() {
        return Err(ConstructionError::ShapeMismatch {
            atom: "reshape",
            expected: format!("{} entries", target.size()),
            got: from.to_string(),
        });
    }
    Ok(target.clone())
}

fn index_shape(kind: &AtomKind, shapes: &[Shape]) -> std::result::Result<Shape, ConstructionError> {
    let (AtomKind::Index { start, stop }, Some(from)) = (kind, shapes.first()) else {
        return Ok(Shape::scalar());
    };
    if start >= stop || *stop > from.size() {
        return Err(ConstructionError::InvalidArgument {
            atom: "index",
            reason: format!("range {}..{} out of bounds for shape {}", start, stop, from),
        });
    }
    Ok(if stop - start == 1 {
        Shape::scalar()
    } else {
        Shape::vector(stop - start)
    })
}

fn vstack_shape(_: &AtomKind, shapes: &[Shape]) -> std::result::Result<Shape, ConstructionError> {
    let cols = shapes.first().map_or(1, Shape::cols);
    if let Some(bad) = shapes.iter().find(|s| s.cols() != cols) {
        return Err(ConstructionError::ShapeMismatch {
            atom: "vstack",
            expected: format!("{} column(s)", cols),
            got: bad.to_string(),
        });
    }
    let rows: usize = shapes.iter().map(Shape::rows).sum();
    if shapes.iter().all(|s| s.ndim() < 2) {
        Ok(Shape::vector(rows))
    } else {
        Ok(Shape::matrix(rows, cols))
    }
}

fn trace_shape(_: &AtomKind, shapes: &[Shape]) -> std::result::Result<Shape, ConstructionError> {
    match shapes.first() {
        Some(s) if s.rows() != s.cols() => Err(ConstructionError::ShapeMismatch {
            atom: "trace",
            expected: "a square matrix".into(),
            got: s.to_string(),
        }),
        _ => Ok(Shape::scalar()),
    }
}

fn eval_add(_: &AtomKind, args: &[&DMatrix<f64>], shape: &Shape) -> DMatrix<f64> {
    args.iter().fold(DMatrix::zeros(shape.rows(), shape.cols()), |acc, m| {
        acc + broadcast_value(m, shape)
    })
}

fn eval_mul(_: &AtomKind, args: &[&DMatrix<f64>], shape: &Shape) -> DMatrix<f64> {
    match args {
        [a, b] => broadcast_value(a, shape).component_mul(&broadcast_value(b, shape)),
        _ => DMatrix::zeros(shape.rows(), shape.cols()),
    }
}

fn eval_matmul(_: &AtomKind, args: &[&DMatrix<f64>], shape: &Shape) -> DMatrix<f64> {
    let [a, b] = args else {
        return DMatrix::zeros(shape.rows(), shape.cols());
    };
    // A vector on the left acts as a row.
    let a = if a.ncols() != b.nrows() {
        a.transpose()
    } else {
        (*a).clone()
    };
    let product = a * *b;
    DMatrix::from_column_slice(shape.rows(), shape.cols(), product.as_slice())
}

fn eval_index(kind: &AtomKind, args: &[&DMatrix<f64>], shape: &Shape) -> DMatrix<f64> {
    match (kind, args.first()) {
        (AtomKind::Index { start, stop }, Some(m)) => {
            DMatrix::from_column_slice(shape.rows(), shape.cols(), &m.as_slice()[*start..*stop])
        }
        _ => DMatrix::zeros(shape.rows(), shape.cols()),
    }
}

fn eval_vstack(_: &AtomKind, args: &[&DMatrix<f64>], shape: &Shape) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(shape.rows(), shape.cols());
    let mut offset = 0;
    for m in args {
        out.view_mut((offset, 0), (m.nrows(), m.ncols())).copy_from(*m);
        offset += m.nrows();
    }
    out
}

impl ExprGraph {
    /// `a + b`, broadcasting single-entry operands.
    pub fn add(&mut self, a: ExprId, b: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Add, vec![a, b])
    }

    /// Sum of several expressions.
    pub fn add_all(&mut self, terms: &[ExprId]) -> Result<ExprId> {
        self.add_atom(AtomKind::Add, terms.to_vec())
    }

    /// `a - b`.
    pub fn sub(&mut self, a: ExprId, b: ExprId) -> Result<ExprId> {
        let neg_b = self.neg(b)?;
        self.add(a, neg_b)
    }

    pub fn neg(&mut self, a: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Neg, vec![a])
    }

    /// Elementwise `a * b`. DCP requires one factor to be constant.
    pub fn mul(&mut self, a: ExprId, b: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Mul, vec![a, b])
    }

    /// `c * a` for a numeric scalar `c`.
    pub fn scale(&mut self, c: f64, a: ExprId) -> Result<ExprId> {
        self.check(a)?;
        let c = self.constant(c);
        self.mul(c, a)
    }

    /// Matrix product `a @ b`. DCP requires one operand to be constant.
    pub fn matmul(&mut self, a: ExprId, b: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::MatMul, vec![a, b])
    }

    /// Inner product of two vectors.
    pub fn dot(&mut self, a: ExprId, b: ExprId) -> Result<ExprId> {
        if !self.shape(a)?.is_vector() || !self.shape(b)?.is_vector() {
            return Err(CvxError::Construction(ConstructionError::ShapeMismatch {
                atom: "matmul",
                expected: "two vectors".into(),
                got: format!("{} and {}", self.shape(a)?, self.shape(b)?),
            }));
        }
        self.matmul(a, b)
    }

    /// Sum of all entries.
    pub fn sum(&mut self, a: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Sum, vec![a])
    }

    /// Column-major reshape.
    pub fn reshape(&mut self, a: ExprId, shape: impl Into<Shape>) -> Result<ExprId> {
        self.add_atom(AtomKind::Reshape(shape.into()), vec![a])
    }

    /// Entries `start..stop` of the column-major flattening.
    pub fn index(&mut self, a: ExprId, start: usize, stop: usize) -> Result<ExprId> {
        self.add_atom(AtomKind::Index { start, stop }, vec![a])
    }

    /// Scalar entry `i` of the column-major flattening.
    pub fn entry(&mut self, a: ExprId, i: usize) -> Result<ExprId> {
        self.index(a, i, i + 1)
    }

    pub fn vstack(&mut self, parts: &[ExprId]) -> Result<ExprId> {
        self.add_atom(AtomKind::VStack, parts.to_vec())
    }

    pub fn transpose(&mut self, a: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Transpose, vec![a])
    }

    pub fn trace(&mut self, a: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Trace, vec![a])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::dcp::Curvature;
    use crate::expr::Array;

    #[test]
    fn test_add_shapes() {
        let mut g = ExprGraph::new();
        let x = g.variable(3);
        let c = g.constant(1.0);
        let y = g.variable(4);
        let sum = g.add(x, c).unwrap();
        assert_eq!(g.shape(sum).unwrap(), &Shape::vector(3));
        assert!(matches!(
            g.add(x, y),
            Err(CvxError::Construction(ConstructionError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn test_arity_is_checked() {
        let mut g = ExprGraph::new();
        let x = g.variable(());
        assert!(matches!(
            g.add_atom(AtomKind::Neg, vec![x, x]),
            Err(CvxError::Construction(ConstructionError::Arity { got: 2, .. }))
        ));
        assert!(g.add_atom(AtomKind::Add, vec![]).is_err());
    }

    #[test]
    fn test_scalar_multiplication_curvature() {
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let a = g.abs(x).unwrap();
        let pos = g.scale(2.0, a).unwrap();
        let neg = g.scale(-2.0, a).unwrap();
        let zero = g.scale(0.0, a).unwrap();
        assert_eq!(g.curvature(pos).unwrap(), Curvature::Convex);
        assert_eq!(g.curvature(neg).unwrap(), Curvature::Concave);
        assert_eq!(g.curvature(zero).unwrap(), Curvature::Affine);
        assert_eq!(g.sign(zero).unwrap(), Sign::Zero);
    }

    #[test]
    fn test_product_of_variables_is_unknown() {
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let y = g.variable(());
        let p = g.mul(x, y).unwrap();
        assert_eq!(g.curvature(p).unwrap(), Curvature::Unknown);
    }

    #[test]
    fn test_constant_subtree_is_constant() {
        let mut g = ExprGraph::new();
        let a = g.constant(vec![1.0, -2.0]);
        let b = g.abs(a).unwrap();
        let s = g.sum(b).unwrap();
        assert_eq!(g.curvature(s).unwrap(), Curvature::Constant);
    }

    #[test]
    fn test_structural_atoms_evaluate() {
        let mut g = ExprGraph::new();
        let m = g.constant_matrix(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let t = g.transpose(m).unwrap();
        let tr = g.trace(m).unwrap();
        let flat = g.reshape(m, 4).unwrap();
        let mid = g.index(flat, 1, 3).unwrap();
        let stacked = g.vstack(&[m, t]).unwrap();
        let none = HashMap::<ExprId, Array>::new();

        assert_eq!(g.evaluate(t, &none).unwrap()[(0, 1)], 2.0);
        assert_eq!(g.evaluate(tr, &none).unwrap()[(0, 0)], 5.0);
        assert_eq!(g.evaluate(mid, &none).unwrap().as_slice(), &[2.0, 3.0]);
        assert_eq!(g.shape(stacked).unwrap(), &Shape::matrix(4, 2));
        assert_eq!(g.evaluate(stacked, &none).unwrap()[(3, 0)], 3.0);
    }

    #[test]
    fn test_matmul_evaluates_row_vector_on_left() {
        let mut g = ExprGraph::new();
        let v = g.constant(vec![1.0, 1.0]);
        let m = g.constant_matrix(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let p = g.matmul(v, m).unwrap();
        let value = g.evaluate(p, &HashMap::new()).unwrap();
        assert_eq!(value.as_slice(), &[3.0, 7.0]);
    }

    #[test]
    fn test_index_out_of_bounds() {
        let mut g = ExprGraph::new();
        let x = g.variable(3);
        assert!(g.index(x, 2, 5).is_err());
        assert!(g.index(x, 2, 2).is_err());
        assert!(g.reshape(x, (2, 2)).is_err());
    }
}
