//! Lowering of solver-primitive (affine) atoms to coefficient form.
//!
//! Every rule here builds a sparse linear map on the column-major
//! flattening of its arguments and applies it with [`LinExpr::transform`].

use nalgebra::DMatrix;

use super::lin_expr::LinExpr;
use crate::atoms::AtomKind;
use crate::error::CanonicalizationError;
use crate::expr::Shape;
use crate::sparse::csc_from_triplets;

type Lowered = Result<LinExpr, CanonicalizationError>;

pub(crate) fn arg<'a>(
    kind: &AtomKind,
    args: &'a [LinExpr],
    i: usize,
) -> Result<&'a LinExpr, CanonicalizationError> {
    args.get(i).ok_or_else(|| {
        CanonicalizationError::new(kind.name(), format!("missing argument {}", i))
    })
}

pub fn lower_add(_: &AtomKind, args: &[LinExpr], shape: &Shape) -> Lowered {
    Ok(args
        .iter()
        .fold(LinExpr::zeros(shape.clone()), |acc, a| acc.add(a)))
}

pub fn lower_neg(kind: &AtomKind, args: &[LinExpr], _: &Shape) -> Lowered {
    Ok(arg(kind, args, 0)?.neg())
}

/// Elementwise product; one factor must have folded to a constant.
pub fn lower_mul(kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Lowered {
    let (a, b) = (arg(kind, args, 0)?, arg(kind, args, 1)?);
    let (weights, expr) = match (a.constant_value(), b.constant_value()) {
        (Some(c), _) => (c, b),
        (None, Some(c)) => (c, a),
        (None, None) => {
            return Err(CanonicalizationError::new(
                kind.name(),
                "product of two non-constant expressions",
            ))
        }
    };
    if weights.len() == 1 {
        return Ok(expr.scale(weights[(0, 0)]).broadcast_to(shape));
    }
    let expr = expr.broadcast_to(shape);
    let weights = DMatrix::from_column_slice(shape.rows(), shape.cols(), weights.as_slice());
    Ok(expr.mul_elementwise(&weights))
}

/// Matrix product; one operand must have folded to a constant.
///
/// Zero entries of a literal constant are pruned. Zero entries of parameter
/// data are kept so the operator's pattern does not depend on the value.
pub fn lower_matmul(kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Lowered {
    let (a, b) = (arg(kind, args, 0)?, arg(kind, args, 1)?);
    let (p, m) = a.shape.matmul_left_dims();
    let (_, n) = b.shape.matmul_right_dims();

    if let Some(left) = a.constant_value() {
        // vec(A E) = (I_n ⊗ A) vec(E)
        let left = DMatrix::from_column_slice(p, m, left.as_slice());
        let keep_zeros = a.parametric;
        let mut triplets = Vec::new();
        for j in 0..n {
            for c in 0..m {
                for r in 0..p {
                    let v = left[(r, c)];
                    if v != 0.0 || keep_zeros {
                        triplets.push((j * p + r, j * m + c, v));
                    }
                }
            }
        }
        let op = csc_from_triplets(p * n, m * n, triplets);
        return Ok(b.transform(&op, shape.clone()));
    }

    if let Some(right) = b.constant_value() {
        // vec(E B) = (B' ⊗ I_p) vec(E)
        let right = DMatrix::from_column_slice(m, n, right.as_slice());
        let keep_zeros = b.parametric;
        let mut triplets = Vec::new();
        for k in 0..n {
            for j in 0..m {
                let v = right[(j, k)];
                if v != 0.0 || keep_zeros {
                    for i in 0..p {
                        triplets.push((i + k * p, i + j * p, v));
                    }
                }
            }
        }
        let op = csc_from_triplets(p * n, p * m, triplets);
        return Ok(a.transform(&op, shape.clone()));
    }

    Err(CanonicalizationError::new(
        kind.name(),
        "product of two non-constant expressions",
    ))
}

pub fn lower_sum(kind: &AtomKind, args: &[LinExpr], _: &Shape) -> Lowered {
    Ok(arg(kind, args, 0)?.sum())
}

pub fn lower_reshape(kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Lowered {
    Ok(arg(kind, args, 0)?.reshape(shape.clone()))
}

pub fn lower_index(kind: &AtomKind, args: &[LinExpr], _: &Shape) -> Lowered {
    match kind {
        AtomKind::Index { start, stop } => Ok(arg(kind, args, 0)?.slice(*start, *stop)),
        _ => Err(CanonicalizationError::new(kind.name(), "not an index atom")),
    }
}

pub fn lower_vstack(_: &AtomKind, args: &[LinExpr], shape: &Shape) -> Lowered {
    let total_rows = shape.rows();
    let cols = shape.cols();
    let mut result = LinExpr::zeros(shape.clone());
    let mut offset = 0;
    for part in args {
        let rows = part.shape.rows();
        let triplets = (0..cols).flat_map(|j| {
            (0..rows).map(move |i| (offset + i + j * total_rows, i + j * rows, 1.0))
        });
        let op = csc_from_triplets(shape.size(), part.size(), triplets);
        result = result.add(&part.transform(&op, shape.clone()));
        offset += rows;
    }
    Ok(result)
}

pub fn lower_transpose(kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Lowered {
    let a = arg(kind, args, 0)?;
    let (m, n) = (a.shape.rows(), a.shape.cols());
    let triplets = (0..n).flat_map(|j| (0..m).map(move |i| (j + i * n, i + j * m, 1.0)));
    let op = csc_from_triplets(a.size(), a.size(), triplets);
    Ok(a.transform(&op, shape.clone()))
}

pub fn lower_trace(kind: &AtomKind, args: &[LinExpr], _: &Shape) -> Lowered {
    let a = arg(kind, args, 0)?;
    let m = a.shape.rows();
    let op = csc_from_triplets(1, a.size(), (0..m).map(|i| (0, i + i * m, 1.0)));
    Ok(a.transform(&op, Shape::scalar()))
}
