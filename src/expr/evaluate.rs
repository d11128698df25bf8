//! Numeric evaluation of expressions.
//!
//! Used to fold constant subtrees during canonicalization and to evaluate
//! expressions at a solution.

use std::collections::HashMap;

use nalgebra::DMatrix;

use super::constant::Array;
use super::expression::{ExprGraph, ExprId, Node};
use super::shape::Shape;
use crate::error::{CvxError, Result};

/// Reshape (column-major) or broadcast `value` to the dimensions of `shape`.
///
/// Returns `None` when the element counts are incompatible.
pub fn fit_to_shape(value: &DMatrix<f64>, shape: &Shape) -> Option<DMatrix<f64>> {
    let (rows, cols) = (shape.rows(), shape.cols());
    if value.nrows() == rows && value.ncols() == cols {
        Some(value.clone())
    } else if value.len() == rows * cols {
        Some(DMatrix::from_column_slice(rows, cols, value.as_slice()))
    } else if value.len() == 1 {
        Some(DMatrix::from_element(rows, cols, value[(0, 0)]))
    } else {
        None
    }
}

impl ExprGraph {
    /// Evaluate `id` numerically.
    ///
    /// `values` must hold a value for every reachable variable; parameters
    /// take their entry in `values` if present and their default otherwise.
    /// The result has the dimensions of the node's shape (`1 x 1` for
    /// scalars, `n x 1` for vectors).
    pub fn evaluate(&self, id: ExprId, values: &HashMap<ExprId, Array>) -> Result<DMatrix<f64>> {
        let order = self.post_order(&[id])?;
        let mut memo: HashMap<ExprId, DMatrix<f64>> = HashMap::with_capacity(order.len());

        for node_id in order {
            let shape = self.shape_unchecked(node_id);
            let raw = match self.node_unchecked(node_id) {
                Node::Constant(c) => c.value.to_dense(),
                Node::Variable(_) => values
                    .get(&node_id)
                    .ok_or_else(|| {
                        CvxError::InvalidProblem(format!("no value for variable {}", node_id))
                    })?
                    .to_dense(),
                Node::Parameter(p) => values
                    .get(&node_id)
                    .or(p.value.as_ref())
                    .ok_or_else(|| {
                        CvxError::InvalidProblem(format!("parameter {} has no value", node_id))
                    })?
                    .to_dense(),
                Node::Atom(a) => {
                    let args = a
                        .args
                        .iter()
                        .map(|arg| {
                            memo.get(arg).ok_or_else(|| {
                                CvxError::InvalidProblem(format!("{} evaluated out of order", arg))
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    (a.kind.spec().eval)(&a.kind, &args, shape)
                }
            };
            let value = fit_to_shape(&raw, shape).ok_or_else(|| {
                CvxError::InvalidProblem(format!(
                    "value for {} has {} entries, expected shape {}",
                    node_id,
                    raw.len(),
                    shape
                ))
            })?;
            memo.insert(node_id, value);
        }

        memo.remove(&id)
            .ok_or_else(|| CvxError::InvalidProblem(format!("{} was not evaluated", id)))
    }
}
