//! Solutions mapped back onto the original problem.

use std::collections::HashMap;

use nalgebra::DMatrix;

use super::stuffing::ConeProgram;
use super::{RawSolution, SolveStats, SolveStatus};
use crate::canon::VarKey;
use crate::error::{CvxError, Result};
use crate::expr::{Array, ExprGraph, ExprId};

/// Solution of a problem in terms of its original variables.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    /// Solution status.
    pub status: SolveStatus,
    /// Optimal value of the original objective (if solved).
    pub value: Option<f64>,
    /// Values of the original variables (if solved); auxiliaries are dropped.
    pub primal: Option<HashMap<ExprId, Array>>,
    /// Raw dual vector, one entry per cone-program row (if solved).
    pub dual: Option<Vec<f64>>,
    /// Dual block of each user constraint, in constraint order (if solved).
    pub constraint_duals: Option<Vec<Array>>,
    pub stats: SolveStats,
}

impl SolveResult {
    pub(crate) fn from_raw(program: &ConeProgram, raw: &RawSolution) -> Self {
        if raw.status != SolveStatus::Optimal {
            return SolveResult {
                status: raw.status,
                value: None,
                primal: None,
                dual: None,
                constraint_duals: None,
                stats: raw.stats,
            };
        }

        let objective: f64 = program
            .c
            .iter()
            .zip(&raw.x)
            .map(|(c, x)| c * x)
            .sum::<f64>()
            + program.offset;
        let value = if program.maximize { -objective } else { objective };

        let primal: HashMap<ExprId, Array> = program
            .var_map
            .originals()
            .iter()
            .filter_map(|&id| {
                let cols = program.var_map.columns_of(id)?;
                let (_, shape) = program.var_map.get(VarKey::Original(id))?;
                let values = raw.x.get(cols)?;
                let dense = DMatrix::from_column_slice(shape.rows(), shape.cols(), values);
                Some((id, Array::from_dense(dense)))
            })
            .collect();

        let constraint_duals: Vec<Array> = program
            .constraint_rows
            .iter()
            .map(|rows| {
                let block = raw.z.get(rows.clone()).unwrap_or(&[]);
                if block.len() == 1 {
                    Array::Scalar(block[0])
                } else {
                    Array::from_vec(block.to_vec())
                }
            })
            .collect();

        SolveResult {
            status: raw.status,
            value: Some(value),
            primal: Some(primal),
            dual: Some(raw.z.clone()),
            constraint_duals: Some(constraint_duals),
            stats: raw.stats,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// Get the value of a variable.
    pub fn get_value(&self, var_id: ExprId) -> Option<&Array> {
        self.primal.as_ref().and_then(|p| p.get(&var_id))
    }

    /// Scalar value of a variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is not in the solution or is not
    /// scalar (use [`SolveResult::vector`] for vectors/matrices).
    pub fn value(&self, var_id: ExprId) -> Result<f64> {
        self.get_value(var_id)
            .ok_or_else(|| CvxError::InvalidProblem(format!("{} is not in the solution", var_id)))?
            .as_scalar()
            .ok_or_else(|| {
                CvxError::InvalidProblem(format!("{} is not scalar; use vector()", var_id))
            })
    }

    /// Dense value of a variable (column-major, `n x 1` for vectors).
    pub fn vector(&self, var_id: ExprId) -> Result<DMatrix<f64>> {
        self.get_value(var_id)
            .map(Array::to_dense)
            .ok_or_else(|| CvxError::InvalidProblem(format!("{} is not in the solution", var_id)))
    }

    /// Get all dual variable values, in cone row order.
    pub fn duals(&self) -> Option<&[f64]> {
        self.dual.as_deref()
    }

    /// Dual block of user constraint `idx` (in the order constraints were
    /// added to the problem).
    pub fn constraint_dual(&self, idx: usize) -> Option<&Array> {
        self.constraint_duals.as_ref().and_then(|d| d.get(idx))
    }

    /// Evaluate an expression of `graph` at the primal solution.
    ///
    /// Parameters take their default values.
    pub fn evaluate(&self, graph: &ExprGraph, id: ExprId) -> Result<DMatrix<f64>> {
        let primal = self.primal.as_ref().ok_or_else(|| {
            CvxError::InvalidProblem(format!("no primal solution (status {})", self.status))
        })?;
        graph.evaluate(id, primal)
    }
}
