//! Error types for cvxcanon.

use thiserror::Error;

use crate::expr::ExprId;
use crate::problem::DcpViolation;

/// Rejected attempt to add a node to an expression graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    /// Wrong number of arguments for an atom.
    #[error("{atom}: expected {expected} argument(s), got {got}")]
    Arity {
        atom: &'static str,
        expected: String,
        got: usize,
    },

    /// Argument shapes are incompatible with the atom.
    #[error("{atom}: shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        atom: &'static str,
        expected: String,
        got: String,
    },

    /// Handle from another graph, or not yet created.
    #[error("expression {0} does not belong to this graph")]
    ForeignNode(ExprId),

    /// Atom parameter outside its domain.
    #[error("{atom}: {reason}")]
    InvalidArgument { atom: &'static str, reason: String },
}

/// A DCP-accepted node the canonicalizer could not rewrite.
///
/// Always a defect: either a node reached canonicalization without a
/// certified curvature, or an atom lacks a lowering rule.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "cannot canonicalize `{atom}`{}: {reason}",
    .node.map(|n| format!(" at node {}", n)).unwrap_or_default()
)]
pub struct CanonicalizationError {
    /// Offending node, when known.
    pub node: Option<ExprId>,
    /// Name of the atom (or leaf kind) being rewritten.
    pub atom: &'static str,
    pub reason: String,
}

impl CanonicalizationError {
    pub fn new(atom: &'static str, reason: impl Into<String>) -> Self {
        CanonicalizationError {
            node: None,
            atom,
            reason: reason.into(),
        }
    }

    /// Attach the offending node unless one is already recorded.
    pub fn at(mut self, node: ExprId) -> Self {
        self.node.get_or_insert(node);
        self
    }
}

/// Error type for cvxcanon operations.
#[derive(Debug, Error)]
pub enum CvxError {
    /// Invalid expression construction.
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// Problem is not DCP-compliant; every violating clause is listed.
    #[error("problem is not DCP: {}", describe_violations(.0))]
    NotDcp(Vec<DcpViolation>),

    /// Canonicalization defect.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// Invalid problem specification.
    #[error("invalid problem: {0}")]
    InvalidProblem(String),

    /// Solver backend failed to run.
    #[error("solver error: {0}")]
    Solver(String),
}

fn describe_violations(violations: &[DcpViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for cvxcanon operations.
pub type Result<T> = std::result::Result<T, CvxError>;
