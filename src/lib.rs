//! # cvxcanon
//!
//! A Disciplined Convex Programming (DCP) engine.
//!
//! cvxcanon certifies that an optimization problem built from composable
//! atoms is convex, rewrites it into a cone program, and solves it with the
//! Clarabel solver.
//!
//! ## Quick Start
//!
//! ```
//! use cvxcanon::prelude::*;
//!
//! let mut g = ExprGraph::new();
//! let x = VariableBuilder::vector(2).nonneg().build(&mut g);
//! let a = g.constant_matrix(vec![1.0, 0.0, 0.0, 2.0], 2, 2);
//! let b = g.constant(vec![1.0, 1.0]);
//! let ax = g.matmul(a, x)?;
//! let r = g.sub(ax, b)?;
//! let obj = g.sum_squares(r)?;
//!
//! let problem = Problem::minimize(obj).build(g)?;
//! let result = problem.solve()?;
//! assert!(result.is_optimal());
//! # Ok::<(), CvxError>(())
//! ```
//!
//! ## DCP Rules
//!
//! cvxcanon enforces Disciplined Convex Programming rules:
//!
//! - **Minimization** requires a **convex** objective
//! - **Maximization** requires a **concave** objective
//! - **Equality constraints** require **affine** expressions on both sides
//! - **`<=` constraints** require convex `<=` concave
//! - **`>=` constraints** require concave `>=` convex
//!
//! A problem breaking the rules is refused with every violating clause
//! listed (see [`Problem::dcp_violations`]).
//!
//! ## Supported Atoms
//!
//! ### Affine
//! - Arithmetic: `add`, `sub`, `neg`, `mul` (one side constant), `scale`
//! - Aggregation: `sum`, `trace`
//! - Structural: `reshape`, `index`, `transpose`, `vstack`
//! - Linear algebra: `matmul`, `dot`
//!
//! ### Convex
//! - Norms: `norm1`, `norm2`, `norm_inf`
//! - Element-wise: `abs`, `pos`, `neg_part`, `exp`, `power` (p >= 1 or p < 0)
//! - Aggregation: `maximum`, `sum_squares`
//! - Quadratic: `quad_form` (PSD matrix), `quad_over_lin`
//!
//! ### Concave
//! - `minimum`, `log`, `entropy`, `sqrt`, `power` (0 < p < 1),
//!   `quad_form` (NSD matrix)
//!
//! ## Architecture
//!
//! - **Expression graph**: an arena of immutable nodes addressed by `ExprId`
//! - **DCP verification**: memoized curvature and sign inference
//! - **Canonicalization**: affine lowering plus graph implementations that
//!   introduce auxiliary variables and cone constraints
//! - **Solving**: any [`ConeSolver`](solver::ConeSolver); Clarabel by default

pub mod atoms;
pub mod canon;
pub mod constraints;
pub mod dcp;
pub mod error;
pub mod expr;
pub mod problem;
pub mod solver;
pub mod sparse;

/// Prelude module for convenient imports.
///
/// ```
/// use cvxcanon::prelude::*;
/// ```
pub mod prelude {
    // Expression types
    pub use crate::expr::{Array, ExprGraph, ExprId, ParameterBuilder, Shape, VariableBuilder};

    // Constraints
    pub use crate::constraints::{Constraint, ConstraintExt, Relation};

    // DCP
    pub use crate::dcp::{Curvature, Sign};

    // Problem
    pub use crate::problem::{solve_batch, DcpViolation, Objective, Problem, ProblemBuilder};

    // Solver
    pub use crate::solver::{ClarabelSolver, ConeSolver, Settings, SolveResult, SolveStatus};

    // Errors
    pub use crate::error::{CvxError, Result};
}

// Re-export main types at crate root
pub use error::{CvxError, Result};
pub use problem::{solve_batch, Problem};
pub use solver::{SolveResult, SolveStatus};
