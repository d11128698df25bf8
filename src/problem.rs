//! Problem definition and solving API.
//!
//! The `Problem` struct represents an optimization problem with:
//! - An objective (minimize or maximize) over a scalar expression
//! - A set of constraints
//! - Values for the parameters it mentions
//!
//! Use the builder pattern to construct problems:
//! ```
//! use cvxcanon::prelude::*;
//!
//! let mut g = ExprGraph::new();
//! let x = g.variable(3);
//! let obj = g.norm1(x)?;
//! let one = g.constant(1.0);
//! let s = g.sum(x)?;
//!
//! let result = Problem::minimize(obj)
//!     .subject_to([s.equals(one)])
//!     .build(g)?
//!     .solve()?;
//! assert_eq!(result.status, SolveStatus::Optimal);
//! # Ok::<(), CvxError>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::warn;

use crate::canon::canonicalize;
use crate::constraints::{Constraint, Relation};
use crate::dcp::Curvature;
use crate::error::{CvxError, Result};
use crate::expr::{Array, ExprGraph, ExprId};
use crate::solver::{
    solve_program, stuff_problem, ClarabelSolver, ConeProgram, ConeSolver, Settings, SolveResult,
};

/// Objective type for optimization problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Minimize the expression.
    Minimize(ExprId),
    /// Maximize the expression (internally converted to minimization).
    Maximize(ExprId),
}

impl Objective {
    /// Get the expression being optimized.
    pub fn expr(&self) -> ExprId {
        match self {
            Objective::Minimize(e) | Objective::Maximize(e) => *e,
        }
    }

    /// Check if this is a minimization.
    pub fn is_minimize(&self) -> bool {
        matches!(self, Objective::Minimize(_))
    }
}

/// A clause of a problem that breaks the DCP rules.
#[derive(Debug, Clone, PartialEq)]
pub enum DcpViolation {
    /// The objective has the wrong curvature for its sense.
    Objective {
        maximize: bool,
        curvature: Curvature,
    },
    /// A constraint's sides have the wrong curvature for its relation.
    Constraint {
        /// Position in the problem's constraint list.
        index: usize,
        relation: Relation,
        lhs: Curvature,
        rhs: Curvature,
    },
}

impl fmt::Display for DcpViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DcpViolation::Objective {
                maximize: false,
                curvature,
            } => write!(f, "objective: minimize requires CONVEX, got {}", curvature),
            DcpViolation::Objective {
                maximize: true,
                curvature,
            } => write!(f, "objective: maximize requires CONCAVE, got {}", curvature),
            DcpViolation::Constraint {
                index,
                relation,
                lhs,
                rhs,
            } => {
                let required = match relation {
                    Relation::Eq => "AFFINE == AFFINE",
                    Relation::Leq => "CONVEX <= CONCAVE",
                    Relation::Geq => "CONCAVE >= CONVEX",
                };
                write!(
                    f,
                    "constraint {}: requires {}, got {} {} {}",
                    index, required, lhs, relation, rhs
                )
            }
        }
    }
}

/// An optimization problem over the nodes of one expression graph.
#[derive(Debug, Clone)]
pub struct Problem {
    graph: Arc<ExprGraph>,
    objective: Objective,
    constraints: Vec<Constraint>,
    params: HashMap<ExprId, Array>,
    violations: OnceLock<Vec<DcpViolation>>,
}

impl Problem {
    /// Create a minimization problem.
    pub fn minimize(expr: ExprId) -> ProblemBuilder {
        ProblemBuilder::new(Objective::Minimize(expr))
    }

    /// Create a maximization problem.
    pub fn maximize(expr: ExprId) -> ProblemBuilder {
        ProblemBuilder::new(Objective::Maximize(expr))
    }

    pub fn graph(&self) -> &ExprGraph {
        &self.graph
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Check if this problem is DCP-compliant.
    ///
    /// A problem is DCP if:
    /// - Minimize: objective is convex
    /// - Maximize: objective is concave
    /// - All constraints are DCP
    pub fn is_dcp(&self) -> bool {
        self.dcp_violations().is_empty()
    }

    /// Every clause breaking the DCP rules, objective first, then
    /// constraints in order. Computed once.
    pub fn dcp_violations(&self) -> &[DcpViolation] {
        self.violations.get_or_init(|| {
            let violations = self.find_violations();
            if !violations.is_empty() {
                warn!(
                    count = violations.len(),
                    first = %violations[0],
                    "problem is not DCP"
                );
            }
            violations
        })
    }

    fn find_violations(&self) -> Vec<DcpViolation> {
        // Handles were validated by the builder.
        let curvature = |id| self.graph.curvature(id).unwrap_or(Curvature::Unknown);
        let mut violations = Vec::new();

        let obj = curvature(self.objective.expr());
        let ok = match self.objective {
            Objective::Minimize(_) => obj.is_convex(),
            Objective::Maximize(_) => obj.is_concave(),
        };
        if !ok {
            violations.push(DcpViolation::Objective {
                maximize: !self.objective.is_minimize(),
                curvature: obj,
            });
        }

        for (index, c) in self.constraints.iter().enumerate() {
            if !c.is_dcp(&self.graph).unwrap_or(false) {
                violations.push(DcpViolation::Constraint {
                    index,
                    relation: c.relation,
                    lhs: curvature(c.lhs),
                    rhs: curvature(c.rhs),
                });
            }
        }
        violations
    }

    fn roots(&self) -> Vec<ExprId> {
        std::iter::once(self.objective.expr())
            .chain(self.constraints.iter().flat_map(|c| c.sides()))
            .collect()
    }

    /// Get all variable IDs in this problem, ordered by handle.
    pub fn variables(&self) -> Vec<ExprId> {
        self.graph.variables(&self.roots()).unwrap_or_default()
    }

    /// Get all parameter IDs in this problem, ordered by handle.
    pub fn parameters(&self) -> Vec<ExprId> {
        self.graph.parameters(&self.roots()).unwrap_or_default()
    }

    /// Value used for a parameter: the problem's own value, else its default.
    pub fn parameter_value(&self, id: ExprId) -> Option<&Array> {
        self.params.get(&id).or_else(|| match self.graph.node(id) {
            Ok(crate::expr::Node::Parameter(p)) => p.value.as_ref(),
            _ => None,
        })
    }

    /// Set the value of a parameter for subsequent solves.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a parameter of the graph, or the value
    /// does not match its shape or declared sign.
    pub fn set_parameter(&mut self, id: ExprId, value: impl Into<Array>) -> Result<()> {
        let value = self.graph.check_parameter_value(id, value.into())?;
        self.params.insert(id, value);
        Ok(())
    }

    /// Canonicalize to a cone program.
    ///
    /// # Errors
    ///
    /// Returns [`CvxError::NotDcp`] listing every violation if the problem is
    /// not DCP.
    pub fn canonicalize(&self) -> Result<ConeProgram> {
        let violations = self.dcp_violations();
        if !violations.is_empty() {
            return Err(CvxError::NotDcp(violations.to_vec()));
        }
        self.lower()
    }

    /// Canonicalize without the DCP gate.
    ///
    /// A graph implementation used against the rules bounds its atom from
    /// one side only, so a non-DCP problem becomes a convex relaxation.
    /// Nodes of unknown curvature still fail to canonicalize.
    pub fn canonicalize_relaxed(&self) -> Result<ConeProgram> {
        if !self.is_dcp() {
            warn!("solving a convex relaxation of a non-DCP problem");
        }
        self.lower()
    }

    fn lower(&self) -> Result<ConeProgram> {
        let canon = canonicalize(
            &self.graph,
            self.objective.expr(),
            !self.objective.is_minimize(),
            &self.constraints,
            &self.params,
        )?;
        Ok(stuff_problem(&canon))
    }

    /// Solve the problem with Clarabel and default settings.
    pub fn solve(&self) -> Result<SolveResult> {
        self.solve_with(&ClarabelSolver::default())
    }

    /// Solve the problem with Clarabel and custom settings.
    pub fn solve_with_settings(&self, settings: Settings) -> Result<SolveResult> {
        self.solve_with(&ClarabelSolver::new(settings))
    }

    /// Solve the problem with any backend.
    ///
    /// Infeasible and unbounded problems are reported through
    /// [`SolveResult::status`], not as errors.
    pub fn solve_with(&self, solver: &dyn ConeSolver) -> Result<SolveResult> {
        let program = self.canonicalize()?;
        solve_program(&program, solver)
    }

    /// Solve the convex relaxation with Clarabel and default settings.
    pub fn solve_relaxed(&self) -> Result<SolveResult> {
        self.solve_relaxed_with(&ClarabelSolver::default())
    }

    /// Solve [`Problem::canonicalize_relaxed`] with any backend.
    pub fn solve_relaxed_with(&self, solver: &dyn ConeSolver) -> Result<SolveResult> {
        let program = self.canonicalize_relaxed()?;
        solve_program(&program, solver)
    }

    /// Evaluate `id` at a solution, using this problem's parameter values.
    pub fn value_at(&self, result: &SolveResult, id: ExprId) -> Result<DMatrix<f64>> {
        let primal = result.primal.as_ref().ok_or_else(|| {
            CvxError::InvalidProblem(format!("no primal solution (status {})", result.status))
        })?;
        let mut values = primal.clone();
        values.extend(self.params.iter().map(|(id, v)| (*id, v.clone())));
        self.graph.evaluate(id, &values)
    }
}

/// Solve independent problems in parallel with Clarabel defaults.
///
/// Results are returned in input order.
pub fn solve_batch(problems: &[Problem]) -> Vec<Result<SolveResult>> {
    problems.par_iter().map(Problem::solve).collect()
}

/// Builder for constructing problems.
#[derive(Debug, Clone)]
pub struct ProblemBuilder {
    objective: Objective,
    constraints: Vec<Constraint>,
    params: Vec<(ExprId, Array)>,
}

impl ProblemBuilder {
    fn new(objective: Objective) -> Self {
        ProblemBuilder {
            objective,
            constraints: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Add constraints to the problem.
    pub fn subject_to(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Add a single constraint.
    pub fn constraint(mut self, c: Constraint) -> Self {
        self.constraints.push(c);
        self
    }

    /// Supply a parameter value.
    pub fn parameter(mut self, id: ExprId, value: impl Into<Array>) -> Self {
        self.params.push((id, value.into()));
        self
    }

    /// Build the problem over `graph`.
    ///
    /// # Errors
    ///
    /// Fails if a handle belongs to another graph, the objective is not
    /// scalar, constraint sides have incompatible shapes, or a parameter
    /// value is invalid. DCP compliance is not checked here.
    pub fn build(self, graph: impl Into<Arc<ExprGraph>>) -> Result<Problem> {
        let graph = graph.into();

        let obj = self.objective.expr();
        let obj_shape = graph.shape(obj)?;
        if obj_shape.size() != 1 {
            return Err(CvxError::InvalidProblem(format!(
                "objective must be scalar, got shape {}",
                obj_shape
            )));
        }

        for (index, c) in self.constraints.iter().enumerate() {
            let (lhs, rhs) = (graph.shape(c.lhs)?, graph.shape(c.rhs)?);
            if lhs.broadcast(rhs).is_none() {
                return Err(CvxError::InvalidProblem(format!(
                    "constraint {}: cannot compare shapes {} and {}",
                    index, lhs, rhs
                )));
            }
        }

        let params = self
            .params
            .into_iter()
            .map(|(id, value)| Ok((id, graph.check_parameter_value(id, value)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Problem {
            graph,
            objective: self.objective,
            constraints: self.constraints,
            params,
            violations: OnceLock::new(),
        })
    }
}
