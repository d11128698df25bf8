//! Solver interface for cvxcanon.
//!
//! This module provides:
//! - Matrix stuffing to convert canonicalized problems to cone programs
//! - The [`ConeSolver`] trait backends implement
//! - Clarabel solver integration
//! - Unmarshalling of raw solutions onto the original variables

pub mod clarabel;
pub mod solution;
pub mod stuffing;

use tracing::debug;

use crate::error::Result;

pub use self::clarabel::{ClarabelSolver, Settings};
pub use solution::SolveResult;
pub use stuffing::{stuff_problem, ConeDims, ConeProgram, VariableMap};

/// Solution status from the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    /// Optimal solution found.
    Optimal,
    /// Problem is infeasible.
    Infeasible,
    /// Problem is unbounded.
    Unbounded,
    /// Anything else: iteration or time limits, numerical trouble.
    Unknown,
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Unbounded => "UNBOUNDED",
            SolveStatus::Unknown => "UNKNOWN",
        })
    }
}

/// Solve statistics reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveStats {
    pub iterations: u32,
    /// Solve time in seconds.
    pub solve_time: f64,
}

/// What a backend returns for a [`ConeProgram`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawSolution {
    pub status: SolveStatus,
    /// Primal point, one entry per column.
    pub x: Vec<f64>,
    /// Dual point, one entry per row.
    pub z: Vec<f64>,
    pub stats: SolveStats,
}

/// A numerical cone-program solver.
///
/// Infeasibility and unboundedness are statuses of the returned
/// [`RawSolution`]; an `Err` means the backend could not run at all.
pub trait ConeSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, program: &ConeProgram) -> Result<RawSolution>;
}

/// Solve `program` with `solver` and map the result back.
///
/// Programs without constraint rows are decided here: a zero objective
/// vector is optimal at the origin, anything else is unbounded.
pub fn solve_program(program: &ConeProgram, solver: &dyn ConeSolver) -> Result<SolveResult> {
    let raw = if program.num_rows() == 0 {
        presolve_unconstrained(program)
    } else {
        debug!(
            solver = solver.name(),
            vars = program.num_vars(),
            rows = program.num_rows(),
            "invoking cone solver"
        );
        solver.solve(program)?
    };
    debug!(
        status = %raw.status,
        iterations = raw.stats.iterations,
        solve_time = raw.stats.solve_time,
        "solve finished"
    );
    Ok(SolveResult::from_raw(program, &raw))
}

fn presolve_unconstrained(program: &ConeProgram) -> RawSolution {
    let status = if program.c.iter().all(|&v| v == 0.0) {
        SolveStatus::Optimal
    } else {
        SolveStatus::Unbounded
    };
    RawSolution {
        status,
        x: vec![0.0; program.num_vars()],
        z: Vec::new(),
        stats: SolveStats::default(),
    }
}
